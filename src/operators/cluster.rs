use crate::operators::excitations::{case_spins, ExcitationList};
use crate::operators::OperatorError;
use crate::system::Dimensions;
use ndarray::prelude::*;

/// Spin-case labels of one excitation rank, in storage order. Mixed cases
/// list their alpha indices first.
pub fn spin_cases(rank: usize) -> &'static [&'static str] {
    match rank {
        1 => &["a", "b"],
        2 => &["aa", "ab", "bb"],
        3 => &["aaa", "aab", "abb", "bbb"],
        4 => &["aaaa", "aaab", "aabb", "abbb", "bbbb"],
        _ => panic!("unsupported excitation rank {}", rank),
    }
}

/// Dense storage shape of a spin case: particle dimensions first, then hole
/// dimensions, each in the label's spin order.
pub fn dense_shape(dims: Dimensions, label: &str) -> Vec<usize> {
    let spins = case_spins(label);
    spins
        .iter()
        .map(|&s| dims.nvir(s))
        .chain(spins.iter().map(|&s| dims.nocc(s)))
        .collect()
}

/// One spin-case block of a cluster or excitation operator. Dense blocks
/// hold the complete amplitude tensor; P-space blocks hold only the
/// amplitudes of an explicit excitation list, aligned row-for-row.
#[derive(Clone, Debug, PartialEq)]
pub enum AmplitudeBlock {
    Dense(ArrayD<f64>),
    Pspace {
        amplitudes: Array1<f64>,
        excitations: ExcitationList,
    },
}

impl AmplitudeBlock {
    pub fn len(&self) -> usize {
        match self {
            AmplitudeBlock::Dense(x) => x.len(),
            AmplitudeBlock::Pspace { amplitudes, .. } => amplitudes.len(),
        }
    }

    pub fn values(&self) -> &[f64] {
        match self {
            AmplitudeBlock::Dense(x) => x.as_slice().unwrap(),
            AmplitudeBlock::Pspace { amplitudes, .. } => amplitudes.as_slice().unwrap(),
        }
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        match self {
            AmplitudeBlock::Dense(x) => x.as_slice_mut().unwrap(),
            AmplitudeBlock::Pspace { amplitudes, .. } => amplitudes.as_slice_mut().unwrap(),
        }
    }

    pub fn dense(&self) -> &ArrayD<f64> {
        match self {
            AmplitudeBlock::Dense(x) => x,
            AmplitudeBlock::Pspace { .. } => panic!("block is stored sparse"),
        }
    }

    pub fn excitations(&self) -> Option<&ExcitationList> {
        match self {
            AmplitudeBlock::Dense(_) => None,
            AmplitudeBlock::Pspace { excitations, .. } => Some(excitations),
        }
    }
}

/// A cluster (or EOM excitation) operator truncated at `order`, stored as
/// one [`AmplitudeBlock`] per spin case per rank. The flattened layout
/// concatenates the blocks rank by rank in [`spin_cases`] order; dense
/// blocks flatten in row-major order and P-space blocks in list order.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterOperator {
    pub dims: Dimensions,
    pub order: usize,
    blocks: Vec<Vec<AmplitudeBlock>>,
}

impl ClusterOperator {
    /// All spin cases dense up to `order`.
    pub fn new(dims: Dimensions, order: usize) -> Self {
        let blocks = (1..=order)
            .map(|rank| {
                spin_cases(rank)
                    .iter()
                    .map(|label| AmplitudeBlock::Dense(ArrayD::zeros(dense_shape(dims, label))))
                    .collect()
            })
            .collect();
        ClusterOperator {
            dims,
            order,
            blocks,
        }
    }

    /// Dense up to `order`, with the listed spin cases replaced by P-space
    /// blocks over the given excitation lists. Amplitudes start at zero.
    pub fn with_pspace(
        dims: Dimensions,
        order: usize,
        lists: Vec<(&str, ExcitationList)>,
    ) -> Result<Self, OperatorError> {
        let mut op = ClusterOperator::new(dims, order);
        for (label, list) in lists {
            if !list.is_canonical(&case_spins(label)) {
                return Err(OperatorError::NonCanonical(canonical_label(label)));
            }
            let n = list.len();
            *op.block_mut(label) = AmplitudeBlock::Pspace {
                amplitudes: Array1::zeros(n),
                excitations: list,
            };
        }
        Ok(op)
    }

    /// A zero operator with the same storage layout, excitation lists
    /// included.
    pub fn zeros_like(&self) -> Self {
        let mut out = self.clone();
        for block in out.blocks.iter_mut().flatten() {
            block.values_mut().iter_mut().for_each(|x| *x = 0.0);
        }
        out
    }

    pub fn labels(&self) -> impl Iterator<Item = &'static str> {
        (1..=self.order).flat_map(|rank| spin_cases(rank).iter().copied())
    }

    pub fn block(&self, label: &str) -> &AmplitudeBlock {
        let (rank, case) = locate(label);
        &self.blocks[rank - 1][case]
    }

    pub fn block_mut(&mut self, label: &str) -> &mut AmplitudeBlock {
        let (rank, case) = locate(label);
        &mut self.blocks[rank - 1][case]
    }

    /// Total number of stored amplitudes.
    pub fn len(&self) -> usize {
        self.len_through(self.order)
    }

    /// Number of stored amplitudes in ranks 1 through `order`.
    pub fn len_through(&self, order: usize) -> usize {
        self.blocks[..order]
            .iter()
            .flatten()
            .map(|b| b.len())
            .sum()
    }

    /// Concatenate every block into a single vector.
    pub fn flatten(&self) -> Array1<f64> {
        let mut out = Array1::zeros(self.len());
        let mut offset = 0;
        for block in self.blocks.iter().flatten() {
            let n = block.len();
            out.slice_mut(s![offset..offset + n])
                .assign(&ArrayView1::from(block.values()));
            offset += n;
        }
        out
    }

    /// Overwrite ranks 1 through `order` from a flattened vector laid out
    /// as produced by [`flatten`](Self::flatten). Blocks above `order` are
    /// left untouched. The vector length must match exactly.
    pub fn unflatten(&mut self, vector: ArrayView1<f64>, order: usize) -> Result<(), OperatorError> {
        let expected = self.len_through(order);
        if vector.len() != expected {
            return Err(OperatorError::LengthMismatch {
                expected,
                got: vector.len(),
            });
        }
        let mut offset = 0;
        for block in self.blocks[..order].iter_mut().flatten() {
            let n = block.len();
            block
                .values_mut()
                .copy_from_slice(vector.slice(s![offset..offset + n]).as_slice().unwrap());
            offset += n;
        }
        Ok(())
    }

    /// Grow a P-space block by appending excitations with zero amplitudes.
    /// Existing amplitudes keep their positions.
    pub fn extend_pspace(
        &mut self,
        label: &str,
        more: &ExcitationList,
    ) -> Result<(), OperatorError> {
        let canonical = canonical_label(label);
        if !more.is_canonical(&case_spins(label)) {
            return Err(OperatorError::NonCanonical(canonical));
        }
        match self.block_mut(label) {
            AmplitudeBlock::Dense(_) => Err(OperatorError::DenseBlock(canonical)),
            AmplitudeBlock::Pspace {
                amplitudes,
                excitations,
            } => {
                excitations.append(more)?;
                let mut grown = Array1::zeros(excitations.len());
                grown.slice_mut(s![..amplitudes.len()]).assign(amplitudes);
                *amplitudes = grown;
                Ok(())
            }
        }
    }

    /// Shrink a P-space block to its first `count` excitations.
    pub fn truncate_pspace(&mut self, label: &str, count: usize) -> Result<(), OperatorError> {
        match self.block_mut(label) {
            AmplitudeBlock::Dense(_) => Err(OperatorError::DenseBlock(canonical_label(label))),
            AmplitudeBlock::Pspace {
                amplitudes,
                excitations,
            } => {
                excitations.truncate(count);
                *amplitudes = amplitudes.slice(s![..count]).to_owned();
                Ok(())
            }
        }
    }

    /// Copy the alpha-dominant spin cases onto their beta mirrors for a
    /// closed-shell reference: the all-alpha case onto the all-beta case,
    /// and the single-beta case onto the single-alpha case with the axes
    /// cycled so the beta index leads. P-space mirrors must hold equally
    /// many excitations and are copied entry for entry.
    pub fn apply_rhf_symmetry(&mut self) -> Result<(), OperatorError> {
        for rank in 1..=self.order {
            let cases = spin_cases(rank);
            let pairs: Vec<(&str, &str, Vec<usize>)> = {
                let mut p = vec![(cases[0], cases[cases.len() - 1], (0..2 * rank).collect())];
                if rank >= 3 {
                    // e.g. aab -> abb via [2, 0, 1, 5, 3, 4].
                    let mut perm: Vec<usize> = vec![rank - 1];
                    perm.extend(0..rank - 1);
                    perm.push(2 * rank - 1);
                    perm.extend(rank..2 * rank - 1);
                    p.push((cases[1], cases[cases.len() - 2], perm));
                }
                p
            };
            for (src, dst, perm) in pairs {
                let source = self.block(src).clone();
                let mismatch = OperatorError::PspaceMismatch {
                    left: canonical_label(src),
                    right: canonical_label(dst),
                    nleft: source.len(),
                    nright: self.block(dst).len(),
                };
                match (source, self.block_mut(dst)) {
                    (AmplitudeBlock::Dense(from), AmplitudeBlock::Dense(to)) => {
                        to.assign(&from.view().permuted_axes(perm.as_slice()));
                    }
                    (
                        AmplitudeBlock::Pspace {
                            amplitudes: from,
                            excitations: from_exc,
                        },
                        AmplitudeBlock::Pspace {
                            amplitudes: to,
                            excitations: to_exc,
                        },
                    ) => {
                        if from_exc.len() != to_exc.len() {
                            return Err(mismatch);
                        }
                        to.assign(&from);
                    }
                    _ => return Err(mismatch),
                }
            }
        }
        Ok(())
    }

    pub fn dot(&self, other: &ClusterOperator) -> f64 {
        self.blocks
            .iter()
            .flatten()
            .zip(other.blocks.iter().flatten())
            .map(|(x, y)| {
                x.values()
                    .iter()
                    .zip(y.values())
                    .map(|(a, b)| a * b)
                    .sum::<f64>()
            })
            .sum()
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }
}

fn locate(label: &str) -> (usize, usize) {
    let rank = label.len();
    let case = spin_cases(rank)
        .iter()
        .position(|&c| c == label)
        .unwrap_or_else(|| panic!("unknown spin case {}", label));
    (rank, case)
}

fn canonical_label(label: &str) -> &'static str {
    let (rank, case) = locate(label);
    spin_cases(rank)[case]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::excitations::ExcitationList;

    fn filled(dims: Dimensions, order: usize) -> ClusterOperator {
        let mut t = ClusterOperator::new(dims, order);
        let n = t.len();
        t.unflatten(
            Array1::from_iter((0..n).map(|k| 0.01 * k as f64 - 0.3)).view(),
            order,
        )
        .unwrap();
        t
    }

    #[test]
    fn flatten_round_trips_bit_for_bit() {
        let dims = Dimensions::new(2, 2, 3, 3);
        let t = filled(dims, 2);
        let v = t.flatten();
        let mut u = ClusterOperator::new(dims, 2);
        u.unflatten(v.view(), 2).unwrap();
        assert_eq!(t, u);
    }

    #[test]
    fn sparse_blocks_round_trip_in_list_order() {
        let dims = Dimensions::new(2, 2, 2, 2);
        let lists = vec![
            ("aab", ExcitationList::full(dims, "aab")),
            ("abb", ExcitationList::full(dims, "abb")),
        ];
        let mut t = ClusterOperator::with_pspace(dims, 3, lists).unwrap();
        let n = t.len();
        let v = Array1::from_iter((0..n).map(|k| (k as f64).sin()));
        t.unflatten(v.view(), 3).unwrap();
        assert_eq!(t.flatten(), v);
    }

    #[test]
    fn unflatten_rejects_a_wrong_length() {
        let dims = Dimensions::new(2, 2, 2, 2);
        let mut t = ClusterOperator::new(dims, 2);
        let err = t.unflatten(Array1::zeros(3).view(), 2).unwrap_err();
        assert!(matches!(err, OperatorError::LengthMismatch { got: 3, .. }));
    }

    #[test]
    fn rank_restricted_unflatten_leaves_higher_ranks_alone() {
        let dims = Dimensions::new(2, 2, 2, 2);
        let mut t = filled(dims, 2);
        let doubles = t.block("ab").clone();
        let singles = Array1::from_elem(t.len_through(1), 7.0);
        t.unflatten(singles.view(), 1).unwrap();
        assert_eq!(t.block("a").values(), vec![7.0; 4]);
        assert_eq!(t.block("ab"), &doubles);
    }

    #[test]
    fn extend_then_truncate_is_the_identity() {
        let dims = Dimensions::new(2, 2, 2, 2);
        let full = ExcitationList::full(dims, "aab");
        let mut first = full.clone();
        first.truncate(2);
        let mut rest = full.clone();
        rest.dets = rest.dets.slice(s![2.., ..]).to_owned();

        let mut t = ClusterOperator::with_pspace(dims, 3, vec![("aab", first)]).unwrap();
        t.block_mut("aab").values_mut().copy_from_slice(&[0.1, -0.2]);
        let original = t.clone();
        t.extend_pspace("aab", &rest).unwrap();
        assert_eq!(t.block("aab").len(), 4);
        assert_eq!(&t.block("aab").values()[..2], &[0.1, -0.2]);
        t.truncate_pspace("aab", 2).unwrap();
        assert_eq!(t, original);
    }

    #[test]
    fn extend_fails_on_a_dense_block() {
        let dims = Dimensions::new(2, 2, 2, 2);
        let mut t = ClusterOperator::new(dims, 2);
        let err = t
            .extend_pspace("ab", &ExcitationList::empty(2))
            .unwrap_err();
        assert_eq!(err, OperatorError::DenseBlock("ab"));
    }

    #[test]
    fn rhf_copy_mirrors_the_alpha_cases() {
        let dims = Dimensions::new(2, 2, 2, 2);
        let mut t = filled(dims, 3);
        t.apply_rhf_symmetry().unwrap();
        assert_eq!(t.block("a").values(), t.block("b").values());
        assert_eq!(t.block("aa").values(), t.block("bb").values());
        let aab = t.block("aab").dense().clone();
        let abb = t.block("abb").dense();
        let mirrored = aab.view().permuted_axes(&[2usize, 0, 1, 5, 3, 4][..]);
        assert_eq!(abb, &mirrored.to_owned());
    }

    #[test]
    fn rhf_copy_needs_matching_pspace_sizes() {
        let dims = Dimensions::new(2, 2, 2, 2);
        let mut short = ExcitationList::full(dims, "abb");
        short.truncate(1);
        let lists = vec![
            ("aab", ExcitationList::full(dims, "aab")),
            ("abb", short),
            ("aaa", ExcitationList::empty(3)),
            ("bbb", ExcitationList::empty(3)),
        ];
        let mut t = ClusterOperator::with_pspace(dims, 3, lists).unwrap();
        let err = t.apply_rhf_symmetry().unwrap_err();
        assert!(matches!(err, OperatorError::PspaceMismatch { .. }));
    }
}
