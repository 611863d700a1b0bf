use crate::operators::OperatorError;
use crate::system::{Dimensions, Spin};
use itertools::Itertools;
use ndarray::prelude::*;

/// Particle (equivalently hole) spins of a spin-case label such as "aab".
pub fn case_spins(label: &str) -> Vec<Spin> {
    label
        .chars()
        .map(|c| if c == 'a' { Spin::Alpha } else { Spin::Beta })
        .collect()
}

/// Ordered list of excitation index tuples defining the sparse support of a
/// P-space amplitude block. Each row holds `rank` particle indices followed
/// by `rank` hole indices, 0-based and local to the spin channel given by
/// the owning spin case. Rows are canonical: within every same-spin index
/// group the indices increase strictly. The list must stay aligned
/// row-for-row with its amplitude vector; it is appended to, never
/// reordered.
#[derive(Clone, Debug, PartialEq)]
pub struct ExcitationList {
    pub rank: usize,
    pub dets: Array2<usize>,
}

impl ExcitationList {
    pub fn new(rank: usize, dets: Array2<usize>) -> Self {
        assert_eq!(dets.ncols(), 2 * rank);
        ExcitationList { rank, dets }
    }

    pub fn empty(rank: usize) -> Self {
        ExcitationList {
            rank,
            dets: Array2::zeros((0, 2 * rank)),
        }
    }

    pub fn len(&self) -> usize {
        self.dets.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enumerate the complete canonical excitation space of a spin case,
    /// e.g. every (particle, hole) tuple of case "aab". The enumeration
    /// order is lexicographic in (alpha particles, beta particles, alpha
    /// holes, beta holes) and is the reference order used by the dense
    /// consistency tests.
    pub fn full(dims: Dimensions, label: &str) -> Self {
        let spins = case_spins(label);
        let rank = spins.len();
        let n_alpha = spins.iter().filter(|&&s| s == Spin::Alpha).count();
        let n_beta = rank - n_alpha;

        let group = |n: usize, k: usize| -> Vec<Vec<usize>> {
            if k == 0 {
                vec![Vec::new()]
            } else {
                (0..n).combinations(k).collect()
            }
        };
        let particles: Vec<Vec<usize>> = group(dims.nvir(Spin::Alpha), n_alpha)
            .into_iter()
            .cartesian_product(group(dims.nvir(Spin::Beta), n_beta))
            .map(|(a, b)| a.into_iter().chain(b).collect())
            .collect();
        let holes: Vec<Vec<usize>> = group(dims.nocc(Spin::Alpha), n_alpha)
            .into_iter()
            .cartesian_product(group(dims.nocc(Spin::Beta), n_beta))
            .map(|(a, b)| a.into_iter().chain(b).collect())
            .collect();

        let mut dets = Array2::zeros((particles.len() * holes.len(), 2 * rank));
        for (row, (p, h)) in particles
            .iter()
            .cartesian_product(holes.iter())
            .enumerate()
        {
            for (c, &idx) in p.iter().chain(h.iter()).enumerate() {
                dets[[row, c]] = idx;
            }
        }
        ExcitationList { rank, dets }
    }

    /// Check the strict ordering of every same-spin index group. `spins`
    /// are the particle spins of the owning spin case.
    pub fn is_canonical(&self, spins: &[Spin]) -> bool {
        for row in self.dets.rows() {
            for half in 0..2 {
                let offset = half * self.rank;
                for c in 1..self.rank {
                    if spins[c] == spins[c - 1] && row[offset + c] <= row[offset + c - 1] {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Append the rows of `more`, preserving the order of both lists.
    pub fn append(&mut self, more: &ExcitationList) -> Result<(), OperatorError> {
        if more.rank != self.rank {
            return Err(OperatorError::NonCanonical("appended list"));
        }
        let mut dets = Array2::zeros((self.len() + more.len(), 2 * self.rank));
        dets.slice_mut(s![..self.len(), ..]).assign(&self.dets);
        dets.slice_mut(s![self.len().., ..]).assign(&more.dets);
        self.dets = dets;
        Ok(())
    }

    /// Drop all rows past `count`.
    pub fn truncate(&mut self, count: usize) {
        self.dets = self.dets.slice(s![..count, ..]).to_owned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_enumeration_counts() {
        let dims = Dimensions::new(2, 2, 2, 2);
        // aab triples: C(2,2) * 2 particles x C(2,2) * 2 holes = 4 dets.
        let list = ExcitationList::full(dims, "aab");
        assert_eq!(list.len(), 4);
        assert!(list.is_canonical(&case_spins("aab")));
        // aaa triples need three alpha particles out of two: empty.
        assert_eq!(ExcitationList::full(dims, "aaa").len(), 0);
    }

    #[test]
    fn canonical_ordering_is_enforced_per_spin_group() {
        let spins = case_spins("aab");
        let good = ExcitationList::new(3, array![[0, 1, 0, 0, 1, 1]]);
        assert!(good.is_canonical(&spins));
        let bad = ExcitationList::new(3, array![[1, 0, 0, 0, 1, 1]]);
        assert!(!bad.is_canonical(&spins));
    }

    #[test]
    fn append_then_truncate_restores_the_original() {
        let mut list = ExcitationList::new(3, array![[0, 1, 0, 0, 1, 0]]);
        let original = list.clone();
        let more = ExcitationList::new(3, array![[0, 1, 1, 0, 1, 1]]);
        list.append(&more).unwrap();
        assert_eq!(list.len(), 2);
        list.truncate(1);
        assert_eq!(list, original);
    }
}
