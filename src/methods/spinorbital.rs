//! Translation between the per-spin-case operator storage and the combined
//! spin-orbital layout the residual machinery contracts in.
//!
//! Combined hole indices run `0..no` with the alpha holes first, combined
//! particle indices run `0..nv` with the alpha particles first. Full
//! combined orbital indices put all holes before all particles, so a rank-k
//! amplitude tensor has shape `(nv, .., nv, no, .., no)` and the integral
//! tensors have shape `(n, n)` and `(n, n, n, n)`.

use crate::hamiltonian::Hamiltonian;
use crate::operators::antisym::parity;
use crate::operators::cluster::AmplitudeBlock;
use crate::operators::excitations::case_spins;
use crate::operators::ClusterOperator;
use crate::system::{Dimensions, Spin};
use itertools::Itertools;
use ndarray::prelude::*;

/// Combined hole index of a per-spin occupied orbital.
pub fn hole(dims: Dimensions, spin: Spin, local: usize) -> usize {
    match spin {
        Spin::Alpha => local,
        Spin::Beta => dims.noa + local,
    }
}

/// Combined particle index of a per-spin virtual orbital.
pub fn particle(dims: Dimensions, spin: Spin, local: usize) -> usize {
    match spin {
        Spin::Alpha => local,
        Spin::Beta => dims.nua + local,
    }
}

/// Spin and per-spin full-range (occupied-first) index of a full combined
/// orbital index.
pub fn orbital(dims: Dimensions, p: usize) -> (Spin, usize) {
    let no = dims.no();
    if p < dims.noa {
        (Spin::Alpha, p)
    } else if p < no {
        (Spin::Beta, p - dims.noa)
    } else if p < no + dims.nua {
        (Spin::Alpha, dims.noa + (p - no))
    } else {
        (Spin::Beta, dims.nob + (p - no - dims.nua))
    }
}

/// Full combined orbital index of a per-spin full-range orbital.
pub fn combined(dims: Dimensions, spin: Spin, p: usize) -> usize {
    if p < dims.nocc(spin) {
        hole(dims, spin, p)
    } else {
        dims.no() + particle(dims, spin, p - dims.nocc(spin))
    }
}

/// Cluster or excitation amplitudes in the combined spin-orbital layout,
/// fully antisymmetric in their particle and hole groups.
#[derive(Clone, Debug)]
pub struct Amplitudes {
    pub t1: ArrayD<f64>,
    pub t2: ArrayD<f64>,
    pub t3: Option<ArrayD<f64>>,
}

impl Amplitudes {
    pub fn zeros(dims: Dimensions, with_triples: bool) -> Self {
        let (no, nv) = (dims.no(), dims.nv());
        Amplitudes {
            t1: ArrayD::zeros(vec![nv, no]),
            t2: ArrayD::zeros(vec![nv, nv, no, no]),
            t3: with_triples.then(|| ArrayD::zeros(vec![nv, nv, nv, no, no, no])),
        }
    }

    pub fn rank(&self, rank: usize) -> &ArrayD<f64> {
        match rank {
            1 => &self.t1,
            2 => &self.t2,
            3 => self.t3.as_ref().unwrap(),
            _ => panic!("unsupported excitation rank {}", rank),
        }
    }

    pub fn rank_mut(&mut self, rank: usize) -> &mut ArrayD<f64> {
        match rank {
            1 => &mut self.t1,
            2 => &mut self.t2,
            3 => self.t3.as_mut().unwrap(),
            _ => panic!("unsupported excitation rank {}", rank),
        }
    }
}

/// Write one spin-case amplitude into every signed index arrangement of the
/// combined tensor.
fn scatter_entry(
    out: &mut ArrayD<f64>,
    dims: Dimensions,
    spins: &[Spin],
    locals: &[usize],
    value: f64,
) {
    let rank = spins.len();
    let particles: Vec<usize> = (0..rank)
        .map(|c| particle(dims, spins[c], locals[c]))
        .collect();
    let holes: Vec<usize> = (0..rank)
        .map(|c| hole(dims, spins[c], locals[rank + c]))
        .collect();
    for sigma in (0..rank).permutations(rank) {
        for tau in (0..rank).permutations(rank) {
            let sign = parity(&sigma) * parity(&tau);
            let index: Vec<usize> = sigma
                .iter()
                .map(|&c| particles[c])
                .chain(tau.iter().map(|&c| holes[c]))
                .collect();
            out[IxDyn(&index)] = sign * value;
        }
    }
}

/// Combined index tuple of a spin-case entry in its natural arrangement
/// (alpha indices leading, as stored).
fn natural_index(dims: Dimensions, spins: &[Spin], locals: &[usize]) -> Vec<usize> {
    let rank = spins.len();
    (0..rank)
        .map(|c| particle(dims, spins[c], locals[c]))
        .chain((0..rank).map(|c| hole(dims, spins[c], locals[rank + c])))
        .collect()
}

/// Expand a spin-case operator into the combined layout. Same-spin blocks
/// are assumed antisymmetric, which every producer in the program
/// maintains.
pub fn scatter(t: &ClusterOperator) -> Amplitudes {
    let dims = t.dims;
    let mut out = Amplitudes::zeros(dims, t.order >= 3);
    for label in t.labels().collect::<Vec<_>>() {
        let spins = case_spins(label);
        let rank = spins.len();
        let target = out.rank_mut(rank);
        match t.block(label) {
            AmplitudeBlock::Dense(x) => {
                for (index, &value) in x.indexed_iter() {
                    if value == 0.0 {
                        continue;
                    }
                    let locals: Vec<usize> = (0..2 * rank).map(|c| index[c]).collect();
                    scatter_entry(target, dims, &spins, &locals, value);
                }
            }
            AmplitudeBlock::Pspace {
                amplitudes,
                excitations,
            } => {
                for (row, det) in excitations.dets.rows().into_iter().enumerate() {
                    let locals: Vec<usize> = det.iter().cloned().collect();
                    scatter_entry(target, dims, &spins, &locals, amplitudes[row]);
                }
            }
        }
    }
    out
}

/// Read a combined tensor back into the storage layout of `template`,
/// touching only the stored entries. P-space blocks read exactly the
/// amplitudes on their excitation lists.
pub fn gather(combined: &Amplitudes, template: &ClusterOperator) -> ClusterOperator {
    let dims = template.dims;
    let mut out = template.zeros_like();
    for label in template.labels().collect::<Vec<_>>() {
        let spins = case_spins(label);
        let rank = spins.len();
        let source = combined.rank(rank);
        match out.block_mut(label) {
            AmplitudeBlock::Dense(x) => {
                for (index, value) in x.indexed_iter_mut() {
                    let locals: Vec<usize> = (0..2 * rank).map(|c| index[c]).collect();
                    *value = source[IxDyn(&natural_index(dims, &spins, &locals))];
                }
            }
            AmplitudeBlock::Pspace {
                amplitudes,
                excitations,
            } => {
                for (row, det) in excitations.dets.rows().into_iter().enumerate() {
                    let locals: Vec<usize> = det.iter().cloned().collect();
                    amplitudes[row] = source[IxDyn(&natural_index(dims, &spins, &locals))];
                }
            }
        }
    }
    out
}

/// The one-body part of an integral container in the combined layout.
pub fn combined_fock(h: &Hamiltonian) -> ArrayD<f64> {
    let dims = h.dims;
    let n = dims.n();
    let mut f = ArrayD::zeros(vec![n, n]);
    for p in 0..n {
        for q in 0..n {
            f[[p, q]] = h.f_elem(orbital(dims, p), orbital(dims, q));
        }
    }
    f
}

/// The antisymmetrized two-body part in the combined layout,
/// `v[p, q, r, s] = <pq||rs>`.
pub fn combined_eri(h: &Hamiltonian) -> ArrayD<f64> {
    let dims = h.dims;
    let n = dims.n();
    let mut v = ArrayD::zeros(vec![n, n, n, n]);
    for p in 0..n {
        for q in 0..n {
            for r in 0..n {
                for s in 0..n {
                    v[[p, q, r, s]] =
                        h.v_elem(orbital(dims, p), orbital(dims, q), orbital(dims, r), orbital(dims, s));
                }
            }
        }
    }
    v
}

/// Pack combined one- and two-body tensors back into the per-spin-case
/// integral container.
pub fn hamiltonian_from_combined(dims: Dimensions, f: &ArrayD<f64>, v: &ArrayD<f64>) -> Hamiltonian {
    let mut h = Hamiltonian::zeros(dims);
    for (one, spin) in [(&mut h.a, Spin::Alpha), (&mut h.b, Spin::Beta)] {
        let norb = dims.norb(spin);
        for p in 0..norb {
            for q in 0..norb {
                one[[p, q]] = f[[combined(dims, spin, p), combined(dims, spin, q)]];
            }
        }
    }
    let cases: [(&mut Array4<f64>, Spin, Spin); 3] = [
        (&mut h.aa, Spin::Alpha, Spin::Alpha),
        (&mut h.ab, Spin::Alpha, Spin::Beta),
        (&mut h.bb, Spin::Beta, Spin::Beta),
    ];
    for (block, s1, s2) in cases {
        let (n1, n2) = (dims.norb(s1), dims.norb(s2));
        for p in 0..n1 {
            for q in 0..n2 {
                for r in 0..n1 {
                    for s in 0..n2 {
                        block[[p, q, r, s]] = v[[
                            combined(dims, s1, p),
                            combined(dims, s2, q),
                            combined(dims, s1, r),
                            combined(dims, s2, s),
                        ]];
                    }
                }
            }
        }
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::antisym::antisymmetrize;
    use crate::utils::fixtures::minimal_pair;
    use approx::assert_abs_diff_eq;

    fn antisymmetric_operator(dims: Dimensions, order: usize) -> ClusterOperator {
        let mut t = ClusterOperator::new(dims, order);
        for label in t.labels().collect::<Vec<_>>() {
            let spins = case_spins(label);
            let rank = spins.len();
            if let AmplitudeBlock::Dense(x) = t.block_mut(label) {
                let seeded = ArrayD::from_shape_fn(x.shape().to_vec(), |ix| {
                    (0..2 * rank)
                        .map(|c| (ix[c] as f64 + 1.3) * (c as f64 + 0.7))
                        .sum::<f64>()
                        .sin()
                });
                // Antisymmetrize within each same-spin particle and hole run.
                let mut groups: Vec<Vec<usize>> = Vec::new();
                for half in 0..2 {
                    let mut start = 0;
                    while start < rank {
                        let mut end = start + 1;
                        while end < rank && spins[end] == spins[start] {
                            end += 1;
                        }
                        groups.push((half * rank + start..half * rank + end).collect());
                        start = end;
                    }
                }
                let refs: Vec<&[usize]> = groups.iter().map(|g| g.as_slice()).collect();
                *x = antisymmetrize(seeded.view(), &refs);
            }
        }
        t
    }

    #[test]
    fn scatter_then_gather_is_the_identity() {
        let dims = Dimensions::new(2, 2, 2, 2);
        let t = antisymmetric_operator(dims, 3);
        let combined = scatter(&t);
        let back = gather(&combined, &t);
        for (x, y) in t.flatten().iter().zip(back.flatten().iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-13);
        }
    }

    #[test]
    fn scattered_tensors_are_antisymmetric() {
        let dims = Dimensions::new(1, 1, 2, 2);
        let t = antisymmetric_operator(dims, 2);
        let t2 = &scatter(&t).t2;
        let (nv, no) = (dims.nv(), dims.no());
        for a in 0..nv {
            for b in 0..nv {
                for i in 0..no {
                    for j in 0..no {
                        assert_abs_diff_eq!(
                            t2[[a, b, i, j]],
                            -t2[[b, a, i, j]],
                            epsilon = 1e-13
                        );
                        assert_abs_diff_eq!(
                            t2[[a, b, i, j]],
                            -t2[[a, b, j, i]],
                            epsilon = 1e-13
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn combined_integrals_round_trip_through_the_container() {
        let (system, h) = minimal_pair();
        let f = combined_fock(&h);
        let v = combined_eri(&h);
        let back = hamiltonian_from_combined(system.dims, &f, &v);
        assert_abs_diff_eq!(&back.a, &h.a, epsilon = 1e-14);
        assert_abs_diff_eq!(&back.aa, &h.aa, epsilon = 1e-14);
        assert_abs_diff_eq!(&back.ab, &h.ab, epsilon = 1e-14);
        // The combined two-body tensor carries the full antisymmetry.
        let n = system.dims.n();
        for p in 0..n {
            for q in 0..n {
                for r in 0..n {
                    for s in 0..n {
                        assert_abs_diff_eq!(
                            v[[p, q, r, s]],
                            -v[[q, p, r, s]],
                            epsilon = 1e-14
                        );
                        assert_abs_diff_eq!(v[[p, q, r, s]], v[[r, s, p, q]], epsilon = 1e-14);
                    }
                }
            }
        }
    }
}
