//! CCSDT-1 extends the CCSD tables by the lowest-order triples channel:
//! the rank-3 equations keep the two-body drive out of T2 plus the diagonal
//! one-body dressing of T3, and T3 feeds back into the rank-1 and rank-2
//! projections through the bare integrals. The back-coupling into rank 2
//! is the adjoint of the rank-3 drive, which the tests pin down.

use crate::hamiltonian::Hamiltonian;
use crate::methods::ccsd;
use crate::methods::terms::{term, Block::*, Term, TermEngine};

/// Rank-3 projection in raw `A(abc)A(ijk)` form. A contribution carrying
/// `P(a/bc)P(k/ij)` enters with a quarter of its textbook weight; the
/// one-body terms, antisymmetric in one particle or hole pair already,
/// enter with a twelfth.
pub fn triples_terms() -> Vec<Term> {
    vec![
        term(0.25, Vvvo, "bcek", &[(2, "aeij")]),
        term(-0.25, Ovoo, "mcjk", &[(2, "abim")]),
        term(1.0 / 12.0, Fvv, "ce", &[(3, "abeijk")]),
        term(-1.0 / 12.0, Foo, "mk", &[(3, "abcijm")]),
    ]
}

/// T3 contributions to the rank-1 projection.
pub fn singles_feedback() -> Vec<Term> {
    vec![term(0.25, Oovv, "mnef", &[(3, "aefimn")])]
}

/// T3 contributions to the rank-2 projection, raw form. The two-body
/// entries are the transposes of the rank-3 drive.
pub fn doubles_feedback() -> Vec<Term> {
    vec![
        term(0.25, Fov, "me", &[(3, "abeijm")]),
        term(0.25, Vvvo, "efbm", &[(3, "aefijm")]),
        term(-0.25, Ovoo, "jemn", &[(3, "abeimn")]),
    ]
}

/// CCSDT-1 engine over the given integral container.
pub fn engine(h: &Hamiltonian) -> TermEngine {
    let mut singles = ccsd::singles_terms();
    singles.extend(singles_feedback());
    let mut doubles = ccsd::doubles_terms();
    doubles.extend(doubles_feedback());
    TermEngine::new(
        h,
        ccsd::energy_terms(),
        vec![singles, doubles, triples_terms()],
        true,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::spinorbital::{scatter, Amplitudes};
    use crate::methods::terms::TermEngine;
    use crate::operators::antisym::antisymmetrize;
    use crate::operators::cluster::AmplitudeBlock;
    use crate::operators::excitations::case_spins;
    use crate::operators::ClusterOperator;
    use crate::utils::fixtures::four_orbital;
    use approx::assert_abs_diff_eq;

    fn random_amplitudes(dims: crate::system::Dimensions, seed: f64) -> Amplitudes {
        let mut t = ClusterOperator::new(dims, 3);
        for label in t.labels().collect::<Vec<_>>() {
            let spins = case_spins(label);
            let rank = spins.len();
            if let AmplitudeBlock::Dense(x) = t.block_mut(label) {
                let seeded = ndarray::ArrayD::from_shape_fn(x.shape().to_vec(), |ix| {
                    (0..2 * rank)
                        .map(|c| (ix[c] as f64 + seed) * (c as f64 + 1.1))
                        .sum::<f64>()
                        .sin()
                        * 0.03
                });
                if rank == 1 {
                    *x = seeded;
                } else {
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
        }
        scatter(&t)
    }

    /// The two-body back-coupling into rank 2 must be the adjoint of the
    /// two-body drive of rank 3 in the weighted inner product, because
    /// both stem from the same Hamiltonian matrix elements.
    #[test]
    fn doubles_feedback_is_the_transpose_of_the_triples_drive() {
        let (system, h) = four_orbital();
        let drive: Vec<Term> = triples_terms()
            .into_iter()
            .filter(|t| t.amps.iter().all(|&(rank, _)| rank == 2))
            .collect();
        let feedback: Vec<Term> = doubles_feedback()
            .into_iter()
            .filter(|t| !matches!(t.block, Fov))
            .collect();
        let drive_engine = TermEngine::new(&h, vec![], vec![vec![], vec![], drive], true);
        let feedback_engine = TermEngine::new(&h, vec![], vec![vec![], feedback, vec![]], true);

        let t = Amplitudes::zeros(system.dims, true);
        let x2 = random_amplitudes(system.dims, 0.9);
        let x3 = random_amplitudes(system.dims, 2.6);
        // <x3, drive(x2)> against <feedback(x3), x2>, where feedback reads
        // the rank-3 part of its argument.
        let lhs = drive_engine.weighted_dot(&x3, &drive_engine.sigma(&t, &x2));
        let rhs = feedback_engine.weighted_dot(&feedback_engine.sigma(&t, &x3), &x2);
        assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-10);
    }

    #[test]
    fn sigma_matches_a_finite_difference_of_the_residual() {
        let (system, h) = four_orbital();
        let engine = engine(&h);
        let t = random_amplitudes(system.dims, 0.4);
        let r = random_amplitudes(system.dims, 1.7);
        let sigma = engine.sigma(&t, &r);

        let eps = 1e-5;
        let mut plus = t.clone();
        let mut minus = t.clone();
        for rank in 1..=3 {
            plus.rank_mut(rank).zip_mut_with(r.rank(rank), |x, &d| *x += eps * d);
            minus
                .rank_mut(rank)
                .zip_mut_with(r.rank(rank), |x, &d| *x -= eps * d);
        }
        let fd_plus = engine.residual(&plus);
        let fd_minus = engine.residual(&minus);
        for rank in 1..=3 {
            for (s, (p, m)) in sigma
                .rank(rank)
                .iter()
                .zip(fd_plus.rank(rank).iter().zip(fd_minus.rank(rank).iter()))
            {
                assert_abs_diff_eq!(*s, (p - m) / (2.0 * eps), epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn transpose_products_agree_in_the_weighted_inner_product() {
        let (system, h) = four_orbital();
        let engine = engine(&h);
        let t = random_amplitudes(system.dims, 0.4);
        let l = random_amplitudes(system.dims, 2.3);
        let r = random_amplitudes(system.dims, 3.1);
        let lhs = engine.weighted_dot(&engine.sigma_transpose(&t, &l), &r);
        let rhs = engine.weighted_dot(&l, &engine.sigma(&t, &r));
        assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-10);
    }

    #[test]
    fn triples_residual_is_antisymmetric_within_spin_groups() {
        let (system, h) = four_orbital();
        let engine = engine(&h);
        let t = random_amplitudes(system.dims, 1.2);
        let r3 = engine.residual(&t).t3.unwrap();
        let (nv, no) = (system.dims.nv(), system.dims.no());
        for a in 0..nv {
            for b in 0..nv {
                for c in 0..nv {
                    for i in 0..no {
                        for j in 0..no {
                            for k in 0..no {
                                assert_abs_diff_eq!(
                                    r3[[a, b, c, i, j, k]],
                                    -r3[[b, a, c, i, j, k]],
                                    epsilon = 1e-11
                                );
                                assert_abs_diff_eq!(
                                    r3[[a, b, c, i, j, k]],
                                    -r3[[a, b, c, j, i, k]],
                                    epsilon = 1e-11
                                );
                            }
                        }
                    }
                }
            }
        }
    }
}
