//! Similarity-transformed integral container. After the ground-state
//! amplitudes have converged, the blocks of `e^-T H e^T` that the guess
//! machinery consumes are assembled once and scattered back into the
//! spin-case container layout: the dressed one-body operator, the
//! hole-hole and particle-particle ladders over the tau amplitudes, and
//! the full ring block. The occupied-occupied-virtual-virtual slab is
//! untouched by the transformation and is stored bare; every other
//! two-body slab is left at zero.

use crate::hamiltonian::Hamiltonian;
use crate::methods::ccsd;
use crate::methods::spinorbital::{hamiltonian_from_combined, Amplitudes};
use crate::methods::terms::{Block, HamBlocks, TermEngine};
use ndarray::prelude::*;
use ndarray_einsum_beta::{einsum, ArrayLike};

fn contract(spec: &str, operands: &[&ArrayD<f64>]) -> ArrayD<f64> {
    let refs: Vec<&dyn ArrayLike<f64>> =
        operands.iter().map(|x| *x as &dyn ArrayLike<f64>).collect();
    einsum(spec, &refs).unwrap_or_else(|e| panic!("contraction '{}' failed: {}", spec, e))
}

/// Build the dressed container from the bare integrals and converged
/// amplitudes.
pub fn similarity_transform(h: &Hamiltonian, t: &Amplitudes) -> Hamiltonian {
    let dims = h.dims;
    let (no, n) = (dims.no(), dims.n());
    let blocks = HamBlocks::new(h);
    let foo = blocks.get(Block::Foo);
    let fov = blocks.get(Block::Fov);
    let fvv = blocks.get(Block::Fvv);
    let oooo = blocks.get(Block::Oooo);
    let ooov = blocks.get(Block::Ooov);
    let oovo = blocks.get(Block::Oovo);
    let oovv = blocks.get(Block::Oovv);
    let ovvo = blocks.get(Block::Ovvo);
    let ovvv = blocks.get(Block::Ovvv);
    let vovv = blocks.get(Block::Vovv);
    let vvvv = blocks.get(Block::Vvvv);
    let (t1, t2) = (&t.t1, &t.t2);

    // Dressed one-body operator.
    let h_ov = fov + &contract("mnef,fn->me", &[oovv, t1]);
    let h_oo = foo
        + &contract("me,ei->mi", &[&h_ov, t1])
        + &contract("mnie,en->mi", &[ooov, t1])
        + &contract("mnef,efin->mi", &[oovv, t2]).mapv(|x| 0.5 * x);
    let h_vv = fvv - &contract("am,me->ae", &[t1, &h_ov])
        + &contract("mafe,fm->ae", &[ovvv, t1])
        - &contract("mnef,afmn->ae", &[oovv, t2]).mapv(|x| 0.5 * x);
    // The particle-hole block is the rank-1 residual, numerically zero at
    // converged amplitudes.
    let singles = TermEngine::new(h, vec![], vec![ccsd::singles_terms()], true);
    let h_vo = singles.residual(t).t1;

    // tau(e, f, i, j) = t2 + t1 t1 - t1 t1, the disconnected pair part.
    let tau = t2 + &contract("ei,fj->efij", &[t1, t1]) - &contract("ej,fi->efij", &[t1, t1]);

    // Hole-hole ladder.
    let w_oooo = oooo
        + &contract("mnie,ej->mnij", &[ooov, t1])
        - &contract("mnje,ei->mnij", &[ooov, t1])
        + &contract("mnef,efij->mnij", &[oovv, &tau]).mapv(|x| 0.5 * x);

    // Particle-particle ladder.
    let w_vvvv = vvvv - &contract("amef,bm->abef", &[vovv, t1])
        + &contract("bmef,am->abef", &[vovv, t1])
        + &contract("mnef,abmn->abef", &[oovv, &tau]).mapv(|x| 0.5 * x);

    // Ring block, with the full doubles coefficient.
    let w_ovvo = ovvo + &contract("mbef,fj->mbej", &[ovvv, t1])
        - &contract("mnej,bn->mbej", &[oovo, t1])
        - &contract("mnef,fbjn->mbej", &[oovv, t2])
        - &contract("mnef,fj,bn->mbej", &[oovv, t1, t1]);

    // Assemble the combined one-body operator.
    let mut f_bar: ArrayD<f64> = ArrayD::zeros(vec![n, n]);
    assign_slab2(&mut f_bar, 0, 0, &h_oo);
    assign_slab2(&mut f_bar, 0, no, &h_ov);
    assign_slab2(&mut f_bar, no, 0, &h_vo);
    assign_slab2(&mut f_bar, no, no, &h_vv);

    // Assemble the combined two-body operator. The ring slab also fills
    // its three pair-swapped arrangements so the spin-case scatter sees a
    // pair-antisymmetric tensor.
    let mut v_bar: ArrayD<f64> = ArrayD::zeros(vec![n, n, n, n]);
    assign_slab4(&mut v_bar, [0, 0, no, no], oovv, 1.0);
    assign_slab4(&mut v_bar, [0, 0, 0, 0], &w_oooo, 1.0);
    assign_slab4(&mut v_bar, [no, no, no, no], &w_vvvv, 1.0);
    assign_slab4(&mut v_bar, [0, no, no, 0], &w_ovvo, 1.0);
    let w_vovo = contract("mbej->bmej", &[&w_ovvo]);
    let w_ovov = contract("mbej->mbje", &[&w_ovvo]);
    let w_voov = contract("mbej->bmje", &[&w_ovvo]);
    assign_slab4(&mut v_bar, [no, 0, no, 0], &w_vovo, -1.0);
    assign_slab4(&mut v_bar, [0, no, 0, no], &w_ovov, -1.0);
    assign_slab4(&mut v_bar, [no, 0, 0, no], &w_voov, 1.0);

    hamiltonian_from_combined(dims, &f_bar, &v_bar)
}

fn assign_slab2(target: &mut ArrayD<f64>, row: usize, col: usize, slab: &ArrayD<f64>) {
    let (nr, nc) = (slab.shape()[0], slab.shape()[1]);
    for i in 0..nr {
        for j in 0..nc {
            target[[row + i, col + j]] = slab[[i, j]];
        }
    }
}

fn assign_slab4(target: &mut ArrayD<f64>, offset: [usize; 4], slab: &ArrayD<f64>, sign: f64) {
    let shape = slab.shape().to_vec();
    for p in 0..shape[0] {
        for q in 0..shape[1] {
            for r in 0..shape[2] {
                for s in 0..shape[3] {
                    target[[offset[0] + p, offset[1] + q, offset[2] + r, offset[3] + s]] =
                        sign * slab[[p, q, r, s]];
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::spinorbital::{combined_eri, combined_fock, scatter};
    use crate::operators::ClusterOperator;
    use crate::utils::fixtures::minimal_pair;
    use approx::assert_abs_diff_eq;

    #[test]
    fn zero_amplitudes_leave_the_stored_blocks_bare() {
        let (system, h) = minimal_pair();
        let t = scatter(&ClusterOperator::new(system.dims, 2));
        let hbar = similarity_transform(&h, &t);
        assert_abs_diff_eq!(&hbar.a, &h.a, epsilon = 1e-13);
        let f = combined_fock(&hbar);
        let v = combined_eri(&hbar);
        let bare_v = combined_eri(&h);
        let no = system.dims.no();
        let n = system.dims.n();
        // The ring slab reduces to the bare integrals.
        for m in 0..no {
            for b in no..n {
                for e in no..n {
                    for j in 0..no {
                        assert_abs_diff_eq!(
                            v[[m, b, e, j]],
                            bare_v[[m, b, e, j]],
                            epsilon = 1e-13
                        );
                    }
                }
            }
        }
        assert_abs_diff_eq!(f[[no, 0]], 0.0, epsilon = 1e-13);
    }

    #[test]
    fn dressed_one_body_shifts_with_the_doubles() {
        let (system, h) = minimal_pair();
        let mut t = scatter(&ClusterOperator::new(system.dims, 2));
        // A single alpha-beta pair amplitude.
        let amp = 0.1;
        t.t2[[0, 1, 0, 1]] = amp;
        t.t2[[1, 0, 0, 1]] = -amp;
        t.t2[[0, 1, 1, 0]] = -amp;
        t.t2[[1, 0, 1, 0]] = amp;
        let hbar = similarity_transform(&h, &t);
        // H_oo[m, i] gains 1/2 <mn||ef> t2[e, f, i, n].
        let bare = combined_eri(&h);
        let mut expected = h.a[[0, 0]];
        let no = system.dims.no();
        for nn in 0..no {
            for e in 0..2 {
                for ff in 0..2 {
                    expected +=
                        0.5 * bare[[0, nn, no + e, no + ff]] * t.t2[[e, ff, 0, nn]];
                }
            }
        }
        assert_abs_diff_eq!(hbar.a[[0, 0]], expected, epsilon = 1e-13);
    }
}
