//! Small closed-shell model systems shared by the unit tests. The integral
//! values are synthetic but carry the full 8-fold permutational symmetry of
//! real electron-repulsion integrals, and the orbitals are canonical (the
//! Fock operator is diagonal).

use crate::hamiltonian::Hamiltonian;
use crate::system::System;
use ndarray::prelude::*;

/// Assign one chemist-notation integral (ij|kl) together with its
/// symmetry-equivalent permutations.
pub fn set_chemist(tei: &mut Array4<f64>, i: usize, j: usize, k: usize, l: usize, value: f64) {
    for &[p, q, r, s] in &[
        [i, j, k, l],
        [j, i, k, l],
        [i, j, l, k],
        [j, i, l, k],
        [k, l, i, j],
        [l, k, i, j],
        [k, l, j, i],
        [l, k, j, i],
    ] {
        tei[[p, q, r, s]] = value;
    }
}

/// Two electrons in two spatial orbitals. At full excitation rank CC is
/// exact for this system, so the correlation energy can be checked against
/// an explicit diagonalization in the four-determinant Sz = 0 space.
pub fn minimal_pair() -> (System, Hamiltonian) {
    let core = 0.5;
    let oei: Array2<f64> = Array2::from_diag(&array![-1.2, -0.3]);
    let mut tei: Array4<f64> = Array4::zeros((2, 2, 2, 2));
    set_chemist(&mut tei, 0, 0, 0, 0, 0.70);
    set_chemist(&mut tei, 1, 1, 1, 1, 0.65);
    set_chemist(&mut tei, 0, 0, 1, 1, 0.55);
    set_chemist(&mut tei, 0, 1, 0, 1, 0.15);
    Hamiltonian::from_spatial(oei.view(), tei.view(), core, 2)
}

/// Exact Sz = 0 eigenvalues of the [`minimal_pair`] system, ascending,
/// including the core energy. The basis is the closed-shell reference, the
/// two open-shell determinants and the doubly excited determinant; the
/// closed-shell pair block and the open-shell block are each 2x2.
pub fn minimal_pair_fci() -> Vec<f64> {
    let core = 0.5;
    let (h00, h11) = (-1.2, -0.3);
    let (u0, u1, u01, k01) = (0.70, 0.65, 0.55, 0.15);
    let pair = [2.0 * h00 + u0, 2.0 * h11 + u1];
    let open = h00 + h11 + u01;
    // 2x2 blocks [[d0, k], [k, d1]] diagonalized in closed form.
    let two_level = |d0: f64, d1: f64, k: f64| {
        let avg = 0.5 * (d0 + d1);
        let rad = (0.25 * (d0 - d1).powi(2) + k * k).sqrt();
        (avg - rad, avg + rad)
    };
    let (pair_lo, pair_hi) = two_level(pair[0], pair[1], k01);
    let mut levels = vec![pair_lo, open - k01, open + k01, pair_hi];
    levels.sort_by(|x, y| x.partial_cmp(y).unwrap());
    levels.into_iter().map(|e| e + core).collect()
}

/// Four electrons in four spatial orbitals, the smallest closed shell with
/// non-vanishing triples amplitudes. The couplings are kept weak so every
/// method variant converges quickly.
pub fn four_orbital() -> (System, Hamiltonian) {
    let core = 1.0;
    let oei: Array2<f64> = Array2::from_diag(&array![-2.0, -1.5, -0.5, -0.1]);
    let mut tei: Array4<f64> = Array4::zeros((4, 4, 4, 4));
    let diag = [0.40, 0.38, 0.36, 0.34];
    for p in 0..4 {
        set_chemist(&mut tei, p, p, p, p, diag[p]);
    }
    for p in 0..4 {
        for q in (p + 1)..4 {
            set_chemist(&mut tei, p, p, q, q, 0.22 - 0.01 * (p + q) as f64);
            set_chemist(&mut tei, p, q, p, q, 0.05 - 0.004 * (p + q) as f64);
        }
    }
    set_chemist(&mut tei, 0, 1, 2, 3, 0.02);
    set_chemist(&mut tei, 0, 3, 1, 2, 0.015);
    Hamiltonian::from_spatial(oei.view(), tei.view(), core, 4)
}
