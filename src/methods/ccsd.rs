//! Term tables of the CCSD amplitude equations in the combined
//! spin-orbital basis, fully expanded (no intermediates). The rank-2 table
//! carries the raw weights of the `A(ab)A(ij)` antisymmetrizer form, so a
//! contribution quoted with a single permutation operator enters with half
//! its textbook coefficient and a fully symmetric one with a quarter.

use crate::hamiltonian::Hamiltonian;
use crate::methods::terms::{term, Block::*, Term, TermEngine};

/// Correlation energy, `<0|(H e^T)_C|0>`.
pub fn energy_terms() -> Vec<Term> {
    vec![
        term(1.0, Fov, "ia", &[(1, "ai")]),
        term(0.25, Oovv, "ijab", &[(2, "abij")]),
        term(0.5, Oovv, "ijab", &[(1, "ai"), (1, "bj")]),
    ]
}

/// Rank-1 projection, `<Phi_i^a|(H e^T1+T2)_C|0>`.
pub fn singles_terms() -> Vec<Term> {
    vec![
        term(1.0, Fvo, "ai", &[]),
        term(1.0, Fvv, "ae", &[(1, "ei")]),
        term(-1.0, Foo, "mi", &[(1, "am")]),
        term(1.0, Fov, "me", &[(2, "aeim")]),
        term(-1.0, Fov, "me", &[(1, "am"), (1, "ei")]),
        term(-1.0, Ovov, "naif", &[(1, "fn")]),
        term(1.0, Ovvv, "mafe", &[(1, "fm"), (1, "ei")]),
        term(-1.0, Ooov, "mnie", &[(1, "en"), (1, "am")]),
        term(-0.5, Oovv, "mnef", &[(2, "afmn"), (1, "ei")]),
        term(-0.5, Oovv, "mnef", &[(2, "efin"), (1, "am")]),
        term(1.0, Oovv, "mnef", &[(1, "fn"), (2, "aeim")]),
        term(-1.0, Oovv, "mnef", &[(1, "am"), (1, "ei"), (1, "fn")]),
        term(-0.5, Ovvv, "maef", &[(2, "efim")]),
        term(-0.5, Oovo, "nmei", &[(2, "aemn")]),
    ]
}

/// Rank-2 projection in raw antisymmetrizer form.
pub fn doubles_terms() -> Vec<Term> {
    vec![
        term(0.25, Vvoo, "abij", &[]),
        // Particle ladder dressing of the one-body operator.
        term(0.5, Fvv, "be", &[(2, "aeij")]),
        term(-0.5, Fov, "me", &[(1, "bm"), (2, "aeij")]),
        term(0.5, Ovvv, "mbfe", &[(1, "fm"), (2, "aeij")]),
        term(-0.25, Oovv, "mnef", &[(2, "bfmn"), (2, "aeij")]),
        term(-0.5, Oovv, "mnef", &[(1, "bm"), (1, "fn"), (2, "aeij")]),
        // Hole ladder dressing.
        term(-0.5, Foo, "mj", &[(2, "abim")]),
        term(-0.5, Fov, "me", &[(1, "ej"), (2, "abim")]),
        term(-0.5, Ooov, "mnje", &[(1, "en"), (2, "abim")]),
        term(-0.25, Oovv, "mnef", &[(2, "efjn"), (2, "abim")]),
        term(-0.5, Oovv, "mnef", &[(1, "ej"), (1, "fn"), (2, "abim")]),
        // Hole-hole ladder.
        term(0.125, Oooo, "mnij", &[(2, "abmn")]),
        term(0.25, Oooo, "mnij", &[(1, "am"), (1, "bn")]),
        term(0.25, Ooov, "mnie", &[(1, "ej"), (2, "abmn")]),
        term(0.5, Ooov, "mnie", &[(1, "ej"), (1, "am"), (1, "bn")]),
        term(0.0625, Oovv, "mnef", &[(2, "abmn"), (2, "efij")]),
        term(0.125, Oovv, "mnef", &[(2, "abmn"), (1, "ei"), (1, "fj")]),
        term(0.125, Oovv, "mnef", &[(1, "am"), (1, "bn"), (2, "efij")]),
        term(0.25, Oovv, "mnef", &[(1, "am"), (1, "bn"), (1, "ei"), (1, "fj")]),
        // Particle-particle ladder.
        term(0.125, Vvvv, "abef", &[(2, "efij")]),
        term(0.25, Vvvv, "abef", &[(1, "ei"), (1, "fj")]),
        term(-0.25, Vovv, "amef", &[(1, "bm"), (2, "efij")]),
        term(-0.5, Vovv, "amef", &[(1, "bm"), (1, "ei"), (1, "fj")]),
        // Ring contractions.
        term(1.0, Ovvo, "mbej", &[(2, "aeim")]),
        term(1.0, Ovvv, "mbef", &[(1, "fj"), (2, "aeim")]),
        term(-1.0, Oovo, "mnej", &[(1, "bn"), (2, "aeim")]),
        term(-0.5, Oovv, "mnef", &[(2, "fbjn"), (2, "aeim")]),
        term(-1.0, Oovv, "mnef", &[(1, "fj"), (1, "bn"), (2, "aeim")]),
        term(-1.0, Ovvo, "mbej", &[(1, "ei"), (1, "am")]),
        // Singles into the bare integrals.
        term(0.5, Vvvo, "abej", &[(1, "ei")]),
        term(-0.5, Ovoo, "mbij", &[(1, "am")]),
    ]
}

/// CCSD engine over the given integral container. With `with_singles`
/// false the rank-1 equations are switched off, which is the CCD model.
pub fn engine(h: &Hamiltonian, with_singles: bool) -> TermEngine {
    TermEngine::new(
        h,
        energy_terms(),
        vec![singles_terms(), doubles_terms()],
        with_singles,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::spinorbital::scatter;
    use crate::operators::ClusterOperator;
    use crate::utils::fixtures::minimal_pair;
    use approx::assert_abs_diff_eq;

    #[test]
    fn residual_at_zero_amplitudes_is_the_bare_integral_block() {
        let (system, h) = minimal_pair();
        let engine = engine(&h, true);
        let t = scatter(&ClusterOperator::new(system.dims, 2));
        let r = engine.residual(&t);
        // Singles start from f(v, o), zero for canonical orbitals.
        assert!(r.t1.iter().all(|&x| x.abs() < 1e-14));
        // Doubles start from <ab||ij>, here the alpha-beta exchange block.
        let k01 = 0.15;
        assert_abs_diff_eq!(r.t2[[0, 1, 0, 1]], k01, epsilon = 1e-14);
        assert_abs_diff_eq!(engine.energy(&t), 0.0, epsilon = 1e-14);
    }

    #[test]
    fn mp2_energy_after_one_perturbative_sweep() {
        let (system, h) = minimal_pair();
        let engine = engine(&h, true);
        let mut t = scatter(&ClusterOperator::new(system.dims, 2));
        let r = engine.residual(&t);
        // Canonical orbital energies of the fixture's diagonal Fock matrix.
        let (e_i, e_a) = (-0.5, 0.65);
        // t2 <- <ab||ij> / (e_i + e_j - e_a - e_b), the MP1 amplitudes.
        let d = 2.0 * (e_i - e_a);
        t.t2 = r.t2.mapv(|x| x / d);
        let k01: f64 = 0.15;
        assert_abs_diff_eq!(engine.energy(&t), k01 * k01 / d, epsilon = 1e-12);
    }
}
