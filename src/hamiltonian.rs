use crate::system::{Dimensions, OrbitalEnergies, Spin, System};
use ndarray::prelude::*;

/// Spin-case graded integral container. One- and two-body blocks are stored
/// as full-range arrays per spin case with the occupied-first index
/// convention of [`Dimensions`]:
///   `a`/`b`   Fock-like one-body operator f(p, q),
///   `aa`/`bb` antisymmetrized two-body integrals <pq||rs>,
///   `ab`      plain mixed-spin integrals <pq|rs>, bra and ket each ordered
///             (alpha, beta).
///
/// The container is read-mostly during ground-state CC and is replaced
/// wholesale when the driver builds the similarity-transformed operator.
#[derive(Clone, Debug)]
pub struct Hamiltonian {
    pub dims: Dimensions,
    pub a: Array2<f64>,
    pub b: Array2<f64>,
    pub aa: Array4<f64>,
    pub ab: Array4<f64>,
    pub bb: Array4<f64>,
}

impl Hamiltonian {
    pub fn zeros(dims: Dimensions) -> Self {
        let na = dims.norb(Spin::Alpha);
        let nb = dims.norb(Spin::Beta);
        Hamiltonian {
            dims,
            a: Array2::zeros((na, na)),
            b: Array2::zeros((nb, nb)),
            aa: Array4::zeros((na, na, na, na)),
            ab: Array4::zeros((na, nb, na, nb)),
            bb: Array4::zeros((nb, nb, nb, nb)),
        }
    }

    /// Assemble the spin-case blocks from restricted spatial integrals.
    /// `oei` is the core Hamiltonian h(p, q), `tei` the chemist-notation
    /// electron repulsion integrals (pq|rs), both over `norb` spatial
    /// orbitals ordered energetically (occupied first). Returns the system
    /// metadata together with the container.
    pub fn from_spatial(
        oei: ArrayView2<f64>,
        tei: ArrayView4<f64>,
        core_energy: f64,
        nelec: usize,
    ) -> (System, Hamiltonian) {
        let norb = oei.nrows();
        let nocc = nelec / 2;
        let dims = Dimensions::new(nocc, nocc, norb - nocc, norb - nocc);

        // Closed-shell Fock operator in the spatial basis.
        let mut fock: Array2<f64> = oei.to_owned();
        for p in 0..norb {
            for q in 0..norb {
                for j in 0..nocc {
                    fock[[p, q]] += 2.0 * tei[[p, q, j, j]] - tei[[p, j, j, q]];
                }
            }
        }

        // Reference energy of the closed-shell determinant.
        let mut e_ref = core_energy;
        for i in 0..nocc {
            e_ref += oei[[i, i]] + fock[[i, i]];
        }

        let mut h = Hamiltonian::zeros(dims);
        h.a.assign(&fock);
        h.b.assign(&fock);
        for p in 0..norb {
            for q in 0..norb {
                for r in 0..norb {
                    for s in 0..norb {
                        // <pq||rs> = (pr|qs) - (ps|qr), <pq|rs> = (pr|qs)
                        let direct = tei[[p, r, q, s]];
                        let exchange = tei[[p, s, q, r]];
                        h.aa[[p, q, r, s]] = direct - exchange;
                        h.bb[[p, q, r, s]] = direct - exchange;
                        h.ab[[p, q, r, s]] = direct;
                    }
                }
            }
        }

        let orbital_energies = OrbitalEnergies {
            a: fock.diag().to_owned(),
            b: fock.diag().to_owned(),
        };
        (System::new(dims, e_ref, orbital_energies), h)
    }

    pub fn one_body(&self, spin: Spin) -> ArrayView2<f64> {
        match spin {
            Spin::Alpha => self.a.view(),
            Spin::Beta => self.b.view(),
        }
    }

    /// One-body matrix element f(p, q) for spin-tagged full-range indices.
    /// Spin off-diagonal elements vanish.
    pub fn f_elem(&self, p: (Spin, usize), q: (Spin, usize)) -> f64 {
        if p.0 != q.0 {
            return 0.0;
        }
        match p.0 {
            Spin::Alpha => self.a[[p.1, q.1]],
            Spin::Beta => self.b[[p.1, q.1]],
        }
    }

    /// Antisymmetrized two-body element <pq||rs> for spin-tagged full-range
    /// indices, resolving the mixed-spin sign conventions of the `ab` block.
    pub fn v_elem(
        &self,
        p: (Spin, usize),
        q: (Spin, usize),
        r: (Spin, usize),
        s: (Spin, usize),
    ) -> f64 {
        use Spin::{Alpha, Beta};
        let bra = (p.0, q.0);
        let ket = (r.0, s.0);
        let n_beta = |pair: (Spin, Spin)| (pair.0 == Beta) as usize + (pair.1 == Beta) as usize;
        if n_beta(bra) != n_beta(ket) {
            return 0.0;
        }
        match n_beta(bra) {
            0 => self.aa[[p.1, q.1, r.1, s.1]],
            2 => self.bb[[p.1, q.1, r.1, s.1]],
            _ => {
                // Sort each pair into (alpha, beta) order, tracking the sign.
                let mut sign = 1.0;
                let (pa, qb) = if p.0 == Alpha {
                    (p.1, q.1)
                } else {
                    sign = -sign;
                    (q.1, p.1)
                };
                let (ra, sb) = if r.0 == Alpha {
                    (r.1, s.1)
                } else {
                    sign = -sign;
                    (s.1, r.1)
                };
                sign * self.ab[[pa, qb, ra, sb]]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::Spin::{Alpha, Beta};
    use approx::assert_abs_diff_eq;

    fn toy() -> (System, Hamiltonian) {
        crate::utils::fixtures::minimal_pair()
    }

    #[test]
    fn fock_is_diagonal_for_canonical_orbitals() {
        let (_, h) = toy();
        assert_abs_diff_eq!(h.a[[0, 1]], 0.0, epsilon = 1e-14);
        assert_abs_diff_eq!(h.a[[1, 0]], 0.0, epsilon = 1e-14);
    }

    #[test]
    fn antisymmetry_of_same_spin_blocks() {
        let (_, h) = toy();
        let n = h.dims.norb(Alpha);
        for p in 0..n {
            for q in 0..n {
                for r in 0..n {
                    for s in 0..n {
                        assert_abs_diff_eq!(
                            h.aa[[p, q, r, s]],
                            -h.aa[[q, p, r, s]],
                            epsilon = 1e-14
                        );
                        assert_abs_diff_eq!(
                            h.aa[[p, q, r, s]],
                            -h.aa[[p, q, s, r]],
                            epsilon = 1e-14
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn mixed_spin_elements_pick_up_the_pair_sort_sign() {
        let (_, h) = toy();
        let v = h.v_elem((Alpha, 0), (Beta, 1), (Alpha, 0), (Beta, 1));
        let swapped = h.v_elem((Beta, 1), (Alpha, 0), (Alpha, 0), (Beta, 1));
        assert_abs_diff_eq!(v, -swapped, epsilon = 1e-14);
        // Spin-forbidden element.
        assert_abs_diff_eq!(
            h.v_elem((Alpha, 0), (Alpha, 1), (Alpha, 0), (Beta, 1)),
            0.0,
            epsilon = 1e-14
        );
    }
}
