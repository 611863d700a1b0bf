use crate::operators::cluster::{AmplitudeBlock, ClusterOperator};
use crate::operators::excitations::case_spins;
use crate::system::System;
use ndarray::prelude::*;

/// Moller-Plesset energy denominators in the storage layout of `template`:
/// D = sum of occupied orbital energies minus sum of virtual orbital
/// energies for every stored amplitude. All entries are negative for an
/// Aufbau reference.
pub fn mp_denominator(system: &System, template: &ClusterOperator) -> ClusterOperator {
    let mut d = template.zeros_like();
    let dims = system.dims;
    for label in template.labels().collect::<Vec<_>>() {
        let spins = case_spins(label);
        let rank = spins.len();
        match d.block_mut(label) {
            AmplitudeBlock::Dense(x) => {
                for (index, value) in x.indexed_iter_mut() {
                    let mut denom = 0.0;
                    for (axis, &spin) in spins.iter().enumerate() {
                        let e = system.orbital_energies.get(spin);
                        denom -= e[dims.nocc(spin) + index[axis]];
                        denom += e[index[rank + axis]];
                    }
                    *value = denom;
                }
            }
            AmplitudeBlock::Pspace {
                amplitudes,
                excitations,
            } => {
                for (row, det) in excitations.dets.rows().into_iter().enumerate() {
                    let mut denom = 0.0;
                    for (c, &spin) in spins.iter().enumerate() {
                        let e = system.orbital_energies.get(spin);
                        denom -= e[dims.nocc(spin) + det[c]];
                        denom += e[det[rank + c]];
                    }
                    amplitudes[row] = denom;
                }
            }
        }
    }
    d
}

/// One perturbative quasi-Newton sweep: t <- t + r / (omega + D - shift),
/// elementwise over every stored amplitude. Denominators closer to zero
/// than 1e-9 are clamped at that magnitude with their sign kept.
pub fn jacobi_step(
    t: &mut ClusterOperator,
    r: &ClusterOperator,
    d: &ClusterOperator,
    omega: f64,
    shift: f64,
) {
    for label in t.labels().collect::<Vec<_>>() {
        let residual = r.block(label).values().to_vec();
        let denoms = d.block(label).values().to_vec();
        for ((value, res), den) in t
            .block_mut(label)
            .values_mut()
            .iter_mut()
            .zip(residual)
            .zip(denoms)
        {
            let mut denom = omega + den - shift;
            if denom.abs() < 1e-9 {
                denom = 1e-9_f64.copysign(denom);
            }
            *value += res / denom;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::{Dimensions, OrbitalEnergies};
    use approx::assert_abs_diff_eq;

    fn toy_system() -> System {
        let dims = Dimensions::new(1, 1, 2, 2);
        let energies = OrbitalEnergies {
            a: array![-0.9, 0.2, 0.7],
            b: array![-0.9, 0.2, 0.7],
        };
        System {
            dims,
            reference_energy: 0.0,
            orbital_energies: energies,
        }
    }

    #[test]
    fn denominators_are_occupied_minus_virtual() {
        let system = toy_system();
        let t = ClusterOperator::new(system.dims, 2);
        let d = mp_denominator(&system, &t);
        // Singles a: D[a, i] = e_i - e_a.
        let singles = d.block("a").dense();
        assert_abs_diff_eq!(singles[[0, 0]], -0.9 - 0.2, epsilon = 1e-14);
        assert_abs_diff_eq!(singles[[1, 0]], -0.9 - 0.7, epsilon = 1e-14);
        // Mixed doubles: D[a, b, i, j] = e_i + e_j - e_a - e_b.
        let doubles = d.block("ab").dense();
        assert_abs_diff_eq!(doubles[[0, 1, 0, 0]], -1.8 - 0.9, epsilon = 1e-14);
        assert!(d.flatten().iter().all(|&x| x < 0.0));
    }

    #[test]
    fn sparse_denominators_follow_the_excitation_list() {
        let system = toy_system();
        let dims = system.dims;
        let dense = mp_denominator(&system, &ClusterOperator::new(dims, 3));
        let lists = vec![
            ("aaa", crate::operators::ExcitationList::full(dims, "aaa")),
            ("aab", crate::operators::ExcitationList::full(dims, "aab")),
            ("abb", crate::operators::ExcitationList::full(dims, "abb")),
            ("bbb", crate::operators::ExcitationList::full(dims, "bbb")),
        ];
        let sparse = ClusterOperator::with_pspace(dims, 3, lists).unwrap();
        let d = mp_denominator(&system, &sparse);
        // aab dets cover (a < b alpha particles, c beta) x (i alpha, j beta)
        // holes; with one hole per spin the list is particle-driven.
        let exc = d.block("aab").excitations().unwrap();
        for (row, det) in exc.dets.rows().into_iter().enumerate() {
            let dense_val = dense.block("aab").dense()[[
                det[0], det[1], det[2], det[3], det[4], det[5],
            ]];
            assert_abs_diff_eq!(d.block("aab").values()[row], dense_val, epsilon = 1e-14);
        }
    }

    #[test]
    fn jacobi_step_divides_by_the_shifted_denominator() {
        let system = toy_system();
        let mut t = ClusterOperator::new(system.dims, 1);
        let d = mp_denominator(&system, &t);
        let mut r = t.zeros_like();
        r.block_mut("a").values_mut()[0] = 0.22;
        jacobi_step(&mut t, &r, &d, 0.0, 0.1);
        let expected = 0.22 / (-1.1 - 0.1);
        assert_abs_diff_eq!(t.block("a").values()[0], expected, epsilon = 1e-14);
    }
}
