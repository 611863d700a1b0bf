//! Equation-of-motion sigma engine: the amplitude-space Jacobian of the
//! ground-state equations behind the [`DavidsonEngine`] interface. Trial
//! vectors arrive flattened in the storage layout of the excitation
//! operator template, are expanded to the combined basis, contracted, and
//! projected back onto the stored excitations.

use crate::defaults;
use crate::methods::spinorbital::{gather, scatter, Amplitudes};
use crate::methods::terms::TermEngine;
use crate::operators::ClusterOperator;
use crate::solvers::DavidsonEngine;
use ndarray::prelude::*;

pub struct EomEngine<'a> {
    engine: &'a TermEngine,
    /// Converged ground-state amplitudes in the combined layout.
    t: Amplitudes,
    /// Storage layout of the excitation operator, including P-space lists.
    template: ClusterOperator,
    /// Flattened bare energy denominators, matching the template layout.
    denominators: Array1<f64>,
}

impl<'a> EomEngine<'a> {
    pub fn new(
        engine: &'a TermEngine,
        t: Amplitudes,
        template: ClusterOperator,
        denominators: &ClusterOperator,
    ) -> Self {
        EomEngine {
            engine,
            t,
            template,
            denominators: denominators.flatten(),
        }
    }

    pub fn template(&self) -> &ClusterOperator {
        &self.template
    }

    /// One Jacobian product in the flattened layout.
    pub fn sigma_vector(&self, x: ArrayView1<f64>) -> Array1<f64> {
        let mut r = self.template.zeros_like();
        let order = r.order;
        r.unflatten(x, order)
            .unwrap_or_else(|e| panic!("trial vector does not match the operator layout: {}", e));
        let combined = scatter(&r);
        let sigma = self.engine.sigma(&self.t, &combined);
        gather(&sigma, &self.template).flatten()
    }
}

impl DavidsonEngine for EomEngine<'_> {
    fn compute_products(&mut self, x: ArrayView2<f64>) -> Array2<f64> {
        let mut out = Array2::zeros((self.get_size(), x.ncols()));
        for (col, mut dst) in x.columns().into_iter().zip(out.columns_mut()) {
            dst.assign(&self.sigma_vector(col));
        }
        out
    }

    /// Diagonal correction r / (w + D), with the denominator floored away
    /// from zero to keep near-degenerate roots stable.
    fn precondition(&self, r: ArrayView1<f64>, w: f64) -> Array1<f64> {
        Array1::from_iter(r.iter().zip(self.denominators.iter()).map(|(&ri, &di)| {
            let mut denom = w + di;
            if denom.abs() < defaults::DENOMINATOR_FLOOR {
                denom = 1.0;
            }
            ri / denom
        }))
    }

    fn get_size(&self) -> usize {
        self.template.len()
    }
}

/// Reference weight of an excited state, `r0 = <0|(H R)_C|0> / omega`,
/// evaluated through the energy gradient.
pub fn reference_weight(engine: &TermEngine, t: &Amplitudes, r: &Amplitudes, omega: f64) -> f64 {
    engine.weighted_dot(&engine.eta(t), r) / omega
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::ccsd;
    use crate::operators::denominator::mp_denominator;
    use crate::utils::fixtures::minimal_pair;
    use approx::assert_abs_diff_eq;

    #[test]
    fn sigma_products_are_linear_in_the_trial_vector() {
        let (system, h) = minimal_pair();
        let engine = ccsd::engine(&h, true);
        let template = ClusterOperator::new(system.dims, 2);
        let d = mp_denominator(&system, &template);
        let t = scatter(&template);
        let eom = EomEngine::new(&engine, t, template.clone(), &d);

        let n = template.len();
        let x = Array1::from_iter((0..n).map(|k| ((k * 7 % 5) as f64 - 2.0) * 0.1));
        let y = Array1::from_iter((0..n).map(|k| ((k * 3 % 7) as f64 - 3.0) * 0.1));
        let combined = eom.sigma_vector((&x + &y).view());
        let separate = &eom.sigma_vector(x.view()) + &eom.sigma_vector(y.view());
        for (c, s) in combined.iter().zip(separate.iter()) {
            assert_abs_diff_eq!(c, s, epsilon = 1e-10);
        }
    }

    #[test]
    fn preconditioner_floors_small_denominators() {
        let (system, h) = minimal_pair();
        let engine = ccsd::engine(&h, true);
        let template = ClusterOperator::new(system.dims, 2);
        let d = mp_denominator(&system, &template);
        let t = scatter(&template);
        let eom = EomEngine::new(&engine, t, template, &d);

        let r = Array1::from_elem(eom.get_size(), 1.0);
        // Choosing w exactly at -D for the first entry hits the floor.
        let w = -eom.denominators[0];
        let out = eom.precondition(r.view(), w);
        assert_abs_diff_eq!(out[0], 1.0, epsilon = 1e-12);
    }
}
