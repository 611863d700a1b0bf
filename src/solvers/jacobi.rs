use crate::operators::denominator::jacobi_step;
use crate::operators::ClusterOperator;
use crate::solvers::diis::Diis;
use crate::solvers::logging;
use crate::utils::Timer;

/// Controls of the quasi-Newton amplitude iteration.
pub struct JacobiOptions {
    pub maximum_iterations: usize,
    pub amplitude_convergence: f64,
    pub energy_convergence: f64,
    pub energy_shift: f64,
    /// (subspace size, minimal history) or None to run plain sweeps.
    pub diis: Option<(usize, usize)>,
}

/// Outcome of an amplitude iteration. Running out of iterations is a
/// regular outcome reported through `converged`, not a failure.
#[derive(Clone, Debug)]
pub struct JacobiSummary {
    pub converged: bool,
    pub iterations: usize,
    pub energy: f64,
    pub residual_norm: f64,
}

/// DIIS-accelerated quasi-Newton solution of a stationarity condition
/// r(t) = 0. `evaluate` returns the residual in the storage layout of `t`
/// together with the scalar tracked for the energy convergence check;
/// `d` holds the bare energy denominators and `omega` shifts them for the
/// excited-state left-hand equations.
pub fn solve<F>(
    label: &str,
    t: &mut ClusterOperator,
    d: &ClusterOperator,
    omega: f64,
    options: &JacobiOptions,
    mut evaluate: F,
) -> JacobiSummary
where
    F: FnMut(&ClusterOperator) -> (ClusterOperator, f64),
{
    let timer = Timer::start();
    logging::print_amplitude_init(
        label,
        options.maximum_iterations,
        options.amplitude_convergence,
        options.energy_convergence,
    );
    let mut diis = options.diis.map(|(size, min)| Diis::new(size, min));
    let order = t.order;

    let mut energy_old = 0.0;
    let mut summary = JacobiSummary {
        converged: false,
        iterations: 0,
        energy: 0.0,
        residual_norm: f64::INFINITY,
    };
    for iter in 0..options.maximum_iterations {
        let (residual, energy) = evaluate(t);
        let rnorm = residual.norm();
        let energy_diff = energy - energy_old;
        logging::print_amplitude_iteration(iter, energy, energy_diff, rnorm);

        summary.iterations = iter + 1;
        summary.energy = energy;
        summary.residual_norm = rnorm;
        if rnorm < options.amplitude_convergence
            && (iter > 0 && energy_diff.abs() < options.energy_convergence)
        {
            summary.converged = true;
            break;
        }
        energy_old = energy;

        let before = t.flatten();
        jacobi_step(t, &residual, d, omega, options.energy_shift);
        if let Some(diis) = &mut diis {
            let after = t.flatten();
            diis.push(after.view(), (&after - &before).view());
            if let Some(extrapolated) = diis.extrapolate() {
                let _ = t.unflatten(extrapolated.view(), order);
            }
        }
    }
    logging::print_amplitude_end(label, summary.converged, summary.energy, timer);
    summary
}
