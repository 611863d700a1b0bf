use crate::utils::Timer;
use log::info;

pub fn print_amplitude_init(label: &str, max_iter: usize, amp_tol: f64, energy_tol: f64) {
    info!("{:^80}", "");
    info!("{: ^80}", format!("{} Amplitude Equations", label));
    info!("{:-^80}", "");
    info!("{: <40} {}", "max. iterations:", max_iter);
    info!("{: <40} {:4.2e}", "residual norm threshold:", amp_tol);
    info!("{: <40} {:4.2e}", "energy change threshold:", energy_tol);
    info!("{:^80}", "");
    info!(
        "{: <45} ",
        "Amplitude Iterations: all quantities are in atomic units"
    );
    info!("{:-^62} ", "");
    info!(
        "{: <5} {: >18} {: >18} {: >18}",
        "Iter.", "Energy", "Energy diff.", "Residual norm"
    );
    info!("{:-^62} ", "");
}

pub fn print_amplitude_iteration(iter: usize, energy: f64, energy_diff: f64, rnorm: f64) {
    if iter == 0 {
        info!(
            "{: >5} {:>18.10e} {:>18.13} {:>18.10e}",
            iter + 1,
            energy,
            0.0,
            rnorm,
        );
    } else {
        info!(
            "{: >5} {:>18.10e} {:>18.10e} {:>18.10e}",
            iter + 1,
            energy,
            energy_diff,
            rnorm,
        );
    }
}

pub fn print_amplitude_end(label: &str, converged: bool, energy: f64, timer: Timer) {
    info!("{:-^62} ", "");
    if converged {
        info!("{: ^62}", format!("{} converged", label));
        info!("{:^80} ", "");
        info!("correlation energy: {:18.14} Hartree", energy);
    } else {
        info!("{: ^62}", format!("{} did NOT converge", label));
    }
    info!("{:-<80} ", "");
    info!("{}", timer);
}

pub fn print_davidson_init(max_iter: usize, nroots: usize, tolerance: f64) {
    info!("{:^80}", "");
    info!("{: ^80}", "Iterative Davidson Routine");
    info!("{:-^80}", "");
    info!(
        "{: <45} {:4.2e}",
        "Root is converged when residual is below:", tolerance
    );
    info!("{: <45} {}", "Maximum number of iterations:", max_iter);
    if nroots == 1 {
        info!("{: >4} {: <25}", nroots, " Root will be computed.");
    } else {
        info!("{: >4} {: <25}", nroots, " Roots will be computed.");
    }
    info!("{:-^75} ", "");
    info!(
        "{: <5}{: >18}{: >14}{: >18}",
        "Iter.", "Eigenvalue", "#subsp. Vec.", "Residual norm"
    );
    info!("{:-^75} ", "");
}

pub fn print_davidson_iteration(iter: usize, eigenvalue: f64, nvec: usize, rnorm: f64) {
    info!(
        "{: >5}{:>18.10}{:>14}{:>18.10e}",
        iter + 1,
        eigenvalue,
        nvec,
        rnorm
    );
}

pub fn print_davidson_end(converged: bool, timer: Timer) {
    info!("{:-^75} ", "");
    if converged {
        info!("Davidson routine converged")
    } else {
        info!("Davidson routine did not converge!")
    }
    info!("{}", timer);
    info!("{:-^80}", "");
    info!("{:^80}", "");
}
