use ndarray::prelude::*;
use ndarray_linalg::Solve;

/// Pulay-type direct inversion of the iterative subspace over flattened
/// amplitude vectors. The error metric is the change of the amplitudes
/// between consecutive quasi-Newton sweeps.
///
/// Based on P. Pulay, Chem. Phys. Lett. 73, 393 (1980).
pub struct Diis {
    size: usize,
    min_space: usize,
    trial_vectors: Vec<Array1<f64>>,
    error_vectors: Vec<Array1<f64>>,
}

impl Diis {
    pub fn new(size: usize, min_space: usize) -> Self {
        Diis {
            size,
            min_space,
            trial_vectors: Vec::new(),
            error_vectors: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.trial_vectors.clear();
        self.error_vectors.clear();
    }

    /// Record one sweep. The oldest pair falls out once the history
    /// exceeds the subspace size.
    pub fn push(&mut self, trial: ArrayView1<f64>, error: ArrayView1<f64>) {
        self.trial_vectors.push(trial.to_owned());
        self.error_vectors.push(error.to_owned());
        if self.trial_vectors.len() > self.size {
            self.trial_vectors.remove(0);
            self.error_vectors.remove(0);
        }
    }

    /// Extrapolated amplitude vector, or None while the history is still
    /// short. A numerically singular B matrix clears the history and
    /// leaves the caller on the plain quasi-Newton path.
    pub fn extrapolate(&mut self) -> Option<Array1<f64>> {
        let m = self.trial_vectors.len();
        if m < self.min_space {
            return None;
        }

        // Lagrange-bordered overlap matrix of the error vectors.
        let mut b: Array2<f64> = Array2::zeros((m + 1, m + 1));
        for i in 0..m {
            for j in 0..m {
                b[[i, j]] = self.error_vectors[i].dot(&self.error_vectors[j]);
            }
            b[[i, m]] = -1.0;
            b[[m, i]] = -1.0;
        }
        let mut rhs: Array1<f64> = Array1::zeros(m + 1);
        rhs[m] = -1.0;

        match b.solve_into(rhs) {
            Ok(coeffs) => {
                let mut out: Array1<f64> = Array1::zeros(self.trial_vectors[0].len());
                for (c, trial) in coeffs.iter().take(m).zip(&self.trial_vectors) {
                    out.scaled_add(*c, trial);
                }
                Some(out)
            }
            Err(_) => {
                self.reset();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn holds_back_until_the_minimal_history_is_reached() {
        let mut diis = Diis::new(6, 3);
        let x = array![1.0, 2.0];
        let e = array![0.1, -0.1];
        diis.push(x.view(), e.view());
        diis.push(x.view(), e.view());
        assert!(diis.extrapolate().is_none());
    }

    /// For a linear fixed-point map the extrapolation over a spanning
    /// history lands on the fixed point.
    #[test]
    fn solves_a_linear_fixed_point_in_one_shot() {
        // x* = (1, -2); iteration x_next = x + 0.5 (x* - x).
        let target = array![1.0, -2.0];
        let mut x = array![0.0, 0.0];
        let mut diis = Diis::new(6, 2);
        for _ in 0..3 {
            let step = (&target - &x).mapv(|v| 0.5 * v);
            let next = &x + &step;
            diis.push(next.view(), step.view());
            if let Some(extrapolated) = diis.extrapolate() {
                x = extrapolated;
            } else {
                x = next;
            }
        }
        assert_abs_diff_eq!(x[0], target[0], epsilon = 1e-10);
        assert_abs_diff_eq!(x[1], target[1], epsilon = 1e-10);
    }

    #[test]
    fn a_singular_history_resets_instead_of_failing() {
        let mut diis = Diis::new(6, 2);
        let x = array![1.0, 2.0];
        let zero = array![0.0, 0.0];
        // Identical zero error vectors make B singular up to the border.
        diis.push(x.view(), zero.view());
        diis.push(x.view(), zero.view());
        let result = diis.extrapolate();
        // Either outcome is acceptable numerically, but a None must have
        // cleared the history.
        if result.is_none() {
            diis.push(x.view(), zero.view());
            assert!(diis.extrapolate().is_none());
        }
    }
}
