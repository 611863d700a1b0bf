pub mod davidson;
pub mod diis;
pub mod jacobi;
pub mod logging;

use ndarray::prelude::*;

/// Engine interface of the iterative eigensolvers. The solvers only ever
/// touch the problem through matrix-vector products and a diagonal
/// preconditioner, so the same routines serve the dense test matrices and
/// the amplitude-space Jacobian.
pub trait DavidsonEngine {
    /// Matrix-vector products of the target matrix with the given trial
    /// vectors, one column each.
    fn compute_products(&mut self, x: ArrayView2<f64>) -> Array2<f64>;

    /// Approximately solve (A - w) delta = r for a correction vector.
    fn precondition(&self, r: ArrayView1<f64>, w: f64) -> Array1<f64>;

    /// Dimension of the eigenvalue problem.
    fn get_size(&self) -> usize;
}
