//! Davidson-type eigensolvers over a [`DavidsonEngine`]. The amplitude
//! Jacobian is not symmetric, so the subspace problem is solved with a
//! general eigendecomposition and the tracked root is selected by its
//! overlap with the previous iterate rather than by energetic order.

use crate::solvers::logging;
use crate::solvers::{diis::Diis, DavidsonEngine};
use crate::utils::Timer;
use ndarray::prelude::*;
use ndarray_linalg::{Eig, Norm};
use std::error;
use std::fmt;

/// Numerical breakdown inside an eigensolver. Plain non-convergence is
/// reported through the result structs instead.
#[derive(Debug, PartialEq)]
pub struct DavidsonError(pub String);

impl fmt::Display for DavidsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Davidson routine failed: {}", self.0)
    }
}

impl error::Error for DavidsonError {}

/// One tracked eigenpair of a non-symmetric matrix.
#[derive(Clone, Debug)]
pub struct DavidsonResult {
    pub converged: bool,
    pub iterations: usize,
    pub eigenvalue: f64,
    pub eigenvector: Array1<f64>,
}

/// Several lowest eigenpairs, block style.
#[derive(Clone, Debug)]
pub struct BlockDavidsonResult {
    pub converged: bool,
    pub iterations: usize,
    pub eigenvalues: Array1<f64>,
    pub eigenvectors: Array2<f64>,
}

/// Real parts of a general eigendecomposition, columns sorted ascending by
/// eigenvalue.
fn real_sorted_eig(g: &Array2<f64>) -> Result<(Array1<f64>, Array2<f64>), DavidsonError> {
    let (values, vectors) = g
        .eig()
        .map_err(|e| DavidsonError(format!("subspace eigendecomposition: {}", e)))?;
    let real_values: Array1<f64> = values.mapv(|z| z.re);
    let real_vectors: Array2<f64> = vectors.mapv(|z| z.re);
    let mut order: Vec<usize> = (0..real_values.len()).collect();
    order.sort_by(|&i, &j| real_values[i].partial_cmp(&real_values[j]).unwrap());
    let sorted_values = order.iter().map(|&i| real_values[i]).collect();
    let mut sorted_vectors = Array2::zeros(real_vectors.raw_dim());
    for (dst, &src) in order.iter().enumerate() {
        sorted_vectors.column_mut(dst).assign(&real_vectors.column(src));
    }
    Ok((sorted_values, sorted_vectors))
}

/// Classical Gram-Schmidt of `vec` against the columns of `basis`; the
/// orthogonalized vector is appended unless it has collapsed numerically.
fn orthogonalize_into(basis: &mut Array2<f64>, vec: Array1<f64>) {
    let mut orth = vec;
    for col in basis.columns() {
        let overlap = col.dot(&orth);
        orth.scaled_add(-overlap, &col);
    }
    let norm = orth.norm();
    if norm > 1.0e-7 {
        let _ = basis.push_column((&orth / norm).view());
    }
}

/// Single-root Davidson iteration with root following. Each cycle solves
/// the subspace problem, picks the eigenvector whose Ritz vector overlaps
/// most with the previous iterate, and expands the basis with the
/// preconditioned residual. The subspace collapses to the current Ritz
/// vector when it exceeds `max_subspace`.
pub fn standard<D: DavidsonEngine>(
    engine: &mut D,
    guess: Array1<f64>,
    max_subspace: usize,
    max_iter: usize,
    tolerance: f64,
) -> Result<DavidsonResult, DavidsonError> {
    let timer = Timer::start();
    let dim = engine.get_size();
    logging::print_davidson_init(max_iter, 1, tolerance);

    let norm = guess.norm();
    if norm < 1.0e-12 {
        return Err(DavidsonError("guess vector is numerically zero".into()));
    }
    let mut previous: Array1<f64> = &guess / norm;
    let mut basis: Array2<f64> = previous
        .view()
        .insert_axis(Axis(1))
        .to_owned();
    let mut products: Array2<f64> = Array2::zeros((dim, 0));

    let mut result = DavidsonResult {
        converged: false,
        iterations: 0,
        eigenvalue: 0.0,
        eigenvector: previous.clone(),
    };
    for iter in 0..max_iter {
        // Products only for the basis vectors added since the last cycle.
        if basis.ncols() > products.ncols() {
            let fresh = engine.compute_products(basis.slice(s![.., products.ncols()..]));
            for col in fresh.columns() {
                let _ = products.push_column(col);
            }
        }
        let g: Array2<f64> = basis.t().dot(&products);
        let (values, vectors) = real_sorted_eig(&g)?;

        // Follow the root by maximal overlap with the previous iterate:
        // |<x_prev, B alpha_k>| = |(B^T x_prev) . alpha_k|.
        let projected = basis.t().dot(&previous);
        let mut root = 0;
        let mut best = -1.0;
        for k in 0..values.len() {
            let overlap =
                projected.dot(&vectors.column(k)).abs() / vectors.column(k).norm();
            if overlap > best {
                best = overlap;
                root = k;
            }
        }

        let alpha = vectors.column(root).to_owned();
        let mut ritz: Array1<f64> = basis.dot(&alpha);
        let mut sigma: Array1<f64> = products.dot(&alpha);
        let scale = ritz.norm();
        ritz /= scale;
        sigma /= scale;
        let theta = values[root];
        let residual = &sigma - &(&ritz * theta);
        let rnorm = residual.norm();
        logging::print_davidson_iteration(iter, theta, basis.ncols(), rnorm);

        result.iterations = iter + 1;
        result.eigenvalue = theta;
        result.eigenvector = ritz.clone();
        if rnorm < tolerance {
            result.converged = true;
            break;
        }
        previous = ritz.clone();

        if basis.ncols() >= max_subspace {
            // Collapse to the current Ritz vector and rebuild the products.
            basis = ritz.insert_axis(Axis(1)).to_owned();
            products = Array2::zeros((dim, 0));
        } else {
            let correction = engine.precondition(residual.view(), theta);
            orthogonalize_into(&mut basis, correction);
        }
    }
    logging::print_davidson_end(result.converged, timer);
    Ok(result)
}

/// Orthonormal basis spanned by the columns of `block`, built by classical
/// Gram-Schmidt; numerically dependent columns are dropped.
fn orthonormal_block(dim: usize, block: &Array2<f64>) -> Array2<f64> {
    let mut basis: Array2<f64> = Array2::zeros((dim, 0));
    for col in block.columns() {
        orthogonalize_into(&mut basis, col.to_owned());
    }
    basis
}

/// Block Davidson for `n_roots` eigenpairs at once. Each root is followed
/// by maximal overlap with its previous Ritz vector, like the single-root
/// scheme, so a block never silently swaps onto lower-lying states. The
/// guess block is orthonormalized before use and the basis is rebuilt
/// orthonormal after every collapse; the general eigendecomposition of the
/// subspace matrix does not return orthonormal columns on its own.
pub fn multiroot<D: DavidsonEngine>(
    engine: &mut D,
    guess: Array2<f64>,
    n_roots: usize,
    max_subspace: usize,
    max_iter: usize,
    tolerance: f64,
) -> Result<BlockDavidsonResult, DavidsonError> {
    let timer = Timer::start();
    let dim = engine.get_size();
    logging::print_davidson_init(max_iter, n_roots, tolerance);

    let mut basis = orthonormal_block(dim, &guess);
    if basis.ncols() < n_roots {
        return Err(DavidsonError(format!(
            "only {} independent guess vectors for {} roots",
            basis.ncols(),
            n_roots
        )));
    }
    let mut previous: Array2<f64> = basis.slice(s![.., ..n_roots]).to_owned();
    let mut products: Array2<f64> = Array2::zeros((dim, 0));

    let mut result = BlockDavidsonResult {
        converged: false,
        iterations: 0,
        eigenvalues: Array1::zeros(n_roots),
        eigenvectors: Array2::zeros((dim, n_roots)),
    };
    for iter in 0..max_iter {
        // Products only for the basis vectors added since the last cycle.
        if basis.ncols() > products.ncols() {
            let fresh = engine.compute_products(basis.slice(s![.., products.ncols()..]));
            for col in fresh.columns() {
                let _ = products.push_column(col);
            }
        }
        let g = basis.t().dot(&products);
        let (values, vectors) = real_sorted_eig(&g)?;

        // Pick one subspace eigenvector per tracked root, each by maximal
        // overlap with that root's previous iterate.
        let projected = basis.t().dot(&previous);
        let mut chosen: Vec<usize> = Vec::with_capacity(n_roots);
        for k in 0..n_roots {
            let target = projected.column(k);
            let mut root = 0;
            let mut best = -1.0;
            for j in 0..values.len() {
                if chosen.contains(&j) {
                    continue;
                }
                let overlap = target.dot(&vectors.column(j)).abs() / vectors.column(j).norm();
                if overlap > best {
                    best = overlap;
                    root = j;
                }
            }
            chosen.push(root);
        }

        let mut theta: Array1<f64> = Array1::zeros(n_roots);
        let mut ritz: Array2<f64> = Array2::zeros((dim, n_roots));
        let mut residuals: Array2<f64> = Array2::zeros((dim, n_roots));
        for (k, &j) in chosen.iter().enumerate() {
            let alpha = vectors.column(j);
            let mut x: Array1<f64> = basis.dot(&alpha);
            let mut sigma: Array1<f64> = products.dot(&alpha);
            let scale = x.norm();
            x /= scale;
            sigma /= scale;
            theta[k] = values[j];
            residuals
                .column_mut(k)
                .assign(&(&sigma - &(&x * values[j])));
            ritz.column_mut(k).assign(&x);
        }
        let errors: Array1<f64> = residuals.columns().into_iter().map(|c| c.norm()).collect();
        let max_error = errors.iter().cloned().fold(0.0, f64::max);
        logging::print_davidson_iteration(iter, theta[0], basis.ncols(), max_error);

        result.iterations = iter + 1;
        result.eigenvalues = theta.clone();
        result.eigenvectors = ritz.clone();
        if errors.iter().all(|&e| e < tolerance) {
            result.converged = true;
            break;
        }
        previous = ritz.clone();

        if basis.ncols() + n_roots > max_subspace {
            // Collapse to an orthonormalized copy of the Ritz block and
            // rebuild the products.
            basis = orthonormal_block(dim, &ritz);
            if basis.ncols() < n_roots {
                return Err(DavidsonError(
                    "Ritz block collapsed to linear dependence".into(),
                ));
            }
            products = Array2::zeros((dim, 0));
        } else {
            for (k, error) in errors.iter().enumerate() {
                if *error >= tolerance {
                    let correction = engine.precondition(residuals.column(k), theta[k]);
                    orthogonalize_into(&mut basis, correction);
                }
            }
        }
    }
    logging::print_davidson_end(result.converged, timer);
    Ok(result)
}

/// DIIS-accelerated nonlinear single-root iteration: a Rayleigh quotient
/// step with diagonal preconditioning, extrapolated over the recent
/// (vector, residual) history. Cheaper per cycle than the subspace scheme
/// and useful when a good starting vector is available.
pub fn nonlinear_diis<D: DavidsonEngine>(
    engine: &mut D,
    guess: Array1<f64>,
    max_iter: usize,
    tolerance: f64,
    diis_size: usize,
    diis_min_space: usize,
) -> Result<DavidsonResult, DavidsonError> {
    let timer = Timer::start();
    logging::print_davidson_init(max_iter, 1, tolerance);

    let norm = guess.norm();
    if norm < 1.0e-12 {
        return Err(DavidsonError("guess vector is numerically zero".into()));
    }
    let mut x = &guess / norm;
    let mut diis = Diis::new(diis_size, diis_min_space);
    let mut result = DavidsonResult {
        converged: false,
        iterations: 0,
        eigenvalue: 0.0,
        eigenvector: x.clone(),
    };
    for iter in 0..max_iter {
        let sigma = engine
            .compute_products(x.view().insert_axis(Axis(1)))
            .column(0)
            .to_owned();
        let theta = x.dot(&sigma);
        let residual = &sigma - &(&x * theta);
        let rnorm = residual.norm();
        logging::print_davidson_iteration(iter, theta, 1, rnorm);

        result.iterations = iter + 1;
        result.eigenvalue = theta;
        result.eigenvector = x.clone();
        if rnorm < tolerance {
            result.converged = true;
            break;
        }

        let correction = engine.precondition(residual.view(), theta);
        let mut next = &x + &correction;
        diis.push(next.view(), residual.view());
        if let Some(extrapolated) = diis.extrapolate() {
            next = extrapolated;
        }
        let norm = next.norm();
        if norm < 1.0e-12 {
            return Err(DavidsonError("iterate collapsed to zero".into()));
        }
        x = next / norm;
    }
    logging::print_davidson_end(result.converged, timer);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Dense non-symmetric test matrix behind the engine interface.
    struct DenseEngine {
        matrix: Array2<f64>,
    }

    impl DavidsonEngine for DenseEngine {
        fn compute_products(&mut self, x: ArrayView2<f64>) -> Array2<f64> {
            self.matrix.dot(&x)
        }

        fn precondition(&self, r: ArrayView1<f64>, w: f64) -> Array1<f64> {
            Array1::from_iter(r.iter().enumerate().map(|(i, &ri)| {
                let mut denom = w - self.matrix[[i, i]];
                if denom.abs() < 1.0e-4 {
                    denom = 1.0;
                }
                ri / denom
            }))
        }

        fn get_size(&self) -> usize {
            self.matrix.nrows()
        }
    }

    fn test_matrix() -> Array2<f64> {
        // Diagonal-dominant and mildly non-symmetric.
        let mut m = Array2::from_diag(&array![1.0, 2.0, 3.5, 5.0, 8.0]);
        m[[0, 1]] = 0.3;
        m[[1, 0]] = 0.2;
        m[[2, 4]] = 0.1;
        m[[4, 2]] = 0.15;
        m[[1, 3]] = 0.05;
        m
    }

    #[test]
    fn standard_finds_the_followed_root() {
        let mut engine = DenseEngine {
            matrix: test_matrix(),
        };
        // Start near the third diagonal entry and stay on that root.
        let mut guess = Array1::zeros(5);
        guess[2] = 1.0;
        let result = standard(&mut engine, guess, 4, 60, 1e-9).unwrap();
        assert!(result.converged);
        // Exact eigenvalue of the 2x2 coupled block {3.5, 8.0}.
        let (d0, d1, c01, c10): (f64, f64, f64, f64) = (3.5, 8.0, 0.1, 0.15);
        let avg = 0.5 * (d0 + d1);
        let rad = (0.25 * (d0 - d1).powi(2) + c01 * c10).sqrt();
        assert_abs_diff_eq!(result.eigenvalue, avg - rad, epsilon = 1e-7);
    }

    #[test]
    fn root_following_survives_a_subspace_collapse() {
        let mut engine = DenseEngine {
            matrix: test_matrix(),
        };
        let mut guess = Array1::zeros(5);
        guess[4] = 1.0;
        // max_subspace of 2 forces collapses; the tracked root must stay
        // the one with the largest overlap, not the lowest.
        let result = standard(&mut engine, guess, 2, 120, 1e-9).unwrap();
        assert!(result.converged);
        let (d0, d1, c01, c10): (f64, f64, f64, f64) = (3.5, 8.0, 0.1, 0.15);
        let avg = 0.5 * (d0 + d1);
        let rad = (0.25 * (d0 - d1).powi(2) + c01 * c10).sqrt();
        assert_abs_diff_eq!(result.eigenvalue, avg + rad, epsilon = 1e-7);
    }

    #[test]
    fn multiroot_matches_the_lowest_eigenvalues() {
        let mut engine = DenseEngine {
            matrix: test_matrix(),
        };
        let mut guess = Array2::zeros((5, 2));
        guess[[0, 0]] = 1.0;
        guess[[1, 1]] = 1.0;
        let result = multiroot(&mut engine, guess, 2, 10, 100, 1e-9).unwrap();
        assert!(result.converged);
        // Reference values from the (nearly decoupled) 2x2 block {1, 2}.
        let (d0, d1): (f64, f64) = (1.0, 2.0);
        let avg = 0.5 * (d0 + d1);
        let rad = (0.25 * (d0 - d1).powi(2) + 0.3 * 0.2).sqrt();
        assert_abs_diff_eq!(result.eigenvalues[0], avg - rad, epsilon = 1e-4);
    }

    /// Two nearly degenerate low states: a guess sitting on the upper one
    /// must converge to the upper one, not slide down the spectrum.
    #[test]
    fn multiroot_follows_the_overlapped_root_not_the_lowest() {
        let mut m = Array2::from_diag(&array![1.0, 1.05, 3.5, 5.0, 8.0]);
        m[[0, 1]] = 0.01;
        m[[1, 0]] = 0.012;
        let mut engine = DenseEngine { matrix: m };
        let mut guess = Array2::zeros((5, 1));
        guess[[1, 0]] = 1.0;
        let result = multiroot(&mut engine, guess, 1, 10, 200, 1e-9).unwrap();
        assert!(result.converged);
        let (d0, d1, c01, c10): (f64, f64, f64, f64) = (1.0, 1.05, 0.01, 0.012);
        let avg = 0.5 * (d0 + d1);
        let rad = (0.25 * (d0 - d1).powi(2) + c01 * c10).sqrt();
        assert_abs_diff_eq!(result.eigenvalues[0], avg + rad, epsilon = 1e-7);
    }

    /// A skewed, mutually non-orthogonal guess block must give the same
    /// answers as an orthogonal one.
    #[test]
    fn multiroot_orthonormalizes_a_skewed_guess_block() {
        let mut engine = DenseEngine {
            matrix: test_matrix(),
        };
        let mut guess = Array2::zeros((5, 2));
        guess[[0, 0]] = 1.0;
        guess[[0, 1]] = 1.0;
        guess[[1, 1]] = 1.0;
        let result = multiroot(&mut engine, guess, 2, 10, 100, 1e-9).unwrap();
        assert!(result.converged);
        let (d0, d1): (f64, f64) = (1.0, 2.0);
        let avg = 0.5 * (d0 + d1);
        let rad = (0.25 * (d0 - d1).powi(2) + 0.3 * 0.2).sqrt();
        assert_abs_diff_eq!(result.eigenvalues[0], avg - rad, epsilon = 1e-4);
        assert_abs_diff_eq!(result.eigenvalues[1], avg + rad, epsilon = 1e-4);
    }

    #[test]
    fn nonlinear_diis_agrees_with_the_subspace_solver() {
        let mut engine = DenseEngine {
            matrix: test_matrix(),
        };
        let mut guess = Array1::zeros(5);
        guess[0] = 1.0;
        let subspace = standard(&mut engine, guess.clone(), 6, 60, 1e-9).unwrap();
        let diis = nonlinear_diis(&mut engine, guess, 200, 1e-9, 6, 3).unwrap();
        assert!(subspace.converged && diis.converged);
        assert_abs_diff_eq!(subspace.eigenvalue, diis.eigenvalue, epsilon = 1e-7);
    }

    #[test]
    fn running_out_of_iterations_is_reported_as_data() {
        let mut engine = DenseEngine {
            matrix: test_matrix(),
        };
        let mut guess = Array1::zeros(5);
        guess[0] = 1.0;
        let result = standard(&mut engine, guess, 4, 1, 1e-12).unwrap();
        assert!(!result.converged);
        assert_eq!(result.iterations, 1);
    }
}
