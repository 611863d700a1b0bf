//! Stateful calculation driver. A [`Driver`] owns the system description,
//! the bare integrals and every product of the session: converged
//! amplitudes, the similarity-transformed integrals, guess vectors,
//! right-hand and left-hand excited states. Each `run_*` operation checks
//! that its prerequisites have been produced and fails loudly otherwise,
//! so a calculation can only advance through the states
//! amplitudes -> transformed integrals -> guesses -> excited states.

use crate::defaults;
use crate::eom_guess;
use crate::hamiltonian::Hamiltonian;
use crate::methods::eom::{self, EomEngine};
use crate::methods::hbar;
use crate::methods::spinorbital::{gather, scatter, Amplitudes};
use crate::methods::terms::TermEngine;
use crate::methods::{ccsd, ccsdt1, Method};
use crate::operators::denominator::mp_denominator;
use crate::operators::{ClusterOperator, ExcitationList, OperatorError};
use crate::solvers::davidson::{self, DavidsonError};
use crate::solvers::jacobi::{self, JacobiOptions, JacobiSummary};
use crate::system::System;
use ndarray::prelude::*;
use std::error;
use std::fmt;
use std::str::FromStr;

/// Which eigensolver handles the excited-state equations.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DavidsonSolver {
    /// Single-root subspace iteration with root following.
    Standard,
    /// Block subspace iteration for all requested roots at once.
    Multiroot,
    /// DIIS-accelerated fixed-point iteration on one root.
    NonlinearDiis,
}

impl FromStr for DavidsonSolver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(DavidsonSolver::Standard),
            "multiroot" => Ok(DavidsonSolver::Multiroot),
            "diis" | "nonlinear-diis" => Ok(DavidsonSolver::NonlinearDiis),
            other => Err(format!("unknown eigensolver '{}'", other)),
        }
    }
}

/// Numerical controls shared by every operation of a driver instance.
#[derive(Clone, Debug)]
pub struct Options {
    pub maximum_iterations: usize,
    pub amplitude_convergence: f64,
    pub energy_convergence: f64,
    pub energy_shift: f64,
    /// DIIS history length, non-positive disables the acceleration.
    pub diis_size: i64,
    pub diis_min_space: usize,
    pub davidson_max_subspace_size: usize,
    pub davidson_solver: DavidsonSolver,
    /// Spin-flip amplitude copying. `None` derives the setting from the
    /// orbital counts of the reference.
    pub rhf_symmetry: Option<bool>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            maximum_iterations: defaults::MAX_ITER,
            amplitude_convergence: defaults::AMP_CONV,
            energy_convergence: defaults::ENERGY_CONV,
            energy_shift: defaults::ENERGY_SHIFT,
            diis_size: defaults::DIIS_SIZE,
            diis_min_space: defaults::DIIS_MIN_SPACE,
            davidson_max_subspace_size: defaults::DAVIDSON_MAX_SUBSPACE,
            davidson_solver: DavidsonSolver::Standard,
            rhf_symmetry: None,
        }
    }
}

/// One converged (or attempted) excited state.
#[derive(Clone, Debug)]
pub struct ExcitedState {
    pub omega: f64,
    pub operator: ClusterOperator,
    pub converged: bool,
}

#[derive(Debug)]
pub enum DriverError {
    /// The operation needs converged ground-state amplitudes.
    MissingAmplitudes(&'static str),
    /// The operation needs the similarity-transformed integrals.
    MissingHbar(&'static str),
    /// The operation needs initial guess vectors.
    MissingGuess(&'static str),
    RootOutOfRange { root: usize, available: usize },
    /// A left-hand state needs its converged right-hand companion.
    MissingRightState(usize),
    WrongKind { method: Method, expected: &'static str },
    /// Excited-state and left-hand methods must match the converged
    /// ground-state ansatz in rank and storage.
    IncompatibleMethods { ground: Method, requested: Method },
    /// The left-hand eigenvalue drifted away from its right-hand
    /// companion, which indicates the two converged to different states.
    LeftRightMismatch { root: usize, right: f64, left: f64 },
    /// A left-hand state is numerically orthogonal to its right-hand
    /// companion, so the biorthonormal rescaling would diverge.
    DegenerateOverlap { root: usize, overlap: f64 },
    Operator(OperatorError),
    Eigensolver(DavidsonError),
    Guess(String),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::MissingAmplitudes(op) => {
                write!(f, "'{}' requires converged ground-state amplitudes", op)
            }
            DriverError::MissingHbar(op) => {
                write!(f, "'{}' requires the similarity-transformed integrals", op)
            }
            DriverError::MissingGuess(op) => {
                write!(f, "'{}' requires initial guess vectors", op)
            }
            DriverError::RootOutOfRange { root, available } => {
                write!(f, "root {} requested but only {} guesses exist", root, available)
            }
            DriverError::MissingRightState(root) => write!(
                f,
                "the left-hand state of root {} requires its converged right-hand companion",
                root
            ),
            DriverError::WrongKind { method, expected } => {
                write!(f, "{} is not {}", method, expected)
            }
            DriverError::IncompatibleMethods { ground, requested } => write!(
                f,
                "{} does not match the converged {} ground state",
                requested, ground
            ),
            DriverError::LeftRightMismatch { root, right, left } => write!(
                f,
                "root {}: left-hand eigenvalue {:.10} disagrees with the right-hand {:.10}",
                root, left, right
            ),
            DriverError::DegenerateOverlap { root, overlap } => write!(
                f,
                "root {}: left-right overlap {:.3e} is numerically zero",
                root, overlap
            ),
            DriverError::Operator(e) => write!(f, "{}", e),
            DriverError::Eigensolver(e) => write!(f, "{}", e),
            DriverError::Guess(msg) => write!(f, "{}", msg),
        }
    }
}

impl error::Error for DriverError {}

impl From<OperatorError> for DriverError {
    fn from(e: OperatorError) -> Self {
        DriverError::Operator(e)
    }
}

impl From<DavidsonError> for DriverError {
    fn from(e: DavidsonError) -> Self {
        DriverError::Eigensolver(e)
    }
}

fn build_engine(h: &Hamiltonian, method: Method) -> TermEngine {
    match method.order() {
        2 => ccsd::engine(h, method.has_singles()),
        _ => ccsdt1::engine(h),
    }
}

fn axpy(dst: &mut Amplitudes, factor: f64, src: &Amplitudes) {
    dst.t1.scaled_add(factor, &src.t1);
    dst.t2.scaled_add(factor, &src.t2);
    if let (Some(d3), Some(s3)) = (dst.t3.as_mut(), src.t3.as_ref()) {
        d3.scaled_add(factor, s3);
    }
}

/// Rescale a left-hand state so its overlap with the right-hand companion
/// is one. A vanishing overlap is a hard error.
fn biorthonormalize(
    l: &mut ClusterOperator,
    r: &ClusterOperator,
    root: usize,
) -> Result<(), DriverError> {
    let overlap = l.dot(r);
    if overlap.abs() < 1.0e-12 {
        return Err(DriverError::DegenerateOverlap { root, overlap });
    }
    let order = l.order;
    let rescaled = l.flatten().mapv(|x| x / overlap);
    l.unflatten(rescaled.view(), order)?;
    Ok(())
}

/// Mirrored P-space blocks must grow in lockstep when the spin-flip
/// shortcut is active.
fn check_rhf_pspace_counts(t: &ClusterOperator) -> Result<(), OperatorError> {
    if t.order < 3 {
        return Ok(());
    }
    for (left, right) in [("aaa", "bbb"), ("aab", "abb")] {
        let (a, b) = (t.block(left), t.block(right));
        if (a.excitations().is_some() || b.excitations().is_some()) && a.len() != b.len() {
            return Err(OperatorError::PspaceMismatch {
                left,
                right,
                nleft: a.len(),
                nright: b.len(),
            });
        }
    }
    Ok(())
}

pub struct Driver {
    pub system: System,
    hamiltonian: Hamiltonian,
    pub options: Options,
    method: Option<Method>,
    t: Option<ClusterOperator>,
    t_converged: bool,
    correlation_energy: f64,
    hbar: Option<Hamiltonian>,
    guess_energies: Option<Array1<f64>>,
    guess_vectors: Option<Array2<f64>>,
    r: Vec<Option<ExcitedState>>,
    r0: Vec<Option<f64>>,
    l: Vec<Option<ExcitedState>>,
    lambda: Option<ClusterOperator>,
}

impl Driver {
    pub fn new(system: System, hamiltonian: Hamiltonian, options: Options) -> Self {
        Driver {
            system,
            hamiltonian,
            options,
            method: None,
            t: None,
            t_converged: false,
            correlation_energy: 0.0,
            hbar: None,
            guess_energies: None,
            guess_vectors: None,
            r: Vec::new(),
            r0: Vec::new(),
            l: Vec::new(),
            lambda: None,
        }
    }

    fn rhf_active(&self) -> bool {
        self.options
            .rhf_symmetry
            .unwrap_or_else(|| self.system.dims.is_closed_shell())
    }

    fn jacobi_options(&self, amplitude_count: usize) -> JacobiOptions {
        // DIIS over a history longer than the problem itself only produces
        // singular extrapolation systems.
        let diis = if self.options.diis_size > 0 && amplitude_count > self.options.diis_size as usize
        {
            Some((self.options.diis_size as usize, self.options.diis_min_space))
        } else {
            None
        };
        JacobiOptions {
            maximum_iterations: self.options.maximum_iterations,
            amplitude_convergence: self.options.amplitude_convergence,
            energy_convergence: self.options.energy_convergence,
            energy_shift: self.options.energy_shift,
            diis,
        }
    }

    fn converged_amplitudes(&self, op: &'static str) -> Result<&ClusterOperator, DriverError> {
        match &self.t {
            Some(t) if self.t_converged => Ok(t),
            _ => Err(DriverError::MissingAmplitudes(op)),
        }
    }

    fn invalidate_downstream(&mut self) {
        self.hbar = None;
        self.guess_energies = None;
        self.guess_vectors = None;
        self.r.clear();
        self.r0.clear();
        self.l.clear();
        self.lambda = None;
    }

    /// Solve the ground-state amplitude equations of a dense method from
    /// scratch. Running out of iterations is reported through the summary,
    /// not as an error.
    pub fn run_cc(&mut self, method: Method) -> Result<JacobiSummary, DriverError> {
        if method.is_excited_state() || method.is_left_hand() {
            return Err(DriverError::WrongKind {
                method,
                expected: "a ground-state method",
            });
        }
        if method.uses_pspace() {
            return Err(DriverError::WrongKind {
                method,
                expected: "a dense method, P-space variants take explicit lists",
            });
        }
        let t = ClusterOperator::new(self.system.dims, method.order());
        self.solve_ground(method, t)
    }

    /// Like [`run_cc`](Self::run_cc) for methods whose highest excitation
    /// rank lives on explicit determinant lists.
    pub fn run_cc_pspace(
        &mut self,
        method: Method,
        lists: Vec<(&str, ExcitationList)>,
    ) -> Result<JacobiSummary, DriverError> {
        if !method.uses_pspace() || method.is_excited_state() || method.is_left_hand() {
            return Err(DriverError::WrongKind {
                method,
                expected: "a ground-state P-space method",
            });
        }
        let mut t = ClusterOperator::with_pspace(self.system.dims, method.order(), lists)?;
        // Warm start: carry the dense ranks of a previous solve into the
        // freshly sized operator. The listed rank begins at zero.
        if let Some(prev) = &self.t {
            let kept = t.len_through(2);
            if prev.len_through(2) == kept {
                let dense = prev.flatten();
                t.unflatten(dense.slice(s![..kept]), 2)?;
            }
        }
        self.solve_ground(method, t)
    }

    fn solve_ground(
        &mut self,
        method: Method,
        mut t: ClusterOperator,
    ) -> Result<JacobiSummary, DriverError> {
        if self.rhf_active() {
            // Validates that mirrored P-space lists are consistent before
            // the first iteration.
            t.apply_rhf_symmetry()?;
        }
        self.method = Some(method);
        self.t = Some(t);
        self.resolve_ground(method)
    }

    /// Continue the ground-state iteration from the stored amplitudes,
    /// typically after the P-space has been extended.
    pub fn rerun_cc(&mut self) -> Result<JacobiSummary, DriverError> {
        let method = match (self.method, &self.t) {
            (Some(method), Some(_)) => method,
            _ => return Err(DriverError::MissingAmplitudes("rerun_cc")),
        };
        if self.rhf_active() {
            check_rhf_pspace_counts(self.t.as_ref().unwrap())?;
        }
        self.resolve_ground(method)
    }

    fn resolve_ground(&mut self, method: Method) -> Result<JacobiSummary, DriverError> {
        self.invalidate_downstream();
        let engine = build_engine(&self.hamiltonian, method);
        let mut t = self.t.take().unwrap();
        let d = mp_denominator(&self.system, &t);
        let options = self.jacobi_options(t.len());
        let label = method.to_string();
        let summary = jacobi::solve(&label, &mut t, &d, 0.0, &options, |t_op| {
            let combined = scatter(t_op);
            let residual = engine.residual(&combined);
            (gather(&residual, t_op), engine.energy(&combined))
        });
        self.correlation_energy = summary.energy;
        self.t_converged = summary.converged;
        self.t = Some(t);
        Ok(summary)
    }

    /// Build the similarity-transformed integrals from the converged
    /// amplitudes and store them next to the bare ones.
    pub fn run_hbar(&mut self) -> Result<(), DriverError> {
        let t = self.converged_amplitudes("run_hbar")?;
        let combined = scatter(t);
        self.hbar = Some(hbar::similarity_transform(&self.hamiltonian, &combined));
        Ok(())
    }

    /// Diagonalize the singles-singles block of the transformed integrals
    /// and keep the lowest `nroots` eigenvectors as guesses. Returns the
    /// guess eigenvalues, of which there may be fewer than requested.
    pub fn run_guess(&mut self, nroots: usize) -> Result<Array1<f64>, DriverError> {
        if nroots > defaults::MAX_STATES {
            return Err(DriverError::Guess(format!(
                "{} roots requested, at most {} are supported",
                nroots,
                defaults::MAX_STATES
            )));
        }
        let hbar = self
            .hbar
            .as_ref()
            .ok_or(DriverError::MissingHbar("run_guess"))?;
        let (omegas, vectors) =
            eom_guess::singles_block_guesses(hbar, nroots).map_err(DriverError::Guess)?;
        let found = omegas.len();
        self.guess_energies = Some(omegas.clone());
        self.guess_vectors = Some(vectors);
        self.r = vec![None; found];
        self.r0 = vec![None; found];
        self.l = vec![None; found];
        Ok(omegas)
    }

    /// Solve the right-hand excited-state eigenproblem for one root and
    /// return its excitation energy. With the multiroot eigensolver every
    /// guessed root is solved and stored in one sweep.
    pub fn run_eomcc(&mut self, method: Method, root: usize) -> Result<f64, DriverError> {
        if !method.is_excited_state() {
            return Err(DriverError::WrongKind {
                method,
                expected: "an excited-state method",
            });
        }
        let ground = self.method.ok_or(DriverError::MissingAmplitudes("run_eomcc"))?;
        // The excitation operator inherits the ground-state storage, so
        // only the excitation rank has to agree.
        if method.order() != ground.order() {
            return Err(DriverError::IncompatibleMethods {
                ground,
                requested: method,
            });
        }
        let t = self.converged_amplitudes("run_eomcc")?.clone();
        if self.hbar.is_none() {
            return Err(DriverError::MissingHbar("run_eomcc"));
        }
        let guesses = self
            .guess_vectors
            .clone()
            .ok_or(DriverError::MissingGuess("run_eomcc"))?;
        if root >= self.r.len() {
            return Err(DriverError::RootOutOfRange {
                root,
                available: self.r.len(),
            });
        }

        let engine = build_engine(&self.hamiltonian, method);
        let template = t.zeros_like();
        let order = template.order;
        let d = mp_denominator(&self.system, &template);
        let t_combined = scatter(&t);
        let mut subspace = EomEngine::new(&engine, t_combined.clone(), template.clone(), &d);

        // Singles guesses padded with zeros in the higher ranks.
        let expand = |column: ArrayView1<f64>| -> Result<Array1<f64>, DriverError> {
            let mut g = template.zeros_like();
            g.unflatten(column, 1)?;
            Ok(g.flatten())
        };

        let max_subspace = self.options.davidson_max_subspace_size;
        let max_iter = self.options.maximum_iterations;
        let tolerance = self.options.amplitude_convergence;

        match self.options.davidson_solver {
            DavidsonSolver::Multiroot => {
                let n_roots = self.r.len();
                let mut block_guess = Array2::zeros((template.len(), n_roots));
                for (k, column) in guesses.columns().into_iter().take(n_roots).enumerate() {
                    block_guess.column_mut(k).assign(&expand(column)?);
                }
                let block = davidson::multiroot(
                    &mut subspace,
                    block_guess,
                    n_roots,
                    max_subspace,
                    max_iter,
                    tolerance,
                )?;
                for k in 0..n_roots {
                    let mut operator = template.zeros_like();
                    operator.unflatten(block.eigenvectors.column(k), order)?;
                    let omega = block.eigenvalues[k];
                    let weight =
                        eom::reference_weight(&engine, &t_combined, &scatter(&operator), omega);
                    self.r[k] = Some(ExcitedState {
                        omega,
                        operator,
                        converged: block.converged,
                    });
                    self.r0[k] = Some(weight);
                }
                Ok(block.eigenvalues[root])
            }
            solver => {
                // A previously solved root restarts from its own vector.
                let guess = match &self.r[root] {
                    Some(state) if state.operator.len() == template.len() => {
                        state.operator.flatten()
                    }
                    _ => expand(guesses.column(root))?,
                };
                let result = match solver {
                    DavidsonSolver::Standard => {
                        davidson::standard(&mut subspace, guess, max_subspace, max_iter, tolerance)?
                    }
                    _ => davidson::nonlinear_diis(
                        &mut subspace,
                        guess,
                        max_iter,
                        tolerance,
                        self.options.diis_size.max(2) as usize,
                        self.options.diis_min_space,
                    )?,
                };
                let mut operator = template.zeros_like();
                operator.unflatten(result.eigenvector.view(), order)?;
                let omega = result.eigenvalue;
                let weight =
                    eom::reference_weight(&engine, &t_combined, &scatter(&operator), omega);
                self.r[root] = Some(ExcitedState {
                    omega,
                    operator,
                    converged: result.converged,
                });
                self.r0[root] = Some(weight);
                Ok(omega)
            }
        }
    }

    /// Solve the left-hand companion equations. `root: None` produces the
    /// ground-state lambda amplitudes; for an excited root the left-hand
    /// eigenvalue must reproduce the right-hand one and the state is
    /// rescaled to unit overlap with its right-hand companion.
    pub fn run_leftcc(
        &mut self,
        method: Method,
        root: Option<usize>,
    ) -> Result<JacobiSummary, DriverError> {
        if !method.is_left_hand() {
            return Err(DriverError::WrongKind {
                method,
                expected: "a left-hand method",
            });
        }
        let ground = self
            .method
            .ok_or(DriverError::MissingAmplitudes("run_leftcc"))?;
        if method.order() != ground.order() {
            return Err(DriverError::IncompatibleMethods {
                ground,
                requested: method,
            });
        }
        let t = self.converged_amplitudes("run_leftcc")?.clone();
        if self.hbar.is_none() {
            return Err(DriverError::MissingHbar("run_leftcc"));
        }
        let engine = build_engine(&self.hamiltonian, method);
        let t_combined = scatter(&t);
        let d = mp_denominator(&self.system, &t);
        let options = self.jacobi_options(t.len());
        let label = method.to_string();

        match root {
            None => {
                // The converged amplitudes are the natural starting point.
                let mut l = t.clone();
                let eta = engine.eta(&t_combined);
                let summary = jacobi::solve(&label, &mut l, &d, 0.0, &options, |l_op| {
                    let lc = scatter(l_op);
                    let mut residual = engine.sigma_transpose(&t_combined, &lc);
                    axpy(&mut residual, 1.0, &eta);
                    let pseudo = engine.weighted_dot(&lc, &eta);
                    (gather(&residual, l_op), pseudo)
                });
                self.lambda = Some(l);
                Ok(summary)
            }
            Some(k) => {
                let state = match self.r.get(k) {
                    Some(Some(state)) if state.converged => state.clone(),
                    _ => return Err(DriverError::MissingRightState(k)),
                };
                let omega_r = state.omega;
                let mut l = state.operator.clone();
                let summary = jacobi::solve(&label, &mut l, &d, omega_r, &options, |l_op| {
                    let lc = scatter(l_op);
                    let transposed = engine.sigma_transpose(&t_combined, &lc);
                    let omega_l = engine.weighted_dot(&transposed, &lc)
                        / engine.weighted_dot(&lc, &lc);
                    let mut residual = transposed;
                    axpy(&mut residual, -omega_r, &lc);
                    (gather(&residual, l_op), omega_l)
                });
                if summary.converged && (summary.energy - omega_r).abs() > defaults::LEFT_RIGHT_TOL
                {
                    return Err(DriverError::LeftRightMismatch {
                        root: k,
                        right: omega_r,
                        left: summary.energy,
                    });
                }
                biorthonormalize(&mut l, &state.operator, k)?;
                self.l[k] = Some(ExcitedState {
                    omega: summary.energy,
                    operator: l,
                    converged: summary.converged,
                });
                Ok(summary)
            }
        }
    }

    /// Append excitations to one P-space block of the stored amplitudes.
    /// Everything derived from the old amplitudes is discarded.
    pub fn extend_pspace(
        &mut self,
        label: &str,
        more: &ExcitationList,
    ) -> Result<(), DriverError> {
        let t = self
            .t
            .as_mut()
            .ok_or(DriverError::MissingAmplitudes("extend_pspace"))?;
        t.extend_pspace(label, more)?;
        self.t_converged = false;
        self.invalidate_downstream();
        Ok(())
    }

    /// Drop every computed quantity and return to the initial state.
    pub fn reset(&mut self) {
        self.method = None;
        self.t = None;
        self.t_converged = false;
        self.correlation_energy = 0.0;
        self.invalidate_downstream();
    }

    pub fn amplitudes(&self) -> Option<&ClusterOperator> {
        self.t.as_ref()
    }

    pub fn correlation_energy(&self) -> f64 {
        self.correlation_energy
    }

    pub fn total_energy(&self) -> f64 {
        self.system.reference_energy + self.correlation_energy
    }

    pub fn dressed_hamiltonian(&self) -> Option<&Hamiltonian> {
        self.hbar.as_ref()
    }

    pub fn guess_energies(&self) -> Option<ArrayView1<f64>> {
        self.guess_energies.as_ref().map(|g| g.view())
    }

    pub fn right_state(&self, root: usize) -> Option<&ExcitedState> {
        self.r.get(root).and_then(|s| s.as_ref())
    }

    pub fn left_state(&self, root: usize) -> Option<&ExcitedState> {
        self.l.get(root).and_then(|s| s.as_ref())
    }

    pub fn ground_lambda(&self) -> Option<&ClusterOperator> {
        self.lambda.as_ref()
    }

    /// Weight of the reference determinant in an excited state.
    pub fn reference_weight(&self, root: usize) -> Option<f64> {
        self.r0.get(root).and_then(|w| *w)
    }
}
