// CALCULATION SPECIFICATION
// CC/EOM-CC method identifier
pub const METHOD: &str = "ccsd";
// number of excited-state roots (0 -> ground state only)
pub const NROOTS: usize = 0;
// config file
pub const CONFIG_FILE_NAME: &str = "ccrs.toml";

// AMPLITUDE ITERATIONS
// stop the Jacobi/DIIS or Davidson loop after maxiter iterations
pub const MAX_ITER: usize = 80;
// convergence threshold for the residual norm
pub const AMP_CONV: f64 = 1.0e-7;
// convergence threshold for the energy change between iterations
pub const ENERGY_CONV: f64 = 1.0e-7;
// static denominator shift applied in the quasi-Newton update
pub const ENERGY_SHIFT: f64 = 0.0;

// DIIS
// number of (amplitude, residual) pairs kept in the extrapolation history;
// values <= 0 disable the extrapolation entirely
pub const DIIS_SIZE: i64 = 6;
// DIIS is switched off automatically below this excitation-space size
pub const DIIS_MIN_SPACE: usize = 4;

// DAVIDSON
pub const DAVIDSON_MAX_SUBSPACE: usize = 30;
pub const DAVIDSON_SOLVER: &str = "standard";
// denominators with a magnitude below this floor are replaced to avoid
// division blow-up in the preconditioner
pub const DENOMINATOR_FLOOR: f64 = 1.0e-4;

// DRIVER
// number of excited-state slots held by one driver instance
pub const MAX_STATES: usize = 50;
// maximum deviation between right and left eigenvalues of the same root
pub const LEFT_RIGHT_TOL: f64 = 1.0e-5;
