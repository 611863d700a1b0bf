pub mod antisym;
pub mod cluster;
pub mod denominator;
pub mod excitations;

pub use cluster::{AmplitudeBlock, ClusterOperator};
pub use excitations::ExcitationList;

use std::error;
use std::fmt;

/// Structural misuse of the operator containers. All variants are fatal
/// precondition violations, never worked around.
#[derive(Debug, PartialEq)]
pub enum OperatorError {
    /// A flattened vector did not match the expected total dimension.
    LengthMismatch { expected: usize, got: usize },
    /// P-space extension or truncation was requested on a dense block.
    DenseBlock(&'static str),
    /// Spin-flip copying requires mirrored excitation lists of equal size.
    PspaceMismatch {
        left: &'static str,
        right: &'static str,
        nleft: usize,
        nright: usize,
    },
    /// An excitation list violates the canonical index ordering.
    NonCanonical(&'static str),
}

impl fmt::Display for OperatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorError::LengthMismatch { expected, got } => write!(
                f,
                "flattened vector has length {} but the operator expects {}",
                got, expected
            ),
            OperatorError::DenseBlock(label) => write!(
                f,
                "spin case {} is stored dense and cannot be resized",
                label
            ),
            OperatorError::PspaceMismatch {
                left,
                right,
                nleft,
                nright,
            } => write!(
                f,
                "spin cases {} ({} excitations) and {} ({} excitations) must be mirror images",
                left, nleft, right, nright
            ),
            OperatorError::NonCanonical(label) => write!(
                f,
                "excitation list for spin case {} is not in canonical order",
                label
            ),
        }
    }
}

impl error::Error for OperatorError {}
