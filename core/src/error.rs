/// Error type for the spatial IRNN scan.
///
/// Every failure is a precondition violation detected before any buffer is
/// written. Nothing here is retryable: the same inputs fail the same way.

use thiserror::Error;

use crate::axis::Direction;

#[derive(Debug, Error)]
pub enum ScanError {
    /// Dimension mismatch between input, output, gradient or weight buffers.
    #[error("shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    Shape {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Feature tensors are always 4-axis.
    #[error("expected a {expected}-axis tensor, got {actual} axes")]
    Rank { expected: usize, actual: usize },

    /// Forward or backward called before the weight matrix exists.
    #[error("weight matrix has not been initialized; call setup() or load weights first")]
    UninitializedWeight,

    /// Activations produced by a layer scanning in another direction.
    #[error("activations were produced by a {actual:?} scan, layer scans {expected:?}")]
    DirectionMismatch { expected: Direction, actual: Direction },

    #[error("unknown layer type {0:?}; expected RNNDOWN, RNNUP, RNNLEFT or RNNRIGHT")]
    UnknownLayerType(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScanError {
    /// Shorthand for a [`ScanError::Shape`] built from two shape slices.
    pub fn shape(what: &'static str, expected: &[usize], actual: &[usize]) -> Self {
        ScanError::Shape {
            what,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// True for every dimension-related failure (`Shape` and `Rank`).
    pub fn is_shape_error(&self) -> bool {
        matches!(self, ScanError::Shape { .. } | ScanError::Rank { .. })
    }
}

pub type ScanResult<T> = Result<T, ScanError>;
