//! Common error types.

use thiserror::Error;

/// Main error type for the compositing engine.
#[derive(Error, Debug)]
pub enum CompositeError {
    #[error("Render cancelled")]
    Cancelled,

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Unknown parameter: {0}")]
    UnknownParam(String),

    #[error("Type mismatch for parameter {param}: expected {expected}, found {found}")]
    TypeMismatch {
        param: String,
        expected: String,
        found: String,
    },

    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Layer does not belong to this canvas: {0}")]
    NotInCanvas(String),

    #[error("Layer has no linked \"{0}\" parameter")]
    MissingDynamicParam(String),

    #[error("Unknown layer type: {0}")]
    UnknownLayerType(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type CompositeResult<T> = Result<T, CompositeError>;

impl CompositeError {
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn unknown_param(name: impl Into<String>) -> Self {
        Self::UnknownParam(name.into())
    }

    pub fn type_mismatch(
        param: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            param: param.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn layer_not_found(msg: impl Into<String>) -> Self {
        Self::LayerNotFound(msg.into())
    }

    pub fn not_in_canvas(msg: impl Into<String>) -> Self {
        Self::NotInCanvas(msg.into())
    }

    pub fn missing_dynamic_param(name: impl Into<String>) -> Self {
        Self::MissingDynamicParam(name.into())
    }

    pub fn unknown_layer_type(name: impl Into<String>) -> Self {
        Self::UnknownLayerType(name.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error came from a progress callback asking to stop.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
