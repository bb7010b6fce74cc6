// Typed errors with thiserror. Fatal input problems are errors; per-item
// migration problems are warnings carried in MigrationResult instead.

use thiserror::Error;

/// Rectangle construction errors. Raised where the rectangle is built, never clamped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Rectangle must have positive size, got {width}x{height}")]
    NonPositiveSize { width: f64, height: f64 },

    #[error("Rectangle origin must be non-negative, got ({x}, {y})")]
    NegativeOrigin { x: f64, y: f64 },

    #[error("Rectangle components must be finite")]
    NonFinite,

    #[error("Breakpoint scale factor must be in (0, 1], got {0}")]
    InvalidScale(f64),
}

/// Engine error types.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid project: {0}")]
    InvalidProject(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
