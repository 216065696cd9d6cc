//! Error types for the oscillator core.
//!
//! Construction-time failures are fatal; `advance` and the mutation
//! operations never fail.

use std::error::Error;
use std::fmt;

/// Errors raised while building the model or touching its file resources.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelError {
    /// Grid dimensions must both be positive.
    InvalidDimensions { columns: usize, rows: usize },
    /// A grid loaded from outside does not match `columns x rows`.
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
    /// Tissue data contains a malformed row or a non-numeric field.
    Format { line: u64, reason: String },
    /// A resource could not be read or written.
    Io { path: String, reason: String },
    /// Settings key is absent from the settings resource.
    SettingNotFound { key: String },
    /// Settings keys are exactly two characters.
    InvalidSettingKey { key: String },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDimensions { columns, rows } => {
                write!(f, "grid dimensions must be positive, got {columns}x{rows}")
            }
            Self::ShapeMismatch { expected, found } => write!(
                f,
                "tissue grid is {}x{}, expected {}x{}",
                found.0, found.1, expected.0, expected.1
            ),
            Self::Format { line, reason } => write!(f, "tissue data line {line}: {reason}"),
            Self::Io { path, reason } => write!(f, "cannot access '{path}': {reason}"),
            Self::SettingNotFound { key } => write!(f, "setting '{key}' not found"),
            Self::InvalidSettingKey { key } => {
                write!(f, "setting key '{key}' must be exactly two characters")
            }
        }
    }
}

impl Error for ModelError {}
