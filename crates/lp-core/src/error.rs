//! Error taxonomy for chart creation and live binding

use thiserror::Error;

/// Errors that can occur while creating or running a chart binding.
///
/// `UnknownColumn`, `TypeMismatch` and `InvalidRequest` are
/// creation-time and fail the chart before any subscription exists.
/// The remaining kinds occur while live and transition the instance to
/// `Failed`, surfaced once via the renderer sink.
#[derive(Error, Debug)]
pub enum ChartError {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("column '{column}' of type {actual} cannot fill the {role} role")]
    TypeMismatch {
        column: String,
        role: &'static str,
        actual: String,
    },

    #[error("invalid chart request: {0}")]
    InvalidRequest(String),

    #[error("value {value} is outside the histogram range [{min}, {max})")]
    BinRangeExceeded { value: f64, min: f64, max: f64 },

    #[error("schema incompatible with resolved columns: {0}")]
    SchemaIncompatible(String),

    #[error("inconsistent delta from source table: {0}")]
    InconsistentDelta(String),
}

impl ChartError {
    /// Coarse classification reported through the renderer sink.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChartError::UnknownColumn(_) => ErrorKind::UnknownColumn,
            ChartError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            ChartError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ChartError::BinRangeExceeded { .. } => ErrorKind::BinRangeExceeded,
            ChartError::SchemaIncompatible(_) => ErrorKind::SchemaIncompatible,
            ChartError::InconsistentDelta(_) => ErrorKind::InconsistentDelta,
        }
    }
}

/// Error classification carried by `FigureSink::on_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnknownColumn,
    TypeMismatch,
    InvalidRequest,
    BinRangeExceeded,
    SchemaIncompatible,
    InconsistentDelta,
}
