//! Error type for the user-facing failure class
//!
//! Contract violations inside the engine (multi-variant cells asked for a
//! single transformation, re-entered merge slots) are assertions, not
//! `GeoError`s. Only input problems a caller can fix end up here.

use thiserror::Error;

/// Unified error type for hierarchical geometry operations.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Grid checks and snapping need a non-negative grid.
    #[error("Grid size must not be negative (got {0})")]
    NegativeGrid(i64),
    /// A check distance or sizing value is out of range.
    #[error("Invalid distance: {0}")]
    InvalidDistance(String),
    /// A two-input operation was called without its second operand.
    #[error("Operation '{0}' requires a second input")]
    MissingOperand(String),
    /// Two operands live in layouts with different database units.
    #[error("Database unit mismatch: {0} vs. {1}")]
    DbuMismatch(f64, f64),
    /// The operation requires both operands to share one hierarchy.
    #[error("Operands do not share a common top cell: {0}")]
    LayoutMismatch(String),
    /// A cell index does not refer to a live cell.
    #[error("Invalid cell index {0}")]
    InvalidCellIndex(usize),
    /// A layer name could not be resolved.
    #[error("Unknown layer '{0}'")]
    UnknownLayer(String),
    /// A cell name could not be resolved.
    #[error("Unknown cell '{0}'")]
    UnknownCell(String),
    /// The instance graph is not a DAG.
    #[error("Recursive cell hierarchy detected at cell '{0}'")]
    CycleDetected(String),
    /// A layout document could not be decoded.
    #[error("Layout document error: {0}")]
    Document(#[from] serde_json::Error),
    /// File access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GeoResult<T> = Result<T, GeoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            GeoError::NegativeGrid(-5).to_string(),
            "Grid size must not be negative (got -5)"
        );
        assert!(GeoError::UnknownLayer("M1".into()).to_string().contains("M1"));
    }
}
