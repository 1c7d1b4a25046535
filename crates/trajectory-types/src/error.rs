// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Trajectory Kernel Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all Trajectory Kernel failures.
///
/// Numerically degenerate but shape-valid input never produces an error:
/// zero vectors, degenerate distributions, non-positive temperatures and
/// out-of-range mixing weights are clamped or substituted instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrajectoryError {
    /// Input shape violation: wrong tensor rank, empty layer set,
    /// unknown pooling mode, or operands that disagree in shape.
    #[error("shape error: {0}")]
    Shape(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// No tracker is registered under this sequence id.
    #[error("unknown sequence: {0}")]
    UnknownSequence(u64),
}

impl TrajectoryError {
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }
}

pub type TrajectoryResult<T> = Result<T, TrajectoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_shape() {
        let err = TrajectoryError::shape("expected rank 3, got rank 2");
        assert_eq!(err.to_string(), "shape error: expected rank 3, got rank 2");
    }

    #[test]
    fn test_display_unknown_sequence() {
        assert_eq!(
            TrajectoryError::UnknownSequence(7).to_string(),
            "unknown sequence: 7"
        );
    }
}
