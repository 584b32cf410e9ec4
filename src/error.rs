//! Error taxonomy for the trip solver.

use thiserror::Error as ThisError;

/// Errors surfaced by the solver and its hosting-layer helpers.
#[derive(Debug, ThisError)]
pub enum TripError {
    /// Malformed or insufficient points, or options referring to unknown points.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Every point sits on the same coordinates. The solver turns this into a
    /// zero-cost trip; it only escapes from `build_matrix` when called directly.
    #[error("degenerate input: all points are coincident")]
    DegenerateInput,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TripError>;

impl TripError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// True for errors caused by the caller's data rather than the environment.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::DegenerateInput)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_message_is_prefixed() {
        let err = TripError::invalid_input("need at least 2 points");
        assert_eq!(err.to_string(), "invalid input: need at least 2 points");
        assert!(err.is_user_error());
    }

    #[test]
    fn test_io_errors_are_not_user_errors() {
        let err: TripError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(!err.is_user_error());
    }
}
