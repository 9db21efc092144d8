//! Error types.
//!
//! Lowering failures are always structural: the step tree either violates a
//! precondition of a lowering rule ([`LoweringError::InvalidStructure`]) or
//! uses a construct that is recognized but cannot be lowered
//! ([`LoweringError::Unsupported`]). Both abort compilation of the whole
//! query; lowering is deterministic, so nothing is retried.

use thiserror::Error;

/// Result type used throughout Graphir.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A step could not be lowered.
    #[error(transparent)]
    Lowering(#[from] LoweringError),

    /// An engine result record could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// An operator program could not be encoded for the engine.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Error raised by a lowering rule.
///
/// `step` identifies the offending step as `<kind>@<position>`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoweringError {
    /// The step or predicate tree violates a structural precondition.
    #[error("invalid structure at {step}: {message}")]
    InvalidStructure {
        /// Offending step.
        step: String,
        /// Violated rule.
        message: String,
    },

    /// The construct is recognized but intentionally not lowerable.
    #[error("unsupported at {step}: {message}")]
    Unsupported {
        /// Offending step.
        step: String,
        /// Unsupported construct.
        message: String,
    },
}

impl LoweringError {
    /// Creates an [`LoweringError::InvalidStructure`] error.
    pub fn invalid(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Creates an [`LoweringError::Unsupported`] error.
    pub fn unsupported(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unsupported {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Returns the offending step reference.
    #[must_use]
    pub fn step(&self) -> &str {
        match self {
            Self::InvalidStructure { step, .. } | Self::Unsupported { step, .. } => step,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_step_and_rule() {
        let err: Error = LoweringError::invalid("order@2", "by() must yield one expression").into();
        assert_eq!(
            err.to_string(),
            "invalid structure at order@2: by() must yield one expression"
        );

        let err = LoweringError::unsupported("group@1", "segment apply is unsupported");
        assert_eq!(err.step(), "group@1");
        assert!(err.to_string().starts_with("unsupported at group@1"));
    }
}
