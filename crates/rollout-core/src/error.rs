//! Error types for the plan lifecycle engine.
//!
//! The engine distinguishes three failure classes (see the variant docs):
//! fatal errors terminate the enclosing plan permanently, transient errors
//! defer retry to the next reconciliation pass, and validation errors reject
//! an instance update before it is ever persisted. Classification is a
//! property of the variant itself, inspected through [`EngineError::is_fatal`]
//! rather than string or sentinel matching.

use thiserror::Error;

/// Comprehensive error type for all engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Structural failure (bad template, broken task config, missing
    /// definition). Never retried; forces the enclosing plan, phase and step
    /// into `FatalError`.
    #[error("fatal error: {0}")]
    Fatal(String),

    /// Environmental failure (resource not yet applied, store unavailable).
    /// Retried on the next externally-triggered reconciliation pass.
    #[error("transient error: {0}")]
    Transient(String),

    /// The status tree does not contain an entry matching the plan shape.
    /// This indicates a corrupted instance status and is not recoverable.
    #[error("no status entry for {level} \"{name}\" in plan status")]
    MissingStatus {
        level: &'static str,
        name: String,
    },

    /// A step referenced a task name the operator version does not define.
    #[error("task \"{name}\" is not defined by the operator version")]
    MissingTask { name: String },

    /// A task specification carried a kind outside the closed built-in set.
    #[error("unknown kind \"{kind}\" for task \"{name}\"")]
    UnknownTaskKind { name: String, kind: String },

    /// An instance update was rejected at admission time; the proposed spec
    /// never reaches the reconciler.
    #[error("rejected instance update: {0}")]
    Validation(String),

    /// Serialization/deserialization errors (spec snapshots, task configs)
    #[error("serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl EngineError {
    /// Creates a fatal (non-retryable) error.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    /// Creates a transient (retryable) error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Creates an admission validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error must never be retried.
    ///
    /// Everything except [`EngineError::Transient`] is terminal: structural
    /// problems do not fix themselves across reconciliation passes.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Transient(_))
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_follows_variant() {
        assert!(EngineError::fatal("bad template").is_fatal());
        assert!(!EngineError::transient("not ready").is_fatal());
        assert!(EngineError::validation("plan override").is_fatal());
        assert!(EngineError::MissingTask {
            name: "deploy".to_string()
        }
        .is_fatal());
    }

    #[test]
    fn display_includes_context() {
        let err = EngineError::UnknownTaskKind {
            name: "main".to_string(),
            kind: "Exotic".to_string(),
        };
        assert_eq!(err.to_string(), "unknown kind \"Exotic\" for task \"main\"");
    }
}
