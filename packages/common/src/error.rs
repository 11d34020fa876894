//! Error types shared across the engine.
//!
//! Two layers: [`HostError`] is what the external document API raises, in a
//! shape the classifier can categorize. [`EngineError`] is what the engines
//! surface to callers.

use thiserror::Error;

use crate::types::{EngineKind, NodeId};

/// Failure raised by the external document API.
///
/// Typed variants cover the signatures the classifier keys on; anything the
/// host cannot express lands in `Other` and is classified by message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("Host call timed out")]
    Timeout,

    #[error("Connection to host lost")]
    ConnectionReset,

    #[error("Host rate limit exceeded")]
    RateLimited,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Failure scoped to a single node inside an otherwise-successful batch.
    #[error("Node {id} failed: {reason}")]
    Node { id: NodeId, reason: String },

    #[error("Host error: {0}")]
    Other(String),
}

/// Failure surface of the audit and replacement engines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Pre-flight argument problem. Never retried, zero side effects.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A run of the same engine kind is already in flight.
    #[error("{0} engine is busy")]
    Busy(EngineKind),

    /// The host rejected the snapshot request. No mutation was attempted.
    #[error("Checkpoint creation failed: {0}")]
    Checkpoint(String),

    /// A persistent failure aborted the run after mutation began. Already
    /// applied changes are left in place; the checkpoint title is the
    /// recovery handle.
    #[error("Run aborted: {reason}")]
    Aborted {
        reason: String,
        checkpoint_title: Option<String>,
    },

    /// The run was cancelled at a page/chunk boundary.
    #[error("Operation cancelled")]
    Cancelled,

    /// A state transition outside the static table was attempted.
    #[error("Illegal state transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("Internal engine failure: {0}")]
    Internal(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_error_names_engine() {
        let err = EngineError::Busy(EngineKind::Audit);
        assert_eq!(err.to_string(), "audit engine is busy");
    }

    #[test]
    fn test_host_error_converts() {
        let err: EngineError = HostError::Timeout.into();
        assert_eq!(err, EngineError::Host(HostError::Timeout));
    }

    #[test]
    fn test_aborted_carries_checkpoint() {
        let err = EngineError::Aborted {
            reason: "permission denied".to_string(),
            checkpoint_title: Some("Bulk restyle - now".to_string()),
        };
        match err {
            EngineError::Aborted {
                checkpoint_title, ..
            } => assert!(checkpoint_title.is_some()),
            _ => panic!("expected Aborted"),
        }
    }
}
