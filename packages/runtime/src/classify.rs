//! # Failure Classification
//!
//! Maps a raised host failure into the four-way taxonomy that governs
//! retry, abort, or per-node-skip behavior.
//!
//! `Validation` never comes out of [`classify`]: pre-flight argument
//! problems are caught by the engines before any state transition and
//! raised directly as `EngineError::Validation`.

use restyle_common::HostError;

/// The four-way classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Worth retrying with backoff: timeouts, dropped connections, rate
    /// limits.
    Transient,
    /// Retrying will not help: permissions, missing targets, bad
    /// references. Also the fail-safe default for anything unclassifiable.
    Persistent,
    /// Pre-flight argument problem. Checked before any state transition,
    /// never retried.
    Validation,
    /// Scoped to one node inside an otherwise-successful batch. The node is
    /// marked failed and the batch continues.
    Partial,
}

/// Classify a host failure.
///
/// Unclassifiable failures default to `Persistent` so nothing is silently
/// retried forever.
pub fn classify(error: &HostError) -> FailureClass {
    match error {
        HostError::Timeout | HostError::ConnectionReset | HostError::RateLimited => {
            FailureClass::Transient
        }
        HostError::PermissionDenied(_)
        | HostError::NotFound(_)
        | HostError::InvalidReference(_) => FailureClass::Persistent,
        HostError::Node { .. } => FailureClass::Partial,
        HostError::Other(message) => classify_message(message),
    }
}

/// Signature-based fallback for failures the host could not type.
fn classify_message(message: &str) -> FailureClass {
    let lower = message.to_lowercase();

    let transient = ["timeout", "timed out", "connection", "rate limit", "429", "503"];
    if transient.iter().any(|sig| lower.contains(sig)) {
        return FailureClass::Transient;
    }

    FailureClass::Persistent
}
