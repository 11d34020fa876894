//! # State Machines and Single-Flight Guards
//!
//! Both engines are tagged-variant state machines with statically defined
//! transition tables: illegal transitions fail loudly instead of
//! manifesting as silent runtime inconsistency. Terminal states return to
//! `Idle` before the run's permit is released.
//!
//! The single-in-flight invariant is an explicit acquired/released token
//! ([`OpGuard`] / [`OpPermit`]), not an ambient boolean, so it is
//! enforceable and independently testable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::mpsc;

use restyle_common::{EngineError, EngineKind};

/// Behavior a state enum must provide to live in a [`StateCell`].
pub trait EngineState: Copy + PartialEq + std::fmt::Debug + Send + 'static {
    fn can_transition(self, next: Self) -> bool;
    fn name(self) -> &'static str;
}

/// States of the audit engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditState {
    Idle,
    Validating,
    Scanning,
    Processing,
    Complete,
    Error,
    Cancelled,
}

impl EngineState for AuditState {
    fn can_transition(self, next: Self) -> bool {
        use AuditState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Scanning)
                | (Validating, Error)
                | (Scanning, Processing)
                | (Scanning, Error)
                | (Scanning, Cancelled)
                | (Processing, Complete)
                | (Processing, Error)
                | (Processing, Cancelled)
                | (Complete, Idle)
                | (Error, Idle)
                | (Cancelled, Idle)
        )
    }

    fn name(self) -> &'static str {
        match self {
            AuditState::Idle => "idle",
            AuditState::Validating => "validating",
            AuditState::Scanning => "scanning",
            AuditState::Processing => "processing",
            AuditState::Complete => "complete",
            AuditState::Error => "error",
            AuditState::Cancelled => "cancelled",
        }
    }
}

/// States of the replacement engine. No `Cancelled` state exists: once
/// `CreatingCheckpoint` is entered the run always finishes with `Complete`
/// or `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplaceState {
    Idle,
    Validating,
    CreatingCheckpoint,
    Processing,
    Complete,
    Error,
}

impl EngineState for ReplaceState {
    fn can_transition(self, next: Self) -> bool {
        use ReplaceState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, CreatingCheckpoint)
                | (Validating, Error)
                | (CreatingCheckpoint, Processing)
                | (CreatingCheckpoint, Error)
                | (Processing, Complete)
                | (Processing, Error)
                | (Complete, Idle)
                | (Error, Idle)
        )
    }

    fn name(self) -> &'static str {
        match self {
            ReplaceState::Idle => "idle",
            ReplaceState::Validating => "validating",
            ReplaceState::CreatingCheckpoint => "creating_checkpoint",
            ReplaceState::Processing => "processing",
            ReplaceState::Complete => "complete",
            ReplaceState::Error => "error",
        }
    }
}

/// Holds the current state, enforces the transition table, and fans every
/// accepted transition out to subscribed state-change channels.
pub struct StateCell<S: EngineState> {
    current: Mutex<S>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<S>>>,
}

impl<S: EngineState> StateCell<S> {
    pub fn new(initial: S) -> Self {
        Self {
            current: Mutex::new(initial),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn get(&self) -> S {
        *self.current.lock().unwrap()
    }

    /// Register a state-change channel. Must happen before the operation
    /// starts; transitions are never replayed.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<S> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.lock().unwrap().push(tx);
        rx
    }

    /// Move to `next`, rejecting anything outside the transition table.
    pub fn transition(&self, next: S) -> Result<(), EngineError> {
        let mut current = self.current.lock().unwrap();
        if !current.can_transition(next) {
            return Err(EngineError::IllegalTransition {
                from: current.name().to_string(),
                to: next.name().to_string(),
            });
        }

        tracing::debug!(from = current.name(), to = next.name(), "state transition");
        *current = next;

        // Drop listeners whose receivers are gone.
        self.listeners
            .lock()
            .unwrap()
            .retain(|tx| tx.send(next).is_ok());

        Ok(())
    }
}

/// Mutual-exclusion guard for one engine kind.
///
/// `try_acquire` is synchronous: a second concurrent call is rejected with
/// `BusyError` rather than queued.
#[derive(Clone)]
pub struct OpGuard {
    kind: EngineKind,
    flag: Arc<AtomicBool>,
}

impl OpGuard {
    pub fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Take the in-flight token, or fail with `Busy` if a run holds it.
    pub fn try_acquire(&self) -> Result<OpPermit, EngineError> {
        self.flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| EngineError::Busy(self.kind))?;

        Ok(OpPermit {
            flag: self.flag.clone(),
        })
    }
}

/// The in-flight token. Releasing is automatic at any terminal state: the
/// run holds the permit for its whole lifetime and drops it on exit.
#[derive(Debug)]
pub struct OpPermit {
    flag: Arc<AtomicBool>,
}

impl Drop for OpPermit {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_happy_path_transitions() {
        let cell = StateCell::new(AuditState::Idle);
        for next in [
            AuditState::Validating,
            AuditState::Scanning,
            AuditState::Processing,
            AuditState::Complete,
            AuditState::Idle,
        ] {
            cell.transition(next).unwrap();
        }
        assert_eq!(cell.get(), AuditState::Idle);
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let cell = StateCell::new(AuditState::Idle);
        let err = cell.transition(AuditState::Processing).unwrap_err();
        assert_eq!(
            err,
            EngineError::IllegalTransition {
                from: "idle".to_string(),
                to: "processing".to_string(),
            }
        );
        // State unchanged on rejection.
        assert_eq!(cell.get(), AuditState::Idle);
    }

    #[test]
    fn test_replace_processing_only_completes_or_errors() {
        use ReplaceState::*;
        for next in [Idle, Validating, CreatingCheckpoint, Processing] {
            assert!(!Processing.can_transition(next));
        }
        assert!(Processing.can_transition(Complete));
        assert!(Processing.can_transition(Error));
    }

    #[test]
    fn test_validating_can_error_without_scanning() {
        assert!(AuditState::Validating.can_transition(AuditState::Error));
        assert!(!AuditState::Validating.can_transition(AuditState::Processing));
    }

    #[test]
    fn test_state_cell_notifies_subscribers_in_order() {
        let cell = StateCell::new(AuditState::Idle);
        let mut rx = cell.subscribe();

        cell.transition(AuditState::Validating).unwrap();
        cell.transition(AuditState::Scanning).unwrap();

        assert_eq!(rx.try_recv().unwrap(), AuditState::Validating);
        assert_eq!(rx.try_recv().unwrap(), AuditState::Scanning);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_guard_rejects_second_acquire() {
        let guard = OpGuard::new(EngineKind::Audit);
        assert!(!guard.is_busy());

        let permit = guard.try_acquire().unwrap();
        assert!(guard.is_busy());
        assert_eq!(
            guard.try_acquire().unwrap_err(),
            EngineError::Busy(EngineKind::Audit)
        );

        drop(permit);
        assert!(!guard.is_busy());
        assert!(guard.try_acquire().is_ok());
    }
}
