//! # Restyle Engine
//!
//! The mutation-safety engines of the restyle document-governance tool.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ audit: scan document → AuditResult          │
//! │  idle → validating → scanning → processing  │
//! │       → complete | error | cancelled        │
//! └─────────────────────────────────────────────┘
//!                     ↓ (selection happens in the UI)
//! ┌─────────────────────────────────────────────┐
//! │ replace: checkpointed bulk rebind           │
//! │  idle → validating → creating_checkpoint    │
//! │       → processing → complete | error       │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ watcher: external edits invalidate the      │
//! │ audit, forcing a re-audit                   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Checkpoint before mutation**: no snapshot, no writes, ever
//! 2. **All-or-nothing audit**: no partial inventory is ever published
//! 3. **No automatic repair**: an aborted run leaves applied changes in
//!    place and surfaces the checkpoint title for user-driven rollback
//! 4. **One run per engine**: concurrent starts are rejected, not queued
//!
//! ## Usage
//!
//! ```rust,ignore
//! use restyle_engine::{AuditOptions, Governor, ReplaceOptions};
//!
//! let governor = Governor::new(host);
//!
//! let handle = governor.start_audit(AuditOptions::default())?;
//! let audit = handle.wait().await?;
//!
//! let ids = audit.nodes_bound_to(&source.id);
//! let handle = governor.replace(source, target, ids, ReplaceOptions::default())?;
//! let result = handle.wait().await?;
//! assert!(audit.is_invalidated());
//! ```

mod audit;
mod events;
mod governor;
mod replace;
mod state;
mod watcher;

pub use audit::{AuditEngine, AuditHandle, AuditOptions, AuditStore};
pub use events::{AuditPhase, AuditProgress, OperationHandle};
pub use governor::Governor;
pub use replace::{ReplaceHandle, ReplaceOptions, ReplacementEngine};
pub use state::{AuditState, EngineState, OpGuard, OpPermit, ReplaceState, StateCell};
pub use watcher::ChangeWatcher;

// Re-export the pieces callers need without depending on the lower crates.
pub use restyle_common::{
    AuditResult, ChangeNotification, ChangeOrigin, DocumentHost, EngineError, EngineKind,
    NodeFailure, NodeId, ReplacementResult, StyleRef,
};
pub use restyle_runtime::BatchProgress;
