//! # Restyle Common
//!
//! Shared types for the restyle mutation-safety engine.
//!
//! This crate defines the vocabulary the runtime and engine crates speak:
//! node and style identifiers, catalog snapshots, audit and replacement
//! results, the failure taxonomy, and the [`DocumentHost`] boundary behind
//! which the external document lives.
//!
//! The engine never owns document content. Everything in here is either an
//! opaque identifier or a read-only snapshot captured at a well-defined
//! point in time.

mod error;
mod host;
mod types;

pub use error::{EngineError, EngineResult, HostError};
pub use host::{DocumentHost, DocumentInfo, NodePage, PageRequest};
pub use types::{
    AuditResult, ChangeNotification, ChangeOrigin, CheckpointRecord, ContentNodeRef, EngineKind,
    NodeFailure, NodeId, ReplacementResult, StyleDefinition, StyleId, StyleRef,
};
