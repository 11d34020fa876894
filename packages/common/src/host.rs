//! # Document Host Boundary
//!
//! The external document lives behind [`DocumentHost`]. The engine consumes
//! this trait; it never implements it against a real transport here. Tests
//! implement it with an in-memory fake so every retry/backoff/size-adaptation
//! path can be driven deterministically.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::HostError;
use crate::types::{ChangeNotification, ContentNodeRef, NodeId, StyleDefinition, StyleRef};

/// Accessibility and size information used by audit validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// Whether the document can currently be read.
    pub accessible: bool,
    /// Total count of matching leaf nodes under the audit root.
    pub matching_nodes: usize,
}

/// One page of a paged node listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePage {
    pub nodes: Vec<NodeId>,
    /// Cursor for the next page, or `None` when traversal is complete.
    pub next: Option<u64>,
}

/// Request for one page of the node listing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Cursor from the previous page's `next`, or `None` for the first page.
    pub cursor: Option<u64>,
    pub limit: usize,
}

/// Capabilities the external document exposes to the engine.
///
/// All calls may fail with a classified [`HostError`]. A stalled call is the
/// host's problem to time out; it surfaces here as `HostError::Timeout` and
/// is handled by the surrounding retry policy.
#[async_trait]
pub trait DocumentHost: Send + Sync {
    /// Accessibility and matching-node count for pre-flight validation.
    async fn document_info(&self) -> Result<DocumentInfo, HostError>;

    /// List matching leaf nodes under the audit root, one page at a time.
    async fn list_nodes(&self, page: PageRequest) -> Result<NodePage, HostError>;

    /// Read a single node's current style/token binding and flags.
    async fn read_binding(&self, id: &NodeId) -> Result<ContentNodeRef, HostError>;

    /// Rebind a single node to `target`. Node-scoped failures come back as
    /// [`HostError::Node`] so the batch can continue past them.
    async fn write_binding(&self, id: &NodeId, target: &StyleRef) -> Result<(), HostError>;

    /// List all known style/token definitions with name, source and usage.
    async fn list_definitions(&self) -> Result<Vec<StyleDefinition>, HostError>;

    /// Create a named, restorable snapshot. There is no programmatic
    /// rollback; restoration is user-driven outside this engine.
    async fn create_checkpoint(&self, title: &str) -> Result<(), HostError>;

    /// Subscribe to document-mutation notifications. Each notification
    /// carries an origin tag distinguishing the engine's own writes from
    /// external edits.
    fn subscribe_changes(&self) -> mpsc::UnboundedReceiver<ChangeNotification>;
}
