//! # Core Data Model
//!
//! Identifier newtypes and the snapshot types the engines produce.
//!
//! ## Ownership rules
//!
//! - Nodes belong to the external document; the engine only ever holds
//!   [`NodeId`]s and per-node snapshots ([`ContentNodeRef`]).
//! - An [`AuditResult`] is immutable once published. It is replaced
//!   wholesale on re-audit, never patched in place. The only mutable bit is
//!   the shared `invalidated` flag, which marks the whole result stale.
//! - A [`ReplacementResult`] is produced exactly once per run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of a content node in the external document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a style or token definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleId(pub String);

impl StyleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StyleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How callers address a definition when requesting a replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleRef {
    pub id: StyleId,
    pub name: String,
}

impl StyleRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: StyleId::new(id),
            name: name.into(),
        }
    }
}

/// Snapshot of one content node captured at audit time.
///
/// The node itself stays in the external document; this records only the
/// identifier, the current binding, and the flags that affect whether the
/// node can be rebound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentNodeRef {
    pub id: NodeId,
    /// Definition the node is currently bound to, if any.
    pub binding: Option<StyleId>,
    pub locked: bool,
    pub hidden: bool,
}

/// Read-only snapshot of a named style/token definition from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleDefinition {
    pub id: StyleId,
    pub name: String,
    /// Hierarchical path, e.g. `"Colors/Brand/Primary"`.
    pub path: String,
    /// Source library or document the definition comes from.
    pub source: String,
    /// Usage count as reported by the catalog at snapshot time.
    pub usage_count: usize,
}

/// Which of the two engines an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Audit,
    Replace,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Audit => f.write_str("audit"),
            EngineKind::Replace => f.write_str("replace"),
        }
    }
}

/// Complete inventory produced by one audit run.
///
/// All-or-nothing: either the run completes and the full result is
/// published, or nothing is. A separate change watcher may flip the
/// `invalidated` flag after publication; the data itself never changes.
#[derive(Debug, Clone, Serialize)]
pub struct AuditResult {
    pub taken_at: DateTime<Utc>,
    /// Total matching nodes reported by the document at audit time.
    pub total_nodes: usize,
    /// Catalog snapshot of every known definition.
    pub definitions: Vec<StyleDefinition>,
    /// Per-node categorization, in traversal order.
    pub nodes: Vec<ContentNodeRef>,
    #[serde(skip)]
    invalidated: Arc<AtomicBool>,
}

impl AuditResult {
    pub fn new(
        total_nodes: usize,
        definitions: Vec<StyleDefinition>,
        nodes: Vec<ContentNodeRef>,
    ) -> Self {
        Self {
            taken_at: Utc::now(),
            total_nodes,
            definitions,
            nodes,
            invalidated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the result has been flagged stale by an external change.
    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }

    /// Flag the result stale. Irreversible; a fresh audit is required.
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::Release);
    }

    /// Ids of every audited node currently bound to `style`.
    pub fn nodes_bound_to(&self, style: &StyleId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.binding.as_ref() == Some(style))
            .map(|n| n.id.clone())
            .collect()
    }

    /// Usage count of `style` as observed across audited nodes.
    pub fn observed_usage(&self, style: &StyleId) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.binding.as_ref() == Some(style))
            .count()
    }
}

/// One node that could not be updated, with the host-reported reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeFailure {
    pub node_id: NodeId,
    pub reason: String,
}

/// Record of the snapshot created before a replacement run.
///
/// Referenced afterward only for display and rollback guidance. Restoration
/// is user-driven outside this engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Summary of one completed replacement run. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplacementResult {
    pub updated_count: usize,
    pub failed_nodes: Vec<NodeFailure>,
    pub checkpoint_title: String,
    pub duration: Duration,
    /// True when the run completed but some nodes could not be updated.
    pub has_warnings: bool,
}

/// Who caused a document mutation the host is notifying us about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOrigin {
    /// Someone or something other than this engine edited the document.
    External,
    /// This engine's own in-flight replacement run. Ignored by the watcher
    /// to avoid self-invalidation loops.
    Engine,
}

/// Notification of a document mutation, tagged with its origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub origin: ChangeOrigin,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, binding: Option<&str>) -> ContentNodeRef {
        ContentNodeRef {
            id: NodeId::new(id),
            binding: binding.map(StyleId::new),
            locked: false,
            hidden: false,
        }
    }

    #[test]
    fn test_audit_result_starts_valid() {
        let result = AuditResult::new(0, vec![], vec![]);
        assert!(!result.is_invalidated());
    }

    #[test]
    fn test_invalidation_is_shared_across_clones() {
        let result = AuditResult::new(0, vec![], vec![]);
        let clone = result.clone();

        result.invalidate();

        assert!(clone.is_invalidated());
    }

    #[test]
    fn test_nodes_bound_to_filters_by_binding() {
        let result = AuditResult::new(
            3,
            vec![],
            vec![
                node("n1", Some("style-a")),
                node("n2", Some("style-b")),
                node("n3", Some("style-a")),
            ],
        );

        let bound = result.nodes_bound_to(&StyleId::new("style-a"));
        assert_eq!(bound, vec![NodeId::new("n1"), NodeId::new("n3")]);
        assert_eq!(result.observed_usage(&StyleId::new("style-a")), 2);
        assert_eq!(result.observed_usage(&StyleId::new("style-c")), 0);
    }

    #[test]
    fn test_replacement_result_serialization() {
        let result = ReplacementResult {
            updated_count: 8,
            failed_nodes: vec![NodeFailure {
                node_id: NodeId::new("n9"),
                reason: "locked".to_string(),
            }],
            checkpoint_title: "Bulk restyle - 2026-01-01 00:00:00 UTC".to_string(),
            duration: Duration::from_secs(2),
            has_warnings: true,
        };

        let json = serde_json::to_string(&result).unwrap();
        let deserialized: ReplacementResult = serde_json::from_str(&json).unwrap();

        assert_eq!(result, deserialized);
    }
}
