//! # Governor Façade
//!
//! The single entry point UI and export collaborators talk to. Owns both
//! engines, the shared audit store, and the change watcher, wired to one
//! [`DocumentHost`].
//!
//! Progress and state-change receivers come from the returned handles and
//! must be taken before consuming events; nothing is buffered beyond the
//! channels and nothing is replayed.

use std::sync::Arc;

use restyle_common::{AuditResult, DocumentHost, EngineError, EngineKind, NodeId, StyleRef};
use restyle_runtime::RetryPolicy;

use crate::audit::{AuditEngine, AuditHandle, AuditOptions, AuditStore};
use crate::replace::{ReplaceHandle, ReplaceOptions, ReplacementEngine};
use crate::watcher::ChangeWatcher;

pub struct Governor {
    audit: AuditEngine,
    replacement: ReplacementEngine,
    watcher: ChangeWatcher,
    store: AuditStore,
}

impl Governor {
    /// Wire both engines and the change watcher to `host`.
    ///
    /// Must be called inside a tokio runtime; the watcher task starts
    /// immediately.
    pub fn new(host: Arc<dyn DocumentHost>) -> Self {
        let store = AuditStore::new();
        Self {
            audit: AuditEngine::new(host.clone(), store.clone()),
            replacement: ReplacementEngine::new(host.clone(), store.clone()),
            watcher: ChangeWatcher::spawn(&host, store.clone()),
            store,
        }
    }

    /// Same wiring with a caller-supplied retry policy for both engines.
    pub fn with_retry(host: Arc<dyn DocumentHost>, retry: RetryPolicy) -> Self {
        let store = AuditStore::new();
        Self {
            audit: AuditEngine::new(host.clone(), store.clone()).with_retry(retry.clone()),
            replacement: ReplacementEngine::new(host.clone(), store.clone()).with_retry(retry),
            watcher: ChangeWatcher::spawn(&host, store.clone()),
            store,
        }
    }

    /// Start an audit run. Synchronous `Busy` rejection while one is in
    /// flight.
    pub fn start_audit(&self, options: AuditOptions) -> Result<AuditHandle, EngineError> {
        self.audit.start(options)
    }

    /// Request cooperative cancellation of the in-flight audit, if any.
    pub fn cancel_audit(&self) {
        self.audit.cancel();
    }

    /// Start a replacement run. Synchronous `Busy` rejection while one is
    /// in flight.
    pub fn replace(
        &self,
        source: StyleRef,
        target: StyleRef,
        node_ids: Vec<NodeId>,
        options: ReplaceOptions,
    ) -> Result<ReplaceHandle, EngineError> {
        self.replacement.replace(source, target, node_ids, options)
    }

    pub fn is_busy(&self, kind: EngineKind) -> bool {
        match kind {
            EngineKind::Audit => self.audit.is_busy(),
            EngineKind::Replace => self.replacement.is_busy(),
        }
    }

    /// The most recently published audit result, if any.
    pub fn current_audit(&self) -> Option<Arc<AuditResult>> {
        self.store.current()
    }

    /// Whether the current audit result (if any) has gone stale.
    pub fn invalidated(&self) -> bool {
        self.store.is_invalidated()
    }

    /// Stop the change watcher. Engines stay usable; staleness tracking
    /// ends.
    pub fn dispose(&mut self) {
        self.watcher.dispose();
    }
}
