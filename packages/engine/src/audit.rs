//! # Audit Engine
//!
//! Seven-state machine that scans the document and builds the style/token
//! inventory: `idle → validating → scanning → processing → {complete |
//! error | cancelled}`, every terminal returning to `idle`.
//!
//! Publication is all-or-nothing. Any unrecoverable failure in scanning or
//! processing discards all partial data; no partial result is ever
//! surfaced. Cancellation is cooperative and observed only at page and
//! chunk boundaries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use restyle_common::{
    AuditResult, ContentNodeRef, DocumentHost, EngineError, EngineKind, NodeId, PageRequest,
};
use restyle_runtime::RetryPolicy;

use crate::events::{AuditPhase, AuditProgress, OperationHandle};
use crate::state::{AuditState, OpGuard, OpPermit, StateCell};

/// Handle to one in-flight audit run.
pub type AuditHandle = OperationHandle<AuditProgress, AuditState, Arc<AuditResult>>;

/// Tunables for one audit run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditOptions {
    /// Nodes requested per scan page.
    pub page_size: usize,
    /// Nodes per metadata-extraction chunk.
    pub chunk_size: usize,
    /// Node count above which the run logs a warning and continues.
    pub warn_threshold: usize,
    /// Node count above which validation fails outright.
    pub hard_limit: usize,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            page_size: 500,
            chunk_size: 50,
            warn_threshold: 5_000,
            hard_limit: 50_000,
        }
    }
}

/// The single process-wide audit result plus its staleness flag.
///
/// Shared by the audit engine (publishes), the replacement engine
/// (invalidates after mutation), and the change watcher (invalidates on
/// external edits).
#[derive(Clone, Default)]
pub struct AuditStore {
    current: Arc<Mutex<Option<Arc<AuditResult>>>>,
    invalidated: Arc<AtomicBool>,
}

impl AuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored result wholesale and clear staleness.
    pub fn publish(&self, result: Arc<AuditResult>) {
        *self.current.lock().unwrap() = Some(result);
        self.invalidated.store(false, Ordering::Release);
    }

    pub fn current(&self) -> Option<Arc<AuditResult>> {
        self.current.lock().unwrap().clone()
    }

    /// Flag the current result stale. Does not reactivate any state
    /// machine; a fresh audit is required to produce a new result.
    pub fn invalidate(&self) {
        if let Some(result) = self.current.lock().unwrap().as_ref() {
            result.invalidate();
        }
        self.invalidated.store(true, Ordering::Release);
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }
}

pub struct AuditEngine {
    host: Arc<dyn DocumentHost>,
    state: Arc<StateCell<AuditState>>,
    guard: OpGuard,
    cancel: Arc<AtomicBool>,
    retry: RetryPolicy,
    store: AuditStore,
}

impl AuditEngine {
    pub fn new(host: Arc<dyn DocumentHost>, store: AuditStore) -> Self {
        Self {
            host,
            state: Arc::new(StateCell::new(AuditState::Idle)),
            guard: OpGuard::new(EngineKind::Audit),
            cancel: Arc::new(AtomicBool::new(false)),
            retry: RetryPolicy::default(),
            store,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn state(&self) -> AuditState {
        self.state.get()
    }

    pub fn is_busy(&self) -> bool {
        self.guard.is_busy()
    }

    /// Begin an audit run.
    ///
    /// Rejected synchronously with `Busy` while another run is in flight;
    /// rejection has zero side effects.
    pub fn start(&self, options: AuditOptions) -> Result<AuditHandle, EngineError> {
        let permit = self.guard.try_acquire()?;
        self.cancel.store(false, Ordering::Release);

        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let states_rx = self.state.subscribe();

        let host = self.host.clone();
        let state = self.state.clone();
        let cancel = self.cancel.clone();
        let retry = self.retry.clone();
        let store = self.store.clone();

        let task = tokio::spawn(async move {
            Self::run(host, state, cancel, retry, store, options, progress_tx, permit).await
        });

        Ok(AuditHandle::new(progress_rx, states_rx, task))
    }

    /// Request cooperative cancellation. Effective only at the next page or
    /// chunk boundary; a no-op when nothing is running.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    #[allow(clippy::too_many_arguments)]
    async fn run(
        host: Arc<dyn DocumentHost>,
        state: Arc<StateCell<AuditState>>,
        cancel: Arc<AtomicBool>,
        retry: RetryPolicy,
        store: AuditStore,
        options: AuditOptions,
        progress: mpsc::UnboundedSender<AuditProgress>,
        permit: OpPermit,
    ) -> Result<Arc<AuditResult>, EngineError> {
        let outcome =
            Self::execute(&host, &state, &cancel, &retry, &options, &progress).await;

        let terminal = match &outcome {
            Ok(_) => AuditState::Complete,
            Err(EngineError::Cancelled) => AuditState::Cancelled,
            Err(_) => AuditState::Error,
        };
        state.transition(terminal)?;
        state.transition(AuditState::Idle)?;

        if let Ok(result) = &outcome {
            store.publish(result.clone());
            tracing::info!(
                nodes = result.nodes.len(),
                definitions = result.definitions.len(),
                "audit complete"
            );
        }

        drop(permit);
        outcome
    }

    async fn execute(
        host: &Arc<dyn DocumentHost>,
        state: &StateCell<AuditState>,
        cancel: &AtomicBool,
        retry: &RetryPolicy,
        options: &AuditOptions,
        progress: &mpsc::UnboundedSender<AuditProgress>,
    ) -> Result<Arc<AuditResult>, EngineError> {
        state.transition(AuditState::Validating)?;

        let info = retry.run(|| host.document_info()).await?;
        if !info.accessible {
            return Err(EngineError::Validation(
                "document is not accessible".to_string(),
            ));
        }
        if info.matching_nodes > options.hard_limit {
            return Err(EngineError::Validation(format!(
                "{} matching nodes exceeds the hard limit of {}",
                info.matching_nodes, options.hard_limit
            )));
        }
        if info.matching_nodes > options.warn_threshold {
            tracing::warn!(
                nodes = info.matching_nodes,
                threshold = options.warn_threshold,
                "large document, audit may be slow"
            );
        }

        state.transition(AuditState::Scanning)?;
        let ids = Self::scan(host, cancel, retry, options, info.matching_nodes, progress).await?;

        state.transition(AuditState::Processing)?;
        let nodes = Self::extract(host, cancel, retry, options, &ids, progress).await?;
        let definitions = retry.run(|| host.list_definitions()).await?;

        Ok(Arc::new(AuditResult::new(
            info.matching_nodes,
            definitions,
            nodes,
        )))
    }

    /// Page through the document's node listing, accumulating ids.
    async fn scan(
        host: &Arc<dyn DocumentHost>,
        cancel: &AtomicBool,
        retry: &RetryPolicy,
        options: &AuditOptions,
        expected: usize,
        progress: &mpsc::UnboundedSender<AuditProgress>,
    ) -> Result<Vec<NodeId>, EngineError> {
        let mut ids = Vec::new();
        let mut cursor = None;

        loop {
            if cancel.load(Ordering::Acquire) {
                tracing::info!("audit cancelled during scan");
                return Err(EngineError::Cancelled);
            }

            let request = PageRequest {
                cursor,
                limit: options.page_size,
            };
            let page = retry.run(|| host.list_nodes(request)).await?;
            ids.extend(page.nodes);

            let _ = progress.send(AuditProgress {
                phase: AuditPhase::Scanning,
                completed: ids.len(),
                total: Some(expected),
            });

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(ids)
    }

    /// Extract per-node metadata in fixed-size chunks.
    async fn extract(
        host: &Arc<dyn DocumentHost>,
        cancel: &AtomicBool,
        retry: &RetryPolicy,
        options: &AuditOptions,
        ids: &[NodeId],
        progress: &mpsc::UnboundedSender<AuditProgress>,
    ) -> Result<Vec<ContentNodeRef>, EngineError> {
        let mut nodes = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(options.chunk_size.max(1)) {
            if cancel.load(Ordering::Acquire) {
                tracing::info!("audit cancelled during processing");
                return Err(EngineError::Cancelled);
            }

            for id in chunk {
                let node = retry.run(|| host.read_binding(id)).await?;
                nodes.push(node);
            }

            let _ = progress.send(AuditProgress {
                phase: AuditPhase::Processing,
                completed: nodes.len(),
                total: Some(ids.len()),
            });
        }

        Ok(nodes)
    }
}
