//! # Replacement Engine
//!
//! Six-state machine driving a bulk, checkpointed rebind of every affected
//! node from one definition to another: `idle → validating →
//! creating_checkpoint → processing → {complete | error}`, terminals
//! returning to `idle`.
//!
//! ## Safety order
//!
//! 1. Validation fails → zero checkpoint calls, zero mutation.
//! 2. Checkpoint fails → zero mutation, safe to retry from idle.
//! 3. Mutation aborts → already-applied changes stay in place; the
//!    checkpoint title is attached for rollback guidance. The engine never
//!    attempts automatic repair.
//!
//! Once `processing` is entered, completion on any path invalidates the
//! current audit result, because the document changed.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use restyle_common::{
    DocumentHost, EngineError, EngineKind, HostError, NodeFailure, NodeId, ReplacementResult,
    StyleRef,
};
use restyle_runtime::{BatchProcessor, BatchProgress, BatchReport, CheckpointManager, RetryPolicy};

use crate::audit::AuditStore;
use crate::events::OperationHandle;
use crate::state::{OpGuard, OpPermit, ReplaceState, StateCell};

/// Handle to one in-flight replacement run.
pub type ReplaceHandle = OperationHandle<BatchProgress, ReplaceState, ReplacementResult>;

/// Tunables for one replacement run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaceOptions {
    /// Label prefixed to the checkpoint title.
    pub checkpoint_label: String,
    /// Hard cap on affected nodes per run.
    pub max_nodes: usize,
}

impl Default for ReplaceOptions {
    fn default() -> Self {
        Self {
            checkpoint_label: "Bulk restyle".to_string(),
            max_nodes: 10_000,
        }
    }
}

/// Everything one replacement run needs, validated up front.
#[derive(Debug, Clone)]
struct ReplaceRequest {
    source: StyleRef,
    target: StyleRef,
    node_ids: Vec<NodeId>,
    options: ReplaceOptions,
}

pub struct ReplacementEngine {
    host: Arc<dyn DocumentHost>,
    state: Arc<StateCell<ReplaceState>>,
    guard: OpGuard,
    retry: RetryPolicy,
    store: AuditStore,
}

impl ReplacementEngine {
    pub fn new(host: Arc<dyn DocumentHost>, store: AuditStore) -> Self {
        Self {
            host,
            state: Arc::new(StateCell::new(ReplaceState::Idle)),
            guard: OpGuard::new(EngineKind::Replace),
            retry: RetryPolicy::default(),
            store,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn state(&self) -> ReplaceState {
        self.state.get()
    }

    pub fn is_busy(&self) -> bool {
        self.guard.is_busy()
    }

    /// Begin a replacement run rebinding `node_ids` from `source` to
    /// `target`.
    ///
    /// Rejected synchronously with `Busy` while another run is in flight.
    /// There is no cancellation once the checkpoint phase begins.
    pub fn replace(
        &self,
        source: StyleRef,
        target: StyleRef,
        node_ids: Vec<NodeId>,
        options: ReplaceOptions,
    ) -> Result<ReplaceHandle, EngineError> {
        let permit = self.guard.try_acquire()?;

        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let states_rx = self.state.subscribe();

        let request = ReplaceRequest {
            source,
            target,
            node_ids,
            options,
        };
        let host = self.host.clone();
        let state = self.state.clone();
        let retry = self.retry.clone();
        let store = self.store.clone();

        let task = tokio::spawn(async move {
            Self::run(host, state, retry, store, request, progress_tx, permit).await
        });

        Ok(ReplaceHandle::new(progress_rx, states_rx, task))
    }

    async fn run(
        host: Arc<dyn DocumentHost>,
        state: Arc<StateCell<ReplaceState>>,
        retry: RetryPolicy,
        store: AuditStore,
        request: ReplaceRequest,
        progress: mpsc::UnboundedSender<BatchProgress>,
        permit: OpPermit,
    ) -> Result<ReplacementResult, EngineError> {
        let outcome = Self::execute(&host, &state, &retry, &store, request, &progress).await;

        let terminal = match &outcome {
            Ok(_) => ReplaceState::Complete,
            Err(_) => ReplaceState::Error,
        };
        state.transition(terminal)?;
        state.transition(ReplaceState::Idle)?;

        match &outcome {
            Ok(result) => tracing::info!(
                updated = result.updated_count,
                failed = result.failed_nodes.len(),
                checkpoint = %result.checkpoint_title,
                "replacement complete"
            ),
            Err(error) => tracing::error!(error = %error, "replacement failed"),
        }

        drop(permit);
        outcome
    }

    async fn execute(
        host: &Arc<dyn DocumentHost>,
        state: &StateCell<ReplaceState>,
        retry: &RetryPolicy,
        store: &AuditStore,
        request: ReplaceRequest,
        progress: &mpsc::UnboundedSender<BatchProgress>,
    ) -> Result<ReplacementResult, EngineError> {
        state.transition(ReplaceState::Validating)?;
        Self::validate(host, retry, &request).await?;

        state.transition(ReplaceState::CreatingCheckpoint)?;
        let checkpoint = CheckpointManager::new(host.clone())
            .create(&request.options.checkpoint_label)
            .await?;

        state.transition(ReplaceState::Processing)?;
        let started = Instant::now();
        let outcome = Self::mutate(host, retry, &request, progress).await;

        // The document changed the moment mutation began, on every path.
        store.invalidate();

        match outcome {
            Ok(report) => {
                let has_warnings = !report.failed.is_empty();
                Ok(ReplacementResult {
                    updated_count: report.updated,
                    failed_nodes: report.failed,
                    checkpoint_title: checkpoint.title,
                    duration: started.elapsed(),
                    has_warnings,
                })
            }
            Err(EngineError::Host(error)) => Err(EngineError::Aborted {
                reason: error.to_string(),
                checkpoint_title: Some(checkpoint.title),
            }),
            Err(other) => Err(other),
        }
    }

    /// Pre-flight checks. Zero side effects: no checkpoint, no mutation.
    async fn validate(
        host: &Arc<dyn DocumentHost>,
        retry: &RetryPolicy,
        request: &ReplaceRequest,
    ) -> Result<(), EngineError> {
        if request.source.id == request.target.id {
            return Err(EngineError::Validation(
                "source and target are the same definition".to_string(),
            ));
        }
        if request.node_ids.is_empty() {
            return Err(EngineError::Validation("no nodes to update".to_string()));
        }
        if request.node_ids.len() > request.options.max_nodes {
            return Err(EngineError::Validation(format!(
                "{} nodes exceeds the per-run limit of {}",
                request.node_ids.len(),
                request.options.max_nodes
            )));
        }

        let definitions = retry.run(|| host.list_definitions()).await?;
        for style_ref in [&request.source, &request.target] {
            if !definitions.iter().any(|d| d.id == style_ref.id) {
                return Err(EngineError::Validation(format!(
                    "unknown definition: {} ({})",
                    style_ref.name, style_ref.id
                )));
            }
        }

        Ok(())
    }

    /// Drive the batch processor, rebinding each node in the batch.
    ///
    /// Node-scoped failures are collected and the batch continues;
    /// batch-level failures surface to the retry and size-adaptation
    /// machinery.
    async fn mutate(
        host: &Arc<dyn DocumentHost>,
        retry: &RetryPolicy,
        request: &ReplaceRequest,
        progress: &mpsc::UnboundedSender<BatchProgress>,
    ) -> Result<BatchReport, EngineError> {
        let processor = BatchProcessor::with_retry(retry.clone());
        let target = request.target.clone();
        let host = host.clone();

        processor
            .run(
                &request.node_ids,
                move |batch| {
                    let host = host.clone();
                    let target = target.clone();
                    async move {
                        let mut failures = Vec::new();
                        for id in &batch {
                            match host.write_binding(id, &target).await {
                                Ok(()) => {}
                                Err(HostError::Node { id, reason }) => {
                                    failures.push(NodeFailure {
                                        node_id: id,
                                        reason,
                                    });
                                }
                                Err(other) => return Err(other),
                            }
                        }
                        Ok(failures)
                    }
                },
                |batch_progress| {
                    let _ = progress.send(batch_progress);
                },
            )
            .await
    }
}
