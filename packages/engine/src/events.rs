//! # Progress Events and Operation Handles
//!
//! Each run delivers two ordered event feeds over unbounded channels:
//! per-page/per-chunk/per-batch progress and state transitions. Receivers
//! must be taken from the handle; events are never replayed.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

use restyle_common::EngineError;

/// Which audit phase a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditPhase {
    /// Paging through the document's node listing.
    Scanning,
    /// Extracting per-node metadata in fixed-size chunks.
    Processing,
}

/// One progress event per scan page or processing chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditProgress {
    pub phase: AuditPhase,
    /// Nodes accumulated (scanning) or categorized (processing) so far.
    pub completed: usize,
    /// Expected total, when the document reported one.
    pub total: Option<usize>,
}

/// Handle to one in-flight operation of either engine.
///
/// `E` is the progress event type, `S` the state enum, `T` the final
/// result. Dropping the handle does not cancel the run.
pub struct OperationHandle<E, S, T> {
    progress: Option<mpsc::UnboundedReceiver<E>>,
    states: Option<mpsc::UnboundedReceiver<S>>,
    task: JoinHandle<Result<T, EngineError>>,
}

impl<E, S, T> std::fmt::Debug for OperationHandle<E, S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationHandle")
            .field("progress_taken", &self.progress.is_none())
            .field("states_taken", &self.states.is_none())
            .finish_non_exhaustive()
    }
}

impl<E, S, T> OperationHandle<E, S, T> {
    pub(crate) fn new(
        progress: mpsc::UnboundedReceiver<E>,
        states: mpsc::UnboundedReceiver<S>,
        task: JoinHandle<Result<T, EngineError>>,
    ) -> Self {
        Self {
            progress: Some(progress),
            states: Some(states),
            task,
        }
    }

    /// Take the progress receiver. Yields `None` on a second call.
    pub fn progress(&mut self) -> Option<mpsc::UnboundedReceiver<E>> {
        self.progress.take()
    }

    /// Take the progress feed as a `Stream`.
    pub fn progress_stream(&mut self) -> Option<UnboundedReceiverStream<E>> {
        self.progress.take().map(UnboundedReceiverStream::new)
    }

    /// Take the state-change receiver. Yields `None` on a second call.
    pub fn states(&mut self) -> Option<mpsc::UnboundedReceiver<S>> {
        self.states.take()
    }

    /// Wait for the run to finish and return its result.
    pub async fn wait(self) -> Result<T, EngineError> {
        self.task
            .await
            .map_err(|e| EngineError::Internal(format!("engine task failed: {}", e)))?
    }
}
