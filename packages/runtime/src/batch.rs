//! # Adaptive Batch Processor
//!
//! Splits an ordered target list into sequential batches and applies a
//! caller-supplied mutation per batch, adapting batch size to observed
//! reliability.
//!
//! ## Sizing rules
//!
//! - Start at 100. Size only ever takes values in {25, 50, 75, 100}.
//! - 5 consecutive successful batches below 100 grow the size by 25 and
//!   reset the streak.
//! - A non-persistent batch failure above the minimum drops straight to 25,
//!   resets the streak, and re-attempts the front of the failed slice once
//!   at the reduced size before giving up on it.
//! - A persistent batch failure aborts the whole run.
//! - Node-scoped failures inside a successful batch are recorded and never
//!   count as batch failures.
//!
//! The streak counter resets on every batch failure and every size change.

use std::future::Future;

use serde::{Deserialize, Serialize};

use restyle_common::{EngineError, HostError, NodeFailure, NodeId};

use crate::classify::{classify, FailureClass};
use crate::retry::RetryPolicy;

/// The only batch sizes the processor will ever use.
pub const BATCH_SIZES: [usize; 4] = [25, 50, 75, 100];

const MIN_BATCH_SIZE: usize = 25;
const MAX_BATCH_SIZE: usize = 100;
const GROWTH_STEP: usize = 25;
const GROWTH_STREAK: usize = 5;

/// One progress event per completed (or given-up) batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// 1-based index of the batch within the run.
    pub index: usize,
    /// Number of nodes attempted in this batch.
    pub size: usize,
    /// Cumulative successfully updated nodes.
    pub processed: usize,
    /// Cumulative failed nodes.
    pub failed: usize,
}

/// Outcome of a full batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub updated: usize,
    pub failed: Vec<NodeFailure>,
    pub batches: usize,
}

/// Per-run sizing state. Exclusively owned by one in-flight run.
#[derive(Debug)]
struct BatchState {
    size: usize,
    streak: usize,
    cursor: usize,
}

impl BatchState {
    fn new() -> Self {
        Self {
            size: MAX_BATCH_SIZE,
            streak: 0,
            cursor: 0,
        }
    }

    fn record_success(&mut self) {
        self.streak += 1;
        if self.size < MAX_BATCH_SIZE && self.streak >= GROWTH_STREAK {
            self.size += GROWTH_STEP;
            self.streak = 0;
            tracing::debug!(size = self.size, "batch size grown");
        }
        debug_assert!(BATCH_SIZES.contains(&self.size));
    }

    fn drop_to_minimum(&mut self) {
        self.size = MIN_BATCH_SIZE;
        self.streak = 0;
        debug_assert!(BATCH_SIZES.contains(&self.size));
    }
}

/// Adaptive-size batch iterator over an ordered node-id list.
#[derive(Debug, Clone, Default)]
pub struct BatchProcessor {
    retry: RetryPolicy,
}

impl BatchProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    /// Drive `mutate` over `ids` in adaptively sized batches.
    ///
    /// `mutate` receives one batch of ids and returns the node-scoped
    /// failures it observed; a batch-level `HostError` feeds the retry and
    /// size-adaptation machinery instead. `on_progress` fires once per
    /// batch, strictly in order.
    ///
    /// An empty `ids` list completes immediately with zero batches.
    pub async fn run<F, Fut, P>(
        &self,
        ids: &[NodeId],
        mut mutate: F,
        mut on_progress: P,
    ) -> Result<BatchReport, EngineError>
    where
        F: FnMut(Vec<NodeId>) -> Fut,
        Fut: Future<Output = Result<Vec<NodeFailure>, HostError>>,
        P: FnMut(BatchProgress),
    {
        let mut state = BatchState::new();
        let mut updated = 0usize;
        let mut failed: Vec<NodeFailure> = Vec::new();
        let mut index = 0usize;

        while state.cursor < ids.len() {
            let end = (state.cursor + state.size).min(ids.len());
            let batch = ids[state.cursor..end].to_vec();

            match self.retry.run(|| mutate(batch.clone())).await {
                Ok(node_failures) => {
                    updated += batch.len() - node_failures.len();
                    failed.extend(node_failures);
                    state.cursor = end;
                    state.record_success();

                    index += 1;
                    on_progress(BatchProgress {
                        index,
                        size: batch.len(),
                        processed: updated,
                        failed: failed.len(),
                    });
                }
                Err(error) => {
                    if classify(&error) == FailureClass::Persistent {
                        tracing::error!(error = %error, "persistent batch failure, aborting run");
                        return Err(EngineError::Host(error));
                    }

                    if state.size > MIN_BATCH_SIZE {
                        // Hold the cursor: the next iteration re-attempts the
                        // front of this slice at the reduced size.
                        tracing::warn!(
                            from = state.size,
                            error = %error,
                            "batch failed, dropping to minimum size"
                        );
                        state.drop_to_minimum();
                    } else {
                        // Already at minimum: give up on this batch.
                        tracing::warn!(
                            count = batch.len(),
                            error = %error,
                            "batch failed at minimum size, marking nodes failed"
                        );
                        for id in &batch {
                            failed.push(NodeFailure {
                                node_id: id.clone(),
                                reason: error.to_string(),
                            });
                        }
                        state.cursor = end;
                        state.streak = 0;

                        index += 1;
                        on_progress(BatchProgress {
                            index,
                            size: batch.len(),
                            processed: updated,
                            failed: failed.len(),
                        });
                    }
                }
            }
        }

        Ok(BatchReport {
            updated,
            failed,
            batches: index,
        })
    }
}
