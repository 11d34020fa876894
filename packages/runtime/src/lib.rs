//! # Restyle Runtime
//!
//! The mutation-safety runtime underneath both engines.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ classify: host failure → failure class      │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ retry: transient-only exponential backoff   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ batch: adaptive-size ordered batching       │
//! │  - 100 → 25 on failure, +25 per 5 successes │
//! │  - persistent failures abort the run        │
//! │  - node-scoped failures are recorded only   │
//! └─────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────┐
//! │ checkpoint: named snapshot before mutation  │
//! └─────────────────────────────────────────────┘
//! ```

mod batch;
mod checkpoint;
mod classify;
mod retry;

pub use batch::{BatchProcessor, BatchProgress, BatchReport, BATCH_SIZES};
pub use checkpoint::CheckpointManager;
pub use classify::{classify, FailureClass};
pub use retry::RetryPolicy;
