//! Asynchronous media ingestion pipeline.
//!
//! Movie creation returns before any image reaches the remote store; the
//! actual work is drained by long-lived workers, one per queue:
//!
//! ```text
//!                   ┌───────────────────┐
//!                   │   MovieService    │
//!                   │   (producer)      │
//!                   └──────┬─────┬──────┘
//!                 uploads  │     │  deletes
//!                   ┌──────▼─┐ ┌─▼──────┐
//!                   │ Redis  │ │ Redis  │
//!                   │ queue  │ │ queue  │
//!                   └──────┬─┘ └─┬──────┘
//!                          │     │
//!                   ┌──────▼─┐ ┌─▼──────┐
//!                   │ Upload │ │ Delete │
//!                   │ worker │ │ worker │
//!                   └──────┬─┘ └─┬──────┘
//!                          │     │
//!              remote store + movie_images rows
//! ```
//!
//! Each worker is a two-state loop: **idle** (queue empty, adaptive backoff
//! between polls) and **draining** (tasks available, backoff at its floor).
//! One task is in flight per worker; remote calls carry a hard timeout; a
//! broadcast shutdown signal stops the loop at the next iteration boundary.
//!
//! The queue, the remote store and the relational rows are never assumed
//! equal. Popped tasks sit on a processing list until settled, failed tasks
//! keep their evidence on a dead letter list, and every outcome lands on
//! the `ingest_events` audit stream. What remains unrepaired (orphans from
//! crash windows between the remote call and the row write) is an
//! operational reconciliation concern, out of band of the pipeline.

pub mod backoff;
pub mod delete_worker;
pub mod upload_worker;
pub mod worker;

// Re-export main types for convenience
pub use backoff::PollBackoff;
pub use delete_worker::DeleteWorker;
pub use upload_worker::UploadWorker;
pub use worker::{TaskOutcome, WorkerConfig, WorkerSnapshot, WorkerStats};
