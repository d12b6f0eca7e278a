//! Durable work queues for deferred image work.
//!
//! Movie creation must not block the caller on slow remote uploads, so all
//! image work travels through two independent Redis-backed FIFO queues:
//!
//! ```text
//!   ┌──────────────┐  push   ┌─────────────────────┐  pop   ┌───────────────┐
//!   │ MovieService ├────────►│ image_upload_queue  ├───────►│ UploadWorker  │
//!   └──────────────┘         └─────────────────────┘        └───────────────┘
//!   ┌──────────────┐  push   ┌─────────────────────┐  pop   ┌───────────────┐
//!   │ MovieService ├────────►│ image_delete_queue  ├───────►│ DeleteWorker  │
//!   └──────────────┘         └─────────────────────┘        └───────────────┘
//! ```
//!
//! Ordering is FIFO per queue; the two queues have no ordering relationship
//! with each other. Popped envelopes sit on a processing list until settled,
//! and exhausted or fatally failed envelopes land on a dead letter list.

pub mod task;
pub mod work_queue;

pub use task::{DeleteTask, TaskEnvelope, UploadTask, DEFAULT_MAX_ATTEMPTS};
pub use work_queue::{QueueError, QueueStats, WorkQueue, DELETE_QUEUE, UPLOAD_QUEUE};
