//! Task definitions for the ingestion queues.
//!
//! Two task types travel through the pipeline:
//!
//! - `UploadTask`: an image waiting to be pushed to the remote image store
//! - `DeleteTask`: a remote object waiting to be removed
//!
//! Both are carried inside a `TaskEnvelope`, which adds the identity and
//! retry accounting that the queue's settle operations work with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default maximum number of delivery attempts before a task is dead-lettered.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Serde adapter encoding image bytes as base64 on the wire.
///
/// Raw `Vec<u8>` would serialize as a JSON array of numbers, which bloats the
/// queue entries roughly fourfold for typical image sizes.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// A single image waiting to be uploaded to the remote image store.
///
/// Produced by the movie service at creation time, one per submitted image.
/// Exists only inside the queue; it is never persisted relationally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadTask {
    /// Movie the image belongs to.
    pub movie_id: Uuid,
    /// Raw image bytes (base64-encoded on the wire).
    #[serde(with = "base64_bytes")]
    pub image: Vec<u8>,
    /// User who submitted the movie.
    pub user_id: Uuid,
}

impl UploadTask {
    /// Creates a new upload task.
    pub fn new(movie_id: Uuid, image: Vec<u8>, user_id: Uuid) -> Self {
        Self {
            movie_id,
            image,
            user_id,
        }
    }
}

/// A remote object waiting to be deleted from the image store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteTask {
    /// External stored-object identifier returned by the image store.
    pub external_id: String,
}

impl DeleteTask {
    /// Creates a new delete task for the given external id.
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
        }
    }
}

/// Envelope carrying a task through the queue.
///
/// The envelope is what actually sits in Redis: it gives the task an
/// identity (used to correlate it in the processing list and to build the
/// upload filename) and tracks delivery attempts so the worker can decide
/// between requeueing and dead-lettering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope<T> {
    /// Unique identifier for this queue entry.
    pub id: Uuid,
    /// The wrapped task.
    pub task: T,
    /// Number of delivery attempts so far.
    pub attempts: u32,
    /// Maximum attempts before the envelope is dead-lettered.
    pub max_attempts: u32,
    /// When the envelope was first enqueued.
    pub created_at: DateTime<Utc>,
}

impl<T> TaskEnvelope<T> {
    /// Wraps a task in a fresh envelope with default retry budget.
    pub fn new(task: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            task,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            created_at: Utc::now(),
        }
    }

    /// Sets the maximum number of delivery attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Increments the attempt counter. Called once per delivery.
    pub fn increment_attempts(&mut self) {
        self.attempts += 1;
    }

    /// Whether the envelope still has attempts left after a failure.
    pub fn should_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Remaining delivery attempts.
    pub fn remaining_attempts(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts)
    }

    /// How long the envelope has been in the system.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload_task() -> UploadTask {
        UploadTask::new(Uuid::new_v4(), vec![0xFF, 0xD8, 0xFF, 0xE0], Uuid::new_v4())
    }

    #[test]
    fn test_envelope_retry_accounting() {
        let mut env = TaskEnvelope::new(upload_task()).with_max_attempts(2);

        assert_eq!(env.attempts, 0);
        assert!(env.should_retry());
        assert_eq!(env.remaining_attempts(), 2);

        env.increment_attempts();
        assert!(env.should_retry());
        assert_eq!(env.remaining_attempts(), 1);

        env.increment_attempts();
        assert!(!env.should_retry());
        assert_eq!(env.remaining_attempts(), 0);
    }

    #[test]
    fn test_upload_task_bytes_encode_as_base64() {
        let task = upload_task();
        let json = serde_json::to_value(&task).expect("serialization should work");

        // The image field must be a base64 string, not a number array.
        assert!(json["image"].is_string());
        assert_eq!(json["image"].as_str(), Some("/9j/4A=="));
    }

    #[test]
    fn test_envelope_serialization_roundtrip() {
        let env = TaskEnvelope::new(upload_task());
        let serialized = serde_json::to_string(&env).expect("serialization should work");
        let parsed: TaskEnvelope<UploadTask> =
            serde_json::from_str(&serialized).expect("deserialization should work");

        assert_eq!(parsed.id, env.id);
        assert_eq!(parsed.task, env.task);
        assert_eq!(parsed.attempts, env.attempts);
        assert_eq!(parsed.max_attempts, env.max_attempts);
    }

    #[test]
    fn test_delete_task_roundtrip() {
        let env = TaskEnvelope::new(DeleteTask::new("ext-123"));
        let serialized = serde_json::to_string(&env).expect("serialization should work");
        let parsed: TaskEnvelope<DeleteTask> =
            serde_json::from_str(&serialized).expect("deserialization should work");

        assert_eq!(parsed.task.external_id, "ext-123");
    }
}
