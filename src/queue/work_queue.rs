//! Redis-backed work queue with non-blocking dequeue and explicit settle.
//!
//! Each queue uses three Redis lists:
//!
//! - `{queue_name}`: the main FIFO list, push-to-tail, pop-from-head
//! - `{queue_name}:processing`: envelopes popped but not yet settled
//! - `{queue_name}:dead_letter`: envelopes that failed past their budget
//!
//! A pop atomically moves the head of the main list onto the processing
//! list (LMOVE), so a worker crash never silently drops a popped envelope:
//! `recover` drains the processing list back to the main queue on startup.

use std::marker::PhantomData;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::task::TaskEnvelope;

/// Name of the list feeding the upload worker.
pub const UPLOAD_QUEUE: &str = "image_upload_queue";

/// Name of the list feeding the delete worker.
pub const DELETE_QUEUE: &str = "image_delete_queue";

/// Errors that can occur during queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Failed to connect to Redis.
    #[error("Redis connection failed: {0}")]
    ConnectionFailed(String),

    /// Redis operation failed.
    #[error("Redis operation failed: {0}")]
    Redis(#[from] redis::RedisError),

    /// Failed to serialize or deserialize an envelope.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable FIFO queue for one task type.
///
/// Dequeue is strictly non-blocking: an empty queue yields `Ok(None)`,
/// never an error and never a wait. Idle pacing is the worker's concern.
pub struct WorkQueue<T> {
    /// Redis connection manager (handles reconnection automatically).
    redis: ConnectionManager,
    /// Name of the main queue.
    queue_name: String,
    /// Name of the processing list.
    processing_queue: String,
    /// Name of the dead letter list.
    dead_letter_queue: String,
    _task: PhantomData<fn() -> T>,
}

impl<T> WorkQueue<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Connects to Redis and creates a new work queue.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::ConnectionFailed` if the connection fails.
    pub async fn connect(redis_url: &str, queue_name: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| QueueError::ConnectionFailed(e.to_string()))?;

        let redis = ConnectionManager::new(client)
            .await
            .map_err(|e| QueueError::ConnectionFailed(e.to_string()))?;

        Ok(Self::from_connection(redis, queue_name))
    }

    /// Creates a work queue from an existing connection manager.
    ///
    /// Useful when sharing a connection across multiple queues.
    pub fn from_connection(redis: ConnectionManager, queue_name: &str) -> Self {
        Self {
            redis,
            queue_name: queue_name.to_string(),
            processing_queue: format!("{}:processing", queue_name),
            dead_letter_queue: format!("{}:dead_letter", queue_name),
            _task: PhantomData,
        }
    }

    /// Wraps a task in a fresh envelope and appends it to the queue tail.
    ///
    /// Returns the envelope id for correlation in logs.
    pub async fn push(&self, task: T) -> Result<Uuid, QueueError> {
        let envelope = TaskEnvelope::new(task);
        let id = envelope.id;
        self.push_envelope(&envelope).await?;
        Ok(id)
    }

    /// Appends an existing envelope to the queue tail.
    ///
    /// Used to requeue an envelope that failed with attempts remaining.
    pub async fn push_envelope(&self, envelope: &TaskEnvelope<T>) -> Result<(), QueueError> {
        let serialized = serde_json::to_string(envelope)?;
        let mut conn = self.redis.clone();
        conn.rpush::<_, _, ()>(&self.queue_name, serialized).await?;
        Ok(())
    }

    /// Pops the head of the queue, or `None` when the queue is empty.
    ///
    /// The envelope is atomically moved onto the processing list and stays
    /// there until settled with `complete`, `retry` or `dead_letter`.
    pub async fn pop(&self) -> Result<Option<TaskEnvelope<T>>, QueueError> {
        let mut conn = self.redis.clone();

        // LMOVE pops from the head and appends to the processing tail in
        // one atomic step, so concurrent poppers never see the same entry.
        let result: Option<String> = redis::cmd("LMOVE")
            .arg(&self.queue_name)
            .arg(&self.processing_queue)
            .arg("LEFT")
            .arg("RIGHT")
            .query_async(&mut conn)
            .await?;

        match result {
            Some(data) => {
                let envelope: TaskEnvelope<T> = serde_json::from_str(&data)?;
                Ok(Some(envelope))
            }
            None => Ok(None),
        }
    }

    /// Marks an envelope as done and removes it from the processing list.
    pub async fn complete(&self, envelope: &TaskEnvelope<T>) -> Result<(), QueueError> {
        self.remove_from_processing(envelope.id).await
    }

    /// Returns a failed envelope to the main queue for another attempt.
    ///
    /// The attempt counter should already have been incremented by the
    /// worker at delivery time.
    pub async fn retry(&self, envelope: &TaskEnvelope<T>) -> Result<(), QueueError> {
        self.remove_from_processing(envelope.id).await?;
        self.push_envelope(envelope).await
    }

    /// Moves an envelope to the dead letter list after a fatal failure or
    /// an exhausted retry budget.
    pub async fn dead_letter(
        &self,
        envelope: &TaskEnvelope<T>,
        error: &str,
    ) -> Result<(), QueueError> {
        self.remove_from_processing(envelope.id).await?;

        let entry = serde_json::json!({
            "envelope": envelope,
            "error": error,
            "moved_at": chrono::Utc::now().to_rfc3339(),
        });
        let serialized = serde_json::to_string(&entry)?;

        let mut conn = self.redis.clone();
        conn.rpush::<_, _, ()>(&self.dead_letter_queue, serialized)
            .await?;

        Ok(())
    }

    /// Drains envelopes stuck in the processing list back to the main queue.
    ///
    /// Called on worker startup to recover from a previous crash. Envelopes
    /// whose attempt budget is already exhausted go to the dead letter list
    /// instead. Returns the number of envelopes returned to the main queue.
    pub async fn recover(&self) -> Result<usize, QueueError> {
        let mut conn = self.redis.clone();
        let mut recovered = 0;

        let entries: Vec<String> = conn.lrange(&self.processing_queue, 0, -1).await?;

        for data in entries {
            let Ok(mut envelope) = serde_json::from_str::<TaskEnvelope<T>>(&data) else {
                // Unparseable entries are dropped from the processing list so
                // they cannot wedge recovery forever.
                conn.lrem::<_, _, ()>(&self.processing_queue, 1, &data)
                    .await?;
                continue;
            };

            envelope.increment_attempts();

            if envelope.should_retry() {
                let serialized = serde_json::to_string(&envelope)?;
                let mut pipe = redis::pipe();
                pipe.atomic()
                    .lrem(&self.processing_queue, 1, &data)
                    .rpush(&self.queue_name, &serialized);
                pipe.query_async::<_, ()>(&mut conn).await?;
                recovered += 1;
            } else {
                self.dead_letter(&envelope, "recovered from processing list after max attempts")
                    .await?;
            }
        }

        Ok(recovered)
    }

    /// Returns the number of envelopes waiting in the main queue.
    pub async fn len(&self) -> Result<usize, QueueError> {
        let mut conn = self.redis.clone();
        let len: usize = conn.llen(&self.queue_name).await?;
        Ok(len)
    }

    /// Returns the number of envelopes on the processing list.
    pub async fn processing_len(&self) -> Result<usize, QueueError> {
        let mut conn = self.redis.clone();
        let len: usize = conn.llen(&self.processing_queue).await?;
        Ok(len)
    }

    /// Returns the number of entries in the dead letter list.
    pub async fn dead_letter_len(&self) -> Result<usize, QueueError> {
        let mut conn = self.redis.clone();
        let len: usize = conn.llen(&self.dead_letter_queue).await?;
        Ok(len)
    }

    /// Returns whether the main queue is empty.
    pub async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len().await? == 0)
    }

    /// Returns current depths for all three lists.
    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        let (pending, processing, dead_letter) = tokio::try_join!(
            self.len(),
            self.processing_len(),
            self.dead_letter_len()
        )?;

        Ok(QueueStats {
            queue_name: self.queue_name.clone(),
            pending,
            processing,
            dead_letter,
        })
    }

    /// Peeks at dead letter entries without removing them.
    pub async fn peek_dead_letter(
        &self,
        limit: usize,
    ) -> Result<Vec<serde_json::Value>, QueueError> {
        let mut conn = self.redis.clone();
        let data: Vec<String> = conn
            .lrange(&self.dead_letter_queue, 0, limit as isize - 1)
            .await?;

        let entries: Result<Vec<serde_json::Value>, _> =
            data.iter().map(|s| serde_json::from_str(s)).collect();

        Ok(entries?)
    }

    /// Deletes all three lists.
    ///
    /// **Warning**: permanently discards every queued, in-flight and
    /// dead-lettered task. For tests and operator resets only.
    pub async fn clear(&self) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();

        let mut pipe = redis::pipe();
        pipe.del(&self.queue_name)
            .del(&self.processing_queue)
            .del(&self.dead_letter_queue);
        pipe.query_async::<_, ()>(&mut conn).await?;

        Ok(())
    }

    /// Returns the queue name.
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Removes the envelope with the given id from the processing list.
    async fn remove_from_processing(&self, id: Uuid) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();

        let entries: Vec<String> = conn.lrange(&self.processing_queue, 0, -1).await?;

        for data in entries {
            if let Ok(envelope) = serde_json::from_str::<TaskEnvelope<T>>(&data) {
                if envelope.id == id {
                    conn.lrem::<_, _, ()>(&self.processing_queue, 1, &data)
                        .await?;
                    return Ok(());
                }
            }
        }

        // Not finding the envelope is not an error: it may already have been
        // settled by a recovery pass.
        Ok(())
    }
}

/// Depths of a queue's three lists.
#[derive(Debug, Clone)]
pub struct QueueStats {
    /// Name of the queue.
    pub queue_name: String,
    /// Envelopes waiting in the main queue.
    pub pending: usize,
    /// Envelopes popped but not yet settled.
    pub processing: usize,
    /// Entries in the dead letter list.
    pub dead_letter: usize,
}

impl QueueStats {
    /// Total envelopes across all three lists.
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.dead_letter
    }
}
