//! Upload worker: drains the upload queue into the remote image store.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::catalog::movie::{IngestEvent, IngestEventKind, MovieImage};
use crate::imagestore::ImageStore;
use crate::ingest::backoff::PollBackoff;
use crate::ingest::worker::{TaskOutcome, WorkerConfig, WorkerStats};
use crate::queue::{TaskEnvelope, UploadTask, UPLOAD_QUEUE};
use crate::storage::MovieStore;

/// Builds the remote filename for an upload task.
///
/// Movie id plus enqueue timestamp plus envelope id: deterministic per
/// task, unique per envelope, stable across retries of the same envelope.
fn upload_filename(envelope: &TaskEnvelope<UploadTask>) -> String {
    format!(
        "movie_{}_{}_{}.jpg",
        envelope.task.movie_id,
        envelope.created_at.timestamp(),
        envelope.id.simple()
    )
}

/// Long-lived consumer of the upload queue.
///
/// Pops one task at a time, uploads it to the remote store, persists the
/// resulting `MovieImage` row and settles the envelope. Transient failures
/// requeue up to the envelope's attempt budget; fatal failures and
/// exhausted budgets dead-letter.
pub struct UploadWorker {
    store: Arc<dyn MovieStore>,
    images: Arc<dyn ImageStore>,
    config: WorkerConfig,
    shutdown: broadcast::Receiver<()>,
    stats: Arc<WorkerStats>,
}

impl UploadWorker {
    /// Creates a new upload worker.
    pub fn new(
        store: Arc<dyn MovieStore>,
        images: Arc<dyn ImageStore>,
        config: WorkerConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            store,
            images,
            config,
            shutdown,
            stats: Arc::new(WorkerStats::new()),
        }
    }

    /// Returns a handle to the worker's counters.
    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Main worker loop.
    ///
    /// Runs until a shutdown signal arrives. The only suspension points are
    /// the interruptible idle sleep and the remote calls, so the loop stops
    /// between iterations, never abandoning a task mid-flight.
    pub async fn run(mut self) {
        info!(queue = UPLOAD_QUEUE, "upload worker started");

        let mut backoff = PollBackoff::new(self.config.poll_floor, self.config.poll_ceiling);

        loop {
            match self.store.next_upload_task().await {
                Ok(Some(envelope)) => {
                    backoff.reset();
                    let outcome = self.process_task(envelope).await;
                    self.stats.record(outcome);

                    if self.shutdown_requested() {
                        break;
                    }
                }
                Ok(None) => {
                    let wait = backoff.next_idle();
                    debug!(wait_ms = wait.as_millis() as u64, "upload queue empty");
                    if self.sleep_or_shutdown(wait).await {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to poll upload queue");
                    let wait = backoff.next_idle();
                    if self.sleep_or_shutdown(wait).await {
                        break;
                    }
                }
            }
        }

        info!(queue = UPLOAD_QUEUE, "upload worker stopped");
    }

    /// Processes a single popped envelope and settles it.
    async fn process_task(&self, mut envelope: TaskEnvelope<UploadTask>) -> TaskOutcome {
        envelope.increment_attempts();

        let movie_id = envelope.task.movie_id;
        let filename = upload_filename(&envelope);

        info!(
            envelope_id = %envelope.id,
            movie_id = %movie_id,
            attempt = envelope.attempts,
            "processing upload task"
        );

        let upload = tokio::time::timeout(
            self.config.task_timeout,
            self.images.upload(&envelope.task.image, &filename),
        )
        .await;

        let stored = match upload {
            Ok(Ok(stored)) => stored,
            Ok(Err(e)) => {
                let transient = e.is_transient();
                return self.settle_failed(envelope, transient, &e.to_string()).await;
            }
            Err(_) => {
                return self
                    .settle_failed(envelope, true, "remote upload timed out")
                    .await;
            }
        };

        let image = MovieImage::new(movie_id, &stored.url, &stored.id);
        if let Err(e) = self.store.create_movie_image(&image).await {
            // The object now exists remotely with no corresponding row: an
            // orphan. Dead-letter the task so the evidence is not lost.
            error!(
                envelope_id = %envelope.id,
                movie_id = %movie_id,
                external_id = %stored.id,
                error = %e,
                "image row write failed after successful remote upload"
            );
            let detail = format!(
                "image row write failed after remote upload of {}: {}",
                stored.id, e
            );
            return self.settle_failed(envelope, false, &detail).await;
        }

        let event = IngestEvent::new(movie_id, IngestEventKind::ImageUploaded)
            .with_external_id(&stored.id)
            .with_detail(&stored.url);
        if let Err(e) = self.store.record_event(&event).await {
            warn!(movie_id = %movie_id, error = %e, "failed to record upload event");
        }

        if let Err(e) = self.store.complete_upload_task(&envelope).await {
            error!(envelope_id = %envelope.id, error = %e, "failed to complete upload task");
        }

        info!(
            envelope_id = %envelope.id,
            movie_id = %movie_id,
            external_id = %stored.id,
            url = %stored.url,
            "image attached"
        );

        TaskOutcome::Completed
    }

    /// Settles a failed envelope: requeue while transient and within
    /// budget, dead-letter otherwise.
    async fn settle_failed(
        &self,
        envelope: TaskEnvelope<UploadTask>,
        transient: bool,
        error: &str,
    ) -> TaskOutcome {
        let movie_id = envelope.task.movie_id;

        if transient && envelope.should_retry() {
            warn!(
                envelope_id = %envelope.id,
                movie_id = %movie_id,
                error = %error,
                remaining_attempts = envelope.remaining_attempts(),
                "upload failed, requeueing"
            );

            if let Err(e) = self.store.retry_upload_task(&envelope).await {
                error!(envelope_id = %envelope.id, error = %e, "failed to requeue upload task");
            }

            return TaskOutcome::Requeued;
        }

        error!(
            envelope_id = %envelope.id,
            movie_id = %movie_id,
            error = %error,
            "upload failed, moving to dead letter list"
        );

        if let Err(e) = self.store.dead_letter_upload_task(&envelope, error).await {
            error!(envelope_id = %envelope.id, error = %e, "failed to dead-letter upload task");
        }

        let event = IngestEvent::new(movie_id, IngestEventKind::UploadFailed).with_detail(error);
        if let Err(e) = self.store.record_event(&event).await {
            warn!(movie_id = %movie_id, error = %e, "failed to record upload failure event");
        }

        TaskOutcome::DeadLettered
    }

    /// Checks for a pending shutdown signal without blocking.
    fn shutdown_requested(&mut self) -> bool {
        !matches!(
            self.shutdown.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        )
    }

    /// Sleeps for `wait`, returning `true` if shutdown arrived first.
    async fn sleep_or_shutdown(&mut self, wait: std::time::Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(wait) => false,
            _ = self.shutdown.recv() => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagestore::testing::ScriptedImageStore;
    use crate::imagestore::{ImageStoreError, StoredImage};
    use crate::storage::memory::MemoryMovieStore;
    use std::time::Duration;
    use uuid::Uuid;

    fn envelope(movie_id: Uuid) -> TaskEnvelope<UploadTask> {
        TaskEnvelope::new(UploadTask::new(movie_id, vec![1, 2, 3], Uuid::new_v4()))
    }

    fn worker(
        store: Arc<MemoryMovieStore>,
        images: Arc<ScriptedImageStore>,
    ) -> UploadWorker {
        let (_tx, rx) = broadcast::channel(1);
        UploadWorker::new(store, images, WorkerConfig::default(), rx)
    }

    #[tokio::test]
    async fn test_successful_upload_persists_exactly_one_row() {
        let store = Arc::new(MemoryMovieStore::new());
        let images = Arc::new(ScriptedImageStore::uploads(vec![Ok(StoredImage {
            id: "X".to_string(),
            url: "https://example/X".to_string(),
        })]));
        let movie_id = Uuid::new_v4();

        let worker = worker(Arc::clone(&store), Arc::clone(&images));
        let outcome = worker.process_task(envelope(movie_id)).await;

        assert_eq!(outcome, TaskOutcome::Completed);

        let rows = store.images();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].movie_id, movie_id);
        assert_eq!(rows[0].external_id, "X");
        assert_eq!(rows[0].image_url, "https://example/X");

        let events = store.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, IngestEventKind::ImageUploaded);
        assert_eq!(events[0].external_id.as_deref(), Some("X"));
    }

    #[tokio::test]
    async fn test_upload_filename_carries_movie_and_envelope_identity() {
        let store = Arc::new(MemoryMovieStore::new());
        let images = Arc::new(ScriptedImageStore::uploads(vec![Ok(StoredImage {
            id: "X".to_string(),
            url: "https://example/X".to_string(),
        })]));
        let movie_id = Uuid::new_v4();
        let env = envelope(movie_id);
        let env_id = env.id;

        let worker = worker(Arc::clone(&store), Arc::clone(&images));
        worker.process_task(env).await;

        let filenames = images.uploaded_filenames.lock().unwrap();
        assert_eq!(filenames.len(), 1);
        assert!(filenames[0].starts_with(&format!("movie_{}_", movie_id)));
        assert!(filenames[0].contains(&env_id.simple().to_string()));
        assert!(filenames[0].ends_with(".jpg"));
    }

    #[tokio::test]
    async fn test_server_error_requeues_while_budget_remains() {
        let store = Arc::new(MemoryMovieStore::new());
        let images = Arc::new(ScriptedImageStore::uploads(vec![Err(
            ImageStoreError::Status {
                code: 500,
                message: "internal".to_string(),
            },
        )]));

        let worker = worker(Arc::clone(&store), images);
        let outcome = worker.process_task(envelope(Uuid::new_v4())).await;

        assert_eq!(outcome, TaskOutcome::Requeued);
        assert!(store.images().is_empty());
        assert_eq!(store.upload_queue_len(), 1);
        assert!(store.upload_dead_letters().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_dead_letters_when_budget_exhausted() {
        let store = Arc::new(MemoryMovieStore::new());
        let images = Arc::new(ScriptedImageStore::uploads(vec![Err(
            ImageStoreError::Status {
                code: 500,
                message: "internal".to_string(),
            },
        )]));
        let movie_id = Uuid::new_v4();
        let env = envelope(movie_id).with_max_attempts(1);

        let worker = worker(Arc::clone(&store), images);
        let outcome = worker.process_task(env).await;

        // No row, no requeue, evidence kept: the loop just moves on.
        assert_eq!(outcome, TaskOutcome::DeadLettered);
        assert!(store.images().is_empty());
        assert_eq!(store.upload_queue_len(), 0);
        assert_eq!(store.upload_dead_letters().len(), 1);

        let events = store.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, IngestEventKind::UploadFailed);
    }

    #[tokio::test]
    async fn test_remote_rejection_is_fatal_regardless_of_budget() {
        let store = Arc::new(MemoryMovieStore::new());
        let images = Arc::new(ScriptedImageStore::uploads(vec![Err(
            ImageStoreError::Rejected("image too large".to_string()),
        )]));

        let worker = worker(Arc::clone(&store), images);
        let outcome = worker.process_task(envelope(Uuid::new_v4())).await;

        assert_eq!(outcome, TaskOutcome::DeadLettered);
        assert_eq!(store.upload_queue_len(), 0);
        assert_eq!(store.upload_dead_letters().len(), 1);
        assert!(store.upload_dead_letters()[0].1.contains("image too large"));
    }

    #[tokio::test]
    async fn test_run_loop_drains_queue_and_stops_on_shutdown() {
        let store = Arc::new(MemoryMovieStore::new());
        let movie_id = Uuid::new_v4();
        store.enqueue_upload(envelope(movie_id));
        store.enqueue_upload(envelope(movie_id));
        let images = Arc::new(ScriptedImageStore::uploads(vec![
            Ok(StoredImage {
                id: "a".to_string(),
                url: "https://example/a".to_string(),
            }),
            Ok(StoredImage {
                id: "b".to_string(),
                url: "https://example/b".to_string(),
            }),
        ]));

        let (tx, rx) = broadcast::channel(1);
        let config = WorkerConfig::default()
            .with_poll_floor(Duration::from_millis(5))
            .with_poll_ceiling(Duration::from_millis(20));
        let worker = UploadWorker::new(Arc::clone(&store), images, config, rx);
        let stats = worker.stats();
        let handle = tokio::spawn(worker.run());

        for _ in 0..200 {
            if stats.snapshot().completed == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        tx.send(()).expect("worker should still be listening");
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker should stop after shutdown")
            .expect("worker task should not panic");

        assert_eq!(store.images().len(), 2);
        assert_eq!(stats.snapshot().completed, 2);
    }

    #[tokio::test]
    async fn test_row_write_failure_after_upload_dead_letters_with_orphan_evidence() {
        let store = Arc::new(MemoryMovieStore::new());
        store.fail_image_inserts.store(true, std::sync::atomic::Ordering::SeqCst);
        let images = Arc::new(ScriptedImageStore::uploads(vec![Ok(StoredImage {
            id: "orphaned-object".to_string(),
            url: "https://example/orphaned-object".to_string(),
        })]));

        let worker = worker(Arc::clone(&store), images);
        let outcome = worker.process_task(envelope(Uuid::new_v4())).await;

        assert_eq!(outcome, TaskOutcome::DeadLettered);
        assert!(store.images().is_empty());

        let dead = store.upload_dead_letters();
        assert_eq!(dead.len(), 1);
        assert!(dead[0].1.contains("orphaned-object"));
    }
}
