//! Delete worker: drains the delete queue against the remote image store.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::catalog::movie::{IngestEvent, IngestEventKind};
use crate::imagestore::ImageStore;
use crate::ingest::backoff::PollBackoff;
use crate::ingest::worker::{TaskOutcome, WorkerConfig, WorkerStats};
use crate::queue::{DeleteTask, TaskEnvelope, DELETE_QUEUE};
use crate::storage::MovieStore;

/// Long-lived consumer of the delete queue.
///
/// Mirror of the upload worker: pop a task, delete the remote object, then
/// delete the local `MovieImage` row. A remote delete that does not succeed
/// leaves the local row untouched, so the row never claims an object that
/// was not verifiably removed. Typically runs as its own process.
pub struct DeleteWorker {
    store: Arc<dyn MovieStore>,
    images: Arc<dyn ImageStore>,
    config: WorkerConfig,
    shutdown: broadcast::Receiver<()>,
    stats: Arc<WorkerStats>,
}

impl DeleteWorker {
    /// Creates a new delete worker.
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

    /// Main worker loop; same shape and shutdown behavior as the upload
    /// worker, over the delete queue.
    pub async fn run(mut self) {
        info!(queue = DELETE_QUEUE, "delete worker started");

        let mut backoff = PollBackoff::new(self.config.poll_floor, self.config.poll_ceiling);

        loop {
            match self.store.next_delete_task().await {
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
                    debug!(wait_ms = wait.as_millis() as u64, "delete queue empty");
                    if self.sleep_or_shutdown(wait).await {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to poll delete queue");
                    let wait = backoff.next_idle();
                    if self.sleep_or_shutdown(wait).await {
                        break;
                    }
                }
            }
        }

        info!(queue = DELETE_QUEUE, "delete worker stopped");
    }

    /// Processes a single popped envelope and settles it.
    async fn process_task(&self, mut envelope: TaskEnvelope<DeleteTask>) -> TaskOutcome {
        envelope.increment_attempts();

        let external_id = envelope.task.external_id.clone();

        info!(
            envelope_id = %envelope.id,
            external_id = %external_id,
            attempt = envelope.attempts,
            "processing delete task"
        );

        // Resolve the owning movie up front so failure events can still
        // name it after the row is gone.
        let row = match self.store.movie_image_by_external_id(&external_id).await {
            Ok(row) => row,
            Err(e) => {
                error!(external_id = %external_id, error = %e, "failed to look up image row");
                return self.settle_failed(envelope, None, true, &e.to_string()).await;
            }
        };
        let movie_id = row.as_ref().map(|r| r.movie_id);

        let delete = tokio::time::timeout(
            self.config.task_timeout,
            self.images.delete(&external_id),
        )
        .await;

        match delete {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let transient = e.is_transient();
                return self
                    .settle_failed(envelope, movie_id, transient, &e.to_string())
                    .await;
            }
            Err(_) => {
                return self
                    .settle_failed(envelope, movie_id, true, "remote delete timed out")
                    .await;
            }
        }

        match self.store.delete_movie_image(&external_id).await {
            Ok(deleted) => {
                if !deleted {
                    warn!(external_id = %external_id, "no local row matched deleted object");
                }
            }
            Err(e) => {
                // The remote object is gone but the row survived; keep the
                // task in the dead letter list so the stale row is findable.
                error!(
                    external_id = %external_id,
                    error = %e,
                    "image row delete failed after remote delete"
                );
                let detail = format!(
                    "image row delete failed after remote delete of {}: {}",
                    external_id, e
                );
                return self.settle_failed(envelope, movie_id, false, &detail).await;
            }
        }

        if let Some(movie_id) = movie_id {
            let event = IngestEvent::new(movie_id, IngestEventKind::ImageDeleted)
                .with_external_id(&external_id);
            if let Err(e) = self.store.record_event(&event).await {
                warn!(movie_id = %movie_id, error = %e, "failed to record delete event");
            }
        }

        if let Err(e) = self.store.complete_delete_task(&envelope).await {
            error!(envelope_id = %envelope.id, error = %e, "failed to complete delete task");
        }

        info!(
            envelope_id = %envelope.id,
            external_id = %external_id,
            "image removed"
        );

        TaskOutcome::Completed
    }

    /// Settles a failed envelope: requeue while transient and within
    /// budget, dead-letter otherwise. The local row is never touched on
    /// the failure path.
    async fn settle_failed(
        &self,
        envelope: TaskEnvelope<DeleteTask>,
        movie_id: Option<uuid::Uuid>,
        transient: bool,
        error: &str,
    ) -> TaskOutcome {
        let external_id = &envelope.task.external_id;

        if transient && envelope.should_retry() {
            warn!(
                envelope_id = %envelope.id,
                external_id = %external_id,
                error = %error,
                remaining_attempts = envelope.remaining_attempts(),
                "delete failed, requeueing"
            );

            if let Err(e) = self.store.retry_delete_task(&envelope).await {
                error!(envelope_id = %envelope.id, error = %e, "failed to requeue delete task");
            }

            return TaskOutcome::Requeued;
        }

        error!(
            envelope_id = %envelope.id,
            external_id = %external_id,
            error = %error,
            "delete failed, moving to dead letter list"
        );

        if let Err(e) = self.store.dead_letter_delete_task(&envelope, error).await {
            error!(envelope_id = %envelope.id, error = %e, "failed to dead-letter delete task");
        }

        if let Some(movie_id) = movie_id {
            let event = IngestEvent::new(movie_id, IngestEventKind::DeleteFailed)
                .with_external_id(external_id)
                .with_detail(error);
            if let Err(e) = self.store.record_event(&event).await {
                warn!(movie_id = %movie_id, error = %e, "failed to record delete failure event");
            }
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
