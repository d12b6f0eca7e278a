//! The movie repository boundary.
//!
//! The repository is the single persistence surface the service and the
//! workers talk to: movie/image CRUD, the ingest audit stream, and the
//! queue push/pop/settle primitives. The queue is part of this contract,
//! not a separate service, so producers and consumers share one seam.

use async_trait::async_trait;
use uuid::Uuid;

use crate::catalog::movie::{IndicativeRating, IngestEvent, Movie, MovieImage, MovieUpdate};
use crate::queue::{
    DeleteTask, QueueError, TaskEnvelope, UploadTask, WorkQueue, DELETE_QUEUE, UPLOAD_QUEUE,
};

use super::database::{Database, DatabaseError};

/// Errors that can occur at the repository boundary.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The relational store failed.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// The queue store failed.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Persistence boundary consumed by the movie service and the workers.
#[async_trait]
pub trait MovieStore: Send + Sync {
    // Movie rows
    async fn create_movie(&self, movie: &Movie) -> Result<(), RepositoryError>;
    async fn movie_by_id(&self, id: Uuid) -> Result<Option<Movie>, RepositoryError>;
    async fn movies_by_user(&self, user_id: Uuid) -> Result<Vec<Movie>, RepositoryError>;
    async fn update_movie(&self, id: Uuid, update: &MovieUpdate) -> Result<bool, RepositoryError>;
    async fn delete_movie(&self, id: Uuid) -> Result<bool, RepositoryError>;

    // Indicative ratings
    async fn indicative_ratings(&self) -> Result<Vec<IndicativeRating>, RepositoryError>;
    async fn indicative_rating_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<IndicativeRating>, RepositoryError>;

    // Movie image rows
    async fn create_movie_image(&self, image: &MovieImage) -> Result<(), RepositoryError>;
    async fn delete_movie_image(&self, external_id: &str) -> Result<bool, RepositoryError>;
    async fn movie_image_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<MovieImage>, RepositoryError>;

    // Ingest audit stream
    async fn record_event(&self, event: &IngestEvent) -> Result<(), RepositoryError>;
    async fn events_for_movie(&self, movie_id: Uuid) -> Result<Vec<IngestEvent>, RepositoryError>;

    // Upload queue
    async fn push_upload_task(&self, task: UploadTask) -> Result<Uuid, RepositoryError>;
    async fn next_upload_task(
        &self,
    ) -> Result<Option<TaskEnvelope<UploadTask>>, RepositoryError>;
    async fn complete_upload_task(
        &self,
        envelope: &TaskEnvelope<UploadTask>,
    ) -> Result<(), RepositoryError>;
    async fn retry_upload_task(
        &self,
        envelope: &TaskEnvelope<UploadTask>,
    ) -> Result<(), RepositoryError>;
    async fn dead_letter_upload_task(
        &self,
        envelope: &TaskEnvelope<UploadTask>,
        error: &str,
    ) -> Result<(), RepositoryError>;

    // Delete queue
    async fn push_delete_task(&self, task: DeleteTask) -> Result<Uuid, RepositoryError>;
    async fn next_delete_task(
        &self,
    ) -> Result<Option<TaskEnvelope<DeleteTask>>, RepositoryError>;
    async fn complete_delete_task(
        &self,
        envelope: &TaskEnvelope<DeleteTask>,
    ) -> Result<(), RepositoryError>;
    async fn retry_delete_task(
        &self,
        envelope: &TaskEnvelope<DeleteTask>,
    ) -> Result<(), RepositoryError>;
    async fn dead_letter_delete_task(
        &self,
        envelope: &TaskEnvelope<DeleteTask>,
        error: &str,
    ) -> Result<(), RepositoryError>;
}

/// Concrete repository over PostgreSQL rows and Redis queues.
pub struct MovieRepository {
    db: Database,
    uploads: WorkQueue<UploadTask>,
    deletes: WorkQueue<DeleteTask>,
}

impl MovieRepository {
    /// Creates a repository from already-connected components.
    pub fn new(
        db: Database,
        uploads: WorkQueue<UploadTask>,
        deletes: WorkQueue<DeleteTask>,
    ) -> Self {
        Self {
            db,
            uploads,
            deletes,
        }
    }

    /// Connects to PostgreSQL and Redis and assembles the repository with
    /// the standard queue names. Both queues share one Redis connection
    /// manager.
    pub async fn connect(database_url: &str, redis_url: &str) -> Result<Self, RepositoryError> {
        let db = Database::connect(database_url).await?;

        let client = redis::Client::open(redis_url)
            .map_err(|e| QueueError::ConnectionFailed(e.to_string()))?;
        let redis = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| QueueError::ConnectionFailed(e.to_string()))?;

        let uploads = WorkQueue::from_connection(redis.clone(), UPLOAD_QUEUE);
        let deletes = WorkQueue::from_connection(redis, DELETE_QUEUE);

        Ok(Self::new(db, uploads, deletes))
    }

    /// Returns the underlying database client.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Returns the upload queue for inspection and recovery.
    pub fn upload_queue(&self) -> &WorkQueue<UploadTask> {
        &self.uploads
    }

    /// Returns the delete queue for inspection and recovery.
    pub fn delete_queue(&self) -> &WorkQueue<DeleteTask> {
        &self.deletes
    }
}

#[async_trait]
impl MovieStore for MovieRepository {
    async fn create_movie(&self, movie: &Movie) -> Result<(), RepositoryError> {
        Ok(self.db.insert_movie(movie).await?)
    }

    async fn movie_by_id(&self, id: Uuid) -> Result<Option<Movie>, RepositoryError> {
        Ok(self.db.movie_by_id(id).await?)
    }

    async fn movies_by_user(&self, user_id: Uuid) -> Result<Vec<Movie>, RepositoryError> {
        Ok(self.db.movies_by_user(user_id).await?)
    }

    async fn update_movie(&self, id: Uuid, update: &MovieUpdate) -> Result<bool, RepositoryError> {
        Ok(self.db.update_movie(id, update).await?)
    }

    async fn delete_movie(&self, id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.db.delete_movie(id).await?)
    }

    async fn indicative_ratings(&self) -> Result<Vec<IndicativeRating>, RepositoryError> {
        Ok(self.db.indicative_ratings().await?)
    }

    async fn indicative_rating_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<IndicativeRating>, RepositoryError> {
        Ok(self.db.indicative_rating_by_id(id).await?)
    }

    async fn create_movie_image(&self, image: &MovieImage) -> Result<(), RepositoryError> {
        Ok(self.db.insert_movie_image(image).await?)
    }

    async fn delete_movie_image(&self, external_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.db.delete_movie_image(external_id).await?)
    }

    async fn movie_image_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<MovieImage>, RepositoryError> {
        Ok(self.db.movie_image_by_external_id(external_id).await?)
    }

    async fn record_event(&self, event: &IngestEvent) -> Result<(), RepositoryError> {
        Ok(self.db.insert_event(event).await?)
    }

    async fn events_for_movie(&self, movie_id: Uuid) -> Result<Vec<IngestEvent>, RepositoryError> {
        Ok(self.db.events_for_movie(movie_id).await?)
    }

    async fn push_upload_task(&self, task: UploadTask) -> Result<Uuid, RepositoryError> {
        Ok(self.uploads.push(task).await?)
    }

    async fn next_upload_task(
        &self,
    ) -> Result<Option<TaskEnvelope<UploadTask>>, RepositoryError> {
        Ok(self.uploads.pop().await?)
    }

    async fn complete_upload_task(
        &self,
        envelope: &TaskEnvelope<UploadTask>,
    ) -> Result<(), RepositoryError> {
        Ok(self.uploads.complete(envelope).await?)
    }

    async fn retry_upload_task(
        &self,
        envelope: &TaskEnvelope<UploadTask>,
    ) -> Result<(), RepositoryError> {
        Ok(self.uploads.retry(envelope).await?)
    }

    async fn dead_letter_upload_task(
        &self,
        envelope: &TaskEnvelope<UploadTask>,
        error: &str,
    ) -> Result<(), RepositoryError> {
        Ok(self.uploads.dead_letter(envelope, error).await?)
    }

    async fn push_delete_task(&self, task: DeleteTask) -> Result<Uuid, RepositoryError> {
        Ok(self.deletes.push(task).await?)
    }

    async fn next_delete_task(
        &self,
    ) -> Result<Option<TaskEnvelope<DeleteTask>>, RepositoryError> {
        Ok(self.deletes.pop().await?)
    }

    async fn complete_delete_task(
        &self,
        envelope: &TaskEnvelope<DeleteTask>,
    ) -> Result<(), RepositoryError> {
        Ok(self.deletes.complete(envelope).await?)
    }

    async fn retry_delete_task(
        &self,
        envelope: &TaskEnvelope<DeleteTask>,
    ) -> Result<(), RepositoryError> {
        Ok(self.deletes.retry(envelope).await?)
    }

    async fn dead_letter_delete_task(
        &self,
        envelope: &TaskEnvelope<DeleteTask>,
        error: &str,
    ) -> Result<(), RepositoryError> {
        Ok(self.deletes.dead_letter(envelope, error).await?)
    }
}
