//! Movie service: catalog operations and the producer side of the pipeline.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::CatalogError;
use crate::queue::{DeleteTask, UploadTask};
use crate::storage::MovieStore;

use super::movie::{IndicativeRating, IngestEvent, Movie, MovieDraft, MovieUpdate};

/// Application service for the movie catalog.
///
/// Creation is the pipeline's producer: the movie row is written
/// synchronously, image work is enqueued fire-and-forget, and the caller
/// gets the movie back immediately with no images attached yet.
pub struct MovieService {
    store: Arc<dyn MovieStore>,
}

impl MovieService {
    /// Creates a new movie service over the given repository.
    pub fn new(store: Arc<dyn MovieStore>) -> Self {
        Self { store }
    }

    /// Creates a movie and enqueues one upload task per readable image.
    ///
    /// A single image failing to read or enqueue is logged and skipped;
    /// it never fails the creation. The returned movie therefore reflects
    /// the committed row, not the eventual image set.
    pub async fn create(
        &self,
        user_id: Uuid,
        mut draft: MovieDraft,
    ) -> Result<Movie, CatalogError> {
        draft.validate().map_err(CatalogError::InvalidPayload)?;

        if self
            .store
            .indicative_rating_by_id(draft.indicative_rating_id)
            .await?
            .is_none()
        {
            return Err(CatalogError::RatingNotFound(draft.indicative_rating_id));
        }

        let (movie, images) = draft.into_movie(user_id);
        self.store.create_movie(&movie).await?;

        let submitted = images.len();
        let mut queued = 0;

        for image in images {
            let bytes = match image.read_bytes().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(
                        movie_id = %movie.id,
                        filename = image.filename(),
                        error = %e,
                        "failed to read submitted image, skipping"
                    );
                    continue;
                }
            };

            match self
                .store
                .push_upload_task(UploadTask::new(movie.id, bytes, user_id))
                .await
            {
                Ok(envelope_id) => {
                    queued += 1;
                    debug!(
                        movie_id = %movie.id,
                        envelope_id = %envelope_id,
                        filename = image.filename(),
                        "image upload task enqueued"
                    );
                }
                Err(e) => {
                    error!(
                        movie_id = %movie.id,
                        filename = image.filename(),
                        error = %e,
                        "failed to enqueue image upload task, skipping"
                    );
                }
            }
        }

        info!(
            movie_id = %movie.id,
            user_id = %user_id,
            submitted_images = submitted,
            queued_images = queued,
            "movie created"
        );

        Ok(movie)
    }

    /// Fetches a movie with its images attached.
    pub async fn movie(&self, movie_id: Uuid) -> Result<Movie, CatalogError> {
        self.store
            .movie_by_id(movie_id)
            .await?
            .ok_or(CatalogError::MovieNotFound(movie_id))
    }

    /// Lists the movies owned by a user.
    pub async fn movies_by_user(&self, user_id: Uuid) -> Result<Vec<Movie>, CatalogError> {
        Ok(self.store.movies_by_user(user_id).await?)
    }

    /// Applies a partial update to a movie owned by the user.
    pub async fn update(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
        mut update: MovieUpdate,
    ) -> Result<Movie, CatalogError> {
        update.validate().map_err(CatalogError::InvalidPayload)?;

        let movie = self.movie(movie_id).await?;
        if movie.user_id != user_id {
            return Err(CatalogError::NotOwner { movie_id, user_id });
        }

        if let Some(rating_id) = update.indicative_rating_id {
            if self
                .store
                .indicative_rating_by_id(rating_id)
                .await?
                .is_none()
            {
                return Err(CatalogError::RatingNotFound(rating_id));
            }
        }

        self.store.update_movie(movie_id, &update).await?;

        info!(movie_id = %movie_id, user_id = %user_id, "movie updated");

        self.movie(movie_id).await
    }

    /// Deletes a movie owned by the user.
    ///
    /// Every attached image is slated for removal from the remote store by
    /// enqueueing a delete task; the rows themselves cascade with the movie
    /// row. Enqueue failures are logged and skipped, leaving those remote
    /// objects to the reconciliation sweep.
    pub async fn delete(&self, user_id: Uuid, movie_id: Uuid) -> Result<(), CatalogError> {
        let movie = self.movie(movie_id).await?;
        if movie.user_id != user_id {
            return Err(CatalogError::NotOwner { movie_id, user_id });
        }

        for image in &movie.images {
            if let Err(e) = self
                .store
                .push_delete_task(DeleteTask::new(&image.external_id))
                .await
            {
                warn!(
                    movie_id = %movie_id,
                    external_id = %image.external_id,
                    error = %e,
                    "failed to enqueue image delete task"
                );
            }
        }

        self.store.delete_movie(movie_id).await?;

        info!(
            movie_id = %movie_id,
            user_id = %user_id,
            images_slated = movie.images.len(),
            "movie deleted"
        );

        Ok(())
    }

    /// Lists all indicative ratings.
    pub async fn indicative_ratings(&self) -> Result<Vec<IndicativeRating>, CatalogError> {
        Ok(self.store.indicative_ratings().await?)
    }

    /// Returns the ingest audit stream for a movie, oldest first.
    pub async fn ingest_events(&self, movie_id: Uuid) -> Result<Vec<IngestEvent>, CatalogError> {
        Ok(self.store.events_for_movie(movie_id).await?)
    }
}
