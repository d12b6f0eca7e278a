//! In-memory `MovieStore` double for unit tests.
//!
//! Models the queue semantics (FIFO pop, requeue, dead letter) without
//! Redis, and the row stores without PostgreSQL, so service and worker
//! logic can be exercised hermetically. Failure injection flags simulate
//! the partial-failure windows the pipeline has to survive.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::catalog::movie::{IndicativeRating, IngestEvent, Movie, MovieImage, MovieUpdate};
use crate::queue::{DeleteTask, TaskEnvelope, UploadTask};

use super::database::DatabaseError;
use super::repository::{MovieStore, RepositoryError};

#[derive(Default)]
struct State {
    movies: Vec<Movie>,
    images: Vec<MovieImage>,
    ratings: Vec<IndicativeRating>,
    events: Vec<IngestEvent>,
    upload_queue: VecDeque<TaskEnvelope<UploadTask>>,
    upload_dead: Vec<(TaskEnvelope<UploadTask>, String)>,
    delete_queue: VecDeque<TaskEnvelope<DeleteTask>>,
    delete_dead: Vec<(TaskEnvelope<DeleteTask>, String)>,
}

/// Hermetic in-memory repository.
#[derive(Default)]
pub(crate) struct MemoryMovieStore {
    state: Mutex<State>,
    /// When set, `create_movie_image` fails (simulates a row-write failure
    /// after a successful remote upload).
    pub fail_image_inserts: AtomicBool,
    /// When set, `push_upload_task` fails (simulates an unreachable queue).
    pub fail_upload_pushes: AtomicBool,
}

impl MemoryMovieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an indicative rating and returns its id.
    pub fn add_rating(&self, description: &str) -> Uuid {
        let rating = IndicativeRating {
            id: Uuid::new_v4(),
            description: description.to_string(),
            image_url: format!("https://static.test/ratings/{}.png", description),
            created_at: chrono::Utc::now(),
        };
        let id = rating.id;
        self.state.lock().unwrap().ratings.push(rating);
        id
    }

    pub fn movies(&self) -> Vec<Movie> {
        self.state.lock().unwrap().movies.clone()
    }

    pub fn images(&self) -> Vec<MovieImage> {
        self.state.lock().unwrap().images.clone()
    }

    pub fn events(&self) -> Vec<IngestEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn upload_queue_len(&self) -> usize {
        self.state.lock().unwrap().upload_queue.len()
    }

    pub fn delete_queue_len(&self) -> usize {
        self.state.lock().unwrap().delete_queue.len()
    }

    pub fn upload_dead_letters(&self) -> Vec<(TaskEnvelope<UploadTask>, String)> {
        self.state.lock().unwrap().upload_dead.clone()
    }

    pub fn delete_dead_letters(&self) -> Vec<(TaskEnvelope<DeleteTask>, String)> {
        self.state.lock().unwrap().delete_dead.clone()
    }

    /// Seeds an already-attached image row.
    pub fn add_image(&self, image: MovieImage) {
        self.state.lock().unwrap().images.push(image);
    }

    /// Seeds a delete-queue envelope directly.
    pub fn enqueue_delete(&self, envelope: TaskEnvelope<DeleteTask>) {
        self.state.lock().unwrap().delete_queue.push_back(envelope);
    }

    /// Seeds an upload-queue envelope directly.
    pub fn enqueue_upload(&self, envelope: TaskEnvelope<UploadTask>) {
        self.state.lock().unwrap().upload_queue.push_back(envelope);
    }

    fn injected_failure(message: &str) -> RepositoryError {
        RepositoryError::Database(DatabaseError::ConnectionFailed(message.to_string()))
    }
}

#[async_trait]
impl MovieStore for MemoryMovieStore {
    async fn create_movie(&self, movie: &Movie) -> Result<(), RepositoryError> {
        self.state.lock().unwrap().movies.push(movie.clone());
        Ok(())
    }

    async fn movie_by_id(&self, id: Uuid) -> Result<Option<Movie>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state.movies.iter().find(|m| m.id == id).map(|m| {
            let mut movie = m.clone();
            movie.images = state
                .images
                .iter()
                .filter(|i| i.movie_id == id)
                .cloned()
                .collect();
            movie
        }))
    }

    async fn movies_by_user(&self, user_id: Uuid) -> Result<Vec<Movie>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .movies
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_movie(&self, id: Uuid, update: &MovieUpdate) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let Some(movie) = state.movies.iter_mut().find(|m| m.id == id) else {
            return Ok(false);
        };

        if let Some(title) = &update.title {
            movie.title = title.clone();
        }
        if let Some(duration) = update.duration_minutes {
            movie.duration_minutes = duration;
        }
        if let Some(rating_id) = update.indicative_rating_id {
            movie.indicative_rating_id = rating_id;
        }
        movie.updated_at = Some(chrono::Utc::now());

        Ok(true)
    }

    async fn delete_movie(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let before = state.movies.len();
        state.movies.retain(|m| m.id != id);
        state.images.retain(|i| i.movie_id != id);
        Ok(state.movies.len() < before)
    }

    async fn indicative_ratings(&self) -> Result<Vec<IndicativeRating>, RepositoryError> {
        Ok(self.state.lock().unwrap().ratings.clone())
    }

    async fn indicative_rating_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<IndicativeRating>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .ratings
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn create_movie_image(&self, image: &MovieImage) -> Result<(), RepositoryError> {
        if self.fail_image_inserts.load(Ordering::SeqCst) {
            return Err(Self::injected_failure("image insert failed"));
        }
        self.state.lock().unwrap().images.push(image.clone());
        Ok(())
    }

    async fn delete_movie_image(&self, external_id: &str) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let before = state.images.len();
        state.images.retain(|i| i.external_id != external_id);
        Ok(state.images.len() < before)
    }

    async fn movie_image_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<MovieImage>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .images
            .iter()
            .find(|i| i.external_id == external_id)
            .cloned())
    }

    async fn record_event(&self, event: &IngestEvent) -> Result<(), RepositoryError> {
        self.state.lock().unwrap().events.push(event.clone());
        Ok(())
    }

    async fn events_for_movie(&self, movie_id: Uuid) -> Result<Vec<IngestEvent>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.movie_id == movie_id)
            .cloned()
            .collect())
    }

    async fn push_upload_task(&self, task: UploadTask) -> Result<Uuid, RepositoryError> {
        if self.fail_upload_pushes.load(Ordering::SeqCst) {
            return Err(Self::injected_failure("upload queue unreachable"));
        }
        let envelope = TaskEnvelope::new(task);
        let id = envelope.id;
        self.state.lock().unwrap().upload_queue.push_back(envelope);
        Ok(id)
    }

    async fn next_upload_task(
        &self,
    ) -> Result<Option<TaskEnvelope<UploadTask>>, RepositoryError> {
        Ok(self.state.lock().unwrap().upload_queue.pop_front())
    }

    async fn complete_upload_task(
        &self,
        _envelope: &TaskEnvelope<UploadTask>,
    ) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn retry_upload_task(
        &self,
        envelope: &TaskEnvelope<UploadTask>,
    ) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .unwrap()
            .upload_queue
            .push_back(envelope.clone());
        Ok(())
    }

    async fn dead_letter_upload_task(
        &self,
        envelope: &TaskEnvelope<UploadTask>,
        error: &str,
    ) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .unwrap()
            .upload_dead
            .push((envelope.clone(), error.to_string()));
        Ok(())
    }

    async fn push_delete_task(&self, task: DeleteTask) -> Result<Uuid, RepositoryError> {
        let envelope = TaskEnvelope::new(task);
        let id = envelope.id;
        self.state.lock().unwrap().delete_queue.push_back(envelope);
        Ok(id)
    }

    async fn next_delete_task(
        &self,
    ) -> Result<Option<TaskEnvelope<DeleteTask>>, RepositoryError> {
        Ok(self.state.lock().unwrap().delete_queue.pop_front())
    }

    async fn complete_delete_task(
        &self,
        _envelope: &TaskEnvelope<DeleteTask>,
    ) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn retry_delete_task(
        &self,
        envelope: &TaskEnvelope<DeleteTask>,
    ) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .unwrap()
            .delete_queue
            .push_back(envelope.clone());
        Ok(())
    }

    async fn dead_letter_delete_task(
        &self,
        envelope: &TaskEnvelope<DeleteTask>,
        error: &str,
    ) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .unwrap()
            .delete_dead
            .push((envelope.clone(), error.to_string()));
        Ok(())
    }
}
