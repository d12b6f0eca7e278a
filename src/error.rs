//! Service-level error types.
//!
//! Infrastructure errors live with their subsystems (`QueueError`,
//! `ImageStoreError`, `DatabaseError`, `RepositoryError`); this module
//! holds the errors the movie service surfaces to its callers.

use thiserror::Error;
use uuid::Uuid;

use crate::storage::RepositoryError;

/// Errors surfaced by the movie service.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The submitted payload failed validation.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// No movie exists with the given id.
    #[error("movie {0} not found")]
    MovieNotFound(Uuid),

    /// The referenced indicative rating does not exist.
    #[error("indicative rating {0} not found")]
    RatingNotFound(Uuid),

    /// The movie belongs to a different user.
    #[error("movie {movie_id} does not belong to user {user_id}")]
    NotOwner { movie_id: Uuid, user_id: Uuid },

    /// The repository failed.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}
