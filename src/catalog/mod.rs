//! Movie catalog: domain types and the application service.
//!
//! The service is also the pipeline's producer: creating a movie commits
//! the row synchronously and defers all image work to the upload queue,
//! and deleting one feeds the delete queue.

pub mod movie;
pub mod service;

pub use movie::{
    ImageSource, ImageUpload, IndicativeRating, IngestEvent, IngestEventKind, Movie, MovieDraft,
    MovieImage, MovieUpdate,
};
pub use service::MovieService;
