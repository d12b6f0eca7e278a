//! Persistence layer: PostgreSQL rows plus the repository boundary.
//!
//! The storage system consists of:
//! - **Database**: PostgreSQL client for the catalog rows (movies, images,
//!   indicative ratings) and the ingest event stream
//! - **Migrations**: schema management with an idempotent in-code runner
//! - **MovieStore / MovieRepository**: the repository boundary consumed by
//!   the movie service and the workers; it spans the relational rows and
//!   the Redis work queues, because the queue is part of the repository's
//!   contract in this design
//!
//! The relational store and the queue store are coordinated only through
//! this boundary and are never assumed to be mutually consistent; the
//! pipeline narrows the inconsistency windows but does not close them.

pub mod database;
#[cfg(test)]
pub(crate) mod memory;
pub mod migrations;
pub mod repository;
pub mod schema;

// Re-export main types for convenience
pub use database::{Database, DatabaseError};
pub use migrations::{AppliedMigration, MigrationError, MigrationRunner};
pub use repository::{MovieRepository, MovieStore, RepositoryError};
