//! Command-line interface for movie-pass.
//!
//! Provides commands for running migrations and workers, inspecting the
//! queues and exercising the producer path.

mod commands;

pub use commands::{parse_cli, run, run_with_cli};
