//! CLI command definitions for movie-pass.
//!
//! The binary is the operational surface of the pipeline: it runs the
//! migrations and the two workers, inspects the queues and the ingest
//! audit stream, and can exercise the producer path directly.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::{ImageUpload, MovieDraft, MovieService};
use crate::imagestore::ImageStoreClient;
use crate::ingest::{DeleteWorker, UploadWorker, WorkerConfig};
use crate::queue::{DeleteTask, UploadTask, WorkQueue, DELETE_QUEUE, UPLOAD_QUEUE};
use crate::storage::{Database, MigrationRunner, MovieRepository, MovieStore};

/// Default Redis connection URL.
const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// Cinema catalog backend core with an asynchronous media ingestion pipeline.
#[derive(Parser)]
#[command(name = "movie-pass")]
#[command(about = "Run and operate the movie-pass media ingestion pipeline")]
#[command(version)]
#[command(
    long_about = "movie-pass hosts the asynchronous media ingestion pipeline for the cinema catalog.\n\nMovie creation commits the row synchronously and defers image work to Redis-backed queues;\nthe upload-worker and delete-worker subcommands drain those queues against the remote image store.\n\nExample usage:\n  movie-pass migrate\n  movie-pass upload-worker\n  movie-pass queue-stats --json"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Apply database migrations.
    Migrate(MigrateArgs),

    /// Run the image upload worker until interrupted.
    UploadWorker(WorkerArgs),

    /// Run the image delete worker until interrupted.
    DeleteWorker(WorkerArgs),

    /// Show queue depths for both ingestion queues.
    QueueStats(QueueStatsArgs),

    /// Return envelopes stuck on the processing lists to their queues.
    Recover(RecoverArgs),

    /// Print the ingest audit stream for a movie.
    Events(EventsArgs),

    /// Create a movie through the producer path, enqueueing its images.
    CreateMovie(CreateMovieArgs),
}

/// Arguments for `movie-pass migrate`.
#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// PostgreSQL connection string.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Drop every table before migrating. Destroys all data.
    #[arg(long)]
    pub reset: bool,
}

/// Arguments shared by both worker subcommands.
#[derive(Parser, Debug)]
pub struct WorkerArgs {
    /// PostgreSQL connection string.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Redis connection string.
    #[arg(long, env = "REDIS_URL", default_value = DEFAULT_REDIS_URL)]
    pub redis_url: String,

    /// Upload endpoint of the remote image store.
    #[arg(long, env = "IMAGE_STORE_ENDPOINT")]
    pub image_store_endpoint: String,

    /// Bearer token for the remote image store.
    #[arg(long, env = "IMAGE_STORE_API_KEY", hide_env_values = true)]
    pub image_store_api_key: String,

    /// Shortest idle wait between empty polls, in seconds.
    #[arg(long, default_value = "5")]
    pub poll_floor_secs: u64,

    /// Longest idle wait between empty polls, in seconds.
    #[arg(long, default_value = "60")]
    pub poll_ceiling_secs: u64,

    /// Hard timeout for a single remote call, in seconds.
    #[arg(long, default_value = "60")]
    pub task_timeout_secs: u64,
}

impl WorkerArgs {
    fn worker_config(&self) -> WorkerConfig {
        WorkerConfig::default()
            .with_poll_floor(Duration::from_secs(self.poll_floor_secs))
            .with_poll_ceiling(Duration::from_secs(self.poll_ceiling_secs))
            .with_task_timeout(Duration::from_secs(self.task_timeout_secs))
    }
}

/// Arguments for `movie-pass queue-stats`.
#[derive(Parser, Debug)]
pub struct QueueStatsArgs {
    /// Redis connection string.
    #[arg(long, env = "REDIS_URL", default_value = DEFAULT_REDIS_URL)]
    pub redis_url: String,

    /// Output JSON instead of a table.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `movie-pass recover`.
#[derive(Parser, Debug)]
pub struct RecoverArgs {
    /// Redis connection string.
    #[arg(long, env = "REDIS_URL", default_value = DEFAULT_REDIS_URL)]
    pub redis_url: String,
}

/// Arguments for `movie-pass events`.
#[derive(Parser, Debug)]
pub struct EventsArgs {
    /// PostgreSQL connection string.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Movie to print the audit stream for.
    #[arg(long)]
    pub movie: Uuid,
}

/// Arguments for `movie-pass create-movie`.
#[derive(Parser, Debug)]
pub struct CreateMovieArgs {
    /// PostgreSQL connection string.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Redis connection string.
    #[arg(long, env = "REDIS_URL", default_value = DEFAULT_REDIS_URL)]
    pub redis_url: String,

    /// Owning user id.
    #[arg(long)]
    pub user: Uuid,

    /// Movie title.
    #[arg(long)]
    pub title: String,

    /// Duration in minutes.
    #[arg(long)]
    pub duration: i32,

    /// Indicative rating id.
    #[arg(long)]
    pub rating: Uuid,

    /// Image files to enqueue for upload. Repeatable.
    #[arg(long = "image")]
    pub images: Vec<PathBuf>,
}

/// Parse CLI arguments without executing.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
///
/// This is the main entry point for the movie-pass CLI.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Migrate(args) => run_migrate_command(args).await?,
        Commands::UploadWorker(args) => run_upload_worker_command(args).await?,
        Commands::DeleteWorker(args) => run_delete_worker_command(args).await?,
        Commands::QueueStats(args) => run_queue_stats_command(args).await?,
        Commands::Recover(args) => run_recover_command(args).await?,
        Commands::Events(args) => run_events_command(args).await?,
        Commands::CreateMovie(args) => run_create_movie_command(args).await?,
    }
    Ok(())
}

async fn run_migrate_command(args: MigrateArgs) -> anyhow::Result<()> {
    let db = Database::connect(&args.database_url).await?;

    if args.reset {
        warn!("resetting database before migrating");
        MigrationRunner::new(db.pool().clone()).reset_database().await?;
    }

    db.run_migrations().await?;
    info!("migrations applied");

    Ok(())
}

async fn run_upload_worker_command(args: WorkerArgs) -> anyhow::Result<()> {
    let repository =
        Arc::new(MovieRepository::connect(&args.database_url, &args.redis_url).await?);

    let recovered = repository.upload_queue().recover().await?;
    if recovered > 0 {
        info!(recovered, queue = UPLOAD_QUEUE, "recovered envelopes from processing list");
    }

    let images = Arc::new(ImageStoreClient::new(
        &args.image_store_endpoint,
        &args.image_store_api_key,
    ));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let worker = UploadWorker::new(
        Arc::clone(&repository) as Arc<dyn MovieStore>,
        images,
        args.worker_config(),
        shutdown_rx,
    );
    let stats = worker.stats();

    let handle = tokio::spawn(worker.run());

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(());
    handle.await?;

    let snapshot = stats.snapshot();
    info!(
        completed = snapshot.completed,
        requeued = snapshot.requeued,
        dead_lettered = snapshot.dead_lettered,
        "upload worker finished"
    );

    Ok(())
}

async fn run_delete_worker_command(args: WorkerArgs) -> anyhow::Result<()> {
    let repository =
        Arc::new(MovieRepository::connect(&args.database_url, &args.redis_url).await?);

    let recovered = repository.delete_queue().recover().await?;
    if recovered > 0 {
        info!(recovered, queue = DELETE_QUEUE, "recovered envelopes from processing list");
    }

    let images = Arc::new(ImageStoreClient::new(
        &args.image_store_endpoint,
        &args.image_store_api_key,
    ));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let worker = DeleteWorker::new(
        Arc::clone(&repository) as Arc<dyn MovieStore>,
        images,
        args.worker_config(),
        shutdown_rx,
    );
    let stats = worker.stats();

    let handle = tokio::spawn(worker.run());

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(());
    handle.await?;

    let snapshot = stats.snapshot();
    info!(
        completed = snapshot.completed,
        requeued = snapshot.requeued,
        dead_lettered = snapshot.dead_lettered,
        "delete worker finished"
    );

    Ok(())
}

async fn run_queue_stats_command(args: QueueStatsArgs) -> anyhow::Result<()> {
    let uploads: WorkQueue<UploadTask> = WorkQueue::connect(&args.redis_url, UPLOAD_QUEUE).await?;
    let deletes: WorkQueue<DeleteTask> = WorkQueue::connect(&args.redis_url, DELETE_QUEUE).await?;

    let upload_stats = uploads.stats().await?;
    let delete_stats = deletes.stats().await?;

    if args.json {
        let out = serde_json::json!({
            "queues": [
                {
                    "name": upload_stats.queue_name,
                    "pending": upload_stats.pending,
                    "processing": upload_stats.processing,
                    "dead_letter": upload_stats.dead_letter,
                },
                {
                    "name": delete_stats.queue_name,
                    "pending": delete_stats.pending,
                    "processing": delete_stats.processing,
                    "dead_letter": delete_stats.dead_letter,
                },
            ]
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{:<24} {:>8} {:>12} {:>12}", "queue", "pending", "processing", "dead_letter");
        for stats in [&upload_stats, &delete_stats] {
            println!(
                "{:<24} {:>8} {:>12} {:>12}",
                stats.queue_name, stats.pending, stats.processing, stats.dead_letter
            );
        }
    }

    Ok(())
}

async fn run_recover_command(args: RecoverArgs) -> anyhow::Result<()> {
    let uploads: WorkQueue<UploadTask> = WorkQueue::connect(&args.redis_url, UPLOAD_QUEUE).await?;
    let deletes: WorkQueue<DeleteTask> = WorkQueue::connect(&args.redis_url, DELETE_QUEUE).await?;

    let recovered_uploads = uploads.recover().await?;
    let recovered_deletes = deletes.recover().await?;

    println!(
        "recovered {} upload and {} delete envelope(s)",
        recovered_uploads, recovered_deletes
    );

    Ok(())
}

async fn run_events_command(args: EventsArgs) -> anyhow::Result<()> {
    let db = Database::connect(&args.database_url).await?;
    let events = db.events_for_movie(args.movie).await?;

    if events.is_empty() {
        println!("no ingest events recorded for movie {}", args.movie);
        return Ok(());
    }

    for event in events {
        println!(
            "{} {:<16} external_id={} {}",
            event.created_at.to_rfc3339(),
            event.kind.as_str(),
            event.external_id.as_deref().unwrap_or("-"),
            event.detail.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

async fn run_create_movie_command(args: CreateMovieArgs) -> anyhow::Result<()> {
    let repository: Arc<dyn MovieStore> =
        Arc::new(MovieRepository::connect(&args.database_url, &args.redis_url).await?);
    let service = MovieService::new(repository);

    let draft = MovieDraft {
        title: args.title,
        duration_minutes: args.duration,
        indicative_rating_id: args.rating,
        images: args.images.into_iter().map(ImageUpload::from_path).collect(),
    };

    let movie = service.create(args.user, draft).await?;

    println!("created movie {} ({})", movie.id, movie.title);
    println!("images are attached asynchronously; check `events --movie {}`", movie.id);

    Ok(())
}
