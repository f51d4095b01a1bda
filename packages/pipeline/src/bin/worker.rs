// Worker process entry point.
//
// `worker run` starts the long-lived polling loop; the remaining
// subcommands are the operator surface for the queue (enqueue, status,
// reset, clear).

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use pipeline_core::collaborators::{CommandComposer, CommandScreenshot, CommandUploader};
use pipeline_core::deps::WorkerDeps;
use pipeline_core::handlers::{self, RenderRequest, RENDER};
use pipeline_core::tasks::{EnqueueResult, PgTaskStore, TaskSpec, Worker, WorkerConfig};
use pipeline_core::Config;

#[derive(Parser)]
#[command(name = "worker", about = "Lead-video pipeline worker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the worker loop until interrupted.
    Run {
        /// Lease identifier for this instance; defaults to a fresh UUID.
        #[arg(long)]
        worker_id: Option<String>,
        /// Poll once and exit (smoke runs).
        #[arg(long)]
        once: bool,
    },
    /// Enqueue a render task for a subject unless one is already live.
    EnqueueRender {
        #[arg(long)]
        subject: Uuid,
        #[arg(long)]
        website_url: String,
        #[arg(long)]
        ads_url: Option<String>,
        #[arg(long)]
        preset: String,
        #[arg(long)]
        title: Option<String>,
        /// Enqueue even if a live render already exists.
        #[arg(long)]
        force: bool,
    },
    /// Show every task recorded for a subject.
    Status {
        #[arg(long)]
        subject: Uuid,
    },
    /// Requeue all terminally failed tasks with a fresh budget.
    ResetFailed,
    /// Delete every task recorded for a subject.
    Clear {
        #[arg(long)]
        subject: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pipeline_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let store = PgTaskStore::new(pool);

    match cli.command {
        Command::Run { worker_id, once } => {
            tokio::fs::create_dir_all(&config.work_dir)
                .await
                .context("Failed to create work directory")?;

            let deps = Arc::new(WorkerDeps {
                store: store.clone(),
                screenshots: Arc::new(CommandScreenshot::new(config.screenshot_cmd.clone())),
                composer: Arc::new(CommandComposer::new(config.compose_cmd.clone())),
                storage: Arc::new(CommandUploader::new(config.upload_cmd.clone())),
                work_dir: config.work_dir.clone(),
                leases: config.leases,
            });

            let worker_config = WorkerConfig {
                worker_id: worker_id.unwrap_or_else(|| format!("worker-{}", Uuid::new_v4())),
                candidate_types: handlers::candidate_types(),
                poll_interval: config.poll_interval,
                sweep_interval: config.sweep_interval,
                error_backoff: Duration::from_secs(1),
            };

            let worker = Worker::with_config(
                store,
                Arc::new(handlers::build_registry()),
                deps,
                worker_config,
            );

            if once {
                let processed = worker.poll_once().await?;
                tracing::info!(processed, "single poll finished");
            } else {
                worker.run_until_shutdown().await?;
            }
        }
        Command::EnqueueRender {
            subject,
            website_url,
            ads_url,
            preset,
            title,
            force,
        } => {
            let request = RenderRequest {
                website_url,
                ads_url,
                preset,
                title,
            };
            let spec = TaskSpec::builder()
                .subject_id(subject)
                .task_type(RENDER)
                .payload(serde_json::to_value(&request)?)
                .max_attempts(config.max_attempts)
                .lease_seconds(config.leases.for_type(RENDER))
                .build();

            if force {
                let task = store.create(spec).await?;
                println!("created {}", task.id);
            } else {
                match store.create_if_absent(spec).await? {
                    EnqueueResult::Created(id) => println!("created {id}"),
                    EnqueueResult::Skipped => {
                        println!("skipped: a live render already exists for {subject}")
                    }
                }
            }
        }
        Command::Status { subject } => {
            let views = store.statuses_for_subject(subject).await?;
            println!("{}", serde_json::to_string_pretty(&views)?);
        }
        Command::ResetFailed => {
            let reset = store.reset_failed().await?;
            println!("requeued {reset} failed tasks");
        }
        Command::Clear { subject } => {
            let deleted = store.clear_subject(subject).await?;
            println!("deleted {deleted} tasks for {subject}");
        }
    }

    Ok(())
}
