/// Emberfeed - ephemeral content core
///
/// A short-form video social service where content expires on schedule:
/// posts live 24 hours, comments 7 days, upvotes buy comments more time,
/// and toxic comments take their post down with them.

mod api;
mod auth;
mod blob_store;
mod comments;
mod config;
mod context;
mod db;
mod error;
mod feed;
mod follows;
mod identity;
mod jobs;
mod lifecycle;
mod posts;
mod reaper;
mod server;
mod users;
mod validation;

use clap::{Parser, Subcommand};
use config::ServerConfig;
use context::AppContext;
use error::ApiResult;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "emberfeed",
    about = "Ephemeral content core for a short-form video social service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP listener and background jobs
    Serve,
    /// Run a single reaper sweep and exit
    Reap,
    /// Apply schema migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "emberfeed=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Serve => serve().await,
        Command::Reap => reap().await,
        Command::Migrate => migrate().await,
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {}", e);
            std::process::ExitCode::FAILURE
        }
    }
}

/// Run the service: migrations, background jobs, HTTP listener
async fn serve() -> ApiResult<()> {
    let config = ServerConfig::from_env()?;

    let ctx = AppContext::new(config).await?;
    db::run_migrations(&ctx.db).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = Arc::new(jobs::JobScheduler::new(
        Arc::new(ctx.clone()),
        shutdown_rx.clone(),
    ));
    scheduler.start();

    // Translate ctrl-c into the shutdown signal shared by the HTTP server
    // and the job loops.
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);
        }
    });

    server::serve(ctx, shutdown_rx).await
}

/// Run a single reaper sweep and report it
async fn reap() -> ApiResult<()> {
    let config = ServerConfig::from_env()?;
    let ctx = AppContext::new(config).await?;
    db::run_migrations(&ctx.db).await?;

    let (_tx, mut rx) = watch::channel(false);
    let summary = ctx.reaper.run(&mut rx).await?;

    info!(
        "Sweep complete: {} posts and {} comments expired in {}ms",
        summary.posts_expired,
        summary.comments_expired,
        (summary.finished_at - summary.started_at).num_milliseconds()
    );

    if !summary.is_clean() {
        for err in &summary.errors {
            error!("sweep error: {}", err);
        }
        return Err(error::ApiError::Internal(format!(
            "Sweep finished with {} error(s)",
            summary.errors.len()
        )));
    }

    Ok(())
}

/// Apply migrations and exit
async fn migrate() -> ApiResult<()> {
    let config = ServerConfig::from_env()?;
    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool).await?;
    info!("Migrations applied");
    Ok(())
}
