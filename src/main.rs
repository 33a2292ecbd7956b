mod config;
mod db;
mod error;
mod models;
mod processor;
mod scheduler;

use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use config::AppConfig;
use db::PgAlertStore;
use processor::{AlertEngine, SystemClock};
use scheduler::{CleanupJob, GenerateJob, Scheduler};
use serde::Serialize;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "fleet-doc-alerts", about = "Document expiry alerts for the fleet database")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the generator and cleaner on their schedules (default)
    Serve,
    /// Run one alert generation pass
    Generate,
    /// Run one invalid alert cleanup pass
    Cleanup,
    /// List active alerts
    List,
    /// Mark an alert as sent
    Ack { id: i64 },
    /// Count documents per bucket and status
    Summary,
}

type Engine = AlertEngine<PgAlertStore, SystemClock>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    // Init DB
    let pool = db::init_pool(
        &config.database_url,
        config.db_max_connections,
        config.db_acquire_timeout,
    )
    .await?;
    info!("Connected to database");

    let engine = Arc::new(AlertEngine::new(
        PgAlertStore::new(pool),
        SystemClock,
        config.timezone,
    ));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, engine).await?,
        Command::Generate => print_json(&engine.generate_alerts().await?)?,
        Command::Cleanup => print_json(&engine.cleanup_invalid_alerts().await?)?,
        Command::List => print_json(&engine.active_alerts().await?)?,
        Command::Ack { id } => print_json(&engine.acknowledge(id).await?)?,
        Command::Summary => print_json(&engine.summarize().await?)?,
    }

    Ok(())
}

async fn serve(config: &AppConfig, engine: Arc<Engine>) -> anyhow::Result<()> {
    info!("Starting document alert scheduler...");

    let mut scheduler = Scheduler::new(config.timezone);
    scheduler.register(&config.generate_cron, Arc::new(GenerateJob(engine.clone())))?;
    scheduler.register(&config.cleanup_cron, Arc::new(CleanupJob(engine)))?;

    for name in scheduler.job_names() {
        if let Some(next_run) = scheduler.next_fire(name, Utc::now()) {
            info!(job = name, %next_run, "Job scheduled");
        }
    }

    if config.run_generate_on_start {
        if let Some(Err(e)) = scheduler.trigger("generate_alerts").await {
            error!("Initial alert generation failed: {}", e);
        }
    }

    tokio::select! {
        _ = scheduler.run() => {}
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
