use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use pipeline_engine::cli::commands::{GetCommand, ListCommand, RetryCommand, TriggerCommand, WorkerCommand};
use pipeline_engine::cli::output::*;
use pipeline_engine::cli::{Cli, Command};
use pipeline_engine::config::Config;
use pipeline_engine::core::registry::Registry;
use pipeline_engine::execution::{Claimer, Metrics, RecoveryOrchestrator};
use pipeline_engine::facade::Facade;
use pipeline_engine::persistence::{InMemoryStore, Store};
use pipeline_engine::pipelines;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();
    let config = Config::from_env();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        config.log_level.parse().unwrap_or(Level::INFO)
    };
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set logging subscriber")?;
    let store = build_store(&config).await?;
    let registry = Arc::new(Registry::new());
    pipelines::register_all(&registry).context("failed to register demonstration pipelines")?;
    let facade = Facade::new(Arc::clone(&store), Arc::clone(&registry));

    match &cli.command {
        Command::Worker(cmd) => run_worker(cmd, config, store, registry).await?,
        Command::Trigger(cmd) => trigger_run(cmd, &facade).await?,
        Command::List(cmd) => list_pipelines(cmd, &facade).await?,
        Command::Get(cmd) => get_run(cmd, &facade).await?,
        Command::Retry(cmd) => retry_run(cmd, &facade).await?,
    }

    Ok(())
}

/// `DATABASE_URL` selects the backend: a Postgres URL (`postgres://...`)
/// connects to `PostgresStore`; anything else (including unset) falls back
/// to a single-process `InMemoryStore`, useful for local experimentation
/// without a database.
async fn build_store(config: &Config) -> Result<Arc<dyn Store>> {
    let is_postgres_url =
        config.database_url.starts_with("postgres://") || config.database_url.starts_with("postgresql://");

    if is_postgres_url {
        if let Some(store) = connect_postgres(&config.database_url).await? {
            return Ok(store);
        }
    }

    warn!("DATABASE_URL is not a usable postgres:// URL; using an in-memory store (not durable across restarts)");
    Ok(Arc::new(InMemoryStore::new()))
}

#[cfg(feature = "postgres")]
async fn connect_postgres(database_url: &str) -> Result<Option<Arc<dyn Store>>> {
    let store = pipeline_engine::persistence::PostgresStore::connect(database_url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(Some(Arc::new(store)))
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(_database_url: &str) -> Result<Option<Arc<dyn Store>>> {
    Ok(None)
}

async fn run_worker(
    cmd: &WorkerCommand,
    config: Config,
    store: Arc<dyn Store>,
    registry: Arc<Registry>,
) -> Result<()> {
    let worker_count = cmd.workers.unwrap_or(config.claimer_worker_count).max(1);
    println!("{} Starting {} claimer loop(s)", ROCKET, style(worker_count).bold());

    let metrics = Arc::new(Metrics::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut claimer_handles = Vec::with_capacity(worker_count);
    for id in 0..worker_count {
        let claimer = Claimer::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&metrics),
            config.worker_poll_interval,
        );
        let rx = shutdown_rx.clone();
        claimer_handles.push(tokio::spawn(async move {
            info!(claimer = id, "claimer loop starting");
            claimer.run(rx).await;
            info!(claimer = id, "claimer loop stopped");
        }));
    }

    let recovery = RecoveryOrchestrator::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        config.recovery_staleness_threshold,
    );
    let recovery_interval = config.recovery_interval;
    let mut recovery_shutdown = shutdown_rx.clone();
    let recovery_handle = tokio::spawn(async move {
        recovery.scan().await;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(recovery_interval) => {
                    recovery.scan().await;
                }
                _ = recovery_shutdown.changed() => {
                    if *recovery_shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    });

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    println!("\n{} Shutting down (letting in-flight runs finish)...", INFO);
    let _ = shutdown_tx.send(true);

    for handle in claimer_handles {
        let _ = handle.await;
    }
    let _ = recovery_handle.await;

    let snapshot = metrics.snapshot().await;
    println!(
        "{} executed={} succeeded={} failed={}",
        INFO, snapshot.executed, snapshot.succeeded, snapshot.failed
    );

    Ok(())
}

async fn trigger_run(cmd: &TriggerCommand, facade: &Facade) -> Result<()> {
    let run_id = facade
        .trigger_run(&cmd.pipeline, &cmd.triggered_by, Default::default())
        .await
        .context("failed to trigger run")?;
    println!(
        "{} Triggered {} (run {})",
        CHECK,
        style(&cmd.pipeline).bold(),
        style(run_id).cyan()
    );
    Ok(())
}

async fn list_pipelines(cmd: &ListCommand, facade: &Facade) -> Result<()> {
    let pipelines = facade.list_pipelines().await.context("failed to list pipelines")?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&pipelines)?);
        return Ok(());
    }

    if pipelines.is_empty() {
        println!("{} No pipelines registered", INFO);
        return Ok(());
    }

    println!("{} Registered pipelines:", INFO);
    for pipeline in &pipelines {
        println!("{}", format_pipeline_summary(pipeline));
    }
    Ok(())
}

async fn get_run(cmd: &GetCommand, facade: &Facade) -> Result<()> {
    let run_id = uuid::Uuid::parse_str(&cmd.run_id).context("invalid run id")?;
    let detail = facade.get_run(run_id).await.context("failed to load run")?;

    if cmd.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "run": detail.run,
                "steps": detail.steps,
                "pipeline": detail.pipeline,
            }))?
        );
        return Ok(());
    }

    print!("{}", format_run_detail(&detail));
    Ok(())
}

async fn retry_run(cmd: &RetryCommand, facade: &Facade) -> Result<()> {
    let run_id = uuid::Uuid::parse_str(&cmd.run_id).context("invalid run id")?;
    let new_run_id = facade.retry_run(run_id).await.context("failed to retry run")?;
    println!(
        "{} Retried run {} as new run {}",
        CHECK,
        style(&run_id.to_string()[..8]).dim(),
        style(new_run_id).cyan()
    );
    Ok(())
}
