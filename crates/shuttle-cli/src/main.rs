mod console;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use shuttle_core::{
    Priority, QueueConfig, QueueEvent, QueueService, QueueServiceBuilder, SubscriptionError,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SHUTDOWN_MESSAGE: &str = "Server is shutting down";

#[derive(Parser)]
#[command(name = "shuttle", version, about = "Single-worker priority task queue")]
struct Cli {
    /// Seed a task before scheduling starts (repeatable), e.g. `--task Render:7`
    #[arg(long = "task", value_name = "NAME:PRIORITY", value_parser = parse_task_arg)]
    tasks: Vec<(String, Priority)>,

    /// How long observers get to drain after the shutdown notice
    #[arg(long, env = "SHUTDOWN_GRACE_MS", default_value_t = 3000)]
    grace_ms: u64,

    /// Do not read commands from stdin
    #[arg(long)]
    no_console: bool,
}

fn parse_task_arg(raw: &str) -> anyhow::Result<(String, Priority)> {
    let Some((name, priority)) = raw.rsplit_once(':') else {
        bail!("expected NAME:PRIORITY, got {raw:?}");
    };
    let value: i64 = priority
        .trim()
        .parse()
        .with_context(|| format!("priority must be an integer, got {priority:?}"))?;
    let name = shuttle_core::domain::validate_task_name(name)?;
    Ok((name, Priority::try_from(value)?))
}

/// Log every event an observer would see; rejoin with a fresh snapshot on lag.
async fn observe(service: Arc<QueueService>) -> anyhow::Result<()> {
    loop {
        let mut sub = service.join().await?;
        loop {
            match sub.recv().await {
                Ok(event) => {
                    log_event(&event);
                    if event.is_terminal() {
                        return Ok(());
                    }
                }
                Err(SubscriptionError::Lagged(missed)) => {
                    warn!(missed, "observer lagged; rejoining");
                    break;
                }
                Err(SubscriptionError::Closed) => return Ok(()),
            }
        }
    }
}

fn log_event(event: &QueueEvent) {
    match event {
        QueueEvent::TaskAdded(task) => {
            info!(event = event.name(), id = %task.id.short(), name = %task.name, priority = task.priority.get())
        }
        QueueEvent::TaskProgress(task) => {
            info!(event = event.name(), id = %task.id.short(), name = %task.name, progress = task.progress)
        }
        QueueEvent::TaskCompleted(done) => {
            info!(event = event.name(), id = %done.id().short(), name = %done.task.name)
        }
        QueueEvent::QueueUpdate(state) => info!(
            event = event.name(),
            pending = state.tasks.len(),
            completed = state.completed_tasks.len(),
            current = ?state.current_task_id.map(|id| id.short())
        ),
        QueueEvent::ServerShutdown { message } => info!(event = event.name(), %message),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = QueueConfig::from_env()?;
    info!(
        aging_factor_secs = config.aging_factor_secs,
        increment_min = config.progress_increment_min,
        increment_max = config.progress_increment_max,
        interval_ms = config.tick_interval.as_millis() as u64,
        "config loaded"
    );

    let service = Arc::new(QueueServiceBuilder::new().config(config).build()?);
    let observer: JoinHandle<anyhow::Result<()>> = tokio::spawn(observe(Arc::clone(&service)));

    for (name, priority) in cli.tasks {
        service.submit(name, priority).await;
    }
    service.start_scheduling();

    let console = if cli.no_console {
        None
    } else {
        println!("{}", console::HELP);
        Some(tokio::spawn(console::run(Arc::clone(&service))))
    };

    tokio::signal::ctrl_c().await.context("listening for ctrl-c")?;
    info!("ctrl-c received");

    if let Some(console) = console {
        console.abort();
    }
    service.shutdown(SHUTDOWN_MESSAGE).await;

    let grace = Duration::from_millis(cli.grace_ms);
    match tokio::time::timeout(grace, observer).await {
        Ok(Ok(result)) => result?,
        Ok(Err(e)) => warn!(error = %e, "observer task failed"),
        Err(_) => warn!(grace_ms = cli.grace_ms, "grace period elapsed; forcing exit"),
    }

    info!("shuttle exited cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_arg_splits_on_last_colon() {
        let (name, priority) = parse_task_arg("build: release:9").unwrap();
        assert_eq!(name, "build: release");
        assert_eq!(priority.get(), 9);
    }

    #[test]
    fn task_arg_requires_valid_priority() {
        assert!(parse_task_arg("Render").is_err());
        assert!(parse_task_arg("Render:0").is_err());
        assert!(parse_task_arg(" :5").is_err());
    }

    #[test]
    fn cli_parses_repeated_tasks() {
        let cli = Cli::parse_from(["shuttle", "--task", "a:1", "--task", "b:10", "--no-console"]);
        assert_eq!(cli.tasks.len(), 2);
        assert!(cli.no_console);
    }
}
