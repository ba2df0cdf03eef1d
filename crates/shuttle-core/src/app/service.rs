//! QueueService - 外部インターフェースのファサード
//!
//! transport（CLI, WebSocket など）から呼ばれる操作をまとめたもの。
//! 状態変更はすべて QueueEngine に委譲し、タイマーは TickDriver が持つ。

use tracing::info;

use super::engine::QueueEngine;
use super::gateway::{BroadcastGateway, Subscription};
use super::status::QueueStats;
use super::tick_loop::TickDriver;
use crate::config::{ConfigPatch, QueueConfig};
use crate::domain::{CompletedTask, Priority, QueueState, ShuttleError, Task, validate_task_name};

pub struct QueueService {
    engine: QueueEngine,
    driver: TickDriver,
    gateway: Option<BroadcastGateway>,
}

impl QueueService {
    pub(crate) fn new(engine: QueueEngine, gateway: Option<BroadcastGateway>) -> Self {
        Self {
            driver: TickDriver::new(engine.clone()),
            engine,
            gateway,
        }
    }

    /// Add a task. The caller guarantees the input is already validated.
    pub async fn submit(&self, name: impl Into<String>, priority: Priority) -> Task {
        self.engine.submit(name, priority).await
    }

    /// Validate raw transport input, then submit.
    pub async fn submit_checked(&self, name: &str, priority: i64) -> Result<Task, ShuttleError> {
        let name = validate_task_name(name)?;
        let priority = Priority::try_from(priority)?;
        Ok(self.submit(name, priority).await)
    }

    pub async fn clear_completed(&self) -> usize {
        self.engine.clear_completed().await
    }

    pub async fn queue_state(&self) -> QueueState {
        self.engine.queue_state().await
    }

    /// Pending tasks in effective-priority order.
    pub async fn pending_tasks(&self) -> Vec<Task> {
        self.engine.pending_tasks().await
    }

    /// Completed tasks, newest first.
    pub async fn completed_tasks(&self) -> Vec<CompletedTask> {
        self.engine.completed_tasks().await
    }

    pub async fn current_task(&self) -> Option<Task> {
        self.engine.current_task().await
    }

    pub async fn stats(&self) -> QueueStats {
        QueueStats::from(&self.queue_state().await)
    }

    /// Stop scheduling and drop every task.
    pub async fn reset(&self) {
        self.driver.stop_and_wait().await;
        self.engine.reset().await;
    }

    /// Returns false if scheduling was already running.
    pub fn start_scheduling(&self) -> bool {
        self.driver.start()
    }

    /// Returns false if scheduling was not running. Does not wait for an in-flight tick.
    pub fn stop_scheduling(&self) -> bool {
        self.driver.stop()
    }

    pub async fn stop_scheduling_and_wait(&self) -> bool {
        self.driver.stop_and_wait().await
    }

    pub fn is_scheduling(&self) -> bool {
        self.driver.is_running()
    }

    pub async fn config(&self) -> QueueConfig {
        self.engine.config().await
    }

    /// Apply a partial config.
    ///
    /// A changed tick interval restarts a running loop; everything else takes effect
    /// on the next tick.
    pub async fn configure(&self, patch: &ConfigPatch) -> Result<QueueConfig, ShuttleError> {
        let update = self.engine.configure(patch).await?;
        if update.interval_changed() {
            self.driver.restart().await;
        }
        Ok(update.config)
    }

    /// Attach an observer (snapshot first, then live events).
    pub async fn join(&self) -> Result<Subscription, ShuttleError> {
        let gateway = self.gateway.as_ref().ok_or(ShuttleError::BroadcastDisabled)?;
        Ok(gateway.join(&self.engine).await)
    }

    pub fn observer_count(&self) -> usize {
        self.gateway.as_ref().map_or(0, BroadcastGateway::observer_count)
    }

    /// Graceful shutdown, first half: stop scheduling (waiting for the in-flight
    /// tick), then publish `server_shutdown` once. The grace period belongs to the host.
    pub async fn shutdown(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        info!(%reason, "shutting down");
        self.driver.stop_and_wait().await;
        self.engine.announce_shutdown(reason).await
    }

    pub fn engine(&self) -> &QueueEngine {
        &self.engine
    }
}
