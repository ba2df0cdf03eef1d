//! QueueEngine - 状態変更を 1 本の critical section に直列化するコア
//!
//! # 設計原則
//! - TaskStore と SchedulerCursor を 1 つの Mutex の中にまとめる
//!   （submit / clear / tick が互いの read-modify-write に割り込めない）
//! - イベントはロックを持ったまま publish する → 全オブザーバが生成順に受け取る
//! - 変更操作は必ず最後に queue_update（フルスナップショット）を publish して終わる
//! - ロック内では await しない（critical section は同期処理のみ）

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::scheduler::{ProgressIncrements, SchedulerCursor, TickOutcome, run_tick};
use crate::config::{ConfigPatch, QueueConfig};
use crate::domain::{
    CompletedTask, Priority, QueueEvent, QueueState, SchedulerState, ShuttleError, Task,
};
use crate::ports::{Clock, EventSink, IdGenerator};
use crate::queue::{AgingPolicy, TaskStore};

/// Everything behind the engine lock.
struct EngineState {
    store: TaskStore,
    cursor: SchedulerCursor,
    config: QueueConfig,
    policy: AgingPolicy,
    rng: StdRng,
    shutdown_announced: bool,
}

impl EngineState {
    fn snapshot(&self, now: DateTime<Utc>) -> QueueState {
        self.store.snapshot(&self.policy, now, self.cursor.current())
    }
}

/// Result of `QueueEngine::configure`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub config: QueueConfig,
    /// Tick interval in force just before this update.
    pub previous_interval: Duration,
}

impl ConfigUpdate {
    pub fn interval_changed(&self) -> bool {
        self.config.tick_interval != self.previous_interval
    }
}

/// The serialized queue core. Cheap to clone (shared state).
#[derive(Clone)]
pub struct QueueEngine {
    state: Arc<Mutex<EngineState>>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl QueueEngine {
    /// `config` must already be validated.
    pub fn new(
        config: QueueConfig,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
        ids: Box<dyn IdGenerator>,
        rng: StdRng,
    ) -> Self {
        let state = EngineState {
            store: TaskStore::new(ids),
            cursor: SchedulerCursor::new(),
            policy: AgingPolicy::new(config.aging_factor_secs),
            config,
            rng,
            shutdown_announced: false,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            sink,
            clock,
        }
    }

    fn publish(&self, event: QueueEvent) {
        match &event {
            QueueEvent::TaskAdded(task) => debug!(
                event = event.name(),
                task_id = %task.id.short(),
                name = %task.name,
                priority = task.priority.get(),
                "→"
            ),
            QueueEvent::TaskProgress(task) => debug!(
                event = event.name(),
                task_id = %task.id.short(),
                progress = task.progress,
                "→"
            ),
            QueueEvent::TaskCompleted(done) => debug!(
                event = event.name(),
                task_id = %done.id().short(),
                name = %done.task.name,
                "→"
            ),
            QueueEvent::QueueUpdate(state) => debug!(
                event = event.name(),
                tasks = state.tasks.len(),
                completed = state.completed_tasks.len(),
                "→"
            ),
            QueueEvent::ServerShutdown { message } => {
                debug!(event = event.name(), %message, "→")
            }
        }
        self.sink.publish(event);
    }

    /// Add a task. Publishes `task_added` then `queue_update`.
    ///
    /// If the pending set was empty, the new task becomes current immediately.
    pub async fn submit(&self, name: impl Into<String>, priority: Priority) -> Task {
        let mut state = self.state.lock().await;
        let now = self.clock.now();

        let was_empty = state.store.is_empty();
        let task = state.store.add(name, priority, now);
        state.cursor.on_submit(task.id, was_empty);

        self.publish(QueueEvent::TaskAdded(task.clone()));
        self.publish(QueueEvent::QueueUpdate(state.snapshot(now)));
        task
    }

    /// Empty the completed set. Publishes `queue_update`. Returns how many were cleared.
    pub async fn clear_completed(&self) -> usize {
        let mut state = self.state.lock().await;
        let now = self.clock.now();

        let cleared = state.store.clear_completed();
        debug!(cleared, "completed tasks cleared");

        self.publish(QueueEvent::QueueUpdate(state.snapshot(now)));
        cleared
    }

    /// Drop all pending and completed tasks and forget the cursor.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        let now = self.clock.now();

        state.store.reset();
        state.cursor.release();

        self.publish(QueueEvent::QueueUpdate(state.snapshot(now)));
    }

    /// One scheduler tick (see `scheduler::run_tick`).
    ///
    /// Events: `task_progress`, then `task_completed` if the task finished, then
    /// `queue_update`. An idle tick publishes nothing.
    pub async fn tick(&self) -> TickOutcome {
        let mut guard = self.state.lock().await;
        let now = self.clock.now();

        let EngineState {
            store,
            cursor,
            config,
            policy,
            rng,
            ..
        } = &mut *guard;
        let increments = ProgressIncrements::from(&*config);
        let outcome = run_tick(store, cursor, policy, now, || increments.draw(rng));

        match &outcome {
            TickOutcome::Idle => return outcome,
            TickOutcome::Advanced(task) => {
                self.publish(QueueEvent::TaskProgress(task.clone()));
            }
            TickOutcome::Completed {
                last_progress,
                task,
            } => {
                self.publish(QueueEvent::TaskProgress(last_progress.clone()));
                info!(task_id = %task.id().short(), name = %task.task.name, "task completed");
                self.publish(QueueEvent::TaskCompleted(task.clone()));
            }
        }
        self.publish(QueueEvent::QueueUpdate(guard.snapshot(now)));
        outcome
    }

    pub async fn queue_state(&self) -> QueueState {
        let state = self.state.lock().await;
        state.snapshot(self.clock.now())
    }

    pub async fn pending_tasks(&self) -> Vec<Task> {
        let state = self.state.lock().await;
        state.store.list_pending(&state.policy, self.clock.now())
    }

    pub async fn completed_tasks(&self) -> Vec<CompletedTask> {
        let state = self.state.lock().await;
        state.store.list_completed()
    }

    /// The task the cursor names, if it is still pending.
    pub async fn current_task(&self) -> Option<Task> {
        let state = self.state.lock().await;
        let id = state.cursor.current()?;
        state.store.get(id).cloned()
    }

    pub async fn scheduler_state(&self) -> SchedulerState {
        self.state.lock().await.cursor.state()
    }

    pub async fn config(&self) -> QueueConfig {
        self.state.lock().await.config.clone()
    }

    pub async fn tick_interval(&self) -> Duration {
        self.state.lock().await.config.tick_interval
    }

    /// Apply a partial config. On error the current config is kept.
    ///
    /// The previous tick interval is read in the same critical section as the
    /// update, so callers can tell whether a running loop needs a new period.
    pub async fn configure(&self, patch: &ConfigPatch) -> Result<ConfigUpdate, ShuttleError> {
        let mut state = self.state.lock().await;
        let merged = state.config.apply(patch)?;
        let previous_interval = state.config.tick_interval;
        state.policy = AgingPolicy::new(merged.aging_factor_secs);
        state.config = merged.clone();
        debug!(?merged, "config updated");
        Ok(ConfigUpdate {
            config: merged,
            previous_interval,
        })
    }

    /// Run `attach` and take a snapshot inside one critical section.
    ///
    /// `attach` typically subscribes to the fan-out channel: since every publish
    /// happens under the same lock, the subscriber sees exactly the events that
    /// come after the returned snapshot.
    pub async fn catch_up<R>(&self, attach: impl FnOnce() -> R) -> (QueueState, R) {
        let state = self.state.lock().await;
        let attached = attach();
        (state.snapshot(self.clock.now()), attached)
    }

    /// Publish the terminal `server_shutdown` notification. Only the first call
    /// publishes; later calls return false.
    pub async fn announce_shutdown(&self, message: impl Into<String>) -> bool {
        let mut state = self.state.lock().await;
        if state.shutdown_announced {
            return false;
        }
        state.shutdown_announced = true;
        self.publish(QueueEvent::ServerShutdown {
            message: message.into(),
        });
        true
    }
}
