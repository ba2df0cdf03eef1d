//! Scheduler - 非プリエンプティブな単一ワーカーのディスパッチ
//!
//! # 学習ポイント
//! - cursor は TaskId だけを弱参照として持つ（Task 本体は TaskStore が所有）
//! - cursor が指す task が pending から消えていたら、エラーではなく忘れて選び直す
//! - 1 tick の処理は同期関数なので、ロックを取った後に途中で中断されることはない
//!
//! # 1 tick のフロー
//! 1. cursor を解決（無ければ最上位の task を選ぶ。pending が空なら何もしない）
//! 2. increment を [min, max] から引く
//! 3. progress = min(100, progress + increment)
//! 4. 100 に達したら completed へ移し、cursor を Idle に戻す

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::debug;

use crate::config::QueueConfig;
use crate::domain::{CompletedTask, SchedulerState, Task, TaskId};
use crate::queue::{AgingPolicy, TaskStore};

/// The scheduler's only state: which task, if any, is being worked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerCursor {
    state: SchedulerState,
}

impl SchedulerCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Raw cursor value. May name a task that has since left the pending set;
    /// `resolve` heals that on the next tick.
    pub fn current(&self) -> Option<TaskId> {
        self.state.current()
    }

    /// First-come activation: a task submitted into an empty pending set becomes
    /// current right away, without waiting for a tick.
    pub fn on_submit(&mut self, id: TaskId, pending_was_empty: bool) {
        if pending_was_empty {
            self.state = SchedulerState::Processing(id);
        }
    }

    /// Decide which task to work on.
    ///
    /// - Processing(id) で id がまだ pending にある → そのまま（後から来た高優先度でも割り込まない）
    /// - Processing(id) で id が消えている → Idle に戻してから選び直す
    /// - Idle → effective priority 最上位を選ぶ（無ければ Idle のまま）
    pub fn resolve(
        &mut self,
        store: &TaskStore,
        policy: &AgingPolicy,
        now: DateTime<Utc>,
    ) -> Option<TaskId> {
        if let SchedulerState::Processing(id) = self.state {
            if store.contains(id) {
                return Some(id);
            }
            debug!(task_id = %id.short(), "cursor points at a task that is no longer pending; reselecting");
            self.state = SchedulerState::Idle;
        }

        let next = policy.top(store.pending(), now)?.id;
        self.state = SchedulerState::Processing(next);
        Some(next)
    }

    pub fn release(&mut self) {
        self.state = SchedulerState::Idle;
    }
}

/// Inclusive range the per-tick progress increment is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressIncrements {
    pub min: u8,
    pub max: u8,
}

impl ProgressIncrements {
    pub fn new(min: u8, max: u8) -> Self {
        Self {
            min: min.min(max),
            max,
        }
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> u8 {
        rng.gen_range(self.min..=self.max)
    }
}

impl From<&QueueConfig> for ProgressIncrements {
    fn from(config: &QueueConfig) -> Self {
        Self::new(config.progress_increment_min, config.progress_increment_max)
    }
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to work on.
    Idle,
    /// Progress advanced but the task is not finished.
    Advanced(Task),
    /// The task reached 100 and moved to the completed set.
    /// `last_progress` is the pending task as it looked at 100.
    Completed {
        last_progress: Task,
        task: CompletedTask,
    },
}

impl TickOutcome {
    pub fn is_idle(&self) -> bool {
        matches!(self, TickOutcome::Idle)
    }

    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            TickOutcome::Idle => None,
            TickOutcome::Advanced(task) => Some(task.id),
            TickOutcome::Completed { task, .. } => Some(task.id()),
        }
    }
}

/// Per-tick work. Pure over its arguments: no I/O, no events, cannot fail.
///
/// `draw_increment` is only called when there is a task to advance.
pub fn run_tick(
    store: &mut TaskStore,
    cursor: &mut SchedulerCursor,
    policy: &AgingPolicy,
    now: DateTime<Utc>,
    draw_increment: impl FnOnce() -> u8,
) -> TickOutcome {
    let Some(id) = cursor.resolve(store, policy, now) else {
        return TickOutcome::Idle;
    };

    let increment = draw_increment();
    let Some(task) = store.advance(id, increment) else {
        // resolve() just checked membership under the same &mut borrow
        cursor.release();
        return TickOutcome::Idle;
    };

    if !task.is_finished() {
        return TickOutcome::Advanced(task);
    }

    cursor.release();
    match store.complete(id, now) {
        Some(completed) => TickOutcome::Completed {
            last_progress: task,
            task: completed,
        },
        None => TickOutcome::Advanced(task),
    }
}
