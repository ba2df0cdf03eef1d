//! In-memory task store.

use chrono::{DateTime, Utc};

use super::AgingPolicy;
use crate::domain::{CompletedTask, MAX_PROGRESS, Priority, QueueState, Task, TaskId};
use crate::ports::IdGenerator;

/// TaskStore は pending / completed の 2 つの集合を所有する
///
/// # 不変条件
/// - 1 つの TaskId は pending か completed のどちらか一方にしか存在しない
/// - pending は挿入順で保持する（同点時の順序に使う）
/// - completed は完了順で保持し、読み出し時に completed_at 降順に並べる
/// - スケジューラの cursor はここでは持たない
pub struct TaskStore {
    /// Pending tasks in insertion order.
    pending: Vec<Task>,

    /// Completed tasks in completion order.
    completed: Vec<CompletedTask>,

    ids: Box<dyn IdGenerator>,
}

impl TaskStore {
    pub fn new(ids: Box<dyn IdGenerator>) -> Self {
        Self {
            pending: Vec::new(),
            completed: Vec::new(),
            ids,
        }
    }

    /// Append a new task with a fresh id, progress 0 and `created_at = now`.
    ///
    /// Input is assumed valid (`Priority` is range-checked by construction; the
    /// name is checked by the caller).
    pub fn add(&mut self, name: impl Into<String>, priority: Priority, now: DateTime<Utc>) -> Task {
        let task = Task::new(self.ids.generate_task_id(), name, priority, now);
        self.pending.push(task.clone());
        task
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn completed_len(&self) -> usize {
        self.completed.len()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.pending.iter().find(|t| t.id == id)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.get(id).is_some()
    }

    /// Pending tasks in insertion order (unordered view for the priority engine).
    pub fn pending(&self) -> &[Task] {
        &self.pending
    }

    pub fn list_pending(&self, policy: &AgingPolicy, now: DateTime<Utc>) -> Vec<Task> {
        policy.order(&self.pending, now)
    }

    /// Completed tasks, most recently completed first.
    pub fn list_completed(&self) -> Vec<CompletedTask> {
        let mut completed: Vec<_> = self.completed.iter().rev().cloned().collect();
        // stable: equal timestamps keep "later completion first"
        completed.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        completed
    }

    /// Add `increment` to the task's progress, capped at 100.
    /// Returns the updated task, or None if `id` is not pending.
    pub fn advance(&mut self, id: TaskId, increment: u8) -> Option<Task> {
        let task = self.pending.iter_mut().find(|t| t.id == id)?;
        task.progress = task.progress.saturating_add(increment).min(MAX_PROGRESS);
        Some(task.clone())
    }

    /// Move a pending task to the completed set. Happens at most once per id.
    pub fn complete(&mut self, id: TaskId, now: DateTime<Utc>) -> Option<CompletedTask> {
        let index = self.pending.iter().position(|t| t.id == id)?;
        let task = self.pending.remove(index);
        let done = CompletedTask::from_task(task, now);
        self.completed.push(done.clone());
        Some(done)
    }

    /// Empty the completed set. Pending tasks are never touched.
    pub fn clear_completed(&mut self) -> usize {
        let cleared = self.completed.len();
        self.completed.clear();
        cleared
    }

    /// Drop everything (pending and completed).
    pub fn reset(&mut self) {
        self.pending.clear();
        self.completed.clear();
    }

    pub fn snapshot(
        &self,
        policy: &AgingPolicy,
        now: DateTime<Utc>,
        current_task_id: Option<TaskId>,
    ) -> QueueState {
        QueueState {
            tasks: self.list_pending(policy, now),
            completed_tasks: self.list_completed(),
            current_task_id,
        }
    }
}
