//! State - キューの読み取りビューとスケジューラの状態

use serde::{Deserialize, Serialize};

use super::{CompletedTask, Task, TaskId};

/// Read-only projection of the whole queue at one instant.
///
/// Stored nowhere; recomputed from the Task Store on demand.
/// - `tasks`: effective priority 降順
/// - `completed_tasks`: completed_at 降順
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueState {
    pub tasks: Vec<Task>,
    pub completed_tasks: Vec<CompletedTask>,
    pub current_task_id: Option<TaskId>,
}

impl QueueState {
    pub fn current_task(&self) -> Option<&Task> {
        let id = self.current_task_id?;
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.completed_tasks.is_empty()
    }
}

/// Scheduler state (non-preemptive, single worker).
///
/// State transitions:
/// - Idle -> Processing(id): selection on a tick, or first submit into an empty queue
/// - Processing(id) -> Processing(id): id is still pending (never preempted)
/// - Processing(id) -> Idle: task completed, or id vanished from pending
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchedulerState {
    #[default]
    Idle,
    Processing(TaskId),
}

impl SchedulerState {
    pub fn current(self) -> Option<TaskId> {
        match self {
            SchedulerState::Idle => None,
            SchedulerState::Processing(id) => Some(id),
        }
    }

    pub fn is_idle(self) -> bool {
        matches!(self, SchedulerState::Idle)
    }
}
