//! Status - 件数サマリ

use serde::{Deserialize, Serialize};

use crate::domain::QueueState;

/// Counts for a one-line status footer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub completed: usize,
    /// A current task id is set.
    pub processing: bool,
}

impl From<&QueueState> for QueueStats {
    fn from(state: &QueueState) -> Self {
        Self {
            pending: state.tasks.len(),
            completed: state.completed_tasks.len(),
            processing: state.current_task_id.is_some(),
        }
    }
}
