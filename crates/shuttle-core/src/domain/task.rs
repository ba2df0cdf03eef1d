use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::TaskId;
use super::errors::ShuttleError;

/// Upper bound of `Task::progress`.
pub const MAX_PROGRESS: u8 = 100;

/// Stated priority of a task, always within `1..=10` (higher = more important).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const MIN: Priority = Priority(1);
    pub const MAX: Priority = Priority(10);

    pub fn new(value: u8) -> Result<Self, ShuttleError> {
        Self::try_from(i64::from(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Priority {
    type Error = ShuttleError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (i64::from(Self::MIN.0)..=i64::from(Self::MAX.0)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ShuttleError::InvalidPriority(value))
        }
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> Self {
        p.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A pending work item.
///
/// `progress` starts at 0 and only grows (see `TaskStore::advance`) until the task
/// leaves the pending set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub priority: Priority,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: TaskId, name: impl Into<String>, priority: Priority, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            priority,
            progress: 0,
            created_at: now,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.progress >= MAX_PROGRESS
    }
}

/// Trim a user-supplied task name; whitespace-only names are rejected.
pub fn validate_task_name(raw: &str) -> Result<String, ShuttleError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ShuttleError::EmptyTaskName);
    }
    Ok(name.to_string())
}

/// Snapshot of a finished task. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTask {
    #[serde(flatten)]
    pub task: Task,
    pub completed_at: DateTime<Utc>,
}

impl CompletedTask {
    /// Freeze `task` as completed at `now`.
    ///
    /// progress は 100 に揃え、completed_at は created_at より前にならないよう丸める。
    pub fn from_task(mut task: Task, now: DateTime<Utc>) -> Self {
        task.progress = MAX_PROGRESS;
        let completed_at = now.max(task.created_at);
        Self { task, completed_at }
    }

    pub fn id(&self) -> TaskId {
        self.task.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;
    use ulid::Ulid;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[rstest]
    #[case::lowest(1)]
    #[case::middle(5)]
    #[case::highest(10)]
    fn priority_accepts_range(#[case] value: u8) {
        assert_eq!(Priority::new(value).unwrap().get(), value);
    }

    #[rstest]
    #[case::zero(0)]
    #[case::eleven(11)]
    #[case::negative(-3)]
    fn priority_rejects_out_of_range(#[case] value: i64) {
        assert_eq!(
            Priority::try_from(value),
            Err(ShuttleError::InvalidPriority(value))
        );
    }

    #[test]
    fn priority_deserialization_is_validated() {
        assert!(serde_json::from_str::<Priority>("7").is_ok());
        assert!(serde_json::from_str::<Priority>("42").is_err());
    }

    #[rstest]
    #[case::plain("Render", "Render")]
    #[case::padded("  Encode video \n", "Encode video")]
    fn task_name_is_trimmed(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(validate_task_name(raw).unwrap(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::blank("   \t")]
    fn blank_task_name_is_rejected(#[case] raw: &str) {
        assert_eq!(validate_task_name(raw), Err(ShuttleError::EmptyTaskName));
    }

    #[test]
    fn new_task_starts_at_zero_progress() {
        let task = Task::new(TaskId::from_ulid(Ulid::new()), "Render", Priority::MAX, at(0));
        assert_eq!(task.progress, 0);
        assert!(!task.is_finished());
    }

    #[test]
    fn task_serializes_with_camel_case_fields() {
        let task = Task::new(TaskId::from_ulid(Ulid::new()), "Render", Priority::MIN, at(0));
        let json = serde_json::to_value(&task).unwrap();

        assert_eq!(json["name"], "Render");
        assert_eq!(json["priority"], 1);
        assert_eq!(json["progress"], 0);
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn completed_task_is_pinned_to_full_progress() {
        let mut task = Task::new(TaskId::from_ulid(Ulid::new()), "Render", Priority::MIN, at(0));
        task.progress = 95;

        let done = CompletedTask::from_task(task, at(30));
        assert_eq!(done.task.progress, MAX_PROGRESS);
        assert_eq!(done.completed_at, at(30));

        let json = serde_json::to_value(&done).unwrap();
        assert_eq!(json["progress"], 100);
        assert!(json.get("completedAt").is_some());
    }

    #[test]
    fn completed_at_never_precedes_created_at() {
        let task = Task::new(TaskId::from_ulid(Ulid::new()), "Skewed", Priority::MIN, at(10));
        let done = CompletedTask::from_task(task, at(5));
        assert_eq!(done.completed_at, at(10));
    }
}
