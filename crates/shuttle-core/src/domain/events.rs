//! Events - オブザーバに配信するイベント
//!
//! Wire shape: `{ "type": "<event name>", "data": <payload> }`

use serde::{Deserialize, Serialize};

use super::{CompletedTask, QueueState, Task};

/// QueueEvent は Task Store / Scheduler の状態変化を表す
///
/// # 配信順（1 回の操作あたり）
/// - submit: TaskAdded -> QueueUpdate
/// - clear completed: QueueUpdate
/// - tick（進捗のみ）: TaskProgress -> QueueUpdate
/// - tick（完了）: TaskProgress -> TaskCompleted -> QueueUpdate
/// - shutdown: ServerShutdown（1 回だけ）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum QueueEvent {
    TaskAdded(Task),
    TaskProgress(Task),
    TaskCompleted(CompletedTask),
    QueueUpdate(QueueState),
    ServerShutdown { message: String },
}

impl QueueEvent {
    pub fn name(&self) -> &'static str {
        match self {
            QueueEvent::TaskAdded(_) => "task_added",
            QueueEvent::TaskProgress(_) => "task_progress",
            QueueEvent::TaskCompleted(_) => "task_completed",
            QueueEvent::QueueUpdate(_) => "queue_update",
            QueueEvent::ServerShutdown { .. } => "server_shutdown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueEvent::ServerShutdown { .. })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Priority, TaskId};
    use chrono::Utc;
    use ulid::Ulid;

    #[test]
    fn wire_shape_uses_type_and_data() {
        let task = Task::new(TaskId::from_ulid(Ulid::new()), "Encode", Priority::MAX, Utc::now());
        let json = serde_json::to_value(QueueEvent::TaskAdded(task)).unwrap();

        assert_eq!(json["type"], "task_added");
        assert_eq!(json["data"]["name"], "Encode");
        assert_eq!(json["data"]["priority"], 10);
    }

    #[test]
    fn shutdown_carries_message() {
        let event = QueueEvent::ServerShutdown {
            message: "bye".to_string(),
        };
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();

        assert_eq!(json, serde_json::json!({ "type": "server_shutdown", "data": { "message": "bye" } }));
        assert!(event.is_terminal());
    }

    #[test]
    fn name_matches_serialized_tag() {
        let events = vec![
            QueueEvent::QueueUpdate(QueueState::default()),
            QueueEvent::ServerShutdown {
                message: String::new(),
            },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.name());
        }
    }
}
