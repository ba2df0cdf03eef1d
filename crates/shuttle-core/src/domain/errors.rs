//! Errors - エラー型
//!
//! コアが呼び出し側に返すエラーは「入力の形が不正」と「設定が不正」だけです。
//! 空キューでの tick、二重 start/stop、消えた cursor などは正常系として扱います。

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShuttleError {
    #[error("priority must be an integer between 1 and 10, got {0}")]
    InvalidPriority(i64),

    #[error("task name must not be empty")]
    EmptyTaskName,

    #[error("invalid config: {field} {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },

    /// join() on a service built without a fan-out sink.
    #[error("broadcast is disabled for this service")]
    BroadcastDisabled,
}

impl ShuttleError {
    pub(crate) fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors seen by an observer while reading its event stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    /// The observer fell behind and `n` events were dropped for it.
    /// Recover by joining again (fresh snapshot), not by replay.
    #[error("observer lagged behind by {0} events; rejoin for a fresh snapshot")]
    Lagged(u64),

    #[error("event stream closed")]
    Closed,
}
