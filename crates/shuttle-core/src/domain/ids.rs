//! Domain identifiers.
//!
//! # ULID ベースの TaskId
//! TaskId は ULID (Universally Unique Lexicographically Sortable Identifier) を包む newtype です。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: timestamp が先頭にあるため、生成順序でおおよそソートできる
//! - **再利用されない**: 80-bit のランダム部があるため、同じ ID が二度払い出されることはない
//! - **不透明**: 呼び出し側は中身を解釈しない（比較と表示のみ）

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identifier of a Task (pending or completed).
///
/// Display は `task-` プレフィックス付き、serialize は素の ULID 文字列です。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Ulid);

impl TaskId {
    /// ULID から TaskId を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// 内部の ULID を取得
    pub fn as_ulid(&self) -> Ulid {
        self.0
    }

    /// Short form used in log lines (first 8 chars of the ULID).
    pub fn short(&self) -> String {
        let mut s = self.0.to_string();
        s.truncate(8);
        s
    }
}

impl From<Ulid> for TaskId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}
