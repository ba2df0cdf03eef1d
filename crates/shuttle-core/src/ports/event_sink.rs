//! EventSink port - イベント配信の抽象化
//!
//! # 実装
//! - NullSink: 何もしない（オブザーバがいない構成・コアだけのテスト）
//! - FanOutSink: tokio broadcast で N 人のオブザーバに配る
//! - RecordingSink: 配信されたイベントを記録（テスト用）

use crate::domain::QueueEvent;

/// EventSink は QueueEvent を外へ流す
///
/// # 設計原則
/// - fire-and-forget: publish は失敗しないし、ブロックもしない
/// - 呼び出し側（エンジン）はロック内で publish するので、順序は呼び出し順のまま
pub trait EventSink: Send + Sync {
    fn publish(&self, event: QueueEvent);

    /// Number of observers currently attached (0 when the sink has no notion of them).
    fn observer_count(&self) -> usize {
        0
    }
}
