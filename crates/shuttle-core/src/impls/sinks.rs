//! EventSink の実装
//!
//! # 学習ポイント
//! - tokio::sync::broadcast による single producer / N consumer の fan-out
//! - 受信者ゼロのときの send エラーは「誰も聞いていない」だけなので無視する
//! - 遅い受信者は Lagged になり、再 join（スナップショット取り直し）で回復する

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::trace;

use crate::domain::QueueEvent;
use crate::ports::EventSink;

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: QueueEvent) {}
}

/// FanOutSink は全オブザーバに同じ順序でイベントを配る
///
/// # 実装詳細
/// - broadcast チャネルの各受信者が自分専用の FIFO を持つ
/// - 容量を超えて遅れた受信者は古いイベントを失う（best-effort）
#[derive(Debug, Clone)]
pub struct FanOutSink {
    tx: broadcast::Sender<QueueEvent>,
}

impl FanOutSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// New receiver that sees every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for FanOutSink {
    fn publish(&self, event: QueueEvent) {
        // Err only means there is no receiver right now.
        match self.tx.send(event) {
            Ok(receivers) => trace!(receivers, "fan-out"),
            Err(_) => trace!("fan-out skipped: no observers"),
        }
    }

    fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Keeps every published event in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<QueueEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<QueueEvent> {
        self.events.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(QueueEvent::name).collect()
    }

    /// Take the recorded events, leaving the sink empty.
    pub fn drain(&self) -> Vec<QueueEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: QueueEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QueueState;

    fn update() -> QueueEvent {
        QueueEvent::QueueUpdate(QueueState::default())
    }

    fn shutdown(message: &str) -> QueueEvent {
        QueueEvent::ServerShutdown {
            message: message.to_string(),
        }
    }

    #[test]
    fn fan_out_without_observers_does_not_fail() {
        let sink = FanOutSink::new(4);
        sink.publish(update());
        assert_eq!(sink.observer_count(), 0);
    }

    #[tokio::test]
    async fn fan_out_delivers_same_order_to_every_observer() {
        let sink = FanOutSink::new(16);
        let mut a = sink.subscribe();
        let mut b = sink.subscribe();
        assert_eq!(sink.observer_count(), 2);

        sink.publish(shutdown("1"));
        sink.publish(shutdown("2"));
        sink.publish(shutdown("3"));

        for rx in [&mut a, &mut b] {
            for expected in ["1", "2", "3"] {
                assert_eq!(rx.recv().await.unwrap(), shutdown(expected));
            }
        }
    }

    #[tokio::test]
    async fn slow_observer_lags_instead_of_blocking() {
        let sink = FanOutSink::new(2);
        let mut rx = sink.subscribe();

        for i in 0..5 {
            sink.publish(shutdown(&i.to_string()));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert_eq!(rx.recv().await.unwrap(), shutdown("3"));
    }

    #[test]
    fn recording_sink_keeps_order_and_drains() {
        let sink = RecordingSink::new();
        sink.publish(update());
        sink.publish(shutdown("x"));

        assert_eq!(sink.names(), vec!["queue_update", "server_shutdown"]);
        assert_eq!(sink.drain().len(), 2);
        assert!(sink.events().is_empty());
    }
}
