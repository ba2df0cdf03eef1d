//! BroadcastGateway - オブザーバへの配信口
//!
//! # フロー
//! 1. join(): エンジンのロック内で subscribe + スナップショット取得
//! 2. Subscription::recv(): 最初にスナップショット（queue_update）、以降は生成順のイベント
//! 3. Lagged になったら再 join してスナップショットから取り直す（replay はしない）

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::debug;

use super::engine::QueueEngine;
use crate::domain::{QueueEvent, QueueState, SubscriptionError};
use crate::impls::FanOutSink;
use crate::ports::EventSink;

pub struct BroadcastGateway {
    sink: Arc<FanOutSink>,
}

impl BroadcastGateway {
    pub fn new(sink: Arc<FanOutSink>) -> Self {
        Self { sink }
    }

    /// The sink to hand to the engine.
    pub fn sink(&self) -> Arc<FanOutSink> {
        Arc::clone(&self.sink)
    }

    /// Attach a new observer.
    ///
    /// The snapshot and the subscription are taken in one critical section, so
    /// nothing is missed or duplicated between them.
    pub async fn join(&self, engine: &QueueEngine) -> Subscription {
        let (snapshot, receiver) = engine.catch_up(|| self.sink.subscribe()).await;
        debug!(
            observers = self.sink.observer_count(),
            tasks = snapshot.tasks.len(),
            "observer joined"
        );
        Subscription {
            snapshot: snapshot.clone(),
            initial: Some(snapshot),
            receiver,
        }
    }

    pub fn observer_count(&self) -> usize {
        self.sink.observer_count()
    }
}

/// One observer's view: a catch-up snapshot followed by the live event stream.
pub struct Subscription {
    snapshot: QueueState,
    initial: Option<QueueState>,
    receiver: broadcast::Receiver<QueueEvent>,
}

impl Subscription {
    /// State at the moment of joining.
    pub fn snapshot(&self) -> &QueueState {
        &self.snapshot
    }

    /// Next event. The first call yields the join snapshot as `queue_update`.
    pub async fn recv(&mut self) -> Result<QueueEvent, SubscriptionError> {
        if let Some(initial) = self.initial.take() {
            return Ok(QueueEvent::QueueUpdate(initial));
        }
        self.receiver.recv().await.map_err(|e| match e {
            RecvError::Lagged(n) => SubscriptionError::Lagged(n),
            RecvError::Closed => SubscriptionError::Closed,
        })
    }

    /// Non-blocking variant of `recv`. `Ok(None)` means nothing is queued right now.
    pub fn try_recv(&mut self) -> Result<Option<QueueEvent>, SubscriptionError> {
        if let Some(initial) = self.initial.take() {
            return Ok(Some(QueueEvent::QueueUpdate(initial)));
        }
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Lagged(n)) => Err(SubscriptionError::Lagged(n)),
            Err(TryRecvError::Closed) => Err(SubscriptionError::Closed),
        }
    }

    /// Drain everything queued right now (including the join snapshot if unread).
    pub fn drain(&mut self) -> Result<Vec<QueueEvent>, SubscriptionError> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv()? {
            events.push(event);
        }
        Ok(events)
    }
}
