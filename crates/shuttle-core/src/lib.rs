//! shuttle-core
//!
//! Core building blocks for the Shuttle task queue: a single worker that picks one
//! task at a time by aged priority, advances it on a periodic tick, and broadcasts
//! every change to observers.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, state, events, errors）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, EventSink）
//! - **impls**: 実装（NullSink, FanOutSink, RecordingSink）
//! - **queue**: Priority Engine（aging）と Task Store
//! - **app**: アプリケーションロジック（builder, service, engine, scheduler, tick_loop, gateway）
//! - **config**: 環境変数からの設定読み込みと検証

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;

pub use crate::app::{QueueService, QueueServiceBuilder, QueueStats, Subscription, TickOutcome};
pub use crate::config::{ConfigPatch, QueueConfig};
pub use crate::domain::{
    CompletedTask, Priority, QueueEvent, QueueState, ShuttleError, SubscriptionError, Task, TaskId,
};
