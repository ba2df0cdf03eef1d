//! QueueServiceBuilder - サービスの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計: 不正な設定では build() が失敗する）
//! - port（Clock / IdGenerator / EventSink）の差し替えでテスト容易性を確保

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;

use super::engine::QueueEngine;
use super::gateway::BroadcastGateway;
use super::service::QueueService;
use crate::config::QueueConfig;
use crate::domain::ShuttleError;
use crate::impls::{FanOutSink, NullSink};
use crate::ports::{Clock, EventSink, IdGenerator, SystemClock, UlidGenerator};

/// Where published events go.
enum SinkChoice {
    /// FanOutSink + BroadcastGateway (join() available).
    FanOut,
    /// Events are dropped.
    Null,
    /// Caller-provided sink (e.g. RecordingSink). join() is unavailable.
    Custom(Arc<dyn EventSink>),
}

/// QueueServiceBuilder は QueueService を構築
///
/// # 使用例
/// ```ignore
/// let service = QueueServiceBuilder::new()
///     .config(QueueConfig::from_env()?)
///     .build()?;
/// service.start_scheduling();
/// ```
pub struct QueueServiceBuilder {
    config: QueueConfig,
    clock: Arc<dyn Clock>,
    ids: Option<Box<dyn IdGenerator>>,
    seed: Option<u64>,
    sink: SinkChoice,
}

impl QueueServiceBuilder {
    pub fn new() -> Self {
        Self {
            config: QueueConfig::default(),
            clock: Arc::new(SystemClock),
            ids: None,
            seed: None,
            sink: SinkChoice::FanOut,
        }
    }

    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Default: ULIDs timestamped by the configured clock.
    pub fn id_generator(mut self, ids: Box<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Fix the progress increment RNG (default: seeded from OS entropy).
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Drop all events (no observers).
    pub fn without_broadcast(mut self) -> Self {
        self.sink = SinkChoice::Null;
        self
    }

    /// Publish into a caller-provided sink instead of the fan-out channel.
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = SinkChoice::Custom(sink);
        self
    }

    /// Validate the config and wire everything together.
    ///
    /// # 検証
    /// - QueueConfig::validate() に通らなければ ShuttleError::InvalidConfig
    pub fn build(self) -> Result<QueueService, ShuttleError> {
        self.config.validate()?;

        let (sink, gateway) = match self.sink {
            SinkChoice::FanOut => {
                let gateway =
                    BroadcastGateway::new(Arc::new(FanOutSink::new(self.config.broadcast_capacity)));
                let sink: Arc<dyn EventSink> = gateway.sink();
                (sink, Some(gateway))
            }
            SinkChoice::Null => (Arc::new(NullSink) as Arc<dyn EventSink>, None),
            SinkChoice::Custom(sink) => (sink, None),
        };

        let ids = self
            .ids
            .unwrap_or_else(|| Box::new(UlidGenerator::new(Arc::clone(&self.clock))));
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let engine = QueueEngine::new(self.config, self.clock, sink, ids, rng);
        Ok(QueueService::new(engine, gateway))
    }
}

impl Default for QueueServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
