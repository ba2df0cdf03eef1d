//! App - アプリケーション層
//!
//! domain / ports / queue を組み合わせて、キューの振る舞いを実装します。
//!
//! # 主要コンポーネント
//! - **QueueServiceBuilder**: サービスの構築とワイヤリング
//! - **QueueService**: 外部インターフェース（submit, clear, configure, join, shutdown）
//! - **QueueEngine**: 全変更操作を 1 本の critical section に直列化
//! - **Scheduler**: cursor の状態遷移と 1 tick 分の処理
//! - **TickDriver**: 周期 tick ループの start/stop
//! - **BroadcastGateway**: オブザーバへの fan-out とスナップショット配信

pub mod builder;
pub mod engine;
pub mod gateway;
pub mod scheduler;
pub mod service;
pub mod status;
pub mod tick_loop;

// 主要な型を再エクスポート
pub use self::builder::QueueServiceBuilder;
pub use self::engine::{ConfigUpdate, QueueEngine};
pub use self::gateway::{BroadcastGateway, Subscription};
pub use self::scheduler::{ProgressIncrements, SchedulerCursor, TickOutcome};
pub use self::service::QueueService;
pub use self::status::QueueStats;
pub use self::tick_loop::{TickDriver, TickLoop};
