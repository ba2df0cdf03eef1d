//! Ports - 抽象化レイヤー
//!
//! コアが外の世界（時刻・ID・オブザーバ）に触れる境目を trait として定義します。
//! コアはネットワークを知らないので、テストでは実装を差し替えるだけで済みます。

pub mod clock;
pub mod event_sink;
pub mod id_generator;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::event_sink::EventSink;
pub use self::id_generator::{IdGenerator, UlidGenerator};
