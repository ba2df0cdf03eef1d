//! Impls - port の実装
//!
//! - **sinks**: NullSink / FanOutSink / RecordingSink

pub mod sinks;

pub use self::sinks::{FanOutSink, NullSink, RecordingSink};
