use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info};

use super::engine::QueueEngine;

/// Handle of one running tick loop.
/// - `shutdown_tx` に true を送るとループが止まる
/// - `shutdown_and_join()` でループの終了を待てる
pub struct TickLoop {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl TickLoop {
    /// Spawn the loop on the current tokio runtime.
    pub fn spawn(engine: QueueEngine) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(tick_loop(engine, shutdown_rx));
        Self { shutdown_tx, join }
    }

    /// Request the loop to stop.
    /// An in-flight tick is not cancelled; it finishes and no new tick starts.
    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop and wait for the loop to exit.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

async fn tick_loop(engine: QueueEngine, mut shutdown_rx: watch::Receiver<bool>) {
    let period = engine.tick_interval().await;
    // 最初の tick は start から 1 周期後（即時には走らない）
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_ms = period.as_millis() as u64, "task processing started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            biased;
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    // sender dropped: nobody can stop us any more, so stop now
                    break;
                }
                continue;
            }
            _ = interval.tick() => {}
        }

        if *shutdown_rx.borrow() {
            break;
        }

        // ロック取得後の処理は同期なので、tick が中途半端に適用されることはない
        let outcome = engine.tick().await;
        if !outcome.is_idle() {
            debug!(?outcome, "tick");
        }
    }

    info!("task processing stopped");
}

/// Owns at most one TickLoop at a time.
///
/// start/stop are idempotent: a second start never creates a second timer and
/// stopping a stopped driver does nothing.
pub struct TickDriver {
    engine: QueueEngine,
    running: Mutex<Option<TickLoop>>,
}

impl TickDriver {
    pub fn new(engine: QueueEngine) -> Self {
        Self {
            engine,
            running: Mutex::new(None),
        }
    }

    /// Returns true if a loop was started, false if one was already running.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut slot = self.running.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(TickLoop::spawn(self.engine.clone()));
        true
    }

    /// Signal the loop to stop without waiting. Returns false if not running.
    pub fn stop(&self) -> bool {
        let Some(tick_loop) = self.running.lock().take() else {
            return false;
        };
        tick_loop.request_shutdown();
        true
    }

    /// Stop and wait until the loop (and any in-flight tick) has finished.
    pub async fn stop_and_wait(&self) -> bool {
        let taken = self.running.lock().take();
        match taken {
            Some(tick_loop) => {
                tick_loop.shutdown_and_join().await;
                true
            }
            None => false,
        }
    }

    /// Replace a running loop with a fresh one (new period). No-op when stopped.
    pub async fn restart(&self) -> bool {
        let old = {
            let mut slot = self.running.lock();
            let Some(old) = slot.take() else {
                return false;
            };
            *slot = Some(TickLoop::spawn(self.engine.clone()));
            old
        };
        old.shutdown_and_join().await;
        info!("task processing restarted");
        true
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use crate::domain::Priority;
    use crate::impls::NullSink;
    use crate::ports::{SystemClock, UlidGenerator};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Arc;
    use std::time::Duration;

    fn engine(interval_ms: u64, inc: u8) -> QueueEngine {
        let config = QueueConfig {
            tick_interval: Duration::from_millis(interval_ms),
            progress_increment_min: inc,
            progress_increment_max: inc,
            ..QueueConfig::default()
        };
        QueueEngine::new(
            config,
            Arc::new(SystemClock),
            Arc::new(NullSink),
            Box::new(UlidGenerator::new(SystemClock)),
            StdRng::seed_from_u64(3),
        )
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_fires_after_one_interval() {
        let engine = engine(100, 10);
        let task = engine.submit("a", Priority::MIN).await;
        let driver = TickDriver::new(engine.clone());
        assert!(driver.start());
        settle().await;

        tokio::time::advance(Duration::from_millis(50)).await;
        settle().await;
        assert_eq!(engine.current_task().await.unwrap().progress, 0);

        tokio::time::advance(Duration::from_millis(50)).await;
        settle().await;
        let current = engine.current_task().await.unwrap();
        assert_eq!(current.id, task.id);
        assert_eq!(current.progress, 10);

        driver.stop_and_wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn double_start_does_not_double_the_rate() {
        let engine = engine(100, 10);
        engine.submit("a", Priority::MIN).await;
        let driver = TickDriver::new(engine.clone());

        assert!(driver.start());
        assert!(!driver.start());
        settle().await;

        tokio::time::advance(Duration::from_millis(100)).await;
        settle().await;
        assert_eq!(engine.current_task().await.unwrap().progress, 10);

        tokio::time::advance(Duration::from_millis(100)).await;
        settle().await;
        assert_eq!(engine.current_task().await.unwrap().progress, 20);

        driver.stop_and_wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_driver_applies_no_more_ticks() {
        let engine = engine(100, 10);
        engine.submit("a", Priority::MIN).await;
        let driver = TickDriver::new(engine.clone());
        driver.start();
        settle().await;

        tokio::time::advance(Duration::from_millis(100)).await;
        settle().await;
        assert!(driver.stop_and_wait().await);

        tokio::time::advance(Duration::from_millis(1000)).await;
        settle().await;
        assert_eq!(engine.current_task().await.unwrap().progress, 10);
    }

    #[tokio::test]
    async fn start_stop_are_idempotent() {
        let driver = TickDriver::new(engine(5000, 10));
        assert!(!driver.is_running());
        assert!(!driver.stop());

        assert!(driver.start());
        assert!(driver.is_running());

        assert!(driver.stop());
        assert!(!driver.is_running());
        assert!(!driver.stop());
        assert!(!driver.stop_and_wait().await);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_picks_up_new_interval() {
        let engine = engine(1000, 10);
        engine.submit("a", Priority::MIN).await;
        let driver = TickDriver::new(engine.clone());
        driver.start();
        settle().await;

        engine
            .configure(&crate::config::ConfigPatch::default().tick_interval_ms(50))
            .await
            .unwrap();
        assert!(driver.restart().await);
        settle().await;

        tokio::time::advance(Duration::from_millis(50)).await;
        settle().await;
        assert_eq!(engine.current_task().await.unwrap().progress, 10);

        driver.stop_and_wait().await;
        assert!(!driver.restart().await);
    }
}
