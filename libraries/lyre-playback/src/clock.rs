//! Progress clock
//!
//! Periodic tick source that drives position sampling while playing. Ticks
//! are delivered into the player's input loop rather than acted on here, so
//! sampling happens on the same serialized path as every other transition.
//!
//! Each run of the clock has a generation. `stop()` aborts the task and moves
//! to a new generation, so a tick that was already queued when the clock was
//! stopped is recognised as stale and dropped.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// One clock tick, tagged with the run that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTick {
    generation: u64,
}

/// Cancellable periodic tick source
#[derive(Debug)]
pub struct ProgressClock {
    interval: Duration,
    generation: u64,
    task: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<ClockTick>,
}

impl ProgressClock {
    /// Create a stopped clock delivering ticks to `tx`
    pub fn new(interval: Duration, tx: mpsc::UnboundedSender<ClockTick>) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            generation: 0,
            task: None,
            tx,
        }
    }

    /// Start ticking; no-op if already running
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }

        self.generation += 1;
        let tick = ClockTick {
            generation: self.generation,
        };
        let period = self.interval;
        let tx = self.tx.clone();

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tx.send(tick).is_err() {
                    break;
                }
            }
        }));
    }

    /// Stop ticking; idempotent
    ///
    /// Takes effect immediately: no tick produced before this call is
    /// accepted afterwards.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.generation += 1;
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether `tick` belongs to the current run
    pub fn accepts(&self, tick: ClockTick) -> bool {
        self.task.is_some() && tick.generation == self.generation
    }
}

impl Drop for ProgressClock {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_at_interval_while_running() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut clock = ProgressClock::new(Duration::from_millis(100), tx);
        clock.start();

        let start = Instant::now();
        let tick = rx.recv().await.unwrap();
        assert!(clock.accepts(tick));
        assert_eq!(start.elapsed(), Duration::from_millis(100));

        let tick = rx.recv().await.unwrap();
        assert!(clock.accepts(tick));
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn queued_ticks_are_stale_after_stop() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut clock = ProgressClock::new(Duration::from_millis(100), tx);
        clock.start();

        tokio::time::sleep(Duration::from_millis(350)).await;
        clock.stop();

        let mut stale = 0;
        while let Ok(tick) = rx.try_recv() {
            assert!(!clock.accepts(tick));
            stale += 1;
        }
        assert!(stale > 0);

        // Nothing more arrives once stopped
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_rejects_previous_run() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut clock = ProgressClock::new(Duration::from_millis(100), tx);
        clock.start();
        let old = rx.recv().await.unwrap();

        clock.stop();
        clock.start();
        assert!(!clock.accepts(old));

        let fresh = rx.recv().await.unwrap();
        assert!(clock.accepts(fresh));
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut clock = ProgressClock::new(Duration::from_millis(100), tx);

        clock.stop();
        assert!(!clock.is_running());

        clock.start();
        clock.start();
        assert!(clock.is_running());

        clock.stop();
        clock.stop();
        assert!(!clock.is_running());
    }
}
