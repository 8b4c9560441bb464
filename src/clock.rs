//! Timer source shared by every ticking component of a run.
//!
//! Wraps tokio's timer wheel so a paused test runtime drives all of it.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::consts::FRAME_INTERVAL;

/// Repeating and one-shot timers for one loading cycle.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    frame: Duration,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(FRAME_INTERVAL)
    }
}

impl Clock {
    pub fn new(frame: Duration) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> Duration {
        self.frame
    }

    pub fn now(&self) -> Instant {
        Instant::now()
    }

    /// Display-refresh ticker. The first tick lands one frame from now and
    /// late frames are dropped rather than replayed.
    pub fn frames(&self) -> Interval {
        let mut interval = tokio::time::interval_at(Instant::now() + self.frame, self.frame);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    }

    /// Fixed-period ticker whose first tick lands one period from now.
    pub fn every(&self, period: Duration) -> Interval {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }

    pub async fn delay(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn frames_start_one_frame_out() {
        let clock = Clock::new(Duration::from_millis(16));
        let start = clock.now();
        let mut frames = clock.frames();

        frames.tick().await;
        assert_eq!(clock.now() - start, Duration::from_millis(16));
        frames.tick().await;
        assert_eq!(clock.now() - start, Duration::from_millis(32));
    }

    #[tokio::test(start_paused = true)]
    async fn every_waits_a_full_period_first() {
        let clock = Clock::default();
        let start = clock.now();
        let mut ticks = clock.every(Duration::from_millis(1500));

        ticks.tick().await;
        assert_eq!(clock.now() - start, Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_advances_virtual_time() {
        let clock = Clock::default();
        let start = clock.now();
        clock.delay(Duration::from_secs(3)).await;
        assert!(clock.now() - start >= Duration::from_secs(3));
    }
}
