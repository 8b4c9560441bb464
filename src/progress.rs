//! Perceived-progress animation.
//!
//! Before the real result is in hand the bar eases toward a soft ceiling and
//! then creeps, so it always looks alive but never claims to be done. Once
//! released it sprints linearly from wherever it is to 100 over a fixed
//! duration.

use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::clock::Clock;
use crate::consts::{CREEP_RATE, CREEP_TARGET, RAMP_CEILING, RAMP_MAX_STEP, RAMP_RATE};
use crate::gate::CancellationGate;

/// Shape of the pre-completion ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampCurve {
    pub ceiling: f64,
    pub rate: f64,
    pub max_step: f64,
    pub creep_target: f64,
    pub creep_rate: f64,
}

impl Default for RampCurve {
    fn default() -> Self {
        Self {
            ceiling: RAMP_CEILING,
            rate: RAMP_RATE,
            max_step: RAMP_MAX_STEP,
            creep_target: CREEP_TARGET,
            creep_rate: CREEP_RATE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    Ramping,
    Sprinting,
    Done,
}

/// Progress value plus the phase that produces it. Values never decrease.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressState {
    value: f64,
    phase: ProgressPhase,
    sprint_from: f64,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressState {
    pub fn new() -> Self {
        Self {
            value: 0.0,
            phase: ProgressPhase::Ramping,
            sprint_from: 0.0,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn phase(&self) -> ProgressPhase {
        self.phase
    }

    /// Advance one ramp frame.
    pub fn ramp(&mut self, curve: &RampCurve) -> f64 {
        if self.phase != ProgressPhase::Ramping {
            return self.value;
        }
        if self.value >= curve.ceiling {
            self.value += (curve.creep_target - self.value).max(0.0) * curve.creep_rate;
        } else {
            let increment = ((curve.ceiling - self.value) * curve.rate).min(curve.max_step);
            self.value = (self.value + increment).min(curve.ceiling);
        }
        self.value
    }

    /// Switch to the sprint, starting from the current value. A fast backend
    /// therefore never snaps the bar forward before it sprints.
    pub fn begin_sprint(&mut self) {
        if self.phase == ProgressPhase::Ramping {
            self.sprint_from = self.value.max(0.0);
            self.phase = ProgressPhase::Sprinting;
        }
    }

    /// Position on the linear sprint `elapsed` into a sprint of `duration`.
    pub fn sprint(&mut self, elapsed: Duration, duration: Duration) -> f64 {
        match self.phase {
            ProgressPhase::Ramping => self.begin_sprint(),
            ProgressPhase::Sprinting => {}
            ProgressPhase::Done => return self.value,
        }

        let fraction = if duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / duration.as_secs_f64()).min(1.0)
        };

        if fraction >= 1.0 {
            self.value = 100.0;
            self.phase = ProgressPhase::Done;
        } else {
            let target = self.sprint_from + (100.0 - self.sprint_from) * fraction;
            self.value = self.value.max(target).min(100.0);
        }
        self.value
    }
}

/// Drives a [`ProgressState`] from the display clock in a background task.
///
/// The task reports every frame through `on_tick`, stops on its own at 100,
/// and is aborted by [`stop`](ProgressAnimator::stop) or on drop.
pub struct ProgressAnimator {
    release: watch::Sender<Option<Instant>>,
    finished: Option<oneshot::Receiver<()>>,
    handle: Option<JoinHandle<()>>,
    clock: Clock,
}

impl ProgressAnimator {
    pub fn start<F>(
        clock: Clock,
        gate: CancellationGate,
        curve: RampCurve,
        sprint: Duration,
        mut on_tick: F,
    ) -> Self
    where
        F: FnMut(f64) + Send + 'static,
    {
        let (release_tx, release_rx) = watch::channel(None::<Instant>);
        let (done_tx, done_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut done_tx = Some(done_tx);
            let mut state = ProgressState::new();
            let mut frames = clock.frames();

            loop {
                frames.tick().await;
                if gate.is_terminal() {
                    break;
                }

                let released_at = *release_rx.borrow();
                let value = match released_at {
                    None => state.ramp(&curve),
                    Some(at) => state.sprint(clock.now().saturating_duration_since(at), sprint),
                };
                on_tick(value);

                if state.phase() == ProgressPhase::Done {
                    if let Some(tx) = done_tx.take() {
                        let _ = tx.send(());
                    }
                    break;
                }
            }
        });

        Self {
            release: release_tx,
            finished: Some(done_rx),
            handle: Some(handle),
            clock,
        }
    }

    /// The result is in hand: start the sprint on the next frame.
    pub fn release(&self) {
        let now = self.clock.now();
        self.release.send_if_modified(|at| {
            if at.is_none() {
                *at = Some(now);
                true
            } else {
                false
            }
        });
    }

    /// Receiver that fires once the bar has reached 100. Can be taken once.
    pub fn take_finished(&mut self) -> Option<oneshot::Receiver<()>> {
        self.finished.take()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel the pending frame, if any. Idempotent.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for ProgressAnimator {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn ramp_frames(state: &mut ProgressState, n: usize) -> Vec<f64> {
        let curve = RampCurve::default();
        (0..n).map(|_| state.ramp(&curve)).collect()
    }

    #[test]
    fn ramp_is_monotonic_and_respects_max_step() {
        let mut state = ProgressState::new();
        let mut prev = 0.0;
        for value in ramp_frames(&mut state, 2_000) {
            assert!(value >= prev);
            assert!(value - prev <= RAMP_MAX_STEP + 1e-9);
            prev = value;
        }
    }

    #[test]
    fn ramp_starts_at_max_step() {
        let mut state = ProgressState::new();
        let first = ramp_frames(&mut state, 1)[0];
        assert!((first - RAMP_MAX_STEP).abs() < 1e-9);
    }

    #[test]
    fn ramp_never_reaches_full_without_release() {
        let mut state = ProgressState::new();
        let last = *ramp_frames(&mut state, 200_000).last().unwrap();
        assert!(last <= CREEP_TARGET);
        assert_eq!(state.phase(), ProgressPhase::Ramping);
    }

    #[test]
    fn creep_keeps_moving_above_ceiling() {
        let curve = RampCurve::default();
        let mut state = ProgressState {
            value: RAMP_CEILING,
            phase: ProgressPhase::Ramping,
            sprint_from: 0.0,
        };
        let a = state.ramp(&curve);
        let b = state.ramp(&curve);
        assert!(a > RAMP_CEILING);
        assert!(b > a);
    }

    #[test]
    fn sprint_runs_from_current_value() {
        let mut state = ProgressState::new();
        ramp_frames(&mut state, 10);
        let from = state.value();
        assert!(from < RAMP_CEILING);

        state.begin_sprint();
        let duration = Duration::from_millis(1000);
        let half = state.sprint(Duration::from_millis(500), duration);
        assert!((half - (from + (100.0 - from) / 2.0)).abs() < 1e-9);
        assert_eq!(state.phase(), ProgressPhase::Sprinting);

        let end = state.sprint(duration, duration);
        assert_eq!(end, 100.0);
        assert_eq!(state.phase(), ProgressPhase::Done);
    }

    #[test]
    fn sprint_never_moves_backwards() {
        let mut state = ProgressState {
            value: 95.0,
            phase: ProgressPhase::Ramping,
            sprint_from: 0.0,
        };
        state.begin_sprint();
        let duration = Duration::from_millis(1100);
        let mut prev = state.value();
        for ms in (0..=1100).step_by(16) {
            let value = state.sprint(Duration::from_millis(ms), duration);
            assert!(value >= prev);
            prev = value;
        }
    }

    #[test]
    fn zero_length_sprint_finishes_immediately() {
        let mut state = ProgressState::new();
        assert_eq!(state.sprint(Duration::ZERO, Duration::ZERO), 100.0);
        assert_eq!(state.phase(), ProgressPhase::Done);
    }

    #[test]
    fn ramp_after_sprint_is_ignored() {
        let mut state = ProgressState::new();
        state.sprint(Duration::from_millis(10), Duration::from_millis(20));
        let before = state.value();
        assert_eq!(state.ramp(&RampCurve::default()), before);
    }

    fn recorder() -> (Arc<Mutex<Vec<f64>>>, impl FnMut(f64) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |v| sink.lock().unwrap().push(v))
    }

    #[tokio::test(start_paused = true)]
    async fn animator_sprints_to_full_after_release() {
        let clock = Clock::default();
        let (seen, on_tick) = recorder();
        let mut animator = ProgressAnimator::start(
            clock,
            CancellationGate::new(),
            RampCurve::default(),
            Duration::from_millis(1100),
            on_tick,
        );
        let finished = animator.take_finished().unwrap();

        clock.delay(Duration::from_millis(500)).await;
        assert!(seen.lock().unwrap().iter().all(|v| *v < 100.0));

        let released = clock.now();
        animator.release();
        finished.await.unwrap();

        let elapsed = clock.now() - released;
        assert!(elapsed >= Duration::from_millis(1100));
        assert!(elapsed <= Duration::from_millis(1100) + clock.frame());

        let seen = seen.lock().unwrap();
        assert_eq!(*seen.last().unwrap(), 100.0);
        assert!(seen.windows(2).all(|w| w[1] >= w[0]));
        assert!(!animator.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_ticks() {
        let clock = Clock::default();
        let (seen, on_tick) = recorder();
        let mut animator = ProgressAnimator::start(
            clock,
            CancellationGate::new(),
            RampCurve::default(),
            Duration::from_millis(1100),
            on_tick,
        );

        clock.delay(Duration::from_millis(200)).await;
        animator.stop();
        let count = seen.lock().unwrap().len();
        assert!(count > 0);

        clock.delay(Duration::from_secs(2)).await;
        assert_eq!(seen.lock().unwrap().len(), count);
        assert!(!animator.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn closed_gate_silences_ticks() {
        let clock = Clock::default();
        let gate = CancellationGate::new();
        let (seen, on_tick) = recorder();
        let _animator = ProgressAnimator::start(
            clock,
            gate.clone(),
            RampCurve::default(),
            Duration::from_millis(1100),
            on_tick,
        );

        clock.delay(Duration::from_millis(100)).await;
        gate.try_enter_terminal();
        let count = seen.lock().unwrap().len();

        clock.delay(Duration::from_secs(1)).await;
        assert_eq!(seen.lock().unwrap().len(), count);
    }
}
