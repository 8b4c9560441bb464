//! Rotating status messages shown under the progress bar.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::gate::CancellationGate;

/// The intro line, the pool of "working" lines and the sticky outro line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageScript {
    pub intro: String,
    pub working: Vec<String>,
    pub outro: String,
}

impl Default for MessageScript {
    fn default() -> Self {
        Self {
            intro: "Our bees are analyzing the news!".to_string(),
            working: vec![
                "Extracting keywords carefully!".to_string(),
                "Tidying up the summary sentences.".to_string(),
                "Information is pooling like honey!".to_string(),
            ],
            outro: "Hang on a moment, your report is almost ready.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStage {
    Intro,
    Cycling,
    Outro,
}

/// Text currently on screen plus how many interval ticks produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageState {
    current_text: String,
    step_count: u32,
    stage: MessageStage,
}

impl MessageState {
    pub fn new(script: &MessageScript) -> Self {
        Self {
            current_text: script.intro.clone(),
            step_count: 0,
            stage: MessageStage::Intro,
        }
    }

    pub fn current_text(&self) -> &str {
        &self.current_text
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    pub fn stage(&self) -> MessageStage {
        self.stage
    }

    /// Advance one interval tick and return the text to show, if it changed.
    ///
    /// The outro is only shown once completion is known and at least one
    /// working message has been on screen. After it, nothing changes.
    pub fn tick(
        &mut self,
        script: &MessageScript,
        complete: bool,
        pick: impl FnOnce(usize) -> usize,
    ) -> Option<&str> {
        if self.stage == MessageStage::Outro {
            return None;
        }
        self.step_count += 1;

        let cycled = self.stage == MessageStage::Cycling;
        if complete && (cycled || script.working.is_empty()) {
            self.current_text = script.outro.clone();
            self.stage = MessageStage::Outro;
            return Some(&self.current_text);
        }

        if script.working.is_empty() {
            return None;
        }
        let index = pick(script.working.len()).min(script.working.len() - 1);
        self.current_text = script.working[index].clone();
        self.stage = MessageStage::Cycling;
        Some(&self.current_text)
    }
}

/// Emits the intro at once, then one message per interval until the outro.
pub struct MessageScheduler {
    complete: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl MessageScheduler {
    /// Start with working messages picked uniformly at random.
    pub fn start<F>(
        clock: Clock,
        gate: CancellationGate,
        script: MessageScript,
        interval: Duration,
        on_message: F,
    ) -> Self
    where
        F: FnMut(String) + Send + 'static,
    {
        Self::start_with(clock, gate, script, interval, |n| rand::random_range(0..n), on_message)
    }

    /// Like [`start`](Self::start) with a caller-supplied index picker.
    pub fn start_with<P, F>(
        clock: Clock,
        gate: CancellationGate,
        script: MessageScript,
        interval: Duration,
        mut pick: P,
        mut on_message: F,
    ) -> Self
    where
        P: FnMut(usize) -> usize + Send + 'static,
        F: FnMut(String) + Send + 'static,
    {
        let (complete_tx, complete_rx) = watch::channel(false);
        let mut state = MessageState::new(&script);
        on_message(state.current_text().to_string());

        let handle = tokio::spawn(async move {
            let mut ticks = clock.every(interval);
            loop {
                ticks.tick().await;
                if gate.is_terminal() {
                    break;
                }

                let complete = *complete_rx.borrow();
                if let Some(text) = state.tick(&script, complete, &mut pick) {
                    on_message(text.to_string());
                }
                if state.stage() == MessageStage::Outro {
                    break;
                }
            }
        });

        Self {
            complete: complete_tx,
            handle: Some(handle),
        }
    }

    /// Completion is known: the next tick shows the outro.
    pub fn mark_complete(&self) {
        self.complete.send_replace(true);
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for MessageScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn first(_: usize) -> usize {
        0
    }

    #[test]
    fn starts_on_intro() {
        let script = MessageScript::default();
        let state = MessageState::new(&script);
        assert_eq!(state.current_text(), script.intro);
        assert_eq!(state.stage(), MessageStage::Intro);
        assert_eq!(state.step_count(), 0);
    }

    #[test]
    fn cycles_until_complete() {
        let script = MessageScript::default();
        let mut state = MessageState::new(&script);
        for i in 1..=5 {
            let text = state.tick(&script, false, |_| i % 3).unwrap().to_string();
            assert!(script.working.contains(&text));
        }
        assert_eq!(state.step_count(), 5);
        assert_eq!(state.stage(), MessageStage::Cycling);
    }

    #[test]
    fn outro_waits_for_a_working_message() {
        let script = MessageScript::default();
        let mut state = MessageState::new(&script);

        let text = state.tick(&script, true, first).unwrap().to_string();
        assert_eq!(text, script.working[0]);

        let text = state.tick(&script, true, first).unwrap().to_string();
        assert_eq!(text, script.outro);
        assert_eq!(state.stage(), MessageStage::Outro);
    }

    #[test]
    fn outro_is_sticky() {
        let script = MessageScript::default();
        let mut state = MessageState::new(&script);
        state.tick(&script, false, first);
        state.tick(&script, true, first);
        assert_eq!(state.tick(&script, true, first), None);
        assert_eq!(state.tick(&script, false, first), None);
        assert_eq!(state.current_text(), script.outro);
    }

    #[test]
    fn out_of_range_pick_is_clamped() {
        let script = MessageScript::default();
        let mut state = MessageState::new(&script);
        let text = state.tick(&script, false, |_| 99).unwrap().to_string();
        assert_eq!(&text, script.working.last().unwrap());
    }

    #[test]
    fn empty_pool_goes_straight_to_outro_on_completion() {
        let script = MessageScript {
            working: Vec::new(),
            ..MessageScript::default()
        };
        let mut state = MessageState::new(&script);
        assert_eq!(state.tick(&script, false, first), None);
        assert_eq!(state.tick(&script, true, first), Some(script.outro.as_str()));
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl FnMut(String) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |m| sink.lock().unwrap().push(m))
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_sequence_ends_on_outro() {
        let clock = Clock::default();
        let script = MessageScript::default();
        let (seen, on_message) = recorder();
        let scheduler = MessageScheduler::start(
            clock,
            CancellationGate::new(),
            script.clone(),
            Duration::from_millis(1500),
            on_message,
        );
        assert_eq!(seen.lock().unwrap().as_slice(), [script.intro.clone()]);

        // Ticks at 1500 and 3000.
        clock.delay(Duration::from_millis(3100)).await;
        scheduler.mark_complete();
        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_ne!(seen.lock().unwrap().last().unwrap(), &script.outro);

        clock.delay(Duration::from_secs(10)).await;
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0], script.intro);
        assert_eq!(seen[3], script.outro);
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_scheduler_emits_nothing_more() {
        let clock = Clock::default();
        let (seen, on_message) = recorder();
        let mut scheduler = MessageScheduler::start(
            clock,
            CancellationGate::new(),
            MessageScript::default(),
            Duration::from_millis(1500),
            on_message,
        );
        clock.delay(Duration::from_millis(1600)).await;
        scheduler.stop();
        clock.delay(Duration::from_secs(10)).await;
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
