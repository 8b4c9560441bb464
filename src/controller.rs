//! Loading-screen lifecycle.
//!
//! A [`Controller`] owns at most one live [`RunContext`]. Starting a run
//! spins up the progress animator, the message scheduler and a driver task
//! that awaits the aggregate. Success, cancel and error all finish through
//! the run's [`CancellationGate`], so exactly one of them navigates.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::aggregate::{AggregateError, Aggregator, Payload};
use crate::clock::Clock;
use crate::config::LoaderConfig;
use crate::gate::CancellationGate;
use crate::messages::MessageScheduler;
use crate::progress::ProgressAnimator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Completing,
    Done,
    Cancelled,
    Errored,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Cancelled | Phase::Errored)
    }
}

/// What the loading surface renders.
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderView {
    pub progress: f64,
    pub message: String,
    pub phase: Phase,
}

impl LoaderView {
    fn idle() -> Self {
        Self {
            progress: 0.0,
            message: String::new(),
            phase: Phase::Idle,
        }
    }

    /// Whole percent for display, rounded down so an unfinished bar never
    /// reads 100.
    pub fn percent(&self) -> u8 {
        self.progress.clamp(0.0, 100.0).floor() as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    NotFound,
    Transport,
}

/// User-facing message attached to an error exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

/// Classify an aggregate failure into the message the user sees.
pub fn notice_for(err: &AggregateError, subject: &str) -> Notice {
    let not_found = match err {
        AggregateError::NotFound { .. } => true,
        AggregateError::Transport { cause, .. } => cause.is_not_found(),
    };
    if not_found {
        Notice {
            kind: NoticeKind::NotFound,
            text: format!(
                "No data found for '{subject}'. Please check the company name and try again."
            ),
        }
    } else {
        Notice {
            kind: NoticeKind::Transport,
            text: format!("Something went wrong while loading '{subject}'. Please try again."),
        }
    }
}

/// Everything the result view needs, passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Handoff {
    pub subject: String,
    pub payloads: Vec<Payload>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    /// Show the fetched report.
    Report(Handoff),
    /// Go back where the query came from. `None` for a user cancel.
    Origin { notice: Option<Notice> },
}

/// Receives the single hand-off of a run.
pub trait Navigator: Send + Sync {
    fn navigate(&self, destination: Destination);
}

#[derive(Default)]
struct Timers {
    progress: Option<ProgressAnimator>,
    messages: Option<MessageScheduler>,
}

impl Timers {
    fn stop_all(&mut self) {
        if let Some(progress) = self.progress.as_mut() {
            progress.stop();
        }
        if let Some(messages) = self.messages.as_mut() {
            messages.stop();
        }
    }

    fn any_running(&self) -> bool {
        self.progress.as_ref().is_some_and(|p| p.is_running())
            || self.messages.as_ref().is_some_and(|m| m.is_running())
    }
}

/// State of one loading cycle, shared by the controller and its driver.
pub struct RunContext {
    query: String,
    started_at: Instant,
    gate: CancellationGate,
    view: Arc<watch::Sender<LoaderView>>,
    timers: Mutex<Timers>,
}

impl RunContext {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn is_terminal(&self) -> bool {
        self.gate.is_terminal()
    }

    fn timers(&self) -> MutexGuard<'_, Timers> {
        self.timers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn stop_all(&self) {
        self.timers().stop_all();
    }

    /// Move to a non-terminal phase unless the run has already closed.
    fn advance(&self, phase: Phase) {
        let gate = &self.gate;
        self.view.send_if_modified(|view| {
            if gate.is_terminal() || view.phase.is_terminal() || view.phase == phase {
                return false;
            }
            view.phase = phase;
            true
        });
    }

    /// Begin the sprint and the outro. Returns the "bar is full" signal.
    fn release(&self) -> Option<oneshot::Receiver<()>> {
        let mut timers = self.timers();
        if let Some(messages) = timers.messages.as_ref() {
            messages.mark_complete();
        }
        let progress = timers.progress.as_mut()?;
        progress.release();
        progress.take_finished()
    }

    /// The one terminal transition. Only the first caller gets through.
    fn finish(&self, phase: Phase, destination: Destination, navigator: &dyn Navigator) -> bool {
        if !self.gate.try_enter_terminal() {
            return false;
        }
        self.stop_all();
        self.view.send_modify(|view| view.phase = phase);
        info!(
            subject = %self.query,
            ?phase,
            elapsed_ms = self.started_at.elapsed().as_millis() as u64,
            "run finished"
        );
        navigator.navigate(destination);
        true
    }

    /// Close the run without navigating; its surface is being reused.
    fn supersede(&self) {
        if self.gate.try_enter_terminal() {
            self.stop_all();
            self.view.send_modify(|view| view.phase = Phase::Cancelled);
            debug!(subject = %self.query, "run superseded");
        }
    }
}

struct ActiveRun {
    ctx: Arc<RunContext>,
    driver: JoinHandle<()>,
}

/// Drives the loading screen for one query at a time.
pub struct Controller {
    aggregator: Arc<Aggregator>,
    navigator: Arc<dyn Navigator>,
    config: LoaderConfig,
    clock: Clock,
    view: Arc<watch::Sender<LoaderView>>,
    active: Option<ActiveRun>,
}

impl Controller {
    pub fn new(aggregator: Aggregator, navigator: Arc<dyn Navigator>, config: LoaderConfig) -> Self {
        let (view, _) = watch::channel(LoaderView::idle());
        Self {
            aggregator: Arc::new(aggregator),
            navigator,
            clock: Clock::new(config.frame),
            config,
            view: Arc::new(view),
            active: None,
        }
    }

    /// Observe `(progress, message, phase)`; updated on every tick.
    pub fn subscribe(&self) -> watch::Receiver<LoaderView> {
        self.view.subscribe()
    }

    pub fn view(&self) -> LoaderView {
        self.view.borrow().clone()
    }

    pub fn phase(&self) -> Phase {
        self.view.borrow().phase
    }

    pub fn run_context(&self) -> Option<&RunContext> {
        self.active.as_ref().map(|run| run.ctx.as_ref())
    }

    /// Any timer, animation frame or driver of the current run still alive.
    pub fn has_pending_work(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|run| run.ctx.timers().any_running() || !run.driver.is_finished())
    }

    /// Begin loading `query`. Blank queries are ignored; a run already in
    /// flight is closed first. Returns whether a run started.
    pub fn start(&mut self, query: &str) -> bool {
        let subject = query.trim();
        if subject.is_empty() {
            debug!("blank query, not starting");
            return false;
        }
        self.supersede();

        let gate = CancellationGate::new();
        self.view.send_replace(LoaderView {
            progress: 0.0,
            message: self.config.script.intro.clone(),
            phase: Phase::Running,
        });

        let ctx = Arc::new(RunContext {
            query: subject.to_string(),
            started_at: self.clock.now(),
            gate: gate.clone(),
            view: Arc::clone(&self.view),
            timers: Mutex::new(Timers::default()),
        });

        let progress = {
            let view = Arc::clone(&self.view);
            let gate = gate.clone();
            ProgressAnimator::start(
                self.clock,
                gate.clone(),
                self.config.curve,
                self.config.sprint,
                move |value| {
                    if !gate.is_terminal() {
                        view.send_modify(|v| v.progress = value);
                    }
                },
            )
        };
        let messages = {
            let view = Arc::clone(&self.view);
            let gate = gate.clone();
            MessageScheduler::start(
                self.clock,
                gate.clone(),
                self.config.script.clone(),
                self.config.message_interval,
                move |text| {
                    if !gate.is_terminal() {
                        view.send_modify(|v| v.message = text);
                    }
                },
            )
        };
        {
            let mut timers = ctx.timers();
            timers.progress = Some(progress);
            timers.messages = Some(messages);
        }

        let span = info_span!("run", subject = %subject);
        let driver = tokio::spawn(
            drive(
                Arc::clone(&ctx),
                Arc::clone(&self.aggregator),
                Arc::clone(&self.navigator),
                self.clock,
                self.config.min_duration,
                self.config.handoff_grace,
            )
            .instrument(span),
        );

        debug!(subject = %subject, "run started");
        self.active = Some(ActiveRun { ctx, driver });
        true
    }

    /// User cancel. Safe at any time; a no-op once the run has finished.
    /// Returns whether this call performed the cancel.
    pub fn cancel(&mut self) -> bool {
        let Some(run) = self.active.as_ref() else {
            return false;
        };
        let cancelled = run.ctx.finish(
            Phase::Cancelled,
            Destination::Origin { notice: None },
            self.navigator.as_ref(),
        );
        if cancelled {
            run.driver.abort();
        }
        cancelled
    }

    /// Resolve once the current run has reached a terminal phase.
    pub async fn wait(&self) -> Phase {
        let mut rx = self.view.subscribe();
        match rx
            .wait_for(|view| view.phase.is_terminal() || view.phase == Phase::Idle)
            .await
        {
            Ok(view) => view.phase,
            Err(_) => self.phase(),
        }
    }

    fn supersede(&mut self) {
        if let Some(run) = self.active.take() {
            run.ctx.supersede();
            run.driver.abort();
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.supersede();
    }
}

async fn drive(
    ctx: Arc<RunContext>,
    aggregator: Arc<Aggregator>,
    navigator: Arc<dyn Navigator>,
    clock: Clock,
    min_duration: Duration,
    grace: Duration,
) {
    let outcome = aggregator.run(ctx.query(), min_duration).await;
    if ctx.is_terminal() {
        debug!("run already closed, discarding aggregate outcome");
        return;
    }

    match outcome {
        Ok(payloads) => {
            ctx.advance(Phase::Completing);
            if let Some(full) = ctx.release() {
                if full.await.is_err() {
                    return;
                }
            }
            clock.delay(grace).await;

            let handoff = Handoff {
                subject: ctx.query().to_string(),
                payloads,
            };
            ctx.finish(Phase::Done, Destination::Report(handoff), navigator.as_ref());
        }
        Err(err) => {
            let notice = notice_for(&err, ctx.query());
            warn!(error = %err, kind = ?notice.kind, "aggregate failed");
            ctx.finish(
                Phase::Errored,
                Destination::Origin {
                    notice: Some(notice),
                },
                navigator.as_ref(),
            );
        }
    }
}
