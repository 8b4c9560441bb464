use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{FetchError, Source};

#[derive(Debug, Clone)]
enum Scripted {
    Body(Value),
    Status(u16),
    Fail(String),
    Hang,
}

/// A scripted source for tests and offline runs. Waits `delay`, then
/// answers with its scripted outcome.
#[derive(Debug)]
pub struct MockSource {
    name: String,
    required: bool,
    delay: Duration,
    outcome: Scripted,
    calls: AtomicUsize,
}

impl MockSource {
    fn scripted(name: &str, outcome: Scripted) -> Self {
        Self {
            name: name.to_string(),
            required: false,
            delay: Duration::ZERO,
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn ok(name: &str, body: Value) -> Self {
        Self::scripted(name, Scripted::Body(body))
    }

    pub fn status(name: &str, status: u16) -> Self {
        Self::scripted(name, Scripted::Status(status))
    }

    pub fn failing(name: &str, message: &str) -> Self {
        Self::scripted(name, Scripted::Fail(message.to_string()))
    }

    /// Never answers.
    pub fn hanging(name: &str) -> Self {
        Self::scripted(name, Scripted::Hang)
    }

    pub fn mark_required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// How many times `fetch` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn required(&self) -> bool {
        self.required
    }

    async fn fetch(&self, _subject: &str) -> Result<Value, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        match &self.outcome {
            Scripted::Body(body) => Ok(body.clone()),
            Scripted::Status(status) => Err(FetchError::Status { status: *status }),
            Scripted::Fail(message) => Err(FetchError::Other(message.clone())),
            Scripted::Hang => futures::future::pending().await,
        }
    }
}
