//! Concurrent fan-out over the report sources, joined with a minimum
//! on-screen duration.
//!
//! All sources are polled together alongside a floor timer; the combined
//! outcome settles only once both sides are done. A failing required source
//! fails the aggregate, a failing optional one just leaves a `null` hole.

pub mod http;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clock::Clock;

/// Why a single source could not deliver.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}")]
    Status { status: u16 },
    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// The backend answered 404 for this subject.
    pub fn is_not_found(&self) -> bool {
        match self {
            FetchError::Status { status } => *status == 404,
            FetchError::Http(e) => e.status().is_some_and(|s| s.as_u16() == 404),
            _ => false,
        }
    }
}

/// Outcome of a whole aggregate run that did not produce payloads.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// Every required source answered, and all of them had nothing.
    #[error("no data found for '{subject}'")]
    NotFound { subject: String },
    /// A required source failed outright.
    #[error("source '{source_name}' failed: {cause}")]
    Transport {
        source_name: String,
        #[source]
        cause: FetchError,
    },
}

/// One independent asynchronous fetch, keyed by the query subject.
#[async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this source takes part in not-found classification and
    /// fails the aggregate when it fails.
    fn required(&self) -> bool {
        false
    }

    async fn fetch(&self, subject: &str) -> Result<Value, FetchError>;
}

/// A fetched body tagged with the source that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub source: String,
    pub required: bool,
    pub body: Value,
}

/// Decides whether a complete set of payloads means "nothing for this
/// subject" rather than success.
pub trait EmptinessCheck: Send + Sync {
    fn is_not_found(&self, payloads: &[Payload]) -> bool;
}

impl<F> EmptinessCheck for F
where
    F: Fn(&[Payload]) -> bool + Send + Sync,
{
    fn is_not_found(&self, payloads: &[Payload]) -> bool {
        self(payloads)
    }
}

/// Not found when every required payload is empty. Never fires when no
/// source is required.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredEmpty;

impl EmptinessCheck for RequiredEmpty {
    fn is_not_found(&self, payloads: &[Payload]) -> bool {
        let mut required = payloads.iter().filter(|p| p.required).peekable();
        required.peek().is_some() && required.all(|p| is_empty_body(&p.body))
    }
}

/// `null`, `{}`, `[]` and `""` count as empty.
pub fn is_empty_body(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Runs a fixed set of sources concurrently with a floor timer.
pub struct Aggregator {
    sources: Vec<Arc<dyn Source>>,
    emptiness: Arc<dyn EmptinessCheck>,
    clock: Clock,
}

impl Aggregator {
    pub fn new(sources: Vec<Arc<dyn Source>>) -> Self {
        Self {
            sources,
            emptiness: Arc::new(RequiredEmpty),
            clock: Clock::default(),
        }
    }

    pub fn with_emptiness(mut self, check: impl EmptinessCheck + 'static) -> Self {
        self.emptiness = Arc::new(check);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn sources(&self) -> &[Arc<dyn Source>] {
        &self.sources
    }

    /// Fetch everything for `subject`. Settles no earlier than
    /// `min_duration`, with payloads in source order.
    pub async fn run(
        &self,
        subject: &str,
        min_duration: Duration,
    ) -> Result<Vec<Payload>, AggregateError> {
        let fetches = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            async move {
                let name = source.name().to_string();
                let required = source.required();
                match source.fetch(subject).await {
                    Ok(body) => Ok(Payload {
                        source: name,
                        required,
                        body,
                    }),
                    Err(cause) if !required => {
                        warn!(source = %name, error = %cause, "optional source failed, continuing without it");
                        Ok(Payload {
                            source: name,
                            required,
                            body: Value::Null,
                        })
                    }
                    Err(cause) => Err(AggregateError::Transport {
                        source_name: name,
                        cause,
                    }),
                }
            }
        });

        debug!(sources = self.sources.len(), ?min_duration, "aggregate started");
        let ((), outcome) = tokio::join!(
            self.clock.delay(min_duration),
            futures::future::try_join_all(fetches)
        );
        let payloads = outcome?;

        if self.emptiness.is_not_found(&payloads) {
            return Err(AggregateError::NotFound {
                subject: subject.to_string(),
            });
        }
        debug!("aggregate settled");
        Ok(payloads)
    }
}
