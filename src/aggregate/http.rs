//! Report sources backed by the analytics HTTP API.

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::{FetchError, Source};

/// GET `<endpoint>?company_name=<subject>&<params>` and decode the JSON body.
pub struct HttpSource {
    name: String,
    endpoint: String,
    params: Vec<(String, String)>,
    required: bool,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(client: reqwest::Client, name: &str, endpoint: &str) -> Self {
        Self {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            params: Vec::new(),
            required: false,
            client,
        }
    }

    /// Count this source towards not-found classification.
    pub fn mark_required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Add a fixed query parameter sent with every request.
    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn url_for(&self, subject: &str) -> Result<Url, FetchError> {
        let params = std::iter::once(("company_name", subject))
            .chain(self.params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        Url::parse_with_params(&self.endpoint, params)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {e}", self.endpoint)))
    }
}

#[async_trait]
impl Source for HttpSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn required(&self) -> bool {
        self.required
    }

    async fn fetch(&self, subject: &str) -> Result<Value, FetchError> {
        let url = self.url_for(subject)?;
        debug!(source = %self.name, %url, "fetching");

        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// The four report sources: summary and news are required, keywords and
/// points are enrichment.
pub fn report_sources(base_url: &str) -> Vec<Arc<dyn Source>> {
    let base = base_url.trim_end_matches('/');
    let client = reqwest::Client::new();

    vec![
        Arc::new(
            HttpSource::new(client.clone(), "summary", &format!("{base}/api/report/summary"))
                .mark_required(),
        ),
        Arc::new(
            HttpSource::new(client.clone(), "news", &format!("{base}/api/report/news"))
                .param("sort_order", "newest")
                .mark_required(),
        ),
        Arc::new(HttpSource::new(
            client.clone(),
            "keywords",
            &format!("{base}/api/analytics/keywords"),
        )),
        Arc::new(HttpSource::new(
            client,
            "points",
            &format!("{base}/api/analytics/points"),
        )),
    ]
}
