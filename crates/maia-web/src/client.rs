//! HTTP client for a running dashboard API.

use crate::routes::{ErrorResponse, TEST_NOT_FOUND};
use crate::source::{ReportSource, SourceError, SourceResult, validate_id};
use async_trait::async_trait;
use maia_report::{Report, RunId, reconcile};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Reads reports through the dashboard's `/api/runs` endpoints.
#[derive(Debug, Clone)]
pub struct ReportClient {
    client: Client,
    base_url: Url,
}

impl ReportClient {
    /// Creates a client for the API rooted at `base_url` (e.g. `http://localhost:3000`).
    pub fn new(base_url: &str) -> SourceResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| SourceError::BaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SourceError::BaseUrl {
                url: base_url.to_string(),
                reason: "not a hierarchical URL".to_string(),
            });
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds `<base>/api/runs/<segments...>` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> SourceResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| SourceError::BaseUrl {
                url: self.base_url.to_string(),
                reason: "not a hierarchical URL".to_string(),
            })?
            .pop_if_empty()
            .extend(["api", "runs"])
            .extend(segments);
        Ok(url)
    }

    /// URL of one test report, `<base>/api/runs/<run>/tests/<test>`.
    fn test_url(&self, run_id: &str, test_id: &str) -> SourceResult<Url> {
        self.endpoint(&[run_id, "tests", test_id])
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> SourceResult<T> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header("accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(SourceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ReportSource for ReportClient {
    async fn list_runs(&self) -> SourceResult<Vec<RunId>> {
        let url = self.endpoint(&[])?;
        self.get_json(url).await
    }

    async fn run_reports(&self, run_id: &str) -> SourceResult<Vec<Report>> {
        validate_id(run_id)?;
        let url = self.endpoint(&[run_id])?;
        let documents: Vec<Value> = self.get_json(url).await?;

        let mut reports = Vec::with_capacity(documents.len());
        for document in documents {
            match reconcile(document) {
                Ok(report) => reports.push(report),
                Err(e) => warn!(run_id, "Skipping unreadable report: {}", e),
            }
        }
        Ok(reports)
    }

    async fn test_report(&self, run_id: &str, test_id: &str) -> SourceResult<Report> {
        validate_id(run_id)?;
        validate_id(test_id)?;
        let url = self.test_url(run_id, test_id)?;

        match self.get_json::<Value>(url).await {
            Ok(document) => {
                let mut report = reconcile(document)?;
                if report.test_id.is_empty() {
                    report.test_id = test_id.to_string();
                }
                Ok(report)
            }
            // A bare 404 means the route was missed, not that the test is absent.
            Err(SourceError::Status { status, message })
                if status == StatusCode::NOT_FOUND.as_u16() && message == TEST_NOT_FOUND =>
            {
                Err(SourceError::NotFound {
                    run_id: run_id.to_string(),
                    test_id: test_id.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }
}
