//! Remotive adapter: API-driven. Owns its own HTTP client from `init`; no
//! browser session and no login concept. The platform has no in-product
//! submission flow, so every apply decision resolves to Manual upstream.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::contracts::{ApiAdapter, JobSource, Operation};
use crate::error::{JobFlowError, Result};
use crate::registry::{AdapterFactory, AdapterRegistration};
use crate::types::{ApplyMode, Job, SearchQuery};

const PLATFORM_KEY: &str = "remotive";
const API_URL: &str = "https://remotive.com/api/remote-jobs";

pub fn registration() -> AdapterRegistration {
    AdapterRegistration {
        key: PLATFORM_KEY,
        display_name: "Remotive",
        capabilities: &[],
        factory: AdapterFactory::Api(|| Box::new(RemotiveAdapter::new())),
    }
}

#[derive(Default)]
pub struct RemotiveAdapter {
    client: Option<reqwest::Client>,
}

impl RemotiveAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> Result<&reqwest::Client> {
        self.client.as_ref().ok_or_else(|| JobFlowError::Adapter {
            message: "remotive adapter used before init".into(),
        })
    }

    /// Translate the API payload into typed jobs, preserving the payload's
    /// own ordering.
    fn parse_jobs(payload: &Value, limit: usize) -> Result<Vec<Job>> {
        let listings = payload["jobs"]
            .as_array()
            .ok_or_else(|| JobFlowError::MissingField("jobs not found".into()))?;

        let mut jobs = Vec::new();
        for listing in listings.iter().take(limit) {
            let id = match &listing["id"] {
                Value::Number(n) => n.to_string(),
                Value::String(s) => s.clone(),
                _ => {
                    debug!("Dropping listing with missing id");
                    continue;
                }
            };
            let title = listing["title"].as_str().unwrap_or_default();
            if title.is_empty() {
                continue;
            }
            jobs.push(Job {
                platform: PLATFORM_KEY.to_string(),
                id,
                title: title.to_string(),
                company: listing["company_name"].as_str().unwrap_or_default().to_string(),
                location: listing["candidate_required_location"]
                    .as_str()
                    .map(|s| s.to_string()),
                url: listing["url"].as_str().map(|s| s.to_string()),
                description: listing["description"].as_str().map(|s| s.to_string()),
                flags: Default::default(),
                discovered_at: chrono::Utc::now(),
            });
        }
        Ok(jobs)
    }
}

#[async_trait]
impl JobSource for RemotiveAdapter {
    fn name(&self) -> &'static str {
        PLATFORM_KEY
    }

    fn operations(&self) -> &'static [Operation] {
        Operation::API_REQUIRED
    }

    #[instrument(skip(self, query))]
    async fn search(&mut self, query: &SearchQuery) -> Result<Vec<Job>> {
        let client = self.client()?;
        let response = client
            .get(API_URL)
            .query(&[
                ("search", query.query.as_str()),
                ("limit", &query.limit.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;
        let payload: Value = response.json().await?;

        let jobs = Self::parse_jobs(&payload, query.limit)?;
        info!("Fetched {} job(s) from Remotive", jobs.len());
        Ok(jobs)
    }

    async fn apply(&mut self, job: &Job, _resume: Option<&Path>, _mode: ApplyMode) -> Result<bool> {
        let url = job.url.as_deref().unwrap_or("the listing");
        info!(
            "Remotive listings are applied to on the employer's site; see {}",
            url
        );
        Ok(false)
    }

    async fn close(&mut self) -> Result<()> {
        // Releases only the adapter-owned client.
        self.client = None;
        Ok(())
    }
}

#[async_trait]
impl ApiAdapter for RemotiveAdapter {
    async fn init(&mut self) -> Result<()> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("jobflow/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        self.client = Some(client);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_jobs_maps_payload_listings() {
        let payload = json!({
            "job-count": 2,
            "jobs": [
                {
                    "id": 1801,
                    "title": "Senior Rust Developer",
                    "company_name": "Hooli",
                    "candidate_required_location": "Worldwide",
                    "url": "https://remotive.com/remote-jobs/software-dev/1801",
                    "description": "<p>Build things.</p>"
                },
                {
                    "id": 1802,
                    "title": "Platform Engineer",
                    "company_name": "Pied Piper",
                    "candidate_required_location": "Europe",
                    "url": "https://remotive.com/remote-jobs/software-dev/1802",
                    "description": "<p>Run things.</p>"
                }
            ]
        });

        let jobs = RemotiveAdapter::parse_jobs(&payload, 10).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].platform, "remotive");
        assert_eq!(jobs[0].id, "1801");
        assert_eq!(jobs[1].company, "Pied Piper");
    }

    #[test]
    fn parse_jobs_truncates_to_the_limit() {
        let payload = json!({
            "jobs": [
                { "id": 1, "title": "A" },
                { "id": 2, "title": "B" },
                { "id": 3, "title": "C" }
            ]
        });

        let jobs = RemotiveAdapter::parse_jobs(&payload, 2).unwrap();
        assert_eq!(jobs.len(), 2);
    }

    #[test]
    fn parse_jobs_requires_the_jobs_array() {
        let err = RemotiveAdapter::parse_jobs(&json!({"job-count": 0}), 10).unwrap_err();
        assert!(matches!(err, JobFlowError::MissingField(_)));
    }

    #[test]
    fn search_before_init_is_an_adapter_error() {
        let adapter = RemotiveAdapter::new();
        assert!(adapter.client().is_err());
    }
}
