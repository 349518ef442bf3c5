//! Wellfound adapter: browser-driven, read-only automation. The platform
//! has no in-product submission flow this tool drives, so `apply` reports
//! the external application URL and returns `false`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, instrument};

use crate::browser::BrowserSession;
use crate::contracts::{BrowserAdapter, JobSource, Operation};
use crate::error::{JobFlowError, Result};
use crate::mixin::{BrowserToolkit, ToolkitSettings};
use crate::registry::{AdapterFactory, AdapterRegistration};
use crate::types::{capabilities, ApplyMode, Job, SearchQuery};

const PLATFORM_KEY: &str = "wellfound";

const AVATAR_SELECTOR: &str = "[data-test='ProfileDropdown']";

const EXTRACT_LISTINGS_JS: &str = r#"
Array.from(document.querySelectorAll("[data-test='StartupResult'] [data-test='JobListing']")).map(el => ({
    id: el.getAttribute('data-job-id') || '',
    title: (el.querySelector("[data-test='JobTitle']")?.innerText || '').trim(),
    company: (el.closest("[data-test='StartupResult']")?.querySelector('h2')?.innerText || '').trim(),
    location: (el.querySelector("[data-test='JobLocations']")?.innerText || '').trim(),
    url: el.querySelector('a')?.href || ''
}))
"#;

const EXTRACT_DESCRIPTION_JS: &str =
    "(document.querySelector('#job-description')?.innerText || '').trim()";

pub fn registration() -> AdapterRegistration {
    AdapterRegistration {
        key: PLATFORM_KEY,
        display_name: "Wellfound",
        // Deliberately no in_product_apply: the resolver forces Manual for
        // every job from this platform.
        capabilities: &[capabilities::DETAIL_ENRICH],
        factory: AdapterFactory::Browser(|| Box::new(WellfoundAdapter::new())),
    }
}

pub struct WellfoundAdapter {
    toolkit: BrowserToolkit,
    session: Option<Box<dyn BrowserSession>>,
}

impl Default for WellfoundAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl WellfoundAdapter {
    pub fn new() -> Self {
        Self {
            toolkit: BrowserToolkit::new(PLATFORM_KEY),
            session: None,
        }
    }

    fn not_initialized() -> JobFlowError {
        JobFlowError::Adapter {
            message: "wellfound adapter used before init".into(),
        }
    }

    fn parse_listings(value: &Value, limit: usize) -> Result<Vec<Job>> {
        let listings = value.as_array().ok_or_else(|| {
            JobFlowError::MissingField("listing extraction did not return an array".into())
        })?;

        let mut jobs = Vec::new();
        for listing in listings.iter().take(limit) {
            let id = listing["id"].as_str().unwrap_or_default();
            let title = listing["title"].as_str().unwrap_or_default();
            if id.is_empty() || title.is_empty() {
                continue;
            }
            jobs.push(Job {
                platform: PLATFORM_KEY.to_string(),
                id: id.to_string(),
                title: title.to_string(),
                company: listing["company"].as_str().unwrap_or_default().to_string(),
                location: listing["location"].as_str().map(|s| s.to_string()),
                url: listing["url"].as_str().map(|s| s.to_string()),
                description: None,
                flags: Default::default(),
                discovered_at: chrono::Utc::now(),
            });
        }
        Ok(jobs)
    }
}

#[async_trait]
impl JobSource for WellfoundAdapter {
    fn name(&self) -> &'static str {
        PLATFORM_KEY
    }

    fn operations(&self) -> &'static [Operation] {
        Operation::BROWSER_REQUIRED
    }

    #[instrument(skip(self, query))]
    async fn search(&mut self, query: &SearchQuery) -> Result<Vec<Job>> {
        let url = format!(
            "https://wellfound.com/jobs?q={}",
            query.query.replace(' ', "+")
        );
        let timeout_ms = self.toolkit.nav_timeout_ms();
        self.toolkit.pace_navigation().await;
        let session = self
            .session
            .as_mut()
            .ok_or_else(Self::not_initialized)?;
        session.navigate(&url, timeout_ms).await?;

        let extracted = session.eval(EXTRACT_LISTINGS_JS).await?;
        let jobs = Self::parse_listings(&extracted, query.limit)?;
        info!("Extracted {} listing(s) from result page", jobs.len());
        Ok(jobs)
    }

    async fn enrich(&mut self, mut job: Job) -> Result<Job> {
        let Some(url) = job.url.clone() else {
            return Ok(job);
        };
        let timeout_ms = self.toolkit.nav_timeout_ms();
        self.toolkit.pace_navigation().await;
        let session = self
            .session
            .as_mut()
            .ok_or_else(Self::not_initialized)?;
        session.navigate(&url, timeout_ms).await?;
        let description = session.eval(EXTRACT_DESCRIPTION_JS).await?;
        if let Some(text) = description.as_str() {
            if !text.is_empty() {
                job.description = Some(text.to_string());
            }
        }
        Ok(job)
    }

    async fn apply(&mut self, job: &Job, _resume: Option<&Path>, _mode: ApplyMode) -> Result<bool> {
        let url = job.url.as_deref().unwrap_or("the platform");
        info!(
            "Wellfound has no in-product submission flow; apply to '{}' externally at {}",
            job.title, url
        );
        Ok(false)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            session.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserAdapter for WellfoundAdapter {
    async fn init(
        &mut self,
        session: Box<dyn BrowserSession>,
        settings: ToolkitSettings,
    ) -> Result<()> {
        self.toolkit.apply_settings(settings);
        self.session = Some(session);
        Ok(())
    }

    async fn login(&mut self) -> Result<bool> {
        // Search works anonymously, and this adapter never submits; no
        // credentials to enter.
        Ok(true)
    }

    async fn is_logged_in(&mut self) -> Result<bool> {
        let session = self.session.as_deref().ok_or_else(Self::not_initialized)?;
        Ok(self
            .toolkit
            .element_exists(session, AVATAR_SELECTOR, Duration::from_secs(3))
            .await)
    }
}
