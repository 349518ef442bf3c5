//! LinkedIn adapter: browser-driven, supports the in-product "Easy Apply"
//! flow. Raw DOM shapes never leave this module.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::browser::BrowserSession;
use crate::contracts::{BrowserAdapter, JobSource, Operation};
use crate::error::{JobFlowError, Result};
use crate::mixin::{BrowserToolkit, ToolkitSettings};
use crate::registry::{AdapterFactory, AdapterRegistration};
use crate::types::{capabilities, flags, ApplyMode, Job, SearchQuery};

const PLATFORM_KEY: &str = "linkedin";
const EMAIL_ENV: &str = "JOBFLOW_LINKEDIN_EMAIL";
const PASSWORD_ENV: &str = "JOBFLOW_LINKEDIN_PASSWORD";

const AVATAR_SELECTOR: &str = "img.global-nav__me-photo";
const CHALLENGE_SELECTOR: &str = "#captcha-internal";
const EASY_APPLY_SELECTOR: &str = "button.jobs-apply-button";
const SUBMIT_SELECTOR: &str = "button[aria-label='Submit application']";

/// In-page extraction: the result cards are read in DOM order, which is the
/// platform's own ranking order.
const EXTRACT_POSTINGS_JS: &str = r#"
Array.from(document.querySelectorAll('li.jobs-search-results__list-item')).map(li => ({
    id: li.dataset.occludableJobId || '',
    title: (li.querySelector('.job-card-list__title')?.innerText || '').trim(),
    company: (li.querySelector('.job-card-container__primary-description')?.innerText || '').trim(),
    location: (li.querySelector('.job-card-container__metadata-item')?.innerText || '').trim(),
    url: li.querySelector('a.job-card-list__title')?.href || '',
    easy_apply: !!li.querySelector('.job-card-container__apply-method')
}))
"#;

const EXTRACT_DESCRIPTION_JS: &str =
    "(document.querySelector('.jobs-description__content')?.innerText || '').trim()";

pub fn registration() -> AdapterRegistration {
    AdapterRegistration {
        key: PLATFORM_KEY,
        display_name: "LinkedIn",
        capabilities: &[capabilities::IN_PRODUCT_APPLY, capabilities::DETAIL_ENRICH],
        factory: AdapterFactory::Browser(|| Box::new(LinkedInAdapter::new())),
    }
}

pub struct LinkedInAdapter {
    toolkit: BrowserToolkit,
    session: Option<Box<dyn BrowserSession>>,
}

impl Default for LinkedInAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkedInAdapter {
    pub fn new() -> Self {
        Self {
            toolkit: BrowserToolkit::new(PLATFORM_KEY),
            session: None,
        }
    }

    fn session(&mut self) -> Result<&mut Box<dyn BrowserSession>> {
        self.session.as_mut().ok_or_else(Self::not_initialized)
    }

    fn not_initialized() -> JobFlowError {
        JobFlowError::Adapter {
            message: "linkedin adapter used before init".into(),
        }
    }

    fn search_url(query: &SearchQuery) -> String {
        let mut url = format!(
            "https://www.linkedin.com/jobs/search/?keywords={}",
            urlencode(&query.query)
        );
        if let Some(location) = &query.location {
            url.push_str(&format!("&location={}", urlencode(location)));
        }
        url
    }

    /// Translate the extracted card array into typed jobs. Pure, so the
    /// translation is testable without a browser.
    fn parse_postings(value: &Value, limit: usize) -> Result<Vec<Job>> {
        let cards = value.as_array().ok_or_else(|| {
            JobFlowError::MissingField("posting extraction did not return an array".into())
        })?;

        let mut jobs = Vec::new();
        for card in cards.iter().take(limit) {
            let id = card["id"].as_str().unwrap_or_default();
            let title = card["title"].as_str().unwrap_or_default();
            if id.is_empty() || title.is_empty() {
                debug!("Dropping card with missing id/title");
                continue;
            }
            let mut job_flags = BTreeSet::new();
            if card["easy_apply"].as_bool().unwrap_or(false) {
                job_flags.insert(flags::EXPRESS_APPLY.to_string());
            }
            jobs.push(Job {
                platform: PLATFORM_KEY.to_string(),
                id: id.to_string(),
                title: title.to_string(),
                company: card["company"].as_str().unwrap_or_default().to_string(),
                location: card["location"].as_str().map(|s| s.to_string()),
                url: card["url"].as_str().map(|s| s.to_string()),
                description: None,
                flags: job_flags,
                discovered_at: chrono::Utc::now(),
            });
        }
        Ok(jobs)
    }
}

#[async_trait]
impl JobSource for LinkedInAdapter {
    fn name(&self) -> &'static str {
        PLATFORM_KEY
    }

    fn operations(&self) -> &'static [Operation] {
        Operation::BROWSER_REQUIRED
    }

    #[instrument(skip(self, query))]
    async fn search(&mut self, query: &SearchQuery) -> Result<Vec<Job>> {
        let url = Self::search_url(query);
        let limit = query.limit;
        let timeout_ms = self.toolkit.nav_timeout_ms();
        self.toolkit.pace_navigation().await;
        self.session()?.navigate(&url, timeout_ms).await?;

        let session = self.session()?;
        let extracted = session.eval(EXTRACT_POSTINGS_JS).await?;
        let jobs = Self::parse_postings(&extracted, limit)?;
        info!("Extracted {} posting(s) from result page", jobs.len());
        Ok(jobs)
    }

    async fn enrich(&mut self, mut job: Job) -> Result<Job> {
        let Some(url) = job.url.clone() else {
            return Ok(job);
        };
        let timeout_ms = self.toolkit.nav_timeout_ms();
        self.toolkit.pace_navigation().await;
        let session = self.session()?;
        session.navigate(&url, timeout_ms).await?;
        let description = session.eval(EXTRACT_DESCRIPTION_JS).await?;
        if let Some(text) = description.as_str() {
            if !text.is_empty() {
                job.description = Some(text.to_string());
            }
        }
        Ok(job)
    }

    #[instrument(skip(self, job, _resume), fields(job_id = %job.id))]
    async fn apply(&mut self, job: &Job, _resume: Option<&Path>, mode: ApplyMode) -> Result<bool> {
        let Some(url) = &job.url else {
            return Err(JobFlowError::MissingField(format!(
                "job {} has no URL to apply at",
                job.id
            )));
        };
        let timeout_ms = self.toolkit.nav_timeout_ms();
        self.toolkit.pace_navigation().await;
        self.session()?.navigate(url, timeout_ms).await?;

        let session = self.session.as_deref().ok_or_else(Self::not_initialized)?;
        let has_easy_apply = self
            .toolkit
            .element_exists(session, EASY_APPLY_SELECTOR, Duration::from_secs(5))
            .await;
        if !has_easy_apply {
            // No in-product flow for this posting; hand the URL back to the
            // operator. A legitimate terminal outcome, not a failure.
            info!("No in-product apply for job {}; apply externally at {}", job.id, url);
            return Ok(false);
        }

        self.toolkit.pace_form().await;
        self.session()?.click(EASY_APPLY_SELECTOR).await?;

        // Keep an artifact of what is about to be submitted.
        let session = self.session.as_deref().ok_or_else(Self::not_initialized)?;
        self.toolkit.screenshot(session, "pre_submit").await?;

        if mode != ApplyMode::Auto {
            let answer = self
                .toolkit
                .confirm(&format!("Submit application for '{}'? [y/N]", job.title))?;
            if !answer.eq_ignore_ascii_case("y") {
                return Err(JobFlowError::HumanAbort {
                    job: job.id.clone(),
                });
            }
        }

        self.toolkit.pace_form().await;
        self.session()?.click(SUBMIT_SELECTOR).await?;
        info!("Submitted application for job {}", job.id);
        Ok(true)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            session.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserAdapter for LinkedInAdapter {
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
        let email = std::env::var(EMAIL_ENV)?;
        let password = std::env::var(PASSWORD_ENV)?;

        let timeout_ms = self.toolkit.nav_timeout_ms();
        self.toolkit.pace_navigation().await;
        self.session()?
            .navigate("https://www.linkedin.com/login", timeout_ms)
            .await?;

        self.toolkit.pace_form().await;
        self.session()?.type_into("#username", &email).await?;
        self.toolkit.pace_form().await;
        self.session()?.type_into("#password", &password).await?;
        self.toolkit.pace_form().await;
        self.session()?.click("button[type='submit']").await?;

        let session = self.session.as_deref().ok_or_else(Self::not_initialized)?;
        let challenged = self
            .toolkit
            .element_exists(session, CHALLENGE_SELECTOR, Duration::from_secs(3))
            .await;
        if challenged {
            // Checkpoint pages need a human; block until the operator says
            // the browser is past it.
            self.toolkit
                .confirm("Complete the verification in the browser, then press Enter")?;
        }

        self.is_logged_in().await
    }

    async fn is_logged_in(&mut self) -> Result<bool> {
        let session = self.session.as_deref().ok_or_else(Self::not_initialized)?;
        Ok(self
            .toolkit
            .element_exists(session, AVATAR_SELECTOR, Duration::from_secs(5))
            .await)
    }
}

fn urlencode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => out.push(c),
            ' ' => out.push_str("%20"),
            other => {
                let mut buf = [0u8; 4];
                for byte in other.encode_utf8(&mut buf).as_bytes() {
                    out.push_str(&format!("%{byte:02X}"));
                }
            }
        }
    }
    out
}
