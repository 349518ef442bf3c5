//! Browser engine abstraction: one shared Chromium process per run, one
//! isolated session per browser adapter. Adapters only ever see
//! [`BrowserSession`]; the orchestrator alone owns the process handle.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::BrowserConfigSection;
use crate::error::{JobFlowError, Result};

/// The shared browser process. Created once per run by the orchestrator,
/// torn down once per run after every browser adapter has exited its scope.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Carve out one isolated session for an adapter.
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>>;

    /// Shut the process down. Consumes the engine: no session can be
    /// created afterwards.
    async fn shutdown(self: Box<Self>) -> Result<()>;

    /// Number of sessions currently open.
    fn active_sessions(&self) -> usize;
}

/// One adapter-owned browser context. Closing a session never touches the
/// shared process.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// Execute JavaScript in the page and return its JSON result.
    async fn eval(&self, script: &str) -> Result<serde_json::Value>;

    /// Whether a CSS selector currently matches. Errors map to `false` at
    /// the mixin layer; here they still propagate.
    async fn query_exists(&self, selector: &str) -> Result<bool>;

    async fn click(&mut self, selector: &str) -> Result<()>;

    async fn type_into(&mut self, selector: &str, text: &str) -> Result<()>;

    /// Full-page PNG capture.
    async fn screenshot_png(&self) -> Result<Vec<u8>>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Resolve an explicit Chromium executable, config first, then the
/// environment. An explicitly named path that does not exist is a
/// configuration error; `Ok(None)` defers to chromiumoxide's detection.
fn find_chromium(config: &BrowserConfigSection) -> Result<Option<PathBuf>> {
    if let Some(path) = &config.chromium_path {
        if !path.exists() {
            return Err(JobFlowError::Config(format!(
                "configured chromium_path '{}' does not exist",
                path.display()
            )));
        }
        return Ok(Some(path.clone()));
    }
    if let Ok(p) = std::env::var("JOBFLOW_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if !path.exists() {
            return Err(JobFlowError::Config(format!(
                "JOBFLOW_CHROMIUM_PATH '{p}' does not exist"
            )));
        }
        return Ok(Some(path));
    }
    Ok(None)
}

/// Chromium-backed engine via chromiumoxide.
pub struct ChromiumEngine {
    browser: Browser,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumEngine {
    /// Launch one Chromium process. Headed by default: this is an
    /// operator-supervised tool and the confirmation checkpoints assume a
    /// visible browser.
    pub async fn launch(config: &BrowserConfigSection) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking");
        if let Some(path) = find_chromium(config)? {
            builder = builder.chrome_executable(path);
        }
        if !config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder
            .build()
            .map_err(|e| JobFlowError::Config(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config).await?;
        info!("Launched shared Chromium process (headless={})", config.headless);

        // Drive the CDP event loop for the lifetime of the process.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>> {
        let page = self.browser.new_page("about:blank").await?;
        self.active_count.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Opened browser session ({} active)",
            self.active_count.load(Ordering::Relaxed)
        );

        Ok(Box::new(ChromiumSession {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(self: Box<Self>) -> Result<()> {
        let open = self.active_count.load(Ordering::Relaxed);
        if open > 0 {
            warn!("Shutting down browser with {} session(s) still open", open);
        }
        let mut browser = self.browser;
        if let Err(e) = browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        let _ = browser.wait().await;
        info!("Shared Chromium process shut down");
        Ok(())
    }

    fn active_sessions(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page context.
pub struct ChromiumSession {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<()> {
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(timeout_ms),
            self.page.goto(url),
        )
        .await;

        match result {
            Ok(Ok(_)) => {
                let _ = self.page.wait_for_navigation().await;
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(JobFlowError::Adapter {
                message: format!("navigation to {url} timed out after {timeout_ms}ms"),
            }),
        }
    }

    async fn current_url(&self) -> Result<String> {
        let url = self.page.url().await?.map(|u| u.to_string()).unwrap_or_default();
        Ok(url)
    }

    async fn eval(&self, script: &str) -> Result<serde_json::Value> {
        let result = self.page.evaluate(script).await?;
        result.into_value().map_err(|e| JobFlowError::Adapter {
            message: format!("failed to convert JS result: {e:?}"),
        })
    }

    async fn query_exists(&self, selector: &str) -> Result<bool> {
        Ok(self.page.find_element(selector).await.is_ok())
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        let element = self.page.find_element(selector).await?;
        element.click().await?;
        Ok(())
    }

    async fn type_into(&mut self, selector: &str, text: &str) -> Result<()> {
        let element = self.page.find_element(selector).await?;
        element.click().await?;
        element.type_str(text).await?;
        Ok(())
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>> {
        let bytes = self
            .page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(true)
                    .build(),
            )
            .await?;
        Ok(bytes)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_configured_chromium_path_is_a_config_error() {
        let config = BrowserConfigSection {
            headless: true,
            chromium_path: Some(PathBuf::from("/nonexistent/chromium-binary")),
            nav_timeout_ms: 30_000,
        };

        let err = find_chromium(&config).unwrap_err();
        assert!(matches!(err, JobFlowError::Config(_)));
        assert!(err.to_string().contains("/nonexistent/chromium-binary"));
    }

    #[test]
    fn configured_chromium_path_wins_when_it_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chromium");
        std::fs::write(&path, b"").unwrap();

        let config = BrowserConfigSection {
            headless: true,
            chromium_path: Some(path.clone()),
            nav_timeout_ms: 30_000,
        };

        assert_eq!(find_chromium(&config).unwrap(), Some(path));
    }
}
