//! Shared behavior for browser-driven adapters, attached by composition: a
//! [`BrowserToolkit`] field, not a base type, so two adapters sharing it
//! remain otherwise unrelated.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info};

use crate::browser::BrowserSession;
use crate::config::{ArtifactsConfig, BrowserConfigSection, Config, PacingConfig};
use crate::error::{JobFlowError, Result};

/// Blocking single-line prompt used for human-in-the-loop checkpoints.
/// Modeled as an explicit boundary so tests substitute a scripted source
/// instead of faking stdin.
pub trait ConfirmationSource: Send + Sync {
    /// Returns the raw operator input line, trimmed of the trailing newline.
    fn confirm(&self, prompt: &str) -> Result<String>;
}

/// Reads one line from stdin. Blocks the whole pipeline until the operator
/// answers, which is the intended behavior for a single-operator tool.
pub struct StdinConfirmation;

impl ConfirmationSource for StdinConfirmation {
    fn confirm(&self, prompt: &str) -> Result<String> {
        print!("{prompt} ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Scripted answers for tests.
pub struct ScriptedConfirmation {
    answers: Mutex<VecDeque<String>>,
}

impl ScriptedConfirmation {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
        }
    }
}

impl ConfirmationSource for ScriptedConfirmation {
    fn confirm(&self, _prompt: &str) -> Result<String> {
        self.answers
            .lock()
            .expect("confirmation script poisoned")
            .pop_front()
            .ok_or_else(|| JobFlowError::Adapter {
                message: "confirmation script exhausted".into(),
            })
    }
}

/// Browser automation settings extracted once per run from the loaded
/// configuration. The orchestrator hands a copy to every browser adapter at
/// init so the `[pacing]`, `[artifacts]`, and `[browser]` sections actually
/// govern runtime behavior.
#[derive(Debug, Clone)]
pub struct ToolkitSettings {
    pub pacing: PacingConfig,
    pub screenshot_dir: PathBuf,
    pub nav_timeout_ms: u64,
}

impl ToolkitSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pacing: config.pacing.clone(),
            screenshot_dir: config.artifacts.screenshot_dir.clone(),
            nav_timeout_ms: config.browser.nav_timeout_ms,
        }
    }
}

impl Default for ToolkitSettings {
    fn default() -> Self {
        Self {
            pacing: PacingConfig::default(),
            screenshot_dir: ArtifactsConfig::default().screenshot_dir,
            nav_timeout_ms: BrowserConfigSection::default().nav_timeout_ms,
        }
    }
}

/// Composable helpers for browser adapters: human-paced delays, debug
/// screenshots, operator confirmation, and a non-throwing element probe.
pub struct BrowserToolkit {
    platform: &'static str,
    pacing: PacingConfig,
    screenshot_dir: PathBuf,
    nav_timeout_ms: u64,
    confirmation: Box<dyn ConfirmationSource>,
}

impl BrowserToolkit {
    pub fn new(platform: &'static str) -> Self {
        let settings = ToolkitSettings::default();
        Self {
            platform,
            pacing: settings.pacing,
            screenshot_dir: settings.screenshot_dir,
            nav_timeout_ms: settings.nav_timeout_ms,
            confirmation: Box::new(StdinConfirmation),
        }
    }

    /// Replace the default timing and artifact settings with the run's
    /// configured values. Called from adapter `init`.
    pub fn apply_settings(&mut self, settings: ToolkitSettings) {
        self.pacing = settings.pacing;
        self.screenshot_dir = settings.screenshot_dir;
        self.nav_timeout_ms = settings.nav_timeout_ms;
    }

    pub fn with_settings(mut self, settings: ToolkitSettings) -> Self {
        self.apply_settings(settings);
        self
    }

    pub fn with_confirmation(mut self, source: Box<dyn ConfirmationSource>) -> Self {
        self.confirmation = source;
        self
    }

    /// The configured per-navigation timeout, for adapters' `navigate` calls.
    pub fn nav_timeout_ms(&self) -> u64 {
        self.nav_timeout_ms
    }

    /// Randomized delay before a navigation.
    pub async fn pace_navigation(&self) {
        Self::pace(self.pacing.nav_delay_ms).await;
    }

    /// Randomized delay before a form interaction. Drawn from its own
    /// range, independent of the navigation range.
    pub async fn pace_form(&self) {
        Self::pace(self.pacing.form_delay_ms).await;
    }

    async fn pace(range: [u64; 2]) {
        let ms = {
            let mut rng = rand::thread_rng();
            rng.gen_range(range[0]..=range[1])
        };
        debug!("Pacing for {}ms", ms);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    /// Capture a full-page screenshot to the debug location. The name is
    /// deterministic from platform key + label + timestamp.
    pub async fn screenshot(
        &self,
        session: &dyn BrowserSession,
        label: &str,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.screenshot_dir)?;
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let filename = format!("{}_{}_{}.png", self.platform, label, timestamp);
        let path = self.screenshot_dir.join(filename);

        let bytes = session.screenshot_png().await?;
        std::fs::write(&path, bytes)?;
        info!("Saved screenshot to {}", path.display());
        Ok(path)
    }

    /// Block for a single line of operator input.
    pub fn confirm(&self, prompt: &str) -> Result<String> {
        self.confirmation.confirm(prompt)
    }

    /// Whether `selector` appears within `timeout`. Never errors: absence,
    /// timeout, and session failures all answer `false`.
    pub async fn element_exists(
        &self,
        session: &dyn BrowserSession,
        selector: &str,
        timeout: Duration,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Ok(true) = session.query_exists(selector).await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Session whose element probe flips to `true` after a set number of
    /// polls; everything else is inert.
    struct ProbeSession {
        hits_after: Mutex<usize>,
    }

    #[async_trait]
    impl BrowserSession for ProbeSession {
        async fn navigate(&mut self, _url: &str, _timeout_ms: u64) -> Result<()> {
            Ok(())
        }
        async fn current_url(&self) -> Result<String> {
            Ok("about:blank".into())
        }
        async fn eval(&self, _script: &str) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
        async fn query_exists(&self, _selector: &str) -> Result<bool> {
            let mut remaining = self.hits_after.lock().unwrap();
            if *remaining == 0 {
                Ok(true)
            } else {
                *remaining -= 1;
                Ok(false)
            }
        }
        async fn click(&mut self, _selector: &str) -> Result<()> {
            Ok(())
        }
        async fn type_into(&mut self, _selector: &str, _text: &str) -> Result<()> {
            Ok(())
        }
        async fn screenshot_png(&self) -> Result<Vec<u8>> {
            Ok(vec![0x89, b'P', b'N', b'G'])
        }
        async fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn scripted_confirmation_replays_answers_in_order() {
        let source = ScriptedConfirmation::new(["y", "n"]);
        assert_eq!(source.confirm("submit?").unwrap(), "y");
        assert_eq!(source.confirm("submit?").unwrap(), "n");
        assert!(source.confirm("submit?").is_err());
    }

    #[tokio::test]
    async fn element_exists_finds_late_elements_within_timeout() {
        let toolkit = BrowserToolkit::new("test");
        let session = ProbeSession {
            hits_after: Mutex::new(2),
        };
        assert!(
            toolkit
                .element_exists(&session, "#apply", Duration::from_secs(2))
                .await
        );
    }

    #[tokio::test]
    async fn element_exists_answers_false_after_timeout() {
        let toolkit = BrowserToolkit::new("test");
        let session = ProbeSession {
            hits_after: Mutex::new(usize::MAX),
        };
        assert!(
            !toolkit
                .element_exists(&session, "#missing", Duration::from_millis(250))
                .await
        );
    }

    #[test]
    fn settings_carry_the_configured_sections() {
        let config = Config {
            pipeline: crate::config::PipelineConfig {
                platforms: vec!["linkedin".into()],
                apply_mode: crate::types::ApplyMode::SemiAuto,
                resume_path: None,
            },
            search: crate::config::SearchConfig::default(),
            browser: BrowserConfigSection {
                headless: true,
                chromium_path: None,
                nav_timeout_ms: 5_000,
            },
            pacing: PacingConfig {
                nav_delay_ms: [1, 2],
                form_delay_ms: [3, 4],
            },
            artifacts: ArtifactsConfig {
                screenshot_dir: PathBuf::from("shots"),
            },
        };

        let settings = ToolkitSettings::from_config(&config);
        assert_eq!(settings.nav_timeout_ms, 5_000);
        assert_eq!(settings.pacing.nav_delay_ms, [1, 2]);
        assert_eq!(settings.pacing.form_delay_ms, [3, 4]);
        assert_eq!(settings.screenshot_dir, PathBuf::from("shots"));

        let toolkit = BrowserToolkit::new("linkedin").with_settings(settings);
        assert_eq!(toolkit.nav_timeout_ms(), 5_000);
        assert_eq!(toolkit.screenshot_dir, PathBuf::from("shots"));
    }

    #[tokio::test]
    async fn screenshot_names_carry_platform_and_label() {
        let dir = tempfile::tempdir().unwrap();
        let toolkit = BrowserToolkit::new("alpha").with_settings(ToolkitSettings {
            screenshot_dir: dir.path().to_path_buf(),
            ..Default::default()
        });
        let session = ProbeSession {
            hits_after: Mutex::new(0),
        };

        let path = toolkit.screenshot(&session, "pre_submit").await.unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("alpha_pre_submit_"));
        assert!(name.ends_with(".png"));
        assert!(path.exists());
    }
}
