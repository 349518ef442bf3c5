use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::error::{JobFlowError, Result};
use crate::types::ApplyMode;

/// Top-level configuration, loaded from `config.toml`.
///
/// Credentials are deliberately absent: adapters read them from the
/// environment (see `.env`) at login time so they never land in a struct
/// that gets logged or serialized.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub browser: BrowserConfigSection,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Enabled platform keys, in execution order.
    pub platforms: Vec<String>,
    #[serde(default)]
    pub apply_mode: ApplyMode,
    pub resume_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub query: String,
    pub location: Option<String>,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfigSection {
    #[serde(default)]
    pub headless: bool,
    /// Overrides Chromium auto-detection when set.
    pub chromium_path: Option<PathBuf>,
    #[serde(default = "default_nav_timeout_ms")]
    pub nav_timeout_ms: u64,
}

/// Randomized human-pacing delay ranges, in milliseconds. Navigation and
/// form interaction draw from independent ranges.
#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_nav_delay_ms")]
    pub nav_delay_ms: [u64; 2],
    #[serde(default = "default_form_delay_ms")]
    pub form_delay_ms: [u64; 2],
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,
}

fn default_search_limit() -> usize {
    25
}

fn default_nav_timeout_ms() -> u64 {
    30_000
}

fn default_nav_delay_ms() -> [u64; 2] {
    [800, 2_500]
}

fn default_form_delay_ms() -> [u64; 2] {
    [300, 1_200]
}

fn default_screenshot_dir() -> PathBuf {
    PathBuf::from("debug/screenshots")
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            query: String::new(),
            location: None,
            limit: default_search_limit(),
        }
    }
}

impl Default for BrowserConfigSection {
    fn default() -> Self {
        Self {
            headless: false,
            chromium_path: None,
            nav_timeout_ms: default_nav_timeout_ms(),
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            nav_delay_ms: default_nav_delay_ms(),
            form_delay_ms: default_form_delay_ms(),
        }
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            screenshot_dir: default_screenshot_dir(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let config_content = fs::read_to_string(path).map_err(|e| {
            JobFlowError::Config(format!("Failed to read config file '{}': {}", path, e))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.pipeline.platforms.is_empty() {
            return Err(JobFlowError::Config(
                "pipeline.platforms must list at least one platform".into(),
            ));
        }
        for range in [&self.pacing.nav_delay_ms, &self.pacing.form_delay_ms] {
            if range[0] > range[1] {
                return Err(JobFlowError::Config(format!(
                    "pacing delay range [{}, {}] is inverted",
                    range[0], range[1]
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [pipeline]
            platforms = ["linkedin"]

            [search]
            query = "rust engineer"
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.platforms, vec!["linkedin"]);
        assert_eq!(config.pipeline.apply_mode, ApplyMode::SemiAuto);
        assert_eq!(config.search.limit, 25);
        assert_eq!(config.pacing.nav_delay_ms, [800, 2_500]);
        assert!(!config.browser.headless);
    }

    #[test]
    fn rejects_inverted_delay_range() {
        let config: Config = toml::from_str(
            r#"
            [pipeline]
            platforms = ["linkedin"]

            [pacing]
            nav_delay_ms = [5000, 100]
            "#,
        )
        .unwrap();

        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_platform_list() {
        let config: Config = toml::from_str(
            r#"
            [pipeline]
            platforms = []
            "#,
        )
        .unwrap();

        assert!(config.validate().is_err());
    }
}
