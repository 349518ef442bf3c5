use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Capability a platform advertises at registration time.
pub mod capabilities {
    /// The platform has a real in-product submission flow the adapter can drive.
    pub const IN_PRODUCT_APPLY: &str = "in_product_apply";
    /// The adapter can enrich a listing from its detail page.
    pub const DETAIL_ENRICH: &str = "detail_enrich";
}

/// Per-job flags set by the adapter that produced the job.
pub mod flags {
    /// The posting qualifies for the platform's one-click submission flow.
    pub const EXPRESS_APPLY: &str = "express_apply";
}

/// Whether an adapter drives a browser context or its own HTTP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterKind {
    Browser,
    Api,
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterKind::Browser => write!(f, "BrowserAdapter"),
            AdapterKind::Api => write!(f, "APIAdapter"),
        }
    }
}

/// How much of the submission flow runs unattended.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    /// Submit without pausing for the operator.
    Auto,
    /// Drive the flow, but pause for operator confirmation before submitting.
    #[default]
    SemiAuto,
    /// Never reaches adapter-level automation.
    Manual,
}

impl fmt::Display for ApplyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyMode::Auto => write!(f, "auto"),
            ApplyMode::SemiAuto => write!(f, "semi_auto"),
            ApplyMode::Manual => write!(f, "manual"),
        }
    }
}

/// What the orchestrator hands each adapter's `search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub location: Option<String>,
    pub limit: usize,
}

/// A job posting as translated by an adapter from its platform's raw shape.
///
/// Produced exclusively by `search`/`enrich`; immutable once returned to the
/// orchestrator, which only aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Key of the platform that produced this job.
    pub platform: String,
    /// Platform-local posting identifier.
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub flags: BTreeSet<String>,
    pub discovered_at: chrono::DateTime<chrono::Utc>,
}

impl Job {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }
}
