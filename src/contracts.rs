use std::fmt;
use std::path::Path;

use crate::browser::BrowserSession;
use crate::error::Result;
use crate::mixin::ToolkitSettings;
use crate::types::{ApplyMode, Job, SearchQuery};

/// One operation of an adapter contract. Adapters declare the surface they
/// actually wire up via [`JobSource::operations`], and the registry checks
/// that surface against the set their kind requires before anything else
/// touches a browser or the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Operation {
    Init,
    Login,
    IsLoggedIn,
    Search,
    Enrich,
    Apply,
    Close,
}

impl Operation {
    /// Operations a browser-driven adapter must expose.
    pub const BROWSER_REQUIRED: &'static [Operation] = &[
        Operation::Init,
        Operation::Login,
        Operation::IsLoggedIn,
        Operation::Search,
        Operation::Enrich,
        Operation::Apply,
        Operation::Close,
    ];

    /// Operations an API-driven adapter must expose: the browser set minus
    /// the session concept (`login` / `is_logged_in`).
    pub const API_REQUIRED: &'static [Operation] = &[
        Operation::Init,
        Operation::Search,
        Operation::Enrich,
        Operation::Apply,
        Operation::Close,
    ];

    pub fn required_for(kind: crate::types::AdapterKind) -> &'static [Operation] {
        match kind {
            crate::types::AdapterKind::Browser => Self::BROWSER_REQUIRED,
            crate::types::AdapterKind::Api => Self::API_REQUIRED,
        }
    }

    pub fn join(ops: &[Operation]) -> String {
        ops.iter()
            .map(|op| op.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Init => "init",
            Operation::Login => "login",
            Operation::IsLoggedIn => "is_logged_in",
            Operation::Search => "search",
            Operation::Enrich => "enrich",
            Operation::Apply => "apply",
            Operation::Close => "close",
        };
        write!(f, "{name}")
    }
}

/// Operations common to both adapter kinds. This is the subset the registry
/// and orchestrator use wherever Browser- and API-backed adapters are
/// treated uniformly.
#[async_trait::async_trait]
pub trait JobSource: Send + Sync {
    /// Unique identifier for this adapter; must match its registered key.
    fn name(&self) -> &'static str;

    /// The operation surface this adapter actually wires up. Checked once,
    /// at registration, against the kind's required set.
    fn operations(&self) -> &'static [Operation];

    /// Fetch postings for a query, translated into typed [`Job`]s. Callers
    /// never observe the platform's raw DOM or JSON shape.
    async fn search(&mut self, query: &SearchQuery) -> Result<Vec<Job>>;

    /// Detail-page enrichment. Default is a no-op returning the input.
    async fn enrich(&mut self, job: Job) -> Result<Job> {
        Ok(job)
    }

    /// Drive the platform's submission flow for one job.
    ///
    /// Returns `Ok(true)` on submission. Platforms without an in-product
    /// flow report the external application URL and return `Ok(false)`, a
    /// legitimate terminal outcome, not a failure. Browser adapters must
    /// pause for operator confirmation before final submission unless
    /// `mode` is [`ApplyMode::Auto`].
    async fn apply(&mut self, job: &Job, resume: Option<&Path>, mode: ApplyMode) -> Result<bool>;

    /// Scoped exit: releases adapter-owned resources only. Never the shared
    /// browser process, which the orchestrator owns.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Contract for adapters that drive a browser context.
#[async_trait::async_trait]
pub trait BrowserAdapter: JobSource {
    /// Receives one isolated context carved from the shared browser process,
    /// plus the run's configured timing and artifact settings.
    async fn init(
        &mut self,
        session: Box<dyn BrowserSession>,
        settings: ToolkitSettings,
    ) -> Result<()>;

    async fn login(&mut self) -> Result<bool>;

    async fn is_logged_in(&mut self) -> Result<bool>;
}

/// Contract for adapters that talk to a platform's HTTP API. No browser
/// session concept, so no login operations; `init` takes no arguments and
/// the adapter self-creates its HTTP client.
#[async_trait::async_trait]
pub trait ApiAdapter: JobSource {
    async fn init(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AdapterKind;

    #[test]
    fn api_contract_is_browser_contract_minus_session_ops() {
        for op in Operation::API_REQUIRED {
            assert!(Operation::BROWSER_REQUIRED.contains(op));
        }
        assert!(!Operation::API_REQUIRED.contains(&Operation::Login));
        assert!(!Operation::API_REQUIRED.contains(&Operation::IsLoggedIn));
        assert_eq!(
            Operation::required_for(AdapterKind::Browser).len(),
            Operation::required_for(AdapterKind::Api).len() + 2
        );
    }

    #[test]
    fn join_formats_operation_names() {
        assert_eq!(
            Operation::join(&[Operation::Search, Operation::IsLoggedIn]),
            "search, is_logged_in"
        );
    }
}
