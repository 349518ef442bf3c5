use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use jobflow::config::{
    ArtifactsConfig, BrowserConfigSection, Config, PacingConfig, PipelineConfig, SearchConfig,
};
use jobflow::contracts::{ApiAdapter, JobSource, Operation};
use jobflow::error::{JobFlowError, Result as JfResult};
use jobflow::orchestrator::{ApplyStatus, Orchestrator, PlatformOutcome};
use jobflow::registry::{AdapterFactory, AdapterRegistration, AdapterRegistry};
use jobflow::types::{capabilities, flags, ApplyMode, Job, SearchQuery};

/// Minimal API-backed source used to drive the pipeline without a network.
struct FixtureBoard {
    name: &'static str,
    postings: &'static [(&'static str, &'static str)],
    fail_search: bool,
}

#[async_trait]
impl JobSource for FixtureBoard {
    fn name(&self) -> &'static str {
        self.name
    }

    fn operations(&self) -> &'static [Operation] {
        Operation::API_REQUIRED
    }

    async fn search(&mut self, _query: &SearchQuery) -> JfResult<Vec<Job>> {
        if self.fail_search {
            return Err(JobFlowError::Adapter {
                message: "connection reset by peer".into(),
            });
        }
        Ok(self
            .postings
            .iter()
            .map(|(id, title)| {
                let mut job_flags = BTreeSet::new();
                job_flags.insert(flags::EXPRESS_APPLY.to_string());
                Job {
                    platform: self.name.to_string(),
                    id: id.to_string(),
                    title: title.to_string(),
                    company: "Fixture Inc".to_string(),
                    location: Some("Remote".to_string()),
                    url: Some(format!("https://example.com/jobs/{id}")),
                    description: None,
                    flags: job_flags,
                    discovered_at: chrono::Utc::now(),
                }
            })
            .collect())
    }

    async fn apply(
        &mut self,
        _job: &Job,
        _resume: Option<&Path>,
        _mode: ApplyMode,
    ) -> JfResult<bool> {
        Ok(true)
    }
}

#[async_trait]
impl ApiAdapter for FixtureBoard {
    async fn init(&mut self) -> JfResult<()> {
        Ok(())
    }
}

fn steady_factory() -> Box<dyn ApiAdapter> {
    Box::new(FixtureBoard {
        name: "steady",
        postings: &[("s1", "Rust Engineer"), ("s2", "Platform Engineer")],
        fail_search: false,
    })
}

fn flaky_factory() -> Box<dyn ApiAdapter> {
    Box::new(FixtureBoard {
        name: "flaky",
        postings: &[],
        fail_search: true,
    })
}

fn test_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry
        .register(AdapterRegistration {
            key: "steady",
            display_name: "Steady Board",
            capabilities: &[capabilities::IN_PRODUCT_APPLY],
            factory: AdapterFactory::Api(steady_factory),
        })
        .unwrap();
    registry
        .register(AdapterRegistration {
            key: "flaky",
            display_name: "Flaky Board",
            capabilities: &[],
            factory: AdapterFactory::Api(flaky_factory),
        })
        .unwrap();
    registry
}

fn test_config(platforms: &[&str]) -> Config {
    Config {
        pipeline: PipelineConfig {
            platforms: platforms.iter().map(|s| s.to_string()).collect(),
            apply_mode: ApplyMode::Auto,
            resume_path: None,
        },
        search: SearchConfig::default(),
        browser: BrowserConfigSection::default(),
        pacing: PacingConfig::default(),
        artifacts: ArtifactsConfig::default(),
    }
}

fn query() -> SearchQuery {
    SearchQuery {
        query: "rust".into(),
        location: None,
        limit: 10,
    }
}

#[tokio::test]
async fn search_aggregates_and_survives_one_platform_outage() -> Result<()> {
    let mut orchestrator = Orchestrator::new(test_registry(), test_config(&["steady", "flaky"]));
    let report = orchestrator.run_search(&query()).await?;

    assert_eq!(report.jobs.len(), 2);
    assert!(report.jobs.iter().all(|j| j.platform == "steady"));

    assert_eq!(report.run.succeeded().len(), 1);
    let skipped = report.run.skipped();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].key, "flaky");
    match &skipped[0].outcome {
        PlatformOutcome::Skipped { reason } => assert!(!reason.is_empty()),
        other => panic!("expected Skipped, got {other:?}"),
    }

    // The summary names both outcomes for the operator.
    let summary = report.run.summary();
    assert!(summary.contains("steady"));
    assert!(summary.contains("flaky"));
    Ok(())
}

#[tokio::test]
async fn collected_jobs_round_trip_through_persistence_into_apply() -> Result<()> {
    let mut orchestrator = Orchestrator::new(test_registry(), test_config(&["steady"]));
    let report = orchestrator.run_search(&query()).await?;

    // main.rs persists jobs to JSON between the search and apply phases;
    // mirror that hand-off here.
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("jobs.json");
    std::fs::write(&file, serde_json::to_string_pretty(&report.jobs)?)?;
    let reloaded: Vec<Job> = serde_json::from_str(&std::fs::read_to_string(&file)?)?;
    assert_eq!(reloaded.len(), report.jobs.len());

    let mut orchestrator = Orchestrator::new(test_registry(), test_config(&["steady"]));
    let apply_report = orchestrator.run_apply(&reloaded, None).await?;

    assert_eq!(apply_report.outcomes.len(), 2);
    assert_eq!(apply_report.submitted(), 2);
    for outcome in &apply_report.outcomes {
        assert_eq!(outcome.status, ApplyStatus::Submitted);
        assert_eq!(outcome.decision.effective, ApplyMode::Auto);
    }
    Ok(())
}

#[tokio::test]
async fn unregistered_configured_platform_aborts_before_any_side_effect() {
    let mut orchestrator = Orchestrator::new(test_registry(), test_config(&["steady", "ghost"]));
    let err = orchestrator.run_search(&query()).await.unwrap_err();

    match err {
        JobFlowError::UnknownPlatform { key, valid } => {
            assert_eq!(key, "ghost");
            assert_eq!(valid, vec!["flaky".to_string(), "steady".to_string()]);
        }
        other => panic!("expected UnknownPlatform, got {other:?}"),
    }
}
