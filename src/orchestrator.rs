//! The pipeline state machine: Setup → Login → Search → (external: Score)
//! → Apply. Phases are strictly sequential, platforms are visited one at a
//! time in configured order, and one platform's failure is caught at this
//! boundary so it never aborts the rest of the run.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::browser::{BrowserEngine, ChromiumEngine};
use crate::config::Config;
use crate::error::{JobFlowError, Result};
use crate::mixin::ToolkitSettings;
use crate::registry::{AdapterInstance, AdapterRegistry, PlatformInfo};
use crate::resolver::{resolve_apply_mode, ApplyModeDecision};
use crate::types::{capabilities, AdapterKind, ApplyMode, Job, SearchQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Setup,
    Login,
    Search,
    Apply,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Setup => write!(f, "setup"),
            Phase::Login => write!(f, "login"),
            Phase::Search => write!(f, "search"),
            Phase::Apply => write!(f, "apply"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PlatformOutcome {
    Succeeded { jobs: usize },
    Skipped { reason: String },
    NotAttempted,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformReport {
    pub key: String,
    pub outcome: PlatformOutcome,
}

/// One orchestrator run. Created at run start, finalized at run end, and
/// handed to the external persistence collaborator, never stored here.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub phase: Phase,
    /// Per-platform outcomes in configured order.
    pub platforms: Vec<PlatformReport>,
}

impl PipelineRun {
    fn new(platform_keys: &[String]) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            phase: Phase::Setup,
            platforms: platform_keys
                .iter()
                .map(|key| PlatformReport {
                    key: key.clone(),
                    outcome: PlatformOutcome::NotAttempted,
                })
                .collect(),
        }
    }

    fn advance(&mut self, phase: Phase) {
        info!("Pipeline phase: {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    fn record(&mut self, key: &str, outcome: PlatformOutcome) {
        if let Some(report) = self.platforms.iter_mut().find(|p| p.key == key) {
            report.outcome = outcome;
        }
    }

    pub fn succeeded(&self) -> Vec<&PlatformReport> {
        self.platforms
            .iter()
            .filter(|p| matches!(p.outcome, PlatformOutcome::Succeeded { .. }))
            .collect()
    }

    pub fn skipped(&self) -> Vec<&PlatformReport> {
        self.platforms
            .iter()
            .filter(|p| matches!(p.outcome, PlatformOutcome::Skipped { .. }))
            .collect()
    }

    pub fn not_attempted(&self) -> Vec<&PlatformReport> {
        self.platforms
            .iter()
            .filter(|p| p.outcome == PlatformOutcome::NotAttempted)
            .collect()
    }

    /// Human-readable run summary: succeeded, skipped (with reason), and
    /// not-attempted platforms.
    pub fn summary(&self) -> String {
        let mut out = format!("Run {}\n", self.id);
        for report in &self.platforms {
            match &report.outcome {
                PlatformOutcome::Succeeded { jobs } => {
                    out.push_str(&format!("  ✅ {}: {} job(s)\n", report.key, jobs));
                }
                PlatformOutcome::Skipped { reason } => {
                    out.push_str(&format!("  ⚠️  {}: skipped ({})\n", report.key, reason));
                }
                PlatformOutcome::NotAttempted => {
                    out.push_str(&format!("  -  {}: not attempted\n", report.key));
                }
            }
        }
        out
    }
}

/// Output of the collection phases: the finalized run plus the flat job
/// list, aggregated in configured platform order with each platform's
/// discovery order preserved.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub run: PipelineRun,
    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ApplyStatus {
    /// The adapter drove the in-product flow to completion.
    Submitted,
    /// The platform only exposes an external application URL.
    ExternalOnly,
    /// The operator declined the confirmation checkpoint.
    Declined,
    /// Left for the operator; adapter automation never ran.
    ManualReview,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutcome {
    pub platform: String,
    pub job_id: String,
    pub job_title: String,
    pub decision: ApplyModeDecision,
    pub status: ApplyStatus,
}

#[derive(Debug, Serialize)]
pub struct ApplyReport {
    pub run_id: Uuid,
    pub outcomes: Vec<ApplyOutcome>,
}

impl ApplyReport {
    pub fn submitted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == ApplyStatus::Submitted)
            .count()
    }
}

struct LivePlatform {
    info: PlatformInfo,
    adapter: AdapterInstance,
    skipped: Option<String>,
}

/// Drives pipeline phases against the registry. Holds no concrete adapter
/// knowledge: the only branch anywhere is on [`AdapterKind`], which is what
/// keeps adding or removing a platform from touching this file.
pub struct Orchestrator {
    registry: AdapterRegistry,
    config: Config,
    /// Pre-launched engine, injected by tests. A run that needs a browser
    /// takes this first and only launches Chromium when it is absent.
    engine_override: Option<Box<dyn BrowserEngine>>,
}

impl Orchestrator {
    pub fn new(registry: AdapterRegistry, config: Config) -> Self {
        Self {
            registry,
            config,
            engine_override: None,
        }
    }

    pub fn with_engine(
        registry: AdapterRegistry,
        config: Config,
        engine: Box<dyn BrowserEngine>,
    ) -> Self {
        Self {
            registry,
            config,
            engine_override: Some(engine),
        }
    }

    /// Resolve every configured key before any browser or network resource
    /// is created. An unregistered key is fatal here, with the valid keys
    /// in the error; a registered platform failing later is not.
    fn preflight(&self, keys: &[String]) -> Result<Vec<PlatformInfo>> {
        keys.iter()
            .map(|key| self.registry.get(key).cloned())
            .collect()
    }

    async fn acquire_engine(&mut self) -> Result<Box<dyn BrowserEngine>> {
        match self.engine_override.take() {
            Some(engine) => Ok(engine),
            None => Ok(Box::new(ChromiumEngine::launch(&self.config.browser).await?)),
        }
    }

    async fn init_adapter(
        engine: Option<&dyn BrowserEngine>,
        settings: &ToolkitSettings,
        adapter: &mut AdapterInstance,
    ) -> Result<()> {
        match adapter {
            AdapterInstance::Browser(a) => {
                let engine = engine.ok_or_else(|| JobFlowError::Config(
                    "browser adapter initialized without a browser engine".into(),
                ))?;
                let session = engine.new_session().await?;
                a.init(session, settings.clone()).await
            }
            AdapterInstance::Api(a) => a.init().await,
        }
    }

    /// Setup → Login → Search. Returns the aggregated job list and the
    /// finalized run for the external scoring/persistence collaborators.
    #[instrument(skip(self, query))]
    pub async fn run_search(&mut self, query: &SearchQuery) -> Result<RunReport> {
        let keys = self.config.pipeline.platforms.clone();
        let mut run = PipelineRun::new(&keys);
        info!("🚀 Starting search run {} for {} platform(s)", run.id, keys.len());

        // Pre-flight: configuration errors surface before any side effect.
        let infos = self.preflight(&keys)?;
        counter!("jobflow_search_runs_total").increment(1);
        let t_run = Instant::now();

        // Setup: the shared browser process exists only when a browser
        // platform is enabled, and only this run owns it.
        let needs_browser = infos.iter().any(|i| i.kind == AdapterKind::Browser);
        let engine = if needs_browser {
            Some(self.acquire_engine().await?)
        } else {
            None
        };

        let settings = ToolkitSettings::from_config(&self.config);
        let mut live = Vec::with_capacity(infos.len());
        for info in infos {
            let mut adapter = info.instantiate();
            let skipped = match Self::init_adapter(engine.as_deref(), &settings, &mut adapter).await
            {
                Ok(()) => None,
                Err(e) => {
                    warn!("Platform '{}' failed to initialize: {}", info.key, e);
                    counter!("jobflow_platforms_skipped_total", "platform" => info.key.clone())
                        .increment(1);
                    Some(format!("init failed: {e}"))
                }
            };
            live.push(LivePlatform {
                info,
                adapter,
                skipped,
            });
        }

        // Login: browser platforms only; API adapters have no session
        // concept.
        run.advance(Phase::Login);
        for lp in &mut live {
            if lp.skipped.is_some() {
                continue;
            }
            let AdapterInstance::Browser(adapter) = &mut lp.adapter else {
                continue;
            };
            let logged_in = match adapter.is_logged_in().await {
                Ok(true) => Ok(true),
                Ok(false) => adapter.login().await,
                Err(e) => Err(e),
            };
            match logged_in {
                Ok(true) => info!("Logged in to '{}'", lp.info.key),
                Ok(false) => {
                    warn!("Login to '{}' was not completed", lp.info.key);
                    lp.skipped = Some("login was not completed".to_string());
                }
                Err(e) => {
                    error!("Login to '{}' failed: {}", lp.info.key, e);
                    counter!("jobflow_platforms_skipped_total", "platform" => lp.info.key.clone())
                        .increment(1);
                    lp.skipped = Some(format!("login failed: {e}"));
                }
            }
        }

        // Search: configured order, one platform at a time. Jobs are
        // aggregated as returned, never reordered.
        run.advance(Phase::Search);
        let mut jobs = Vec::new();
        for lp in &mut live {
            if let Some(reason) = lp.skipped.clone() {
                run.record(&lp.info.key, PlatformOutcome::Skipped { reason });
                continue;
            }
            let enrich = lp
                .info
                .capabilities
                .contains(capabilities::DETAIL_ENRICH);
            let key = lp.info.key.clone();
            let t_search = Instant::now();
            let source = lp.adapter.as_source_mut();
            match source.search(query).await {
                Ok(found) => {
                    let mut platform_jobs = Vec::with_capacity(found.len());
                    for job in found {
                        if enrich {
                            match source.enrich(job.clone()).await {
                                Ok(enriched) => platform_jobs.push(enriched),
                                Err(e) => {
                                    // Enrichment is best-effort; keep the
                                    // un-enriched job.
                                    warn!("Enrich failed for '{}' job {}: {}", key, job.id, e);
                                    platform_jobs.push(job);
                                }
                            }
                        } else {
                            platform_jobs.push(job);
                        }
                    }
                    info!("✅ '{}' returned {} job(s)", key, platform_jobs.len());
                    counter!("jobflow_jobs_found_total", "platform" => key.clone())
                        .increment(platform_jobs.len() as u64);
                    histogram!("jobflow_search_duration_seconds", "platform" => key.clone())
                        .record(t_search.elapsed().as_secs_f64());
                    run.record(
                        &key,
                        PlatformOutcome::Succeeded {
                            jobs: platform_jobs.len(),
                        },
                    );
                    jobs.extend(platform_jobs);
                }
                Err(e) => {
                    error!("Search on '{}' failed: {}", key, e);
                    counter!("jobflow_platforms_skipped_total", "platform" => key.clone())
                        .increment(1);
                    run.record(
                        &key,
                        PlatformOutcome::Skipped {
                            reason: format!("search failed: {e}"),
                        },
                    );
                }
            }
        }

        // Teardown: every adapter exits its scope, normal or error path,
        // before the shared process goes away.
        for lp in &mut live {
            if let Err(e) = lp.adapter.as_source_mut().close().await {
                warn!("Closing adapter '{}' failed: {}", lp.info.key, e);
            }
        }
        if let Some(engine) = engine {
            // The report is already collected; a shutdown failure must not
            // discard it.
            if let Err(e) = engine.shutdown().await {
                warn!("Browser shutdown failed: {}", e);
            }
        }

        run.finished_at = Some(Utc::now());
        histogram!("jobflow_run_duration_seconds").record(t_run.elapsed().as_secs_f64());
        info!(
            "Search run {} finished: {} job(s), {} skipped platform(s)",
            run.id,
            jobs.len(),
            run.skipped().len()
        );
        Ok(RunReport { run, jobs })
    }

    /// Apply phase over previously collected (and externally scored) jobs.
    /// One adapter instance per platform for the whole phase; the resolver
    /// runs per job and only ever downgrades.
    #[instrument(skip(self, jobs, resume))]
    pub async fn run_apply(
        &mut self,
        jobs: &[Job],
        resume: Option<&Path>,
    ) -> Result<ApplyReport> {
        let requested = self.config.pipeline.apply_mode;
        let run_id = Uuid::new_v4();
        info!(
            "🚀 Starting apply run {} for {} job(s), requested mode '{}'",
            run_id,
            jobs.len(),
            requested
        );

        // Pre-flight: every referenced platform must resolve before any
        // resource is acquired.
        let mut platform_keys: Vec<String> = Vec::new();
        for job in jobs {
            if !platform_keys.contains(&job.platform) {
                platform_keys.push(job.platform.clone());
            }
        }
        let infos = self.preflight(&platform_keys)?;
        let by_key: HashMap<String, PlatformInfo> =
            infos.into_iter().map(|i| (i.key.clone(), i)).collect();
        counter!("jobflow_apply_runs_total").increment(1);

        // A platform whose every decision resolves to Manual never needs
        // automation, so the engine launches only for browser platforms
        // with a real in-product flow.
        let needs_browser = by_key.values().any(|i| {
            i.kind == AdapterKind::Browser
                && i.capabilities.contains(capabilities::IN_PRODUCT_APPLY)
        });
        let engine = if needs_browser {
            Some(self.acquire_engine().await?)
        } else {
            None
        };

        let settings = ToolkitSettings::from_config(&self.config);
        let mut adapters: HashMap<String, AdapterInstance> = HashMap::new();
        let mut broken: HashMap<String, String> = HashMap::new();
        let mut outcomes = Vec::with_capacity(jobs.len());

        for job in jobs {
            let info = &by_key[&job.platform];
            let decision = resolve_apply_mode(requested, &info.capabilities, &job.flags);
            info!(
                "Apply mode for '{}' job {}: {} ({})",
                job.platform, job.id, decision.effective, decision.reason
            );

            if decision.effective == ApplyMode::Manual {
                outcomes.push(ApplyOutcome {
                    platform: job.platform.clone(),
                    job_id: job.id.clone(),
                    job_title: job.title.clone(),
                    decision,
                    status: ApplyStatus::ManualReview,
                });
                continue;
            }

            if let Some(reason) = broken.get(&job.platform) {
                outcomes.push(ApplyOutcome {
                    platform: job.platform.clone(),
                    job_id: job.id.clone(),
                    job_title: job.title.clone(),
                    decision,
                    status: ApplyStatus::Failed {
                        reason: reason.clone(),
                    },
                });
                continue;
            }

            if !adapters.contains_key(&job.platform) {
                let mut adapter = info.instantiate();
                match Self::init_adapter(engine.as_deref(), &settings, &mut adapter).await {
                    Ok(()) => {
                        adapters.insert(job.platform.clone(), adapter);
                    }
                    Err(e) => {
                        let reason = format!("init failed: {e}");
                        warn!("Platform '{}' unavailable for apply: {}", job.platform, e);
                        broken.insert(job.platform.clone(), reason.clone());
                        outcomes.push(ApplyOutcome {
                            platform: job.platform.clone(),
                            job_id: job.id.clone(),
                            job_title: job.title.clone(),
                            decision,
                            status: ApplyStatus::Failed { reason },
                        });
                        continue;
                    }
                }
            }

            let adapter = adapters
                .get_mut(&job.platform)
                .expect("adapter constructed above");
            let status = match adapter
                .as_source_mut()
                .apply(job, resume, decision.effective)
                .await
            {
                Ok(true) => {
                    counter!("jobflow_applications_submitted_total", "platform" => job.platform.clone())
                        .increment(1);
                    ApplyStatus::Submitted
                }
                Ok(false) => ApplyStatus::ExternalOnly,
                Err(JobFlowError::HumanAbort { .. }) => {
                    info!("Operator declined submission for job {}", job.id);
                    ApplyStatus::Declined
                }
                Err(e) => {
                    error!("Apply on '{}' failed for job {}: {}", job.platform, job.id, e);
                    ApplyStatus::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            outcomes.push(ApplyOutcome {
                platform: job.platform.clone(),
                job_id: job.id.clone(),
                job_title: job.title.clone(),
                decision,
                status,
            });
        }

        for (key, mut adapter) in adapters {
            if let Err(e) = adapter.as_source_mut().close().await {
                warn!("Closing adapter '{}' failed: {}", key, e);
            }
        }
        if let Some(engine) = engine {
            if let Err(e) = engine.shutdown().await {
                warn!("Browser shutdown failed: {}", e);
            }
        }

        let report = ApplyReport { run_id, outcomes };
        info!(
            "Apply run {} finished: {} submitted of {} job(s)",
            run_id,
            report.submitted(),
            jobs.len()
        );
        Ok(report)
    }
}
