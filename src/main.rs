use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use jobflow::adapters;
use jobflow::config::Config;
use jobflow::logging;
use jobflow::orchestrator::Orchestrator;
use jobflow::registry::AdapterRegistry;
use jobflow::types::{AdapterKind, ApplyMode, Job, SearchQuery};

#[derive(Parser)]
#[command(name = "jobflow")]
#[command(about = "Job search and application pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every registered platform
    Platforms,
    /// Run the search pipeline (Setup -> Login -> Search) and persist jobs
    Search {
        /// Override the configured query
        #[arg(long)]
        query: Option<String>,
        /// Specific platforms to run (comma-separated), overriding config
        #[arg(long)]
        platforms: Option<String>,
    },
    /// Run the apply phase over a previously collected job file
    Apply {
        /// JSON file produced by `jobflow search`
        #[arg(long)]
        input: PathBuf,
        /// Override the configured apply mode
        #[arg(long, value_enum)]
        mode: Option<ApplyMode>,
    },
}

/// Build the registry: the one explicit discovery step of the process.
fn load_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    let report = adapters::discover(&mut registry);
    for (key, err) in &report.failed {
        warn!("Adapter '{}' not available: {}", key, err);
        eprintln!("⚠️  Adapter '{key}' not available: {err}");
    }
    registry
}

/// Persist aggregated jobs to a timestamped JSON file.
fn persist_jobs(jobs: &[Job], output_dir: &str) -> anyhow::Result<String> {
    fs::create_dir_all(output_dir)?;
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let filepath = Path::new(output_dir).join(format!("jobs_{timestamp}.json"));
    fs::write(&filepath, serde_json::to_string_pretty(jobs)?)?;
    Ok(filepath.to_string_lossy().to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Credentials come from the environment; .env is optional.
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Platforms => {
            let registry = load_registry();
            println!("Registered platforms:");
            for (key, info) in registry.all() {
                let kind = match info.kind {
                    AdapterKind::Browser => "browser",
                    AdapterKind::Api => "api",
                };
                let capabilities: Vec<&str> =
                    info.capabilities.iter().map(|c| c.as_str()).collect();
                println!(
                    "  {key} ({kind}): {} [{}]",
                    info.display_name,
                    capabilities.join(", ")
                );
            }
        }
        Commands::Search { query, platforms } => {
            let mut config = Config::load(&cli.config)?;
            if let Some(list) = platforms {
                config.pipeline.platforms =
                    list.split(',').map(|s| s.trim().to_string()).collect();
            }
            let search_query = SearchQuery {
                query: query.unwrap_or_else(|| config.search.query.clone()),
                location: config.search.location.clone(),
                limit: config.search.limit,
            };
            if search_query.query.is_empty() {
                anyhow::bail!("no search query: set [search].query or pass --query");
            }

            let registry = load_registry();
            let mut orchestrator = Orchestrator::new(registry, config);

            println!("🔄 Running search pipeline...");
            let report = orchestrator.run_search(&search_query).await?;

            println!("\n📊 {}", report.run.summary());
            println!("   Total jobs: {}", report.jobs.len());
            let output_file = persist_jobs(&report.jobs, "output")?;
            info!("Saved jobs to {}", output_file);
            println!("   Output file: {output_file}");
        }
        Commands::Apply { input, mode } => {
            let mut config = Config::load(&cli.config)?;
            if let Some(mode) = mode {
                config.pipeline.apply_mode = mode;
            }
            let resume = config.pipeline.resume_path.clone();

            let jobs: Vec<Job> = serde_json::from_str(&fs::read_to_string(&input)?)?;
            println!(
                "🔄 Applying to {} job(s) in '{}' mode...",
                jobs.len(),
                config.pipeline.apply_mode
            );

            let registry = load_registry();
            let mut orchestrator = Orchestrator::new(registry, config);
            let report = orchestrator.run_apply(&jobs, resume.as_deref()).await?;

            println!("\n📊 Apply run {}:", report.run_id);
            for outcome in &report.outcomes {
                println!(
                    "   {} / {}: {:?} ({})",
                    outcome.platform, outcome.job_title, outcome.status, outcome.decision.reason
                );
            }
            println!("   Submitted: {}/{}", report.submitted(), report.outcomes.len());
        }
    }
    Ok(())
}
