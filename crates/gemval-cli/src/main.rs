//! gemval - standard-GEM repository validator
//!
//! ## Commands
//!
//! - `discover`: find repositories tagged `standard-gem` and merge them into the index
//! - `validate`: one validation pass over a single repository
//! - `validate-index`: one pass over every indexed repository
//! - `matrix`: print the index as a CI job matrix

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, Level};

use gemval_core::{ReleasePolicy, RepositoryIndex, StandardPolicy, ValidatorConfig};
use gemval_provider::{ProviderClient, ProviderKind};
use gemval_runner::{discover, JobMatrix, ValidationOutcome, ValidationPipeline};

#[derive(Parser)]
#[command(name = "gemval")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate standard-GEM genome-scale model repositories", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Directory holding one result file per repository
    #[arg(long, global = true, env = "GEMVAL_RESULTS_DIR", default_value = "results")]
    results_dir: PathBuf,

    /// Directory for cached owner avatars
    #[arg(long, global = true, env = "GEMVAL_AVATARS_DIR", default_value = "avatars")]
    avatars_dir: PathBuf,

    /// Directory model files are downloaded into
    #[arg(long, global = true, env = "GEMVAL_WORK_DIR", default_value = ".")]
    work_dir: PathBuf,

    /// Repository index file
    #[arg(long, global = true, env = "GEMVAL_INDEX", default_value = "index.json")]
    index: PathBuf,

    /// Releases validated per pass: one-per-run or all-pending
    #[arg(long, global = true, env = "GEMVAL_RELEASE_POLICY", default_value = "one-per-run")]
    release_policy: ReleasePolicy,

    /// Standard versions compared against: latest or all
    #[arg(long, global = true, env = "GEMVAL_STANDARD_POLICY", default_value = "latest")]
    standard_policy: StandardPolicy,

    /// Python interpreter with cobra and memote installed
    #[arg(long, global = true, env = "GEMVAL_PYTHON", default_value = "python3")]
    python: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover tagged repositories on every provider and merge them into the index
    Discover,

    /// Validate one repository
    Validate {
        /// Repository as owner/name (GitLab paths may include subgroups)
        repository: String,

        /// Hosting provider
        provider: ProviderKind,
    },

    /// Validate every repository in the index, one after another
    ValidateIndex {
        /// Only repositories on this provider
        #[arg(long)]
        provider: Option<ProviderKind>,
    },

    /// Print the index as a CI job matrix
    Matrix {
        /// Only repositories on this provider
        #[arg(long)]
        provider: Option<ProviderKind>,
    },
}

impl Cli {
    /// Credentials from the environment, directories and policies from flags.
    fn config(&self) -> Result<ValidatorConfig> {
        let config = ValidatorConfig::from_env().context("missing provider credentials")?;
        Ok(config
            .with_results_dir(&self.results_dir)
            .with_avatars_dir(&self.avatars_dir)
            .with_work_dir(&self.work_dir)
            .with_index_path(&self.index)
            .with_release_policy(self.release_policy)
            .with_standard_policy(self.standard_policy)
            .with_python(&self.python))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    gemval_core::init_tracing(cli.json, level);

    match &cli.command {
        Commands::Matrix { provider } => cmd_matrix(&cli.index, *provider),
        Commands::Discover => cmd_discover(cli.config()?).await,
        Commands::Validate {
            repository,
            provider,
        } => cmd_validate(cli.config()?, repository, *provider).await,
        Commands::ValidateIndex { provider } => cmd_validate_index(cli.config()?, *provider).await,
    }
}

async fn cmd_discover(config: ValidatorConfig) -> Result<()> {
    let clients = ProviderKind::ALL
        .iter()
        .map(|kind| config.client(*kind))
        .collect::<std::result::Result<Vec<Arc<dyn ProviderClient>>, _>>()
        .context("failed to build provider clients")?;

    let mut index = RepositoryIndex::load(&config.index_path)
        .with_context(|| format!("failed to read {}", config.index_path.display()))?;
    let summaries = discover(&clients, &config.topic, &mut index)
        .await
        .context("repository discovery failed")?;
    index
        .save(&config.index_path)
        .with_context(|| format!("failed to write {}", config.index_path.display()))?;

    for summary in &summaries {
        println!(
            "{}: {} found, {} new",
            summary.provider, summary.found, summary.added
        );
    }
    println!("Index: {} repositories in {}", index.len(), config.index_path.display());
    Ok(())
}

async fn cmd_validate(config: ValidatorConfig, repository: &str, provider: ProviderKind) -> Result<()> {
    let pipeline = ValidationPipeline::from_config(config, provider)
        .context("failed to build validation pipeline")?;
    let outcome = pipeline
        .validate(repository)
        .await
        .with_context(|| format!("validation of {repository} failed"))?;
    print_outcome(&outcome);
    Ok(())
}

async fn cmd_validate_index(config: ValidatorConfig, provider: Option<ProviderKind>) -> Result<()> {
    let index = RepositoryIndex::load(&config.index_path)
        .with_context(|| format!("failed to read {}", config.index_path.display()))?;

    let mut pipelines: HashMap<ProviderKind, ValidationPipeline> = HashMap::new();
    let mut failures = Vec::new();
    let mut total = 0usize;

    for (kind, repository) in index.repositories() {
        if provider.is_some_and(|p| p != kind) {
            continue;
        }
        total += 1;

        if !pipelines.contains_key(&kind) {
            let pipeline = ValidationPipeline::from_config(config.clone(), kind)
                .context("failed to build validation pipeline")?;
            pipelines.insert(kind, pipeline);
        }
        let Some(pipeline) = pipelines.get(&kind) else {
            continue;
        };

        match pipeline.validate(&repository).await {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => {
                error!(repository = %repository, provider = %kind, error = %e, "validation failed");
                failures.push(repository);
            }
        }
    }

    info!(total, failed = failures.len(), "index validated");
    if !failures.is_empty() {
        anyhow::bail!(
            "{} of {} repositories failed: {}",
            failures.len(),
            total,
            failures.join(", ")
        );
    }
    Ok(())
}

fn cmd_matrix(index_path: &Path, provider: Option<ProviderKind>) -> Result<()> {
    println!("{}", matrix_json(index_path, provider)?);
    Ok(())
}

fn matrix_json(index_path: &Path, provider: Option<ProviderKind>) -> Result<String> {
    let index = RepositoryIndex::load(index_path)
        .with_context(|| format!("failed to read {}", index_path.display()))?;
    let matrix = JobMatrix::from_index(&index, provider);
    Ok(serde_json::to_string(&matrix)?)
}

fn print_outcome(outcome: &ValidationOutcome) {
    println!("{}", outcome.repository);
    for release in &outcome.releases {
        let status = if release.report.is_compliant() { "✓" } else { "✗" };
        println!(
            "  {} {} ({} checks, {} failed)",
            status,
            release.tag,
            release.report.test_results.len(),
            release.failed_checks()
        );
    }
    println!("  Record: {}", outcome.record_path.display());
}
