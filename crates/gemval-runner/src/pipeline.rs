//! Incremental per-repository validation.
//!
//! One pass: load the record, refresh metadata, pick the release(s) to
//! validate, check compliance against the standard, download the model
//! files of compliant releases, run every registered check, merge, save.
//! Any provider error aborts the pass before the record is written.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use gemval_core::{
    refresh_metadata, AvatarCache, ComplianceChecker, GemvalError, MergeOutcome, PersistedRecord,
    ReleaseEntry, ReleasePolicy, Result, ResultStore, StandardReport, TestResult, ValidatorConfig,
};
use gemval_provider::{split_repository, ProviderClient, ProviderKind};

use crate::registry::CheckRegistry;

/// What happened to one validated release.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseOutcome {
    pub tag: String,
    pub report: StandardReport,
    pub merge: MergeOutcome,
}

impl ReleaseOutcome {
    pub fn failed_checks(&self) -> usize {
        self.report
            .test_results
            .values()
            .filter(|result| !result.status.is_success())
            .count()
    }
}

/// Result of one pass over a repository.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub repository: String,
    pub record_path: PathBuf,
    pub releases: Vec<ReleaseOutcome>,
}

impl ValidationOutcome {
    pub fn validated_tags(&self) -> Vec<&str> {
        self.releases.iter().map(|r| r.tag.as_str()).collect()
    }
}

/// Tags to validate this pass, in merge order.
///
/// `OnePerRun`: the first listed tag missing from the record, else the first
/// branch tag. `AllPending`: every missing tag plus the branch tags, oldest
/// first so the newest ends up on top of the record.
pub fn select_targets(
    listed: &[String],
    record: &PersistedRecord,
    branch_tags: &[String],
    policy: ReleasePolicy,
) -> Vec<String> {
    match policy {
        ReleasePolicy::OnePerRun => listed
            .iter()
            .find(|tag| !record.contains_tag(tag))
            .or_else(|| branch_tags.first())
            .cloned()
            .into_iter()
            .collect(),
        ReleasePolicy::AllPending => listed
            .iter()
            .rev()
            .filter(|tag| branch_tags.contains(tag) || !record.contains_tag(tag))
            .cloned()
            .collect(),
    }
}

/// Validation pipeline for repositories on one provider.
pub struct ValidationPipeline {
    client: Arc<dyn ProviderClient>,
    compliance: ComplianceChecker,
    registry: CheckRegistry,
    store: ResultStore,
    avatars: AvatarCache,
    config: ValidatorConfig,
}

impl ValidationPipeline {
    /// Assemble from explicit collaborators; directories come from `config`.
    pub fn new(
        client: Arc<dyn ProviderClient>,
        compliance: ComplianceChecker,
        registry: CheckRegistry,
        config: ValidatorConfig,
    ) -> Self {
        Self {
            client,
            compliance,
            registry,
            store: ResultStore::new(&config.results_dir),
            avatars: AvatarCache::new(&config.avatars_dir),
            config,
        }
    }

    /// Live clients for `kind` and the standard repository, built-in checks.
    pub fn from_config(config: ValidatorConfig, kind: ProviderKind) -> Result<Self> {
        let client = config.client(kind)?;
        let standard_client = config.client(ProviderKind::GitHub)?;
        let compliance = ComplianceChecker::new(
            standard_client,
            &config.standard_repository,
            &config.marker_path,
        );
        let registry = CheckRegistry::builtin(&config.python, config.check_timeout);
        Ok(Self::new(client, compliance, registry, config))
    }

    pub fn provider(&self) -> ProviderKind {
        self.client.kind()
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// One validation pass over `owner_repo`.
    pub async fn validate(&self, owner_repo: &str) -> Result<ValidationOutcome> {
        let (_, short_name) = split_repository(owner_repo)?;
        info!(repository = owner_repo, provider = %self.provider(), "validating");

        let mut record = self.store.load(owner_repo)?;
        record.metadata = refresh_metadata(
            self.client.as_ref(),
            owner_repo,
            record.metadata.avatar.as_deref(),
            &self.avatars,
        )
        .await?;

        let versions = self
            .compliance
            .standard_versions(self.config.standard_policy, &self.config.branch_tags)
            .await?;
        let listed = self.client.list_releases(owner_repo).await?;
        let targets = select_targets(
            &listed,
            &record,
            &self.config.branch_tags,
            self.config.release_policy,
        );
        debug!(repository = owner_repo, listed = ?listed, targets = ?targets, "releases selected");

        let mut releases = Vec::with_capacity(targets.len());
        for tag in targets {
            let report = self
                .validate_release(owner_repo, short_name, &tag, &versions)
                .await?;
            let merge = record.merge_release(ReleaseEntry::new(tag.clone(), &report));
            releases.push(ReleaseOutcome { tag, report, merge });
        }

        let record_path = self.store.save(owner_repo, &record)?;
        info!(
            repository = owner_repo,
            validated = releases.len(),
            path = %record_path.display(),
            "record saved"
        );

        Ok(ValidationOutcome {
            repository: owner_repo.to_string(),
            record_path,
            releases,
        })
    }

    async fn validate_release(
        &self,
        owner_repo: &str,
        short_name: &str,
        tag: &str,
        versions: &[String],
    ) -> Result<StandardReport> {
        let mut compliance = Vec::with_capacity(versions.len());
        for version in versions {
            let compliant = self
                .compliance
                .is_compliant(self.client.as_ref(), owner_repo, tag, version)
                .await?;
            info!(repository = owner_repo, release = tag, standard = %version, compliant, "compliance");
            compliance.push((version.clone(), compliant));
        }

        let mut test_results = BTreeMap::new();
        if compliance.iter().any(|(_, compliant)| *compliant) {
            let model_base = self.download_models(owner_repo, short_name, tag).await?;
            test_results = self.run_checks(&model_base, tag).await;
        }
        Ok(StandardReport::new(compliance, test_results))
    }

    /// Fetch `model/<short-name>.<ext>` for each format into the work directory.
    ///
    /// Files from a previous pass are removed first; formats the release does
    /// not ship stay absent.
    async fn download_models(&self, owner_repo: &str, short_name: &str, tag: &str) -> Result<PathBuf> {
        let work_dir = &self.config.work_dir;
        tokio::fs::create_dir_all(work_dir)
            .await
            .map_err(|e| GemvalError::io(work_dir, e))?;

        for ext in &self.config.model_formats {
            let target = work_dir.join(format!("model.{ext}"));
            match tokio::fs::remove_file(&target).await {
                Ok(()) => debug!(path = %target.display(), "removed stale model file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(GemvalError::io(&target, e)),
            }

            let source = format!("model/{short_name}.{ext}");
            match self.client.fetch_raw_file(owner_repo, tag, &source).await? {
                Some(bytes) => {
                    tokio::fs::write(&target, bytes)
                        .await
                        .map_err(|e| GemvalError::io(&target, e))?;
                    info!(repository = owner_repo, release = tag, file = %source, "model downloaded");
                }
                None => debug!(repository = owner_repo, release = tag, file = %source, "model format not shipped"),
            }
        }
        Ok(work_dir.join("model"))
    }

    /// Run every check; one failing to execute never stops the others.
    async fn run_checks(&self, model_base: &Path, tag: &str) -> BTreeMap<String, TestResult> {
        let mut results = BTreeMap::new();
        for check in self.registry.iter() {
            let result = match check.run(model_base).await {
                Ok(report) => {
                    if !report.status.is_success() {
                        warn!(release = tag, check = check.name(), errors = %report.errors, "check failed");
                    } else {
                        info!(release = tag, check = check.name(), status = %report.status, "check passed");
                    }
                    report.to_test_result()
                }
                Err(e) => {
                    warn!(release = tag, check = check.name(), error = %e, "check could not run");
                    TestResult::execution_failure(check.description(), &e.to_string())
                }
            };
            results.insert(check.name().to_string(), result);
        }
        results
    }
}
