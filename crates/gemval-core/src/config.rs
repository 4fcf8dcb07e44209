//! Validator configuration.
//!
//! Built from the environment at startup and passed explicitly into every
//! constructor. Credentials are checked before any network activity.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use gemval_provider::{
    GitHubClient, GitLabClient, ProviderClient, ProviderKind, ProviderSettings,
    DEFAULT_RELEASE_LIMIT, DEFAULT_TIMEOUT,
};

use crate::compliance::MARKER_FILE;
use crate::error::{ConfigError, Result};

pub const GITHUB_TOKEN_VAR: &str = "GH_TOKEN";
pub const GITLAB_TOKEN_VAR: &str = "GL_TOKEN";

/// Topic marking a repository as following the standard.
pub const DEFAULT_TOPIC: &str = "standard-gem";

/// Standard-definition repository (on GitHub).
pub const DEFAULT_STANDARD_REPOSITORY: &str = "MetabolicAtlas/standard-GEM";

/// Model file extensions downloaded for each compliant release.
pub const DEFAULT_MODEL_FORMATS: [&str; 4] = ["yml", "xml", "mat", "json"];

/// Interpreter used by the cobrapy and memote checks.
pub const DEFAULT_PYTHON: &str = "python3";

/// Upper bound for one check process.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(900);

/// How many releases one pass validates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReleasePolicy {
    /// First pending release, or the branch tag when nothing is pending
    #[default]
    OnePerRun,
    /// Every pending release plus the branch tags
    AllPending,
}

impl FromStr for ReleasePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "one-per-run" => Ok(ReleasePolicy::OnePerRun),
            "all-pending" => Ok(ReleasePolicy::AllPending),
            other => Err(ConfigError::InvalidValue {
                name: "release policy",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ReleasePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReleasePolicy::OnePerRun => "one-per-run",
            ReleasePolicy::AllPending => "all-pending",
        })
    }
}

/// Which standard versions compliance is evaluated against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StandardPolicy {
    #[default]
    Latest,
    All,
}

impl FromStr for StandardPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "latest" => Ok(StandardPolicy::Latest),
            "all" => Ok(StandardPolicy::All),
            other => Err(ConfigError::InvalidValue {
                name: "standard policy",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for StandardPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StandardPolicy::Latest => "latest",
            StandardPolicy::All => "all",
        })
    }
}

/// Everything a validation pass needs besides the check registry.
#[derive(Clone)]
pub struct ValidatorConfig {
    pub github_token: String,
    pub gitlab_token: String,
    pub topic: String,
    pub standard_repository: String,
    pub marker_path: String,
    pub branch_tags: Vec<String>,
    pub release_limit: usize,
    pub model_formats: Vec<String>,
    pub results_dir: PathBuf,
    pub avatars_dir: PathBuf,
    /// Where `model.<ext>` files are downloaded
    pub work_dir: PathBuf,
    pub index_path: PathBuf,
    pub release_policy: ReleasePolicy,
    pub standard_policy: StandardPolicy,
    /// Per-request provider timeout
    pub timeout: Duration,
    pub python: String,
    pub check_timeout: Duration,
}

impl fmt::Debug for ValidatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorConfig")
            .field("github_token", &"<redacted>")
            .field("gitlab_token", &"<redacted>")
            .field("topic", &self.topic)
            .field("standard_repository", &self.standard_repository)
            .field("branch_tags", &self.branch_tags)
            .field("release_limit", &self.release_limit)
            .field("model_formats", &self.model_formats)
            .field("results_dir", &self.results_dir)
            .field("avatars_dir", &self.avatars_dir)
            .field("work_dir", &self.work_dir)
            .field("index_path", &self.index_path)
            .field("release_policy", &self.release_policy)
            .field("standard_policy", &self.standard_policy)
            .field("timeout", &self.timeout)
            .field("python", &self.python)
            .field("check_timeout", &self.check_timeout)
            .finish_non_exhaustive()
    }
}

impl ValidatorConfig {
    /// Defaults with the given credentials.
    pub fn new(github_token: impl Into<String>, gitlab_token: impl Into<String>) -> Self {
        Self {
            github_token: github_token.into(),
            gitlab_token: gitlab_token.into(),
            topic: DEFAULT_TOPIC.to_string(),
            standard_repository: DEFAULT_STANDARD_REPOSITORY.to_string(),
            marker_path: MARKER_FILE.to_string(),
            branch_tags: vec!["main".to_string()],
            release_limit: DEFAULT_RELEASE_LIMIT,
            model_formats: DEFAULT_MODEL_FORMATS.iter().map(|f| f.to_string()).collect(),
            results_dir: PathBuf::from("results"),
            avatars_dir: PathBuf::from("avatars"),
            work_dir: PathBuf::from("."),
            index_path: PathBuf::from("index.json"),
            release_policy: ReleasePolicy::default(),
            standard_policy: StandardPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
            python: DEFAULT_PYTHON.to_string(),
            check_timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }

    /// Read credentials from the process environment.
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through `lookup`. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> std::result::Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::MissingCredential(name))
        };
        let github = required(GITHUB_TOKEN_VAR)?;
        let gitlab = required(GITLAB_TOKEN_VAR)?;
        Ok(Self::new(github, gitlab))
    }

    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = dir.into();
        self
    }

    pub fn with_avatars_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.avatars_dir = dir.into();
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn with_index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = path.into();
        self
    }

    pub fn with_release_policy(mut self, policy: ReleasePolicy) -> Self {
        self.release_policy = policy;
        self
    }

    pub fn with_standard_policy(mut self, policy: StandardPolicy) -> Self {
        self.standard_policy = policy;
        self
    }

    pub fn with_branch_tags(mut self, tags: Vec<String>) -> Self {
        self.branch_tags = tags;
        self
    }

    pub fn with_model_formats(mut self, formats: Vec<String>) -> Self {
        self.model_formats = formats;
        self
    }

    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }

    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    pub fn token(&self, kind: ProviderKind) -> &str {
        match kind {
            ProviderKind::GitHub => &self.github_token,
            ProviderKind::GitLab => &self.gitlab_token,
        }
    }

    /// Client settings for `kind`, carrying this config's limits.
    pub fn provider_settings(&self, kind: ProviderKind) -> ProviderSettings {
        let base = match kind {
            ProviderKind::GitHub => ProviderSettings::github(self.token(kind)),
            ProviderKind::GitLab => ProviderSettings::gitlab(self.token(kind)),
        };
        base.release_limit(self.release_limit)
            .branch_tags(self.branch_tags.clone())
            .timeout(self.timeout)
    }

    /// Live HTTP client for `kind`.
    pub fn client(&self, kind: ProviderKind) -> Result<Arc<dyn ProviderClient>> {
        let settings = self.provider_settings(kind);
        let client: Arc<dyn ProviderClient> = match kind {
            ProviderKind::GitHub => Arc::new(GitHubClient::new(settings)?),
            ProviderKind::GitLab => Arc::new(GitLabClient::new(settings)?),
        };
        Ok(client)
    }
}
