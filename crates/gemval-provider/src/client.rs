//! Provider-neutral client contract.
//!
//! Both source-control providers expose the same five operations; the
//! orchestrator only ever sees `Arc<dyn ProviderClient>`, chosen once when it
//! is constructed.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::Result;

/// Per-request timeout applied to every provider call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of most recent releases returned by `list_releases`.
pub const DEFAULT_RELEASE_LIMIT: usize = 5;

/// Repositories whose path contains this are the standard itself.
pub const STANDARD_REPOSITORY_MARKER: &str = "standard-GEM";

/// Supported source-control providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    GitHub,
    GitLab,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::GitHub, ProviderKind::GitLab];

    /// Lowercase name used in index files and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "github",
            ProviderKind::GitLab => "gitlab",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Ok(ProviderKind::GitHub),
            "gitlab" => Ok(ProviderKind::GitLab),
            other => Err(format!("unknown provider: {other} (expected github or gitlab)")),
        }
    }
}

/// A release tag together with its publish time, before ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub tag: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl ReleaseInfo {
    /// Build from a raw RFC 3339 timestamp; unparsable timestamps count as missing.
    pub fn parse(tag: impl Into<String>, timestamp: Option<&str>) -> Self {
        let created_at = timestamp
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Self {
            tag: tag.into(),
            created_at,
        }
    }
}

/// Aggregated repository metadata as reported by a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub owner: Option<String>,
    pub avatar_url: Option<String>,
    pub commit_count: u64,
    pub contributor_count: u64,
    pub latest_commit_date: Option<String>,
}

/// Uniform query interface over GitHub and GitLab.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Which provider this client talks to.
    fn kind(&self) -> ProviderKind;

    /// `owner/name` of every repository tagged with `topic`, excluding the
    /// standard-definition repository.
    async fn list_tagged_repositories(&self, topic: &str) -> Result<Vec<String>>;

    /// Release tags newest first, capped, with the branch tags prepended.
    async fn list_releases(&self, owner_repo: &str) -> Result<Vec<String>>;

    /// Raw file content at `git_ref`, or `None` when the provider answers 404.
    async fn fetch_raw_file(
        &self,
        owner_repo: &str,
        git_ref: &str,
        path: &str,
    ) -> Result<Option<Vec<u8>>>;

    /// Owner, avatar, commit and contributor counts, latest commit date.
    async fn fetch_repository_metadata(&self, owner_repo: &str) -> Result<RepositoryInfo>;

    /// Plain download of an absolute URL (avatar images).
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}

/// Settings shared by both HTTP clients.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Access token
    pub token: String,
    /// API base URL (GraphQL and REST endpoints hang off it)
    pub api_url: String,
    /// Base URL for raw file content
    pub raw_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// How many releases `list_releases` keeps
    pub release_limit: usize,
    /// Synthetic branch tags prepended to every release list
    pub branch_tags: Vec<String>,
    /// Repositories containing this substring are never listed
    pub exclude_substring: String,
}

impl ProviderSettings {
    /// Settings for github.com.
    pub fn github(token: &str) -> Self {
        Self::with_urls(token, "https://api.github.com", "https://raw.githubusercontent.com")
    }

    /// Settings for gitlab.com. Raw files live under the web origin.
    pub fn gitlab(token: &str) -> Self {
        Self::with_urls(token, "https://gitlab.com/api", "https://gitlab.com")
    }

    fn with_urls(token: &str, api_url: &str, raw_url: &str) -> Self {
        ProviderSettings {
            token: token.to_string(),
            api_url: api_url.to_string(),
            raw_url: raw_url.to_string(),
            timeout: DEFAULT_TIMEOUT,
            release_limit: DEFAULT_RELEASE_LIMIT,
            branch_tags: vec!["main".to_string()],
            exclude_substring: STANDARD_REPOSITORY_MARKER.to_string(),
        }
    }

    /// Point the API at another host (mock servers, enterprise instances).
    pub fn api_url(mut self, url: &str) -> Self {
        self.api_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Point raw file fetches at another host.
    pub fn raw_url(mut self, url: &str) -> Self {
        self.raw_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn release_limit(mut self, limit: usize) -> Self {
        self.release_limit = limit;
        self
    }

    pub fn branch_tags(mut self, tags: Vec<String>) -> Self {
        self.branch_tags = tags;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Sort newest first (missing timestamps last, stable) and keep `limit` tags.
pub fn order_releases(mut releases: Vec<ReleaseInfo>, limit: usize) -> Vec<String> {
    releases.sort_by(|a, b| match (&a.created_at, &b.created_at) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    releases.into_iter().take(limit).map(|r| r.tag).collect()
}

/// Prepend the branch tags; a formal release sharing a branch name is dropped.
pub fn with_branch_tags(branch_tags: &[String], releases: Vec<String>) -> Vec<String> {
    let mut tags = branch_tags.to_vec();
    tags.extend(releases.into_iter().filter(|t| !branch_tags.contains(t)));
    tags
}

/// Split `owner/name` at the last slash (GitLab paths may have nested groups).
pub fn split_repository(owner_repo: &str) -> Result<(&str, &str)> {
    match owner_repo.rsplit_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() => Ok((owner, name)),
        _ => Err(ProviderError::InvalidRepository(owner_repo.to_string())),
    }
}

/// Drop repositories whose path contains `substring`.
pub(crate) fn exclude_repositories(repos: Vec<String>, substring: &str) -> Vec<String> {
    repos
        .into_iter()
        .filter(|repo| !repo.contains(substring))
        .collect()
}
