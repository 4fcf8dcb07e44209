//! In-memory fake provider (testing only)
//!
//! `FakeProvider` satisfies the [`ProviderClient`] contract without any
//! network access and records every raw fetch and download so tests can
//! assert on what the orchestrator asked for.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{
    exclude_repositories, order_releases, with_branch_tags, ProviderClient, ProviderKind,
    ReleaseInfo, RepositoryInfo, DEFAULT_RELEASE_LIMIT, STANDARD_REPOSITORY_MARKER,
};
use crate::error::ProviderError;
use crate::Result;

#[derive(Debug, Default)]
struct FakeState {
    repositories: Vec<String>,
    releases: HashMap<String, Vec<ReleaseInfo>>,
    files: HashMap<(String, String, String), Vec<u8>>,
    metadata: HashMap<String, RepositoryInfo>,
    downloads: HashMap<String, Vec<u8>>,
    failing: HashMap<String, u16>,
    raw_fetches: Vec<(String, String, String)>,
    download_requests: Vec<String>,
}

/// Scriptable in-memory provider.
#[derive(Debug)]
pub struct FakeProvider {
    kind: ProviderKind,
    branch_tags: Vec<String>,
    release_limit: usize,
    state: Mutex<FakeState>,
}

impl FakeProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            branch_tags: vec!["main".to_string()],
            release_limit: DEFAULT_RELEASE_LIMIT,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn with_branch_tags(mut self, tags: &[&str]) -> Self {
        self.branch_tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_repository(self, owner_repo: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .repositories
            .push(owner_repo.to_string());
        self
    }

    /// Add a release; `created_at` is an RFC 3339 timestamp.
    pub fn with_release(self, owner_repo: &str, tag: &str, created_at: Option<&str>) -> Self {
        self.add_release(owner_repo, tag, created_at);
        self
    }

    pub fn with_file(self, owner_repo: &str, git_ref: &str, path: &str, content: &[u8]) -> Self {
        self.put_file(owner_repo, git_ref, path, content);
        self
    }

    pub fn with_metadata(self, owner_repo: &str, info: RepositoryInfo) -> Self {
        self.state
            .lock()
            .unwrap()
            .metadata
            .insert(owner_repo.to_string(), info);
        self
    }

    pub fn with_download(self, url: &str, content: &[u8]) -> Self {
        self.state
            .lock()
            .unwrap()
            .downloads
            .insert(url.to_string(), content.to_vec());
        self
    }

    /// Every call touching `owner_repo` fails with `status`.
    pub fn with_failure(self, owner_repo: &str, status: u16) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(owner_repo.to_string(), status);
        self
    }

    /// Publish a new release between runs.
    pub fn add_release(&self, owner_repo: &str, tag: &str, created_at: Option<&str>) {
        self.state
            .lock()
            .unwrap()
            .releases
            .entry(owner_repo.to_string())
            .or_default()
            .push(ReleaseInfo::parse(tag, created_at));
    }

    pub fn put_file(&self, owner_repo: &str, git_ref: &str, path: &str, content: &[u8]) {
        self.state.lock().unwrap().files.insert(
            (owner_repo.to_string(), git_ref.to_string(), path.to_string()),
            content.to_vec(),
        );
    }

    /// Every `(repo, ref, path)` passed to `fetch_raw_file`, in call order.
    pub fn raw_fetches(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().raw_fetches.clone()
    }

    /// Every URL passed to `download`, in call order.
    pub fn download_requests(&self) -> Vec<String> {
        self.state.lock().unwrap().download_requests.clone()
    }

    fn check_failure(&self, owner_repo: &str) -> Result<()> {
        match self.state.lock().unwrap().failing.get(owner_repo) {
            Some(status) => Err(ProviderError::Status {
                provider: "fake",
                status: *status,
                message: format!("injected failure for {owner_repo}"),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProviderClient for FakeProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn list_tagged_repositories(&self, _topic: &str) -> Result<Vec<String>> {
        let repos = self.state.lock().unwrap().repositories.clone();
        Ok(exclude_repositories(repos, STANDARD_REPOSITORY_MARKER))
    }

    async fn list_releases(&self, owner_repo: &str) -> Result<Vec<String>> {
        self.check_failure(owner_repo)?;
        let releases = self
            .state
            .lock()
            .unwrap()
            .releases
            .get(owner_repo)
            .cloned()
            .unwrap_or_default();
        let tags = order_releases(releases, self.release_limit);
        Ok(with_branch_tags(&self.branch_tags, tags))
    }

    async fn fetch_raw_file(
        &self,
        owner_repo: &str,
        git_ref: &str,
        path: &str,
    ) -> Result<Option<Vec<u8>>> {
        self.check_failure(owner_repo)?;
        let key = (owner_repo.to_string(), git_ref.to_string(), path.to_string());
        let mut state = self.state.lock().unwrap();
        state.raw_fetches.push(key.clone());
        Ok(state.files.get(&key).cloned())
    }

    async fn fetch_repository_metadata(&self, owner_repo: &str) -> Result<RepositoryInfo> {
        self.check_failure(owner_repo)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .metadata
            .get(owner_repo)
            .cloned()
            .unwrap_or_default())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        state.download_requests.push(url.to_string());
        state
            .downloads
            .get(url)
            .cloned()
            .ok_or_else(|| ProviderError::Status {
                provider: "fake",
                status: 404,
                message: format!("no download registered for {url}"),
            })
    }
}
