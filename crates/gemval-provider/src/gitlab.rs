//! GitLab client: GraphQL for topic search and releases, REST v4 for project
//! metadata, `/-/raw/` for file content.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::client::{
    exclude_repositories, order_releases, with_branch_tags, ProviderClient, ProviderKind,
    ProviderSettings, ReleaseInfo, RepositoryInfo,
};
use crate::error::ProviderError;
use crate::http::{header_u64, HttpTransport};
use crate::Result;

const PROJECTS_QUERY: &str = r#"
query($topics: [String!], $first: Int) {
  projects(topics: $topics, first: $first) {
    edges { node { fullPath } }
  }
}"#;

const RELEASES_QUERY: &str = r#"
query($fullPath: ID!, $first: Int) {
  project(fullPath: $fullPath) {
    releases(first: $first, sort: RELEASED_AT_DESC) {
      edges { node { tagName releasedAt } }
    }
  }
}"#;

#[derive(Deserialize)]
struct ProjectsData {
    projects: ProjectConnection,
}

#[derive(Deserialize)]
struct ProjectConnection {
    edges: Vec<ProjectEdge>,
}

#[derive(Deserialize)]
struct ProjectEdge {
    node: ProjectNode,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectNode {
    full_path: String,
}

#[derive(Deserialize)]
struct ReleasesData {
    project: Option<ReleasesProject>,
}

#[derive(Deserialize)]
struct ReleasesProject {
    releases: ReleaseConnection,
}

#[derive(Deserialize)]
struct ReleaseConnection {
    edges: Vec<ReleaseEdge>,
}

#[derive(Deserialize)]
struct ReleaseEdge {
    node: ReleaseNode,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseNode {
    tag_name: Option<String>,
    released_at: Option<String>,
}

#[derive(Deserialize)]
struct ProjectResponse {
    id: u64,
    namespace: Option<NamespaceResponse>,
}

#[derive(Deserialize)]
struct NamespaceResponse {
    full_path: Option<String>,
    name: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Deserialize)]
struct CommitResponse {
    committed_date: Option<String>,
}

/// GitLab implementation of [`ProviderClient`].
pub struct GitLabClient {
    settings: ProviderSettings,
    http: HttpTransport,
}

impl GitLabClient {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let http = HttpTransport::new("gitlab", settings.timeout)?;
        Ok(Self { settings, http })
    }

    fn graphql_url(&self) -> String {
        format!("{}/graphql", self.settings.api_url)
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/v4/{}", self.settings.api_url, path)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.settings.token)
    }

    fn private_token(&self) -> [(&'static str, &str); 1] {
        [("PRIVATE-TOKEN", self.settings.token.as_str())]
    }

    /// Avatars of self-hosted namespaces come back as `/uploads/...`.
    fn absolute_url(&self, url: String) -> String {
        if url.starts_with('/') {
            format!("{}{}", self.settings.raw_url, url)
        } else {
            url
        }
    }
}

/// Project paths go into REST URLs percent-encoded as a single segment.
fn encode_project_path(full_path: &str) -> String {
    full_path.replace('/', "%2F")
}

#[async_trait]
impl ProviderClient for GitLabClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GitLab
    }

    async fn list_tagged_repositories(&self, topic: &str) -> Result<Vec<String>> {
        let data: ProjectsData = self
            .http
            .graphql(
                &self.graphql_url(),
                &self.bearer(),
                PROJECTS_QUERY,
                json!({ "topics": [topic], "first": 100 }),
            )
            .await?;

        let repos = data
            .projects
            .edges
            .into_iter()
            .map(|edge| edge.node.full_path)
            .collect();
        let repos = exclude_repositories(repos, &self.settings.exclude_substring);
        info!(count = repos.len(), topic, "gitlab projects discovered");
        Ok(repos)
    }

    async fn list_releases(&self, owner_repo: &str) -> Result<Vec<String>> {
        let data: ReleasesData = self
            .http
            .graphql(
                &self.graphql_url(),
                &self.bearer(),
                RELEASES_QUERY,
                json!({ "fullPath": owner_repo, "first": self.settings.release_limit }),
            )
            .await?;

        let project = data.project.ok_or_else(|| ProviderError::GraphQl {
            provider: self.http.provider(),
            message: format!("project {owner_repo} not found"),
        })?;
        let releases = project
            .releases
            .edges
            .into_iter()
            .filter_map(|edge| {
                let tag = edge.node.tag_name?;
                Some(ReleaseInfo::parse(tag, edge.node.released_at.as_deref()))
            })
            .collect();
        let tags = order_releases(releases, self.settings.release_limit);
        debug!(repository = owner_repo, releases = ?tags, "gitlab releases");
        Ok(with_branch_tags(&self.settings.branch_tags, tags))
    }

    async fn fetch_raw_file(
        &self,
        owner_repo: &str,
        git_ref: &str,
        path: &str,
    ) -> Result<Option<Vec<u8>>> {
        let url = format!(
            "{}/{}/-/raw/{}/{}",
            self.settings.raw_url, owner_repo, git_ref, path
        );
        self.http.get_optional_bytes(&url, &[]).await
    }

    async fn fetch_repository_metadata(&self, owner_repo: &str) -> Result<RepositoryInfo> {
        let token = self.private_token();
        let project_url = self.rest_url(&format!("projects/{}", encode_project_path(owner_repo)));
        let (project, _): (ProjectResponse, _) = self.http.get_json(&project_url, &token).await?;

        let namespace = project.namespace.unwrap_or(NamespaceResponse {
            full_path: None,
            name: None,
            avatar_url: None,
        });
        let owner = namespace
            .full_path
            .or(namespace.name)
            .or_else(|| owner_repo.split('/').next().map(str::to_string));
        let avatar_url = namespace.avatar_url.map(|url| self.absolute_url(url));

        let commits_url = self.rest_url(&format!(
            "projects/{}/repository/commits?per_page=1",
            project.id
        ));
        let (commits, commit_headers): (Option<Vec<CommitResponse>>, _) =
            self.http.get_json(&commits_url, &token).await?;
        let commits = commits.unwrap_or_default();
        let commit_count =
            header_u64(&commit_headers, "X-Total").unwrap_or(commits.len() as u64);
        let latest_commit_date = commits.into_iter().next().and_then(|c| c.committed_date);

        let contributors_url = self.rest_url(&format!(
            "projects/{}/repository/contributors",
            project.id
        ));
        let (contributors, contributor_headers): (Value, _) =
            self.http.get_json(&contributors_url, &token).await?;
        let contributor_count = header_u64(&contributor_headers, "X-Total").unwrap_or_else(|| {
            contributors
                .as_array()
                .map(|a| a.len() as u64)
                .unwrap_or(0)
        });

        Ok(RepositoryInfo {
            owner,
            avatar_url,
            commit_count,
            contributor_count,
            latest_commit_date,
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.http.get_bytes(url).await
    }
}
