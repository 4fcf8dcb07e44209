//! GitHub client: GraphQL v4 for search, releases and metadata, REST v3 for
//! contributors, raw.githubusercontent.com for file content.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::client::{
    exclude_repositories, order_releases, split_repository, with_branch_tags, ProviderClient,
    ProviderKind, ProviderSettings, ReleaseInfo, RepositoryInfo,
};
use crate::error::ProviderError;
use crate::http::{last_page_from_link, HttpTransport};
use crate::Result;

const SEARCH_QUERY: &str = r#"
query($query: String!) {
  search(type: REPOSITORY, query: $query, first: 100) {
    repos: edges {
      repo: node {
        ... on Repository { nameWithOwner }
      }
    }
  }
}"#;

const RELEASES_QUERY: &str = r#"
query($owner: String!, $name: String!, $first: Int!) {
  repository(owner: $owner, name: $name) {
    releases(first: $first, orderBy: {field: CREATED_AT, direction: DESC}) {
      edges { node { tagName createdAt } }
    }
  }
}"#;

const METADATA_QUERY: &str = r#"
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    owner { login avatarUrl }
    defaultBranchRef {
      target {
        ... on Commit {
          committedDate
          history { totalCount }
        }
      }
    }
  }
}"#;

#[derive(Deserialize)]
struct SearchData {
    search: SearchConnection,
}

#[derive(Deserialize)]
struct SearchConnection {
    repos: Vec<SearchEdge>,
}

#[derive(Deserialize)]
struct SearchEdge {
    repo: Option<SearchNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchNode {
    name_with_owner: Option<String>,
}

#[derive(Deserialize)]
struct ReleasesData {
    repository: Option<ReleasesRepository>,
}

#[derive(Deserialize)]
struct ReleasesRepository {
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
    tag_name: String,
    created_at: Option<String>,
}

#[derive(Deserialize)]
struct MetadataData {
    repository: Option<MetadataRepository>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataRepository {
    owner: OwnerNode,
    default_branch_ref: Option<BranchRef>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnerNode {
    login: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Deserialize)]
struct BranchRef {
    target: Option<CommitTarget>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitTarget {
    committed_date: Option<String>,
    history: Option<CommitHistory>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitHistory {
    total_count: u64,
}

/// GitHub implementation of [`ProviderClient`].
pub struct GitHubClient {
    settings: ProviderSettings,
    http: HttpTransport,
}

impl GitHubClient {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let http = HttpTransport::new("github", settings.timeout)?;
        Ok(Self { settings, http })
    }

    fn graphql_url(&self) -> String {
        format!("{}/graphql", self.settings.api_url)
    }

    fn authorization(&self) -> String {
        format!("token {}", self.settings.token)
    }

    fn not_found(&self, owner_repo: &str) -> ProviderError {
        ProviderError::GraphQl {
            provider: self.http.provider(),
            message: format!("repository {owner_repo} not found"),
        }
    }

    /// Contributor count from the `rel="last"` page of a one-per-page listing.
    async fn contributor_count(&self, owner: &str, name: &str) -> Result<u64> {
        let url = format!(
            "{}/repos/{}/{}/contributors?per_page=1&anon=true",
            self.settings.api_url, owner, name
        );
        let authorization = self.authorization();
        let (body, headers): (Value, _) = self
            .http
            .get_json(
                &url,
                &[
                    ("Authorization", authorization.as_str()),
                    ("Accept", "application/vnd.github+json"),
                ],
            )
            .await?;

        let from_link = headers
            .get("link")
            .and_then(|v| v.to_str().ok())
            .and_then(last_page_from_link);
        let count = match from_link {
            Some(last_page) => last_page,
            None => body.as_array().map(|a| a.len() as u64).unwrap_or(0),
        };
        Ok(count)
    }
}

#[async_trait]
impl ProviderClient for GitHubClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GitHub
    }

    async fn list_tagged_repositories(&self, topic: &str) -> Result<Vec<String>> {
        let data: SearchData = self
            .http
            .graphql(
                &self.graphql_url(),
                &self.authorization(),
                SEARCH_QUERY,
                json!({ "query": format!("fork:true topic:{topic}") }),
            )
            .await?;

        let repos = data
            .search
            .repos
            .into_iter()
            .filter_map(|edge| edge.repo.and_then(|node| node.name_with_owner))
            .collect();
        let repos = exclude_repositories(repos, &self.settings.exclude_substring);
        info!(count = repos.len(), topic, "github repositories discovered");
        Ok(repos)
    }

    async fn list_releases(&self, owner_repo: &str) -> Result<Vec<String>> {
        let (owner, name) = split_repository(owner_repo)?;
        let data: ReleasesData = self
            .http
            .graphql(
                &self.graphql_url(),
                &self.authorization(),
                RELEASES_QUERY,
                json!({ "owner": owner, "name": name, "first": self.settings.release_limit }),
            )
            .await?;

        let repository = data.repository.ok_or_else(|| self.not_found(owner_repo))?;
        let releases = repository
            .releases
            .edges
            .into_iter()
            .map(|edge| ReleaseInfo::parse(edge.node.tag_name, edge.node.created_at.as_deref()))
            .collect();
        let tags = order_releases(releases, self.settings.release_limit);
        debug!(repository = owner_repo, releases = ?tags, "github releases");
        Ok(with_branch_tags(&self.settings.branch_tags, tags))
    }

    async fn fetch_raw_file(
        &self,
        owner_repo: &str,
        git_ref: &str,
        path: &str,
    ) -> Result<Option<Vec<u8>>> {
        let url = format!("{}/{}/{}/{}", self.settings.raw_url, owner_repo, git_ref, path);
        self.http.get_optional_bytes(&url, &[]).await
    }

    async fn fetch_repository_metadata(&self, owner_repo: &str) -> Result<RepositoryInfo> {
        let (owner, name) = split_repository(owner_repo)?;
        let data: MetadataData = self
            .http
            .graphql(
                &self.graphql_url(),
                &self.authorization(),
                METADATA_QUERY,
                json!({ "owner": owner, "name": name }),
            )
            .await?;
        let repository = data.repository.ok_or_else(|| self.not_found(owner_repo))?;

        let commit = repository.default_branch_ref.and_then(|r| r.target);
        let commit_count = commit
            .as_ref()
            .and_then(|c| c.history.as_ref())
            .map(|h| h.total_count)
            .unwrap_or(0);
        let latest_commit_date = commit.and_then(|c| c.committed_date);
        let contributor_count = self.contributor_count(owner, name).await?;

        Ok(RepositoryInfo {
            owner: repository.owner.login,
            avatar_url: repository.owner.avatar_url,
            commit_count,
            contributor_count,
            latest_commit_date,
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.http.get_bytes(url).await
    }
}
