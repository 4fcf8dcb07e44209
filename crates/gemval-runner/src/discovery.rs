//! Repository discovery into the index, and the CI job matrix built from it.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use gemval_core::{RepositoryIndex, Result};
use gemval_provider::{ProviderClient, ProviderKind};

/// Per-provider discovery counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverySummary {
    pub provider: ProviderKind,
    pub found: usize,
    pub added: usize,
}

/// Ask every client for repositories tagged `topic` and union them into `index`.
///
/// A provider failure aborts before later providers are asked; the index is
/// only mutated in memory, callers decide when to save.
pub async fn discover(
    clients: &[Arc<dyn ProviderClient>],
    topic: &str,
    index: &mut RepositoryIndex,
) -> Result<Vec<DiscoverySummary>> {
    let mut summaries = Vec::with_capacity(clients.len());
    for client in clients {
        let repositories = client.list_tagged_repositories(topic).await?;
        let found = repositories.len();
        let added = index.merge(client.kind(), repositories);
        info!(provider = %client.kind(), found, added, "repositories discovered");
        summaries.push(DiscoverySummary {
            provider: client.kind(),
            found,
            added,
        });
    }
    Ok(summaries)
}

/// One CI job: a repository and the provider hosting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixJob {
    pub gem: String,
    pub provider: ProviderKind,
}

/// `{"include": [{"gem": ..., "provider": ...}]}` as consumed by CI matrices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobMatrix {
    pub include: Vec<MatrixJob>,
}

impl JobMatrix {
    /// Every indexed repository, optionally restricted to one provider.
    pub fn from_index(index: &RepositoryIndex, provider: Option<ProviderKind>) -> Self {
        let include = index
            .repositories()
            .into_iter()
            .filter(|(kind, _)| provider.map_or(true, |p| p == *kind))
            .map(|(provider, gem)| MatrixJob { gem, provider })
            .collect();
        Self { include }
    }
}
