//! gemval-provider: source-control provider clients
//!
//! Uniform access to the two providers hosting standard-GEM repositories:
//!
//! - `GitHubClient`: GraphQL v4 + REST v3 + raw.githubusercontent.com
//! - `GitLabClient`: GraphQL + REST v4 + `/-/raw/`
//!
//! Both implement [`ProviderClient`]. An in-memory [`fakes::FakeProvider`]
//! is provided for tests of code built on top of the trait.

mod client;
mod error;
pub mod fakes;
mod github;
mod gitlab;
mod http;

pub use client::{
    order_releases, split_repository, with_branch_tags, ProviderClient, ProviderKind,
    ProviderSettings, ReleaseInfo, RepositoryInfo, DEFAULT_RELEASE_LIMIT, DEFAULT_TIMEOUT,
    STANDARD_REPOSITORY_MARKER,
};
pub use error::ProviderError;
pub use github::GitHubClient;
pub use gitlab::GitLabClient;

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;
