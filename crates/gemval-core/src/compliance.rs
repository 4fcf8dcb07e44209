//! Standard compliance: does a release carry the standard's marker document?
//!
//! Checkbox states in the marker are each repository's self-attestation, so
//! `[ ]`, `[x]` and `[X]` are stripped before the texts are compared.

use std::sync::{Arc, OnceLock};

use gemval_provider::{ProviderClient, ProviderError};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::StandardPolicy;

/// Marker document every standard-GEM repository carries at its root.
pub const MARKER_FILE: &str = ".standard-GEM.md";

fn checkbox_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[ xX]\]").expect("valid regex"))
}

/// Remove Markdown checkboxes from `text`.
pub fn strip_checkboxes(text: &str) -> String {
    checkbox_regex().replace_all(text, "").into_owned()
}

/// Marker texts are equal once checkboxes are stripped.
pub fn markers_match(repository_marker: &str, standard_marker: &str) -> bool {
    strip_checkboxes(repository_marker) == strip_checkboxes(standard_marker)
}

/// Compares repository releases against the standard-definition repository.
pub struct ComplianceChecker {
    standard_client: Arc<dyn ProviderClient>,
    standard_repository: String,
    marker_path: String,
}

impl ComplianceChecker {
    pub fn new(
        standard_client: Arc<dyn ProviderClient>,
        standard_repository: &str,
        marker_path: &str,
    ) -> Self {
        Self {
            standard_client,
            standard_repository: standard_repository.to_string(),
            marker_path: marker_path.to_string(),
        }
    }

    pub fn standard_repository(&self) -> &str {
        &self.standard_repository
    }

    /// Standard versions to compare against, newest first.
    ///
    /// `Latest` yields one version. A standard repository without formal
    /// releases falls back to its first branch tag.
    pub async fn standard_versions(
        &self,
        policy: StandardPolicy,
        branch_tags: &[String],
    ) -> Result<Vec<String>, ProviderError> {
        let tags = self
            .standard_client
            .list_releases(&self.standard_repository)
            .await?;
        let mut versions: Vec<String> = tags
            .into_iter()
            .filter(|tag| !branch_tags.contains(tag))
            .collect();

        if versions.is_empty() {
            warn!(
                standard = %self.standard_repository,
                "standard repository has no releases, comparing against branch"
            );
            versions.extend(branch_tags.first().cloned());
        }
        if policy == StandardPolicy::Latest {
            versions.truncate(1);
        }
        debug!(versions = ?versions, "standard versions selected");
        Ok(versions)
    }

    /// Whether `owner_repo` at `tag` follows the standard at `version`.
    ///
    /// A missing marker on either side means "not compliant", not an error.
    pub async fn is_compliant(
        &self,
        repo_client: &dyn ProviderClient,
        owner_repo: &str,
        tag: &str,
        version: &str,
    ) -> Result<bool, ProviderError> {
        let Some(repository_marker) = repo_client
            .fetch_raw_file(owner_repo, tag, &self.marker_path)
            .await?
        else {
            info!(repository = owner_repo, tag, "no standard marker file");
            return Ok(false);
        };

        let Some(standard_marker) = self
            .standard_client
            .fetch_raw_file(&self.standard_repository, version, &self.marker_path)
            .await?
        else {
            warn!(version, "standard marker file missing at version");
            return Ok(false);
        };

        Ok(markers_match(
            &String::from_utf8_lossy(&repository_marker),
            &String::from_utf8_lossy(&standard_marker),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemval_provider::fakes::FakeProvider;
    use gemval_provider::ProviderKind;

    const STANDARD: &str = "MetabolicAtlas/standard-GEM";

    const TEMPLATE: &str = "# standard-GEM\n\n- [ ] model/ folder\n- [ ] YAML export\n";

    #[test]
    fn test_checkbox_states_ignored() {
        let filled = "# standard-GEM\n\n- [x] model/ folder\n- [X] YAML export\n";
        assert!(markers_match(filled, TEMPLATE));
    }

    #[test]
    fn test_other_differences_detected() {
        let edited = "# standard-GEM\n\n- [x] model folder\n- [ ] YAML export\n";
        assert!(!markers_match(edited, TEMPLATE));
    }

    #[test]
    fn test_strip_leaves_other_brackets() {
        assert_eq!(strip_checkboxes("[x] a [link](b) [ ] [y]"), " a [link](b)  [y]");
    }

    fn checker(standard: Arc<FakeProvider>) -> ComplianceChecker {
        ComplianceChecker::new(standard, STANDARD, MARKER_FILE)
    }

    #[tokio::test]
    async fn test_compliant_release() {
        let standard = Arc::new(
            FakeProvider::new(ProviderKind::GitHub).with_file(STANDARD, "v3", MARKER_FILE, TEMPLATE.as_bytes()),
        );
        let repo = FakeProvider::new(ProviderKind::GitHub).with_file(
            "acme/model-x",
            "v2",
            MARKER_FILE,
            TEMPLATE.replace("[ ]", "[x]").as_bytes(),
        );

        let compliant = checker(standard)
            .is_compliant(&repo, "acme/model-x", "v2", "v3")
            .await
            .unwrap();
        assert!(compliant);
    }

    #[tokio::test]
    async fn test_missing_marker_skips_standard_fetch() {
        let standard = Arc::new(FakeProvider::new(ProviderKind::GitHub));
        let repo = FakeProvider::new(ProviderKind::GitLab);

        let compliant = checker(standard.clone())
            .is_compliant(&repo, "lab/plant-GEM", "1.0", "v3")
            .await
            .unwrap();
        assert!(!compliant);
        assert!(standard.raw_fetches().is_empty());
    }

    #[tokio::test]
    async fn test_missing_standard_marker_not_compliant() {
        let standard = Arc::new(FakeProvider::new(ProviderKind::GitHub));
        let repo = FakeProvider::new(ProviderKind::GitHub).with_file(
            "acme/model-x",
            "v2",
            MARKER_FILE,
            TEMPLATE.as_bytes(),
        );

        let compliant = checker(standard)
            .is_compliant(&repo, "acme/model-x", "v2", "v9")
            .await
            .unwrap();
        assert!(!compliant);
    }

    #[tokio::test]
    async fn test_latest_standard_version() {
        let standard = Arc::new(
            FakeProvider::new(ProviderKind::GitHub)
                .with_release(STANDARD, "0.4", Some("2021-01-01T00:00:00Z"))
                .with_release(STANDARD, "0.5", Some("2022-01-01T00:00:00Z")),
        );
        let branches = vec!["main".to_string()];

        let latest = checker(standard.clone())
            .standard_versions(StandardPolicy::Latest, &branches)
            .await
            .unwrap();
        assert_eq!(latest, vec!["0.5"]);

        let all = checker(standard)
            .standard_versions(StandardPolicy::All, &branches)
            .await
            .unwrap();
        assert_eq!(all, vec!["0.5", "0.4"]);
    }

    #[tokio::test]
    async fn test_standard_without_releases_uses_branch() {
        let standard = Arc::new(FakeProvider::new(ProviderKind::GitHub));
        let versions = checker(standard)
            .standard_versions(StandardPolicy::Latest, &["main".to_string()])
            .await
            .unwrap();
        assert_eq!(versions, vec!["main"]);
    }
}
