//! Integration tests for the validation pipeline over fake providers.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use gemval_core::{
    ComplianceChecker, GemvalError, MergeOutcome, ReleasePolicy, StandardPolicy, ValidatorConfig,
    MARKER_FILE,
};
use gemval_provider::fakes::FakeProvider;
use gemval_provider::{ProviderKind, RepositoryInfo};
use gemval_runner::fakes::ScriptedCheck;
use gemval_runner::{CheckRegistry, ValidationPipeline};
use serde_json::{json, Value};
use tempfile::TempDir;

const REPO: &str = "acme/model-x";
const STANDARD: &str = "MetabolicAtlas/standard-GEM";
const AVATAR_URL: &str = "https://avatars.example.com/u/1?v=4";
const TEMPLATE: &str = "# standard-GEM\n\n- [ ] model/ folder\n- [ ] YAML export\n- [ ] SBML export\n";

fn filled_marker() -> Vec<u8> {
    TEMPLATE.replace("[ ]", "[x]").into_bytes()
}

fn standard_provider() -> Arc<FakeProvider> {
    Arc::new(
        FakeProvider::new(ProviderKind::GitHub)
            .with_release(STANDARD, "v2", Some("2022-01-01T00:00:00Z"))
            .with_release(STANDARD, "v3", Some("2023-01-01T00:00:00Z"))
            .with_file(STANDARD, "v3", MARKER_FILE, TEMPLATE.as_bytes())
            .with_file(STANDARD, "v2", MARKER_FILE, b"# standard-GEM\n\n- [ ] model/ folder\n"),
    )
}

/// `acme/model-x` with releases v1 and v2; v2 and main follow the standard
/// and ship YAML and SBML models only.
fn repo_provider() -> Arc<FakeProvider> {
    Arc::new(
        FakeProvider::new(ProviderKind::GitHub)
            .with_release(REPO, "v1", Some("2023-06-01T00:00:00Z"))
            .with_release(REPO, "v2", Some("2024-01-01T00:00:00Z"))
            .with_metadata(
                REPO,
                RepositoryInfo {
                    owner: Some("acme".to_string()),
                    avatar_url: Some(AVATAR_URL.to_string()),
                    commit_count: 120,
                    contributor_count: 4,
                    latest_commit_date: Some("2024-02-02T00:00:00Z".to_string()),
                },
            )
            .with_download(AVATAR_URL, b"png-bytes")
            .with_file(REPO, "v2", MARKER_FILE, &filled_marker())
            .with_file(REPO, "main", MARKER_FILE, &filled_marker())
            .with_file(REPO, "v2", "model/model-x.yml", b"id: model-x\n")
            .with_file(REPO, "v2", "model/model-x.xml", b"<sbml/>")
            .with_file(REPO, "main", "model/model-x.yml", b"id: model-x\n"),
    )
}

struct Harness {
    dir: TempDir,
    repo: Arc<FakeProvider>,
    standard: Arc<FakeProvider>,
    checks: Vec<Arc<ScriptedCheck>>,
}

impl Harness {
    fn new() -> Self {
        Self::with_checks(vec![
            Arc::new(ScriptedCheck::passing("yamllint").requiring("yml")),
            Arc::new(ScriptedCheck::passing("cobrapy-load-sbml").requiring("xml")),
            Arc::new(ScriptedCheck::passing("cobrapy-load-matlab").requiring("mat")),
        ])
    }

    fn with_checks(checks: Vec<Arc<ScriptedCheck>>) -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
            repo: repo_provider(),
            standard: standard_provider(),
            checks,
        }
    }

    fn config(&self) -> ValidatorConfig {
        let root = self.dir.path();
        ValidatorConfig::new("gh", "gl")
            .with_results_dir(root.join("results"))
            .with_avatars_dir(root.join("avatars"))
            .with_work_dir(root.join("work"))
    }

    fn pipeline_with(&self, config: ValidatorConfig) -> ValidationPipeline {
        let mut registry = CheckRegistry::new();
        for check in &self.checks {
            registry.register(check.clone()).expect("unique names");
        }
        let compliance = ComplianceChecker::new(self.standard.clone(), STANDARD, MARKER_FILE);
        ValidationPipeline::new(self.repo.clone(), compliance, registry, config)
    }

    fn pipeline(&self) -> ValidationPipeline {
        self.pipeline_with(self.config())
    }

    fn result_path(&self) -> std::path::PathBuf {
        self.dir.path().join("results").join("model-x.json")
    }

    fn result_file(&self) -> Value {
        let text = fs::read_to_string(self.result_path()).expect("result file");
        serde_json::from_str(&text).expect("valid json")
    }

    fn write_result_file(&self, value: &Value) {
        let path = self.result_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    }
}

fn tags(file: &Value) -> Vec<String> {
    file["releases"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry.as_object().unwrap().keys().next().unwrap().clone())
        .collect()
}

fn entry<'a>(file: &'a Value, tag: &str) -> &'a Value {
    file["releases"]
        .as_array()
        .unwrap()
        .iter()
        .find_map(|e| e.get(tag))
        .unwrap_or_else(|| panic!("no entry for {tag}"))
}

fn model_fetches(provider: &FakeProvider) -> usize {
    provider
        .raw_fetches()
        .iter()
        .filter(|(_, _, path)| path.starts_with("model/"))
        .count()
}

/// Record with `main` already validated, `v2` and `v1` pending; standard at
/// `v3`; release ships `.yml` and `.xml` only; three checks.
#[tokio::test]
async fn test_new_release_prepended_with_results() {
    let h = Harness::new();
    h.write_result_file(&json!({
        "metadata": { "avatar": "acme.png" },
        "releases": [
            { "main": { "standard-GEM": [ { "v3": true }, { "test_results": {} } ] } }
        ]
    }));

    let outcome = h.pipeline().validate(REPO).await.expect("pass");
    assert_eq!(outcome.validated_tags(), vec!["v2"]);
    assert_eq!(outcome.releases[0].merge, MergeOutcome::Prepended);
    assert_eq!(outcome.releases[0].failed_checks(), 1);

    let file = h.result_file();
    assert_eq!(tags(&file), vec!["v2", "main"]);
    assert_eq!(
        entry(&file, "v2"),
        &json!({ "standard-GEM": [
            { "v3": true },
            { "test_results": {
                "cobrapy-load-matlab": {
                    "description": "cobrapy-load-matlab check",
                    "version": "1.0",
                    "status": false,
                    "errors": "File missing"
                },
                "cobrapy-load-sbml": {
                    "description": "cobrapy-load-sbml check",
                    "version": "1.0",
                    "status": true,
                    "errors": ""
                },
                "yamllint": {
                    "description": "yamllint check",
                    "version": "1.0",
                    "status": true,
                    "errors": ""
                }
            } }
        ] })
    );

    // cached avatar carried forward, counts refreshed
    assert_eq!(file["metadata"]["avatar"], "acme.png");
    assert_eq!(file["metadata"]["commits"], 120);
    assert_eq!(file["metadata"]["contributors"], 4);
    assert!(h.repo.download_requests().is_empty());

    // every check saw the same model base in the work directory
    let model_base = h.dir.path().join("work").join("model");
    for check in &h.checks {
        assert_eq!(check.calls(), vec![model_base.clone()]);
    }
    assert!(model_base.with_extension("yml").is_file());
    assert!(!model_base.with_extension("mat").exists());
}

#[tokio::test]
async fn test_missing_marker_means_no_downloads() {
    let h = Harness::new();
    h.write_result_file(&json!({
        "metadata": {},
        "releases": [
            { "v2": { "standard-GEM": [ { "v3": true }, { "test_results": {} } ] } },
            { "main": { "standard-GEM": [ { "v3": true }, { "test_results": {} } ] } }
        ]
    }));

    let outcome = h.pipeline().validate(REPO).await.expect("pass");
    assert_eq!(outcome.validated_tags(), vec!["v1"]);

    let file = h.result_file();
    assert_eq!(tags(&file), vec!["v1", "v2", "main"]);
    assert_eq!(
        entry(&file, "v1"),
        &json!({ "standard-GEM": [ { "v3": false }, { "test_results": {} } ] })
    );
    assert_eq!(model_fetches(&h.repo), 0);
    assert!(h.checks.iter().all(|c| c.calls().is_empty()));
    // standard marker never needed once the repository marker is absent
    assert!(h.standard.raw_fetches().is_empty());
}

#[tokio::test]
async fn test_repeated_passes_only_revalidate_branch() {
    let h = Harness::new();
    let pipeline = h.pipeline();

    let mut seen = Vec::new();
    for _ in 0..3 {
        let outcome = pipeline.validate(REPO).await.expect("pass");
        seen.extend(outcome.validated_tags().iter().map(|t| t.to_string()));
    }
    assert_eq!(seen, vec!["main", "v2", "v1"]);
    let settled = h.result_file();
    assert_eq!(tags(&settled), vec!["v1", "v2", "main"]);

    for _ in 0..2 {
        let outcome = pipeline.validate(REPO).await.expect("pass");
        assert_eq!(outcome.validated_tags(), vec!["main"]);
        assert_eq!(outcome.releases[0].merge, MergeOutcome::Replaced);
    }

    let file = h.result_file();
    assert_eq!(tags(&file), tags(&settled));
    for tag in ["v1", "v2"] {
        assert_eq!(entry(&file, tag), entry(&settled, tag));
    }
}

#[tokio::test]
async fn test_new_upstream_release_grows_history() {
    let h = Harness::new();
    let pipeline = h.pipeline();
    for _ in 0..3 {
        pipeline.validate(REPO).await.expect("pass");
    }
    let before = tags(&h.result_file());

    h.repo.add_release(REPO, "v3", Some("2024-06-01T00:00:00Z"));
    h.repo.put_file(REPO, "v3", MARKER_FILE, &filled_marker());
    let outcome = pipeline.validate(REPO).await.expect("pass");
    assert_eq!(outcome.validated_tags(), vec!["v3"]);

    let after = tags(&h.result_file());
    assert_eq!(after[0], "v3");
    assert!(before.iter().all(|tag| after.contains(tag)));
}

#[tokio::test]
async fn test_avatar_downloaded_once() {
    let h = Harness::new();
    let pipeline = h.pipeline();

    pipeline.validate(REPO).await.expect("first pass");
    pipeline.validate(REPO).await.expect("second pass");

    assert_eq!(h.repo.download_requests(), vec![AVATAR_URL.to_string()]);
    let avatar = h.dir.path().join("avatars").join("acme.png");
    assert_eq!(fs::read(avatar).unwrap(), b"png-bytes");
    assert_eq!(h.result_file()["metadata"]["avatar"], "acme.png");
}

#[tokio::test]
async fn test_provider_error_writes_nothing() {
    let mut h = Harness::new();
    h.repo = Arc::new(FakeProvider::new(ProviderKind::GitHub).with_failure(REPO, 502));

    let err = h.pipeline().validate(REPO).await.unwrap_err();
    match err {
        GemvalError::Provider(e) => assert_eq!(e.status(), Some(502)),
        other => panic!("expected provider error, got {other:?}"),
    }
    assert!(!h.result_path().exists());
}

#[tokio::test]
async fn test_provider_error_keeps_existing_record() {
    let mut h = Harness::new();
    let existing = json!({
        "metadata": { "owner": "acme" },
        "releases": [ { "v1": { "legacy": true } } ]
    });
    h.write_result_file(&existing);
    h.repo = Arc::new(FakeProvider::new(ProviderKind::GitHub).with_failure(REPO, 500));

    assert!(h.pipeline().validate(REPO).await.is_err());
    assert_eq!(h.result_file(), existing);
}

#[tokio::test]
async fn test_broken_check_recorded_and_others_run() {
    let h = Harness::with_checks(vec![
        Arc::new(ScriptedCheck::broken("memote-score", &"x".repeat(400))),
        Arc::new(ScriptedCheck::passing("yamllint").requiring("yml")),
    ]);
    h.write_result_file(&json!({
        "metadata": { "avatar": "acme.png" },
        "releases": [ { "main": { "standard-GEM": [ { "v3": true }, { "test_results": {} } ] } } ]
    }));

    h.pipeline().validate(REPO).await.expect("pass");

    let file = h.result_file();
    let results = &entry(&file, "v2")["standard-GEM"][1]["test_results"];
    assert_eq!(results["memote-score"]["status"], false);
    assert_eq!(results["memote-score"]["version"], "unknown");
    assert_eq!(results["memote-score"]["errors"].as_str().unwrap().chars().count(), 300);
    assert_eq!(results["yamllint"]["status"], true);
}

#[tokio::test]
async fn test_stale_model_files_removed() {
    let h = Harness::new();
    let work = h.dir.path().join("work");
    fs::create_dir_all(&work).unwrap();
    fs::write(work.join("model.mat"), b"from an earlier release").unwrap();
    h.write_result_file(&json!({
        "metadata": { "avatar": "acme.png" },
        "releases": [ { "main": { "standard-GEM": [ { "v3": true }, { "test_results": {} } ] } } ]
    }));

    h.pipeline().validate(REPO).await.expect("pass");

    assert!(!work.join("model.mat").exists());
    let file = h.result_file();
    let results = &entry(&file, "v2")["standard-GEM"][1]["test_results"];
    assert_eq!(results["cobrapy-load-matlab"]["errors"], "File missing");
}

#[tokio::test]
async fn test_all_standard_versions_recorded() {
    let h = Harness::new();
    h.repo.put_file(
        REPO,
        "v1",
        MARKER_FILE,
        b"# standard-GEM\n\n- [x] model/ folder\n",
    );
    h.write_result_file(&json!({
        "metadata": { "avatar": "acme.png" },
        "releases": [
            { "v2": { "standard-GEM": [ { "v3": true }, { "test_results": {} } ] } },
            { "main": { "standard-GEM": [ { "v3": true }, { "test_results": {} } ] } }
        ]
    }));

    let config = h.config().with_standard_policy(StandardPolicy::All);
    h.pipeline_with(config).validate(REPO).await.expect("pass");

    let file = h.result_file();
    let body = &entry(&file, "v1")["standard-GEM"];
    assert_eq!(body[0], json!({ "v3": false }));
    assert_eq!(body[1], json!({ "v2": true }));
    // compliant with an older standard: checks still run
    assert_eq!(body[2]["test_results"]["cobrapy-load-sbml"]["errors"], "File missing");
}

#[tokio::test]
async fn test_all_pending_in_one_pass() {
    let h = Harness::new();
    let config = h.config().with_release_policy(ReleasePolicy::AllPending);

    let outcome = h.pipeline_with(config).validate(REPO).await.expect("pass");
    assert_eq!(outcome.validated_tags(), vec!["v1", "v2", "main"]);
    assert_eq!(tags(&h.result_file()), vec!["main", "v2", "v1"]);
}

#[tokio::test]
async fn test_unknown_release_bodies_survive_rewrite() {
    let h = Harness::new();
    let legacy_entry = json!({ "v1": { "standard-GEM": [ { "0.4": true }, { "tests": { "yamllint": { "1.2": true } } } ] } });
    h.write_result_file(&json!({
        "model-x": {
            "metadata": { "avatar": "acme.png" },
            "releases": [
                { "v2": { "standard-GEM": [ { "v3": true }, { "test_results": {} } ] } },
                legacy_entry.clone()
            ]
        }
    }));

    h.pipeline().validate(REPO).await.expect("pass");

    let file = h.result_file();
    assert!(file.get("model-x").is_none());
    assert_eq!(tags(&file), vec!["main", "v2", "v1"]);
    assert_eq!(file["releases"][2], legacy_entry);
}

#[tokio::test]
async fn test_record_path_follows_short_name() {
    let h = Harness::new();
    let outcome = h.pipeline().validate(REPO).await.expect("pass");
    assert!(outcome.record_path.ends_with(Path::new("results/model-x.json")));
}
