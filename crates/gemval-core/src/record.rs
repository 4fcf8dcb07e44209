//! Persisted per-repository record.
//!
//! On disk:
//!
//! ```json
//! {
//!   "metadata": { "avatar": "acme.png", "commits": 412, ... },
//!   "releases": [
//!     { "v2": { "standard-GEM": [ { "v3": true }, { "test_results": { ... } } ] } },
//!     { "main": { ... } }
//!   ]
//! }
//! ```
//!
//! Release bodies are kept as raw JSON so history written by older versions
//! survives a rewrite untouched; [`StandardReport`] is the typed view of the
//! current shape.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Key of the compliance array inside a release body.
pub const STANDARD_KEY: &str = "standard-GEM";

/// Key of the test results object inside the compliance array.
pub const TEST_RESULTS_KEY: &str = "test_results";

/// Error text kept per failed check.
pub const ERROR_TEXT_LIMIT: usize = 300;

/// Cut `text` to [`ERROR_TEXT_LIMIT`] characters.
pub fn truncate_error(text: &str) -> String {
    text.chars().take(ERROR_TEXT_LIMIT).collect()
}

/// Repository metadata block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Cached avatar filename under the avatars directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commits: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributors: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_commit_date: Option<String>,
}

/// Outcome of a check: pass/fail, or a numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckStatus {
    Passed(bool),
    Score(f64),
}

impl CheckStatus {
    /// Scores count as success; only an explicit `false` is a failure.
    pub fn is_success(&self) -> bool {
        match self {
            CheckStatus::Passed(passed) => *passed,
            CheckStatus::Score(_) => true,
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Passed(passed) => write!(f, "{passed}"),
            CheckStatus::Score(score) => write!(f, "{score}"),
        }
    }
}

/// One check's result inside `test_results`, keyed by check name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub description: String,
    pub version: String,
    pub status: CheckStatus,
    pub errors: String,
}

impl TestResult {
    /// Build a result; `errors` is truncated.
    pub fn new(description: &str, version: &str, status: CheckStatus, errors: &str) -> Self {
        Self {
            description: description.to_string(),
            version: version.to_string(),
            status,
            errors: truncate_error(errors),
        }
    }

    /// Result for a check that could not be executed at all.
    pub fn execution_failure(description: &str, error: &str) -> Self {
        Self::new(description, "unknown", CheckStatus::Passed(false), error)
    }
}

/// Typed view of a release body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StandardReport {
    /// `(standard version, compliant)` in evaluation order
    pub compliance: Vec<(String, bool)>,
    pub test_results: BTreeMap<String, TestResult>,
}

impl StandardReport {
    pub fn new(compliance: Vec<(String, bool)>, test_results: BTreeMap<String, TestResult>) -> Self {
        Self {
            compliance,
            test_results,
        }
    }

    /// Whether any evaluated standard version matched.
    pub fn is_compliant(&self) -> bool {
        self.compliance.iter().any(|(_, compliant)| *compliant)
    }

    /// Compliance for one standard version.
    pub fn compliant_with(&self, version: &str) -> Option<bool> {
        self.compliance
            .iter()
            .find(|(v, _)| v == version)
            .map(|(_, c)| *c)
    }

    /// Release body JSON.
    pub fn to_value(&self) -> Value {
        let mut items: Vec<Value> = self
            .compliance
            .iter()
            .map(|(version, compliant)| json!({ version.as_str(): compliant }))
            .collect();
        items.push(json!({ TEST_RESULTS_KEY: self.test_results }));
        json!({ STANDARD_KEY: items })
    }

    /// Parse a release body; `None` when it does not have the current shape.
    pub fn from_value(body: &Value) -> Option<Self> {
        let items = body.get(STANDARD_KEY)?.as_array()?;
        let mut report = StandardReport::default();
        for item in items {
            let object = item.as_object()?;
            if let Some(results) = object.get(TEST_RESULTS_KEY) {
                report.test_results = serde_json::from_value(results.clone()).ok()?;
                continue;
            }
            for (version, compliant) in object {
                report.compliance.push((version.clone(), compliant.as_bool()?));
            }
        }
        Some(report)
    }
}

/// One `{tag: body}` element of `releases`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseEntry {
    pub tag: String,
    pub body: Value,
}

impl ReleaseEntry {
    pub fn new(tag: impl Into<String>, report: &StandardReport) -> Self {
        Self {
            tag: tag.into(),
            body: report.to_value(),
        }
    }

    /// Typed view of the body, if it has the current shape.
    pub fn report(&self) -> Option<StandardReport> {
        StandardReport::from_value(&self.body)
    }
}

impl Serialize for ReleaseEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.tag, &self.body)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for ReleaseEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntryVisitor;

        impl<'de> Visitor<'de> for EntryVisitor {
            type Value = ReleaseEntry;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object with exactly one release tag")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<ReleaseEntry, A::Error> {
                let (tag, body) = map
                    .next_entry::<String, Value>()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                if map.next_key::<String>()?.is_some() {
                    return Err(de::Error::invalid_length(2, &self));
                }
                Ok(ReleaseEntry { tag, body })
            }
        }

        deserializer.deserialize_map(EntryVisitor)
    }
}

/// How [`PersistedRecord::merge_release`] placed an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// New tag, inserted at the front
    Prepended,
    /// Existing tag, body overwritten at its current position
    Replaced,
}

/// Everything persisted for one repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    #[serde(default)]
    pub metadata: RepositoryMetadata,
    #[serde(default)]
    pub releases: Vec<ReleaseEntry>,
}

impl PersistedRecord {
    pub fn contains_tag(&self, tag: &str) -> bool {
        self.releases.iter().any(|entry| entry.tag == tag)
    }

    /// Tags newest first.
    pub fn tags(&self) -> Vec<&str> {
        self.releases.iter().map(|entry| entry.tag.as_str()).collect()
    }

    pub fn entry(&self, tag: &str) -> Option<&ReleaseEntry> {
        self.releases.iter().find(|entry| entry.tag == tag)
    }

    /// Overwrite an existing tag in place, otherwise prepend.
    ///
    /// Callers only hand in existing tags for branch tags; immutable release
    /// tags are never selected again once present.
    pub fn merge_release(&mut self, entry: ReleaseEntry) -> MergeOutcome {
        match self.releases.iter_mut().find(|e| e.tag == entry.tag) {
            Some(existing) => {
                existing.body = entry.body;
                MergeOutcome::Replaced
            }
            None => {
                self.releases.insert(0, entry);
                MergeOutcome::Prepended
            }
        }
    }

    /// Record as a JSON value; object keys come out sorted.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Parse a record, unwrapping the legacy `{short_name: record}` layout.
    pub fn from_value(value: Value, short_name: &str) -> serde_json::Result<Self> {
        let value = match value {
            Value::Object(mut object) if is_legacy_wrapper(&object, short_name) => object
                .remove(short_name)
                .unwrap_or_else(|| Value::Object(Map::new())),
            other => other,
        };
        serde_json::from_value(value)
    }
}

fn is_legacy_wrapper(object: &Map<String, Value>, short_name: &str) -> bool {
    object.len() == 1
        && !object.contains_key("releases")
        && !object.contains_key("metadata")
        && object.get(short_name).map(Value::is_object).unwrap_or(false)
}
