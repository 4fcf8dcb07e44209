//! The check capability and its report.

use std::path::Path;

use async_trait::async_trait;
use gemval_core::{CheckStatus, TestResult};

/// Outcome of one check against one model.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub name: String,
    pub description: String,
    /// Version of the underlying tool, `"unknown"` when it could not be read
    pub tool_version: String,
    pub status: CheckStatus,
    pub errors: String,
}

impl CheckReport {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        tool_version: impl Into<String>,
        status: CheckStatus,
        errors: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tool_version: tool_version.into(),
            status,
            errors: errors.into(),
        }
    }

    /// Result entry stored under the check name; errors are truncated.
    pub fn to_test_result(&self) -> TestResult {
        TestResult::new(
            &self.description,
            &self.tool_version,
            self.status,
            &self.errors,
        )
    }
}

/// A check that could not be executed at all.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("check {name} timed out after {seconds} seconds")]
    TimedOut { name: String, seconds: u64 },

    #[error("check {name} has an empty command")]
    EmptyCommand { name: String },

    #[error("check {name} failed: {message}")]
    Execution { name: String, message: String },
}

/// One named validation of a model.
///
/// `model_base` is the model path without extension (`<work_dir>/model`);
/// each check picks the format it needs.
#[async_trait]
pub trait Check: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn run(&self, model_base: &Path) -> Result<CheckReport, CheckError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_to_test_result() {
        let report = CheckReport::new(
            "yamllint",
            "YAML file passes yamllint",
            "1.35.1",
            CheckStatus::Passed(false),
            "x".repeat(500),
        );
        let result = report.to_test_result();
        assert_eq!(result.version, "1.35.1");
        assert_eq!(result.status, CheckStatus::Passed(false));
        assert_eq!(result.errors.len(), 300);
    }

    #[test]
    fn test_error_messages() {
        let err = CheckError::TimedOut {
            name: "memote-score".to_string(),
            seconds: 900,
        };
        assert_eq!(err.to_string(), "check memote-score timed out after 900 seconds");
    }
}
