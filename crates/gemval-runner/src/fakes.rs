//! Scripted checks for tests of the pipeline.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use gemval_core::CheckStatus;

use crate::builtin::FILE_MISSING;
use crate::check::{Check, CheckError, CheckReport};

#[derive(Debug, Clone)]
enum Script {
    Report { status: CheckStatus, errors: String },
    Error(String),
}

/// A check that returns a fixed outcome and records every model path it saw.
#[derive(Debug)]
pub struct ScriptedCheck {
    name: String,
    description: String,
    version: String,
    script: Script,
    /// When set, a missing `<model>.<ext>` yields `false` / "File missing"
    extension: Option<String>,
    calls: Mutex<Vec<PathBuf>>,
}

impl ScriptedCheck {
    fn new(name: &str, script: Script) -> Self {
        Self {
            name: name.to_string(),
            description: format!("{name} check"),
            version: "1.0".to_string(),
            script,
            extension: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn passing(name: &str) -> Self {
        Self::new(
            name,
            Script::Report {
                status: CheckStatus::Passed(true),
                errors: String::new(),
            },
        )
    }

    pub fn failing(name: &str, errors: &str) -> Self {
        Self::new(
            name,
            Script::Report {
                status: CheckStatus::Passed(false),
                errors: errors.to_string(),
            },
        )
    }

    pub fn scoring(name: &str, score: f64) -> Self {
        Self::new(
            name,
            Script::Report {
                status: CheckStatus::Score(score),
                errors: String::new(),
            },
        )
    }

    /// Fails to execute with `message`.
    pub fn broken(name: &str, message: &str) -> Self {
        Self::new(name, Script::Error(message.to_string()))
    }

    /// Only pass when `<model>.<extension>` exists.
    pub fn requiring(mut self, extension: &str) -> Self {
        self.extension = Some(extension.to_string());
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Model base paths passed to `run`, in call order.
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Check for ScriptedCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, model_base: &Path) -> Result<CheckReport, CheckError> {
        self.calls.lock().unwrap().push(model_base.to_path_buf());

        if let Some(extension) = &self.extension {
            if !model_base.with_extension(extension).is_file() {
                return Ok(CheckReport::new(
                    &self.name,
                    &self.description,
                    &self.version,
                    CheckStatus::Passed(false),
                    FILE_MISSING,
                ));
            }
        }

        match &self.script {
            Script::Report { status, errors } => Ok(CheckReport::new(
                &self.name,
                &self.description,
                &self.version,
                *status,
                errors.as_str(),
            )),
            Script::Error(message) => Err(CheckError::Execution {
                name: self.name.clone(),
                message: message.clone(),
            }),
        }
    }
}
