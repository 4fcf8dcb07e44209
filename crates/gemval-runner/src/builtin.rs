//! Built-in checks backed by external tools.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use gemval_core::CheckStatus;
use tracing::{debug, warn};

use crate::check::{Check, CheckError, CheckReport};
use crate::runner::CommandRunner;

/// Error text for a model format the release does not ship.
pub const FILE_MISSING: &str = "File missing";

/// Placeholder replaced by the model file path in command argv.
pub const MODEL_PLACEHOLDER: &str = "{model}";

const UNKNOWN_VERSION: &str = "unknown";

const YAMLLINT_CONFIG: &str = "{extends: default, rules: {line-length: disable}}";

const COBRA_VERSION: &str = "import cobra; print(cobra.__version__)";

const MEMOTE_VERSION: &str = "import memote; print(memote.__version__)";

const VALIDATE_SBML: &str = "\
import sys, cobra
_, report = cobra.io.validate_sbml_model(sys.argv[1])
problems = [e for key in ('SBML_FATAL', 'SBML_ERROR', 'SBML_SCHEMA_ERROR', 'COBRA_FATAL', 'COBRA_ERROR') for e in report.get(key, [])]
print(*problems, sep='\\n', file=sys.stderr)
sys.exit(1 if problems else 0)
";

const MEMOTE_SCORE: &str = "\
import sys, json, cobra, memote
model = cobra.io.read_sbml_model(sys.argv[1])
_, results = memote.suite.api.test_model(model, None, True, None, {'basic', 'annotation', 'consistency'})
report = json.loads(memote.suite.api.snapshot_report(results, None, False))
print(report['score']['total_score'])
";

/// The checks every pipeline registers by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinCheck {
    Yamllint,
    CobrapyLoadYaml,
    CobrapyLoadSbml,
    CobrapyLoadMatlab,
    CobrapyLoadJson,
    CobrapyValidateSbml,
    MemoteScore,
}

impl BuiltinCheck {
    pub const ALL: [BuiltinCheck; 7] = [
        BuiltinCheck::Yamllint,
        BuiltinCheck::CobrapyLoadYaml,
        BuiltinCheck::CobrapyLoadSbml,
        BuiltinCheck::CobrapyLoadMatlab,
        BuiltinCheck::CobrapyLoadJson,
        BuiltinCheck::CobrapyValidateSbml,
        BuiltinCheck::MemoteScore,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinCheck::Yamllint => "yamllint",
            BuiltinCheck::CobrapyLoadYaml => "cobrapy-load-yaml",
            BuiltinCheck::CobrapyLoadSbml => "cobrapy-load-sbml",
            BuiltinCheck::CobrapyLoadMatlab => "cobrapy-load-matlab",
            BuiltinCheck::CobrapyLoadJson => "cobrapy-load-json",
            BuiltinCheck::CobrapyValidateSbml => "cobrapy-validate-sbml",
            BuiltinCheck::MemoteScore => "memote-score",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BuiltinCheck::Yamllint => "YAML file passes yamllint (line-length disabled)",
            BuiltinCheck::CobrapyLoadYaml => "YAML model loads with cobrapy",
            BuiltinCheck::CobrapyLoadSbml => "SBML model loads with cobrapy",
            BuiltinCheck::CobrapyLoadMatlab => "MATLAB model loads with cobrapy",
            BuiltinCheck::CobrapyLoadJson => "JSON model loads with cobrapy",
            BuiltinCheck::CobrapyValidateSbml => "SBML model passes cobrapy SBML validation",
            BuiltinCheck::MemoteScore => "memote annotation and consistency total score",
        }
    }

    /// Model format the check reads.
    pub fn extension(&self) -> &'static str {
        match self {
            BuiltinCheck::Yamllint | BuiltinCheck::CobrapyLoadYaml => "yml",
            BuiltinCheck::CobrapyLoadSbml
            | BuiltinCheck::CobrapyValidateSbml
            | BuiltinCheck::MemoteScore => "xml",
            BuiltinCheck::CobrapyLoadMatlab => "mat",
            BuiltinCheck::CobrapyLoadJson => "json",
        }
    }

    /// Check argv; [`MODEL_PLACEHOLDER`] stands for the model file.
    pub fn command(&self, python: &str) -> Vec<String> {
        let load = |function: &str| {
            python_script(
                python,
                &format!("import sys, cobra; cobra.io.{function}(sys.argv[1])"),
            )
        };
        match self {
            BuiltinCheck::Yamllint => vec![
                "yamllint".to_string(),
                "--strict".to_string(),
                "-d".to_string(),
                YAMLLINT_CONFIG.to_string(),
                MODEL_PLACEHOLDER.to_string(),
            ],
            BuiltinCheck::CobrapyLoadYaml => load("load_yaml_model"),
            BuiltinCheck::CobrapyLoadSbml => load("read_sbml_model"),
            BuiltinCheck::CobrapyLoadMatlab => load("load_matlab_model"),
            BuiltinCheck::CobrapyLoadJson => load("load_json_model"),
            BuiltinCheck::CobrapyValidateSbml => python_script(python, VALIDATE_SBML),
            BuiltinCheck::MemoteScore => python_script(python, MEMOTE_SCORE),
        }
    }

    /// Argv printing the tool version as its last stdout token.
    pub fn version_command(&self, python: &str) -> Vec<String> {
        match self {
            BuiltinCheck::Yamllint => vec!["yamllint".to_string(), "--version".to_string()],
            BuiltinCheck::MemoteScore => {
                vec![python.to_string(), "-c".to_string(), MEMOTE_VERSION.to_string()]
            }
            _ => vec![python.to_string(), "-c".to_string(), COBRA_VERSION.to_string()],
        }
    }

    /// Status is the numeric last stdout line instead of the exit code.
    pub fn reports_score(&self) -> bool {
        matches!(self, BuiltinCheck::MemoteScore)
    }
}

fn python_script(python: &str, script: &str) -> Vec<String> {
    vec![
        python.to_string(),
        "-c".to_string(),
        script.to_string(),
        MODEL_PLACEHOLDER.to_string(),
    ]
}

/// A check that runs an external command against one model file.
#[derive(Debug, Clone)]
pub struct CommandCheck {
    pub name: String,
    pub description: String,
    /// Model format read, without the dot
    pub extension: String,
    pub command: Vec<String>,
    pub version_command: Vec<String>,
    /// Parse the last stdout line as a score
    pub score: bool,
    pub timeout: Duration,
}

impl CommandCheck {
    pub fn from_builtin(check: BuiltinCheck, python: &str, timeout: Duration) -> Self {
        Self {
            name: check.name().to_string(),
            description: check.description().to_string(),
            extension: check.extension().to_string(),
            command: check.command(python),
            version_command: check.version_command(python),
            score: check.reports_score(),
            timeout,
        }
    }

    pub fn custom(
        name: impl Into<String>,
        description: impl Into<String>,
        extension: impl Into<String>,
        command: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            extension: extension.into(),
            command,
            version_command: Vec::new(),
            score: false,
            timeout,
        }
    }

    pub fn with_version_command(mut self, command: Vec<String>) -> Self {
        self.version_command = command;
        self
    }

    pub fn scored(mut self) -> Self {
        self.score = true;
        self
    }

    fn model_path(&self, model_base: &Path) -> PathBuf {
        model_base.with_extension(&self.extension)
    }

    fn argv_for(&self, model: &Path) -> Vec<String> {
        let model = model.to_string_lossy();
        self.command
            .iter()
            .map(|arg| arg.replace(MODEL_PLACEHOLDER, &model))
            .collect()
    }

    async fn tool_version(&self) -> String {
        if self.version_command.is_empty() {
            return UNKNOWN_VERSION.to_string();
        }
        match CommandRunner::execute(&self.name, &self.version_command, self.timeout).await {
            Ok(output) if output.success() => output
                .last_line()
                .and_then(|line| line.split_whitespace().last())
                .map(str::to_string)
                .unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
            Ok(output) => {
                debug!(check = %self.name, exit_code = output.exit_code, "version command failed");
                UNKNOWN_VERSION.to_string()
            }
            Err(e) => {
                debug!(check = %self.name, error = %e, "version command did not run");
                UNKNOWN_VERSION.to_string()
            }
        }
    }

    fn report(&self, version: String, status: CheckStatus, errors: impl Into<String>) -> CheckReport {
        CheckReport::new(&self.name, &self.description, version, status, errors)
    }
}

#[async_trait]
impl Check for CommandCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, model_base: &Path) -> Result<CheckReport, CheckError> {
        let model = self.model_path(model_base);
        if !model.is_file() {
            debug!(check = %self.name, model = %model.display(), "model file missing");
            return Ok(self.report(
                UNKNOWN_VERSION.to_string(),
                CheckStatus::Passed(false),
                FILE_MISSING,
            ));
        }

        let version = self.tool_version().await;
        let output = CommandRunner::execute(&self.name, &self.argv_for(&model), self.timeout).await?;

        if !output.success() {
            warn!(check = %self.name, exit_code = output.exit_code, "check failed");
            return Ok(self.report(version, CheckStatus::Passed(false), output.error_text()));
        }
        if !self.score {
            return Ok(self.report(version, CheckStatus::Passed(true), ""));
        }

        match output.last_line().map(str::parse::<f64>) {
            Some(Ok(score)) if score.is_finite() => {
                Ok(self.report(version, CheckStatus::Score(score), ""))
            }
            _ => Ok(self.report(
                version,
                CheckStatus::Passed(false),
                format!("no score in output: {}", output.stdout.trim()),
            )),
        }
    }
}
