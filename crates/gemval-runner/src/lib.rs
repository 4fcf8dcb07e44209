//! gemval-runner: checks and the validation pipeline
//!
//! Provides the pieces that act on repositories:
//! - A registry of named checks run against downloaded model files
//! - Built-in checks wrapping yamllint, cobrapy and memote
//! - The incremental per-repository validation pipeline
//! - Repository discovery and CI job matrices

pub mod builtin;
pub mod check;
pub mod discovery;
pub mod fakes;
pub mod pipeline;
pub mod registry;
pub mod runner;

pub use builtin::{BuiltinCheck, CommandCheck, FILE_MISSING};
pub use check::{Check, CheckError, CheckReport};
pub use discovery::{discover, DiscoverySummary, JobMatrix, MatrixJob};
pub use pipeline::{select_targets, ReleaseOutcome, ValidationOutcome, ValidationPipeline};
pub use registry::CheckRegistry;
pub use runner::{CommandOutput, CommandRunner};
