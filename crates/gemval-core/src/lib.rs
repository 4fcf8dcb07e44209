//! gemval-core: records, compliance and configuration for standard-GEM validation
//!
//! - [`record`]: the persisted per-repository JSON document
//! - [`compliance`]: marker-file comparison against the standard repository
//! - [`metadata`]: repository metadata refresh and the avatar cache
//! - [`store`]: result files and the repository index on disk
//! - [`config`]: [`ValidatorConfig`] and the release/standard policies

pub mod compliance;
pub mod config;
pub mod error;
pub mod metadata;
pub mod record;
pub mod store;
pub mod telemetry;

pub use compliance::{markers_match, strip_checkboxes, ComplianceChecker, MARKER_FILE};
pub use config::{ReleasePolicy, StandardPolicy, ValidatorConfig};
pub use error::{ConfigError, GemvalError, Result};
pub use metadata::{refresh_metadata, AvatarCache};
pub use record::{
    truncate_error, CheckStatus, MergeOutcome, PersistedRecord, ReleaseEntry, RepositoryMetadata,
    StandardReport, TestResult, ERROR_TEXT_LIMIT,
};
pub use store::{RepositoryIndex, ResultStore};
pub use telemetry::init_tracing;
