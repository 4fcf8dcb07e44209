//! Tracing initialisation for the `gemval` binary.
//!
//! Logs always go to stderr: `gemval matrix` prints JSON on stdout that CI
//! parses directly.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crate targets that log at the requested level by default.
const GEMVAL_TARGETS: [&str; 4] = ["gemval", "gemval_core", "gemval_provider", "gemval_runner"];

/// Default filter directives: gemval crates at `level`, everything else
/// (reqwest, hyper, rustls) at `warn`.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    let mut directives = vec!["warn".to_string()];
    directives.extend(GEMVAL_TARGETS.iter().map(|target| format!("{target}={level}")));
    directives.join(",")
}

/// Initialise the global tracing subscriber.
///
/// * `json` - emit newline-delimited JSON records instead of compact text.
/// * `level` - verbosity of the gemval crates when `RUST_LOG` is not set.
///
/// `RUST_LOG` replaces the default directives entirely.
/// Only the first call in a process takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()
            .ok();
    }
}
