//! Logging configuration consumed by the hosting binary's tracing-subscriber
//! setup. Not part of spec.md's own schema, but required ambient stack — see
//! SPEC_FULL.md §1.1.

use serde::Deserialize;

/// Structured-logging knobs
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `"relaymux=debug,info"`
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON-formatted log lines instead of the default human-readable format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: default_filter(), json: false }
    }
}

fn default_filter() -> String {
    "info".to_owned()
}
