//! The `server` section (spec.md §6): `{port, host, debug}`.
//!
//! The HTTP listening surface itself is an external collaborator; this
//! struct only carries the settings that surface would need, so a
//! hosting binary can read them without this crate depending on axum.

use serde::Deserialize;

/// Listener and debug settings (spec.md §6 `server`)
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Port the external HTTP surface should bind to
    #[serde(default = "default_port")]
    pub port: u16,
    /// Host/address the external HTTP surface should bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Verbose debug logging
    #[serde(default)]
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port(), host: default_host(), debug: false }
    }
}

const fn default_port() -> u16 {
    8787
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}
