//! Configuration schema and loader for the relaymux request router.
//!
//! Structurally this mirrors how the teacher repo layers its config: one
//! `Config` aggregating per-concern sub-structs, all `deny_unknown_fields`,
//! loaded from TOML text after `{{ env.VAR }}` expansion.

mod env;
mod loader;
pub mod logging;
pub mod providers;
pub mod request;
pub mod router;
pub mod scheduler;
pub mod server;

use serde::Deserialize;

pub use logging::LoggingConfig;
pub use providers::{
    ApiKeyConfig, CompatibilityTagConfigValue, ExpandedRoutingEntry, ExpandedRoutingTable,
    ExpandedRoutingTarget, HeaderEntry, ModelFilterConfig, ProtocolConfigValue, ProviderEntry,
    ProviderTable, ServerCompatibilityConfig,
};
pub use request::RequestConfig;
pub use router::{parse_router_table, RawRouterTable};
pub use scheduler::{SchedulerConfig, SelectionAlgorithmConfig};
pub use server::ServerConfig;

/// Top-level relaymux configuration (spec.md §6 "Configuration")
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Listener/debug settings for the (external) HTTP surface
    #[serde(default)]
    pub server: ServerConfig,
    /// Structured-logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Request timeout and large-body handling
    #[serde(default)]
    pub request: RequestConfig,
    /// Scheduler tuning
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Upstream provider table, keyed by provider name
    #[serde(default)]
    pub providers: ProviderTable,
    /// `virtualModel -> route entry string` map
    #[serde(default)]
    pub router: RawRouterTable,
    /// Optional primary/security-enhanced routing with explicit priority
    #[serde(default, rename = "expandedRouting")]
    pub expanded_routing: ExpandedRoutingTable,
}
