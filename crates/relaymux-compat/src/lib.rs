//! Compatibility Adapter Registry (spec.md §4.1)
//!
//! Applies provider-specific request shape adjustments after the Protocol
//! layer has produced a provider-protocol request body, keyed by a
//! `CompatibilityTag` derived from provider configuration, routing
//! decision, provider name, or endpoint.

mod adapters;
mod context;
mod registry;

pub use adapters::{AnthropicAdapter, IflowAdapter, LmStudioAdapter, ModelscopeAdapter, OllamaAdapter, PassthroughAdapter, QwenAdapter, VllmAdapter};
pub use context::AdapterContext;
pub use registry::{derive_tag, AdapterRegistry};
use relaymux_core::GatewayError;

/// A single provider-specific adjustment applied to an outgoing request
/// body, keyed by `CompatibilityTag` and resolved through `AdapterRegistry`
pub trait Adapter: Send + Sync {
    /// The tag name this adapter implements, for logging
    fn name(&self) -> &'static str;

    /// Apply this adapter's adjustment to `request`, optionally recording
    /// extra headers or an endpoint override in `ctx`
    fn process(&self, request: serde_json::Value, ctx: &mut AdapterContext) -> Result<serde_json::Value, GatewayError>;
}
