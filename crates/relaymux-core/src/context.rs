//! The per-request context threaded through the layered processor
//!
//! See spec.md §3 "Request context" / "Routing decision". Deliberately
//! plain data with no behavior: it is the sole mutable object carried
//! across layers, and per spec.md §9 it must never be leaked into the
//! outbound request body (unlike the source system's `__internal` field
//! hack) — everything an adapter needs to communicate back to the caller
//! travels through `metadata.protocol_config` instead.

use std::time::{Duration, Instant};

use serde_json::Value;

use crate::model::VirtualModel;

/// Names of the layers a request can pass through, used both for
/// `context.transformations` bookkeeping and for error attribution.
pub const LAYER_ROUTER: &str = "router";
pub const LAYER_TRANSFORMER: &str = "transformer";
pub const LAYER_PROTOCOL: &str = "protocol";
pub const LAYER_SERVER_COMPATIBILITY: &str = "server_compatibility";
pub const LAYER_SERVER: &str = "server";
pub const LAYER_RETRANSFORM: &str = "retransform";

/// Resolved endpoint, auth, and timeout for one request, filled in by the
/// Protocol layer and possibly amended by a compatibility adapter
/// (spec.md §4.5.3, §4.5.4).
#[derive(Debug, Clone, Default)]
pub struct ProtocolConfig {
    /// Final URL the Server layer will POST to
    pub endpoint: Option<String>,
    /// Resolved API key (first entry, if the provider key was a list)
    pub api_key: Option<String>,
    /// Effective request timeout
    pub timeout: Option<Duration>,
    /// Headers an adapter or provider config wants added, in addition to
    /// the standard `Content-Type` / `Authorization` / `Content-Length`
    pub custom_headers: Vec<(String, String)>,
}

/// Everything else layers need to share out-of-band, without touching the
/// outbound request body
#[derive(Debug, Clone, Default)]
pub struct RequestMetadata {
    /// Endpoint/auth/timeout resolved by the Protocol layer
    pub protocol_config: ProtocolConfig,
    /// Arbitrary additional key-value data an adapter wants to record
    pub extra: std::collections::HashMap<String, Value>,
}

/// The record of virtual-model mapping plus selected pipeline, attached to
/// a request context by the Router layer (spec.md §3, §4.5.1)
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    /// The model name the client originally asked for
    pub original_model: String,
    /// The virtual model it was mapped to
    pub virtual_model: VirtualModel,
    /// Pipeline ids that were eligible at selection time
    pub available_pipelines: Vec<String>,
    /// The pipeline id actually selected
    pub selected_pipeline: String,
    /// Human-readable explanation of why this pipeline was chosen
    pub reasoning: String,
    /// The selected pipeline's provider protocol
    pub provider_type: crate::model::Protocol,
}

/// One mutable object, carried across all layers, for a single inbound
/// request (spec.md §3 "Request context")
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique id for this request, used in logs and persisted artifacts
    pub request_id: String,
    /// When the request entered the Router layer
    pub start_time: Instant,
    /// Wall-clock time spent in each layer, keyed by layer name
    pub per_layer_timings: Vec<(&'static str, Duration)>,
    /// Layer names visited, in chronological order (spec.md §8 invariant)
    pub transformations: Vec<&'static str>,
    /// Errors recorded as the request traveled through the pipeline
    pub errors: Vec<String>,
    /// The routing decision, once the Router layer has run
    pub routing_decision: Option<RoutingDecision>,
    /// Protocol config and adapter-contributed extras
    pub metadata: RequestMetadata,
    /// Whether the client's original request spoke the Anthropic dialect
    /// (drives whether §4.5.6 response re-transformation runs)
    pub client_speaks_anthropic: bool,
}

impl RequestContext {
    /// Start a new context for an inbound request
    pub fn new(request_id: impl Into<String>, client_speaks_anthropic: bool) -> Self {
        Self {
            request_id: request_id.into(),
            start_time: Instant::now(),
            per_layer_timings: Vec::new(),
            transformations: Vec::new(),
            errors: Vec::new(),
            routing_decision: None,
            metadata: RequestMetadata::default(),
            client_speaks_anthropic,
        }
    }

    /// Record that `layer` ran, along with how long it took
    pub fn record_layer(&mut self, layer: &'static str, elapsed: Duration) {
        self.transformations.push(layer);
        self.per_layer_timings.push((layer, elapsed));
    }

    /// Record an error without aborting — callers still propagate the
    /// typed error up the call stack; this is bookkeeping only
    /// (spec.md §7 "each layer surfaces a typed error … and records it")
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Total elapsed time since the request entered the Router layer
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_layers_in_order() {
        let mut ctx = RequestContext::new("req-1", false);
        ctx.record_layer(LAYER_ROUTER, Duration::from_millis(1));
        ctx.record_layer(LAYER_TRANSFORMER, Duration::from_millis(2));
        ctx.record_layer(LAYER_SERVER, Duration::from_millis(3));
        assert_eq!(ctx.transformations, vec![LAYER_ROUTER, LAYER_TRANSFORMER, LAYER_SERVER]);
    }

    #[test]
    fn starts_with_no_errors() {
        let ctx = RequestContext::new("req-1", true);
        assert!(ctx.errors.is_empty());
    }
}
