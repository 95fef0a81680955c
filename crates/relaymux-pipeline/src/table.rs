//! Pipeline Table Builder (spec.md §4.3, C3)

use std::collections::HashMap;

use indexmap::IndexMap;
use relaymux_config::providers::{ExpandedRoutingTable, ProviderTable};
use relaymux_config::router::RawRouterTable;
use relaymux_core::{pipeline_id, CompatibilityTag, Protocol, ProviderDescriptor, RouteTarget};

/// A single candidate routing target within a pipeline descriptor's virtual
/// model entry, carrying the `expandedRouting` priority when present
/// (spec.md §4.3 step 6)
#[derive(Debug, Clone, Default)]
pub struct SelectionHint {
    /// Lower numbers are preferred by the priority-based selection
    /// algorithm; `None` when the plain router map (no `expandedRouting`)
    /// was used
    pub priority: Option<u32>,
    /// Whether this target is a security-enhanced variant of the primary
    pub security_enhanced: bool,
}

/// One concrete routing target, fully resolved from configuration
/// (spec.md §3 "Pipeline")
#[derive(Debug, Clone)]
pub struct PipelineDescriptor {
    /// `<provider>-<target-model>-key<index>`
    pub pipeline_id: String,
    /// Virtual model this descriptor was registered under (a pipeline may
    /// be registered under several; the builder emits one descriptor per
    /// `(virtual_model, provider, model, key_index)` combination and the
    /// caller groups by `pipeline_id` when collapsing duplicates)
    pub virtual_model: String,
    /// Provider name
    pub provider: String,
    /// Model name at that provider
    pub target_model: String,
    /// Index into the provider's configured API key list
    pub api_key_index: usize,
    /// Wire protocol the provider speaks
    pub protocol: Protocol,
    /// Transformer hint inherited from the provider descriptor
    pub transformer_name: Option<String>,
    /// Server-compatibility tag, if explicitly configured on the provider
    pub server_compatibility: Option<CompatibilityTag>,
    /// Fully resolved server endpoint (spec.md §4.3 step 4)
    pub server_endpoint: String,
    /// `expandedRouting` selection metadata, if present for this virtual
    /// model
    pub selection_hint: SelectionHint,
}

/// Output of the table builder: all descriptors plus the grouping by
/// virtual model that the scheduler (C6) consumes
#[derive(Debug, Clone, Default)]
pub struct PipelineTable {
    /// Every pipeline descriptor, in the order produced
    pub descriptors: Vec<PipelineDescriptor>,
    /// `virtualModel -> pipelineId list`, preference-ordered
    pub by_virtual_model: IndexMap<String, Vec<String>>,
    /// Routes that named a provider absent from the provider table
    /// (spec.md §4.3 step 5)
    pub warnings: Vec<String>,
}

/// Resolve a provider's server endpoint, appending `/chat/completions` when
/// the configured base URL ends in `/v1` and carries no further path
/// segment (spec.md §4.3 step 4)
fn resolve_server_endpoint(api_base_url: &str) -> String {
    let trimmed = api_base_url.trim_end_matches('/');
    if trimmed.ends_with("/v1") {
        format!("{trimmed}/chat/completions")
    } else {
        trimmed.to_owned()
    }
}

/// Build the pipeline table from the router map, provider table, and
/// optional `expandedRouting` form (spec.md §4.3)
#[must_use]
pub fn build_pipeline_table(
    router: &RawRouterTable,
    providers: &ProviderTable,
    expanded_routing: &ExpandedRoutingTable,
) -> PipelineTable {
    let route_entries = relaymux_config::router::parse_router_table(router);

    let mut descriptors = Vec::new();
    let mut by_virtual_model: IndexMap<String, Vec<String>> = IndexMap::new();
    let mut warnings = Vec::new();

    for (virtual_model, entry) in &route_entries {
        let hints = expanded_routing.get(virtual_model);

        for target in &entry.targets {
            let Some(provider_entry) = providers.get(&target.provider) else {
                warnings.push(format!(
                    "router entry for virtual model '{virtual_model}' references unknown provider '{}'; skipped",
                    target.provider
                ));
                continue;
            };

            let descriptor_template = provider_entry.clone().into_descriptor(target.provider.clone());
            let selection_hint = selection_hint_for(hints, &target.provider, &target.model);

            for id in push_descriptors_for_target(virtual_model, target, &descriptor_template, &selection_hint) {
                by_virtual_model.entry(virtual_model.clone()).or_default().push(id.pipeline_id.clone());
                descriptors.push(id);
            }
        }
    }

    PipelineTable { descriptors, by_virtual_model, warnings }
}

fn selection_hint_for(hints: Option<&relaymux_config::providers::ExpandedRoutingEntry>, provider: &str, model: &str) -> SelectionHint {
    let Some(hints) = hints else {
        return SelectionHint::default();
    };

    hints
        .targets
        .iter()
        .find(|t| t.provider == provider && t.model == model)
        .map(|t| SelectionHint { priority: Some(t.priority), security_enhanced: t.security_enhanced })
        .unwrap_or_default()
}

fn push_descriptors_for_target(
    virtual_model: &str,
    target: &RouteTarget,
    descriptor: &ProviderDescriptor,
    selection_hint: &SelectionHint,
) -> Vec<PipelineDescriptor> {
    let key_count = descriptor.api_keys.len();
    let server_endpoint = resolve_server_endpoint(&descriptor.api_base_url);

    (0..key_count)
        .map(|api_key_index| PipelineDescriptor {
            pipeline_id: pipeline_id(&target.provider, &target.model, api_key_index),
            virtual_model: virtual_model.to_owned(),
            provider: target.provider.clone(),
            target_model: target.model.clone(),
            api_key_index,
            protocol: descriptor.protocol,
            transformer_name: descriptor.transformer_hint.clone(),
            server_compatibility: descriptor.server_compatibility,
            server_endpoint: server_endpoint.clone(),
            selection_hint: selection_hint.clone(),
        })
        .collect()
}

/// Look up a provider's configured API key count without going through the
/// full table build, used by callers that need to report "zero keys" as a
/// distinct boundary case (spec.md §8 "API key list of length 0")
#[must_use]
pub fn provider_key_count(providers: &ProviderTable, provider: &str) -> Option<usize> {
    providers.get(provider).map(|entry| match &entry.api_key {
        relaymux_config::providers::ApiKeyConfig::One(_) => 1,
        relaymux_config::providers::ApiKeyConfig::Many(keys) => keys.len(),
    })
}
