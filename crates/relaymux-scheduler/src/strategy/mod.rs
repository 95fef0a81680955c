//! Pipeline selection algorithms (spec.md §4.6 "Selection algorithms")

use std::collections::HashMap;

use relaymux_config::SelectionAlgorithmConfig;
use relaymux_core::{Protocol, RequestPriority, RoutingDecision, VirtualModel};

use crate::counters::CounterSnapshot;

mod least_connections;
mod priority_based;
mod response_time;
mod round_robin;
mod weighted;

/// One eligible pipeline, as seen by a selection algorithm. Priority and
/// `security_enhanced` both come from the pipeline's `SelectionHint`
/// (spec.md §4.3 step 6), defaulting to 0 / false when the plain router map
/// was used instead of `expandedRouting`.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub pipeline_id: &'a str,
    pub priority: i64,
    /// Security-enhanced variant of a primary provider (spec.md §9 open
    /// question): at equal priority, preferred by the priority-based
    /// algorithm over the primary variant.
    pub security_enhanced: bool,
}

/// Trait for a pipeline selection algorithm, mirroring the routing-strategy
/// shape used elsewhere in this codebase: one method that picks among
/// eligible candidates, one that names itself for logging.
pub trait SelectionStrategy: Send + Sync {
    /// Pick one of `candidates` (already filtered to eligible pipelines).
    /// `counters` holds per-pipeline rolling stats, `round` is a
    /// monotonically increasing call counter local to the virtual model,
    /// used by round-robin to advance its cursor. `request_priority` is the
    /// per-request priority dimension (spec.md §4.6); only the
    /// priority-based algorithm consults it.
    fn select<'a>(
        &self,
        candidates: &[Candidate<'a>],
        counters: &HashMap<String, CounterSnapshot>,
        round: u64,
        request_priority: RequestPriority,
    ) -> Option<&'a str>;

    fn name(&self) -> &'static str;
}

/// Build the configured strategy. Unlike the teacher's
/// `StrategyRegistry::from_config`, there is exactly one active algorithm
/// per scheduler instance (spec.md §4.6 — the algorithm is a global
/// scheduler setting, not per-virtual-model), so this returns the single
/// boxed strategy rather than a name-keyed table.
#[must_use]
pub fn build(algorithm: SelectionAlgorithmConfig) -> Box<dyn SelectionStrategy> {
    match algorithm {
        SelectionAlgorithmConfig::RoundRobin => Box::new(round_robin::RoundRobin),
        SelectionAlgorithmConfig::LeastConnections => Box::new(least_connections::LeastConnections),
        SelectionAlgorithmConfig::Weighted => Box::new(weighted::Weighted),
        SelectionAlgorithmConfig::ResponseTime => Box::new(response_time::ResponseTime),
        SelectionAlgorithmConfig::PriorityBased => Box::new(priority_based::PriorityBased),
    }
}

/// Build the `RoutingDecision.reasoning` string for a selection
#[must_use]
pub fn explain(strategy_name: &str, pipeline_id: &str, pool_size: usize) -> String {
    format!("{strategy_name} selected {pipeline_id} from a pool of {pool_size} eligible pipelines")
}

/// Attach a `RoutingDecision` describing `selected` among `available`
#[must_use]
pub fn routing_decision(
    original_model: String,
    virtual_model: VirtualModel,
    available: Vec<String>,
    selected: String,
    reasoning: String,
    provider_type: Protocol,
) -> RoutingDecision {
    RoutingDecision { original_model, virtual_model, available_pipelines: available, selected_pipeline: selected, reasoning, provider_type }
}
