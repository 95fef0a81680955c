//! `InitializationResult` and its timing breakdown (spec.md §4.7)

use std::sync::Arc;
use std::time::Duration;

use relaymux_pipeline::{Pipeline, PipelineTable};
use relaymux_scheduler::Scheduler;

/// Wall-clock breakdown of one `initialize()` run
#[derive(Debug, Clone, Copy, Default)]
pub struct InitTimings {
    /// Time spent in `build_pipeline_table`
    pub table_build: Duration,
    /// Time spent constructing and handshaking every `Pipeline`
    pub pipeline_construction: Duration,
    /// Total time across the whole sequence
    pub total: Duration,
}

/// Outcome of one `initialize()` run (spec.md §4.7 "Contract")
pub struct InitializationResult {
    /// Whether every pipeline constructed and handshaked successfully
    pub success: bool,
    /// The pipeline table the router map and provider table resolved to
    pub pipeline_table: PipelineTable,
    /// The scheduler, populated with every pipeline on success; empty on
    /// failure (nothing is safe to register if handshakes didn't all pass)
    pub scheduler: Arc<Scheduler>,
    /// Every pipeline that is live and registered; empty on failure
    pub pipelines: Vec<Arc<Pipeline>>,
    /// Fatal problems: config validation, handshake failures, construction
    /// failures
    pub errors: Vec<String>,
    /// Non-fatal problems: router entries naming unknown providers
    pub warnings: Vec<String>,
    /// Timing breakdown
    pub timings: InitTimings,
}

impl InitializationResult {
    pub(crate) fn failed(errors: Vec<String>, warnings: Vec<String>, timings: InitTimings) -> Self {
        Self {
            success: false,
            pipeline_table: PipelineTable::default(),
            scheduler: Arc::new(Scheduler::new(relaymux_config::SchedulerConfig::default())),
            pipelines: Vec::new(),
            errors,
            warnings,
            timings,
        }
    }
}
