//! Scheduler lifecycle events (spec.md §6 "Emitted events")
//!
//! There is no in-process event bus in this codebase — events are emitted
//! as structured `tracing` records, the same way the provider health
//! tracker logs a circuit-breaker trip. Anything that wants to react to
//! these (metrics exporters, alerting) subscribes at the `tracing`
//! subscriber layer rather than through a bespoke pub/sub mechanism here.

use crate::blocklist::BlockReason;

/// One scheduler-lifecycle occurrence, named per spec.md §6
#[derive(Debug, Clone)]
pub enum SchedulerEvent<'a> {
    PipelineRegistered { pipeline_id: &'a str, virtual_model: &'a str },
    PipelineUnregistered { pipeline_id: &'a str },
    PipelineError { pipeline_id: &'a str, detail: &'a str },
    PipelineBlocked { pipeline_id: &'a str, reason: BlockReason, until_unix: u64 },
    PipelineReactivated { pipeline_id: &'a str },
    AuthenticationRequired { pipeline_id: &'a str },
    DestroyPipelineRequired { pipeline_id: &'a str },
    RouteSuccess { pipeline_id: &'a str, virtual_model: &'a str, response_time_ms: u64 },
    RouteError { virtual_model: &'a str, detail: &'a str },
}

impl SchedulerEvent<'_> {
    /// Emit this event as a structured `tracing` record at the
    /// appropriate level.
    pub fn emit(&self) {
        match self {
            Self::PipelineRegistered { pipeline_id, virtual_model } => {
                tracing::info!(pipeline_id, virtual_model, "pipeline registered");
            }
            Self::PipelineUnregistered { pipeline_id } => {
                tracing::info!(pipeline_id, "pipeline unregistered");
            }
            Self::PipelineError { pipeline_id, detail } => {
                tracing::warn!(pipeline_id, detail, "pipeline error");
            }
            Self::PipelineBlocked { pipeline_id, reason, until_unix } => {
                tracing::warn!(pipeline_id, ?reason, until_unix, "pipeline blocked");
            }
            Self::PipelineReactivated { pipeline_id } => {
                tracing::info!(pipeline_id, "pipeline reactivated");
            }
            Self::AuthenticationRequired { pipeline_id } => {
                tracing::error!(pipeline_id, "authentication required");
            }
            Self::DestroyPipelineRequired { pipeline_id } => {
                tracing::error!(pipeline_id, "pipeline requires teardown");
            }
            Self::RouteSuccess { pipeline_id, virtual_model, response_time_ms } => {
                tracing::debug!(pipeline_id, virtual_model, response_time_ms, "route succeeded");
            }
            Self::RouteError { virtual_model, detail } => {
                tracing::warn!(virtual_model, detail, "route failed");
            }
        }
    }
}
