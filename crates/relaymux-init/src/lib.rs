//! Initialization Coordinator (spec.md §4.7, C7)
//!
//! A one-shot orchestrator: config → pipeline table → handshaked pipelines →
//! scheduler registration. `Initializer::initialize` refuses a second call
//! (spec.md §4.7 "terminal idempotency").

mod result;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use relaymux_compat::AdapterRegistry;
use relaymux_config::Config;
use relaymux_core::{ApiKeys, GatewayError};
use relaymux_pipeline::{build_pipeline_table, Pipeline, PipelineDescriptor, PipelineTable};
use relaymux_scheduler::Scheduler;

pub use result::{InitTimings, InitializationResult};

/// Retry attempts at the Server layer when a provider doesn't set its own
/// `maxRetries` (spec.md §6 leaves this provider-configurable but doesn't
/// pin a gateway-wide default).
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Runs `initialize()` at most once per process.
#[derive(Default)]
pub struct Initializer {
    started: AtomicBool,
}

impl Initializer {
    #[must_use]
    pub fn new() -> Self {
        Self { started: AtomicBool::new(false) }
    }

    /// Run the full boot sequence against `config`.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::AlreadyInitialized` if this is not the first
    /// call. Every other failure (invalid config, handshake failure) is
    /// reported inside a successfully-returned `InitializationResult` with
    /// `success: false`, per spec.md §4.7's contract — `initialize` always
    /// hands back a populated result once it has been allowed to run.
    pub async fn initialize(&self, config: &Config) -> Result<InitializationResult, GatewayError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(GatewayError::AlreadyInitialized);
        }

        let overall_start = Instant::now();

        if let Err(e) = config.validate() {
            return Ok(InitializationResult::failed(vec![format!("config-invalid: {e}")], Vec::new(), InitTimings { total: overall_start.elapsed(), ..InitTimings::default() }));
        }

        let table_start = Instant::now();
        let table = build_pipeline_table(&config.router, &config.providers, &config.expanded_routing);
        let table_build = table_start.elapsed();
        let warnings = table.warnings.clone();

        let adapter_registry = Arc::new(AdapterRegistry::new());
        let construction_start = Instant::now();

        let mut errors = Vec::new();
        let mut pipelines = Vec::with_capacity(table.descriptors.len());
        for descriptor in &table.descriptors {
            match instantiate(descriptor, config, &adapter_registry) {
                Ok(pipeline) => pipelines.push(Arc::new(pipeline)),
                Err(e) => errors.push(e),
            }
        }

        let handshakes = futures::future::join_all(pipelines.iter().map(|p| p.handshake())).await;
        let handshake_failed = handshakes.iter().any(Result::is_err);
        for outcome in &handshakes {
            if let Err(e) = outcome {
                errors.push(e.to_string());
            }
        }

        if handshake_failed || !errors.is_empty() {
            tracing::error!(failures = errors.len(), "initialization aborted, tearing down constructed pipelines");
            for pipeline in &pipelines {
                pipeline.stop();
            }
            return Ok(InitializationResult::failed(errors, warnings, InitTimings { table_build, pipeline_construction: construction_start.elapsed(), total: overall_start.elapsed() }));
        }

        let pipeline_construction = construction_start.elapsed();

        let scheduler = Arc::new(Scheduler::new(config.scheduler.clone()));
        for pipeline in &pipelines {
            let virtual_models = virtual_models_for(&table, &pipeline.pipeline_id);
            let priority = priority_for(&table, &pipeline.pipeline_id);
            let security_enhanced = security_enhanced_for(&table, &pipeline.pipeline_id);
            scheduler.register(Arc::clone(pipeline), &virtual_models, priority, security_enhanced);
        }

        tracing::info!(pipelines = pipelines.len(), "initialization complete");

        Ok(InitializationResult {
            success: true,
            pipeline_table: table,
            scheduler,
            pipelines,
            errors,
            warnings,
            timings: InitTimings { table_build, pipeline_construction, total: overall_start.elapsed() },
        })
    }
}

fn instantiate(descriptor: &PipelineDescriptor, config: &Config, adapter_registry: &Arc<AdapterRegistry>) -> Result<Pipeline, String> {
    let provider_entry = config
        .providers
        .get(&descriptor.provider)
        .ok_or_else(|| format!("pipeline {}: provider '{}' not found", descriptor.pipeline_id, descriptor.provider))?;

    let api_keys: ApiKeys = provider_entry.api_key.clone().into();
    let api_key = api_keys
        .get(descriptor.api_key_index)
        .ok_or_else(|| format!("pipeline {}: no api key at index {}", descriptor.pipeline_id, descriptor.api_key_index))?
        .clone();

    let timeout = Duration::from_secs(provider_entry.timeout.unwrap_or(config.request.default_timeout_secs));
    let max_retries = provider_entry.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);

    Ok(Pipeline::new(
        descriptor,
        api_key,
        timeout,
        max_retries,
        config.request.large_body_threshold_bytes,
        Duration::from_secs(config.request.long_request_timeout_secs),
        Arc::clone(adapter_registry),
    ))
}

/// Every virtual model whose route entry contains this pipeline's
/// `(provider, model)` pair (spec.md §4.7 step 4)
fn virtual_models_for(table: &PipelineTable, pipeline_id: &str) -> Vec<String> {
    table
        .by_virtual_model
        .iter()
        .filter(|(_, ids)| ids.iter().any(|id| id == pipeline_id))
        .map(|(virtual_model, _)| virtual_model.clone())
        .collect()
}

/// `expandedRouting` priority is "lower is preferred"; the scheduler's
/// `PriorityBased` strategy treats a higher `Candidate.priority` as
/// preferred, so the sign is flipped here. Pipelines with no explicit
/// priority get `0`, ranking above any pipeline that was explicitly
/// deprioritized.
fn priority_for(table: &PipelineTable, pipeline_id: &str) -> i64 {
    table
        .descriptors
        .iter()
        .find(|d| d.pipeline_id == pipeline_id)
        .and_then(|d| d.selection_hint.priority)
        .map_or(0, |p| -i64::from(p))
}

/// Whether this pipeline is the security-enhanced variant of a provider
/// (spec.md §9 open question) — consulted by the priority-based algorithm
/// to prefer it over an equal-priority primary variant.
fn security_enhanced_for(table: &PipelineTable, pipeline_id: &str) -> bool {
    table.descriptors.iter().find(|d| d.pipeline_id == pipeline_id).is_some_and(|d| d.selection_hint.security_enhanced)
}

#[cfg(test)]
mod tests {
    use relaymux_config::Config;

    use super::*;

    fn minimal_config() -> Config {
        let toml = r#"
            [providers.p1]
            api_base_url = "https://example.invalid/v1"
            api_key = "key-1"
            protocol = "openai"

            [router]
            default = "p1,model-a"
        "#;
        Config::load_str(toml).unwrap()
    }

    #[tokio::test]
    async fn refuses_second_initialization() {
        let initializer = Initializer::new();
        let config = minimal_config();

        let _first = initializer.initialize(&config).await.unwrap();
        let second = initializer.initialize(&config).await;
        assert!(matches!(second, Err(GatewayError::AlreadyInitialized)));
    }

    #[tokio::test]
    async fn empty_provider_list_reports_config_invalid() {
        let initializer = Initializer::new();
        let config = Config::default();

        let result = initializer.initialize(&config).await.unwrap();
        assert!(!result.success);
        assert!(result.errors[0].contains("config-invalid"));
    }

    #[tokio::test]
    async fn handshake_failure_tears_down_and_reports_failure() {
        let initializer = Initializer::new();
        let config = minimal_config();

        let result = initializer.initialize(&config).await.unwrap();

        // example.invalid never resolves, so every pipeline's handshake
        // fails and initialization is reported as unsuccessful.
        assert!(!result.success);
        assert!(result.pipelines.is_empty());
        assert!(!result.errors.is_empty());
    }

    #[tokio::test]
    async fn unknown_router_provider_is_a_warning_not_an_error() {
        let initializer = Initializer::new();
        let toml = r#"
            [providers.p1]
            api_base_url = "https://example.invalid/v1"
            api_key = "key-1"
            protocol = "openai"

            [router]
            default = "p1,model-a;ghost,model-x"
        "#;
        let config = Config::load_str(toml).unwrap();

        let result = initializer.initialize(&config).await.unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("ghost"));
    }
}
