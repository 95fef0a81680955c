//! The runtime scheduler: pipeline registry, health tracking, and selection
//! (spec.md §4.6, C6)

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use relaymux_config::SchedulerConfig;
use relaymux_core::{ErrorKind, GatewayError, RequestPriority};
use relaymux_pipeline::Pipeline;

use crate::blocklist::{BlockReason, Blocklist};
use crate::counters::PipelineCounters;
use crate::events::SchedulerEvent;
use crate::strategy::{self, Candidate, SelectionStrategy};

/// Outcome of a `select` call, carrying enough to let the caller time the
/// execution and report it back via `record_result`.
pub struct Selection {
    pub pipeline: Arc<Pipeline>,
    pub reasoning: String,
    pub available_pipelines: Vec<String>,
    pub virtual_model: String,
}

/// Owns every registered pipeline, its rolling counters, the blacklist and
/// temporary-block sets, and the configured selection algorithm. One
/// instance per gateway process (spec.md §4.6 "Runtime Scheduler").
pub struct Scheduler {
    config: SchedulerConfig,
    pipelines: DashMap<String, Arc<Pipeline>>,
    counters: DashMap<String, PipelineCounters>,
    priorities: DashMap<String, i64>,
    security_enhanced: DashMap<String, bool>,
    by_virtual_model: DashMap<String, Vec<String>>,
    round_cursor: DashMap<String, AtomicI64>,
    blocklist: Blocklist,
    strategy: Box<dyn SelectionStrategy>,
}

impl Scheduler {
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        let strategy = strategy::build(config.algorithm);
        Self {
            config,
            pipelines: DashMap::new(),
            counters: DashMap::new(),
            priorities: DashMap::new(),
            security_enhanced: DashMap::new(),
            by_virtual_model: DashMap::new(),
            round_cursor: DashMap::new(),
            blocklist: Blocklist::new(),
            strategy,
        }
    }

    /// Register a pipeline under every virtual model it should be
    /// considered for (spec.md §4.7 step 4 — a pipeline may serve more than
    /// one virtual model, e.g. `default` and `longContext`). `security_enhanced`
    /// comes from the pipeline's `SelectionHint` (spec.md §9) and lets the
    /// priority-based algorithm prefer this pipeline over an equal-priority
    /// primary variant.
    pub fn register(&self, pipeline: Arc<Pipeline>, virtual_models: &[String], priority: i64, security_enhanced: bool) {
        let pipeline_id = pipeline.pipeline_id.clone();
        self.priorities.insert(pipeline_id.clone(), priority);
        self.security_enhanced.insert(pipeline_id.clone(), security_enhanced);
        self.counters.entry(pipeline_id.clone()).or_insert_with(|| PipelineCounters::new(self.config.response_time_window));

        for virtual_model in virtual_models {
            self.by_virtual_model.entry(virtual_model.clone()).or_default().push(pipeline_id.clone());
            SchedulerEvent::PipelineRegistered { pipeline_id: &pipeline_id, virtual_model }.emit();
        }

        self.pipelines.insert(pipeline_id, pipeline);
    }

    /// Remove a pipeline from every pool it was registered under. Counters
    /// and block state are retained in case the same id is re-registered.
    pub fn unregister(&self, pipeline_id: &str) {
        self.pipelines.remove(pipeline_id);
        for mut entry in self.by_virtual_model.iter_mut() {
            entry.value_mut().retain(|id| id != pipeline_id);
        }
        SchedulerEvent::PipelineUnregistered { pipeline_id }.emit();
    }

    fn eligible(&self, virtual_model: &str) -> Vec<String> {
        self.by_virtual_model
            .get(virtual_model)
            .map(|ids| ids.iter().filter(|id| !self.blocklist.is_blocked(id)).cloned().collect())
            .unwrap_or_default()
    }

    /// Select a pipeline for `virtual_model`. Re-examines the pool after
    /// clearing expired temporary blocks if the first pass found nothing
    /// eligible (spec.md §4.6 "category-pipeline-routing fallback").
    /// `request_priority` only affects the outcome when the configured
    /// algorithm is priority-based.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::NoAvailablePipelines` if no pipeline is
    /// registered for `virtual_model`, or every one is blacklisted/blocked.
    pub fn select(&self, virtual_model: &str, request_priority: RequestPriority) -> Result<Selection, GatewayError> {
        let mut eligible = self.eligible(virtual_model);

        if eligible.is_empty() {
            let reactivated = self.blocklist.clear_expired();
            for id in &reactivated {
                SchedulerEvent::PipelineReactivated { pipeline_id: id }.emit();
            }
            eligible = self.eligible(virtual_model);
        }

        if eligible.is_empty() {
            SchedulerEvent::RouteError { virtual_model, detail: "no eligible pipelines" }.emit();
            return Err(GatewayError::NoAvailablePipelines { virtual_model: virtual_model.to_owned() });
        }

        let candidates: Vec<Candidate<'_>> = eligible
            .iter()
            .map(|id| Candidate {
                pipeline_id: id.as_str(),
                priority: self.priorities.get(id).map_or(0, |p| *p),
                security_enhanced: self.security_enhanced.get(id).is_some_and(|v| *v),
            })
            .collect();

        let snapshots: HashMap<String, crate::counters::CounterSnapshot> =
            eligible.iter().filter_map(|id| self.counters.get(id).map(|c| (id.clone(), c.snapshot()))).collect();

        let round = self.round_cursor.entry(virtual_model.to_owned()).or_insert_with(|| AtomicI64::new(0)).fetch_add(1, Ordering::AcqRel);
        #[allow(clippy::cast_sign_loss)]
        let round = round.max(0) as u64;

        let selected_id = self
            .strategy
            .select(&candidates, &snapshots, round, request_priority)
            .ok_or_else(|| GatewayError::NoAvailablePipelines { virtual_model: virtual_model.to_owned() })?;

        let pipeline = self
            .pipelines
            .get(selected_id)
            .map(|p| Arc::clone(&p))
            .ok_or_else(|| GatewayError::NoAvailablePipelines { virtual_model: virtual_model.to_owned() })?;

        if let Some(counter) = self.counters.get(selected_id) {
            counter.begin_request();
        }

        Ok(Selection {
            reasoning: strategy::explain(self.strategy.name(), selected_id, eligible.len()),
            available_pipelines: eligible,
            virtual_model: virtual_model.to_owned(),
            pipeline,
        })
    }

    /// Record the outcome of an execution against `pipeline_id`, applying
    /// the error-classification table of spec.md §4.6.
    pub fn record_result(&self, pipeline_id: &str, virtual_model: &str, response_time_ms: u64, outcome: Result<(), &GatewayError>) {
        let Some(counter) = self.counters.get(pipeline_id) else { return };
        let succeeded = outcome.is_ok();
        counter.record_result(response_time_ms, succeeded);
        let error_count = counter.error_count();
        drop(counter);

        let Err(error) = outcome else {
            SchedulerEvent::RouteSuccess { pipeline_id, virtual_model, response_time_ms }.emit();
            return;
        };

        SchedulerEvent::PipelineError { pipeline_id, detail: &error.to_string() }.emit();

        match error.classify() {
            Some(ErrorKind::Unrecoverable) => {
                self.blocklist.blacklist(pipeline_id);
                SchedulerEvent::DestroyPipelineRequired { pipeline_id }.emit();
            }
            Some(ErrorKind::Authentication) => {
                self.blocklist.temp_block(pipeline_id, self.config.auth_retry_delay_secs, BlockReason::Authentication);
                SchedulerEvent::AuthenticationRequired { pipeline_id }.emit();
                SchedulerEvent::PipelineBlocked {
                    pipeline_id,
                    reason: BlockReason::Authentication,
                    until_unix: relaymux_core::now_unix_secs() + self.config.auth_retry_delay_secs,
                }
                .emit();
            }
            Some(ErrorKind::RateLimit | ErrorKind::Recoverable) => {
                if error_count >= self.config.max_error_count {
                    self.blocklist.temp_block(pipeline_id, self.config.blacklist_duration_secs, BlockReason::RateLimitOrRecoverable);
                    SchedulerEvent::PipelineBlocked {
                        pipeline_id,
                        reason: BlockReason::RateLimitOrRecoverable,
                        until_unix: relaymux_core::now_unix_secs() + self.config.blacklist_duration_secs,
                    }
                    .emit();
                }
            }
            Some(ErrorKind::Network) => {
                if error_count >= 2 {
                    self.blocklist.temp_block(pipeline_id, self.config.network_block_secs, BlockReason::Network);
                    SchedulerEvent::PipelineBlocked {
                        pipeline_id,
                        reason: BlockReason::Network,
                        until_unix: relaymux_core::now_unix_secs() + self.config.network_block_secs,
                    }
                    .emit();
                }
            }
            None => {}
        }
    }

    /// Probe every registered pipeline once. A pipeline that fails its
    /// health check is temporarily blocked, not blacklisted (spec.md §4.6
    /// "Health check" — a blip should not permanently remove a pipeline).
    pub async fn run_health_check_once(&self) {
        let ids: Vec<String> = self.pipelines.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            let Some(pipeline) = self.pipelines.get(&id).map(|p| Arc::clone(&p)) else { continue };
            if pipeline.health_check().await {
                continue;
            }
            self.blocklist.temp_block(&id, self.config.network_block_secs, BlockReason::HealthCheckFailure);
            SchedulerEvent::PipelineBlocked {
                pipeline_id: &id,
                reason: BlockReason::HealthCheckFailure,
                until_unix: relaymux_core::now_unix_secs() + self.config.network_block_secs,
            }
            .emit();
        }
    }

    /// Spawn the periodic health-check task. Returns the `JoinHandle` so
    /// the caller can abort it on shutdown.
    pub fn spawn_health_check_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let scheduler = Arc::clone(self);
        let interval = Duration::from_secs(self.config.health_check_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                scheduler.run_health_check_once().await;
            }
        })
    }

    #[must_use]
    pub fn is_blacklisted(&self, pipeline_id: &str) -> bool {
        self.blocklist.is_blacklisted(pipeline_id)
    }

    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use relaymux_compat::AdapterRegistry;
    use relaymux_core::Protocol;
    use relaymux_pipeline::{PipelineDescriptor, SelectionHint};
    use secrecy::SecretString;

    use super::*;

    fn descriptor(id: &str) -> PipelineDescriptor {
        PipelineDescriptor {
            pipeline_id: id.to_owned(),
            virtual_model: "default".to_owned(),
            provider: "openai".to_owned(),
            target_model: "gpt-4o".to_owned(),
            api_key_index: 0,
            protocol: Protocol::Openai,
            transformer_name: None,
            server_compatibility: None,
            server_endpoint: "https://example.invalid/v1/chat/completions".to_owned(),
            selection_hint: SelectionHint::default(),
        }
    }

    fn pipeline(id: &str) -> Arc<Pipeline> {
        Arc::new(Pipeline::new(
            &descriptor(id),
            SecretString::from("key".to_owned()),
            StdDuration::from_secs(300),
            2,
            256 * 1024,
            StdDuration::from_secs(600),
            Arc::new(AdapterRegistry::new()),
        ))
    }

    #[test]
    fn selects_among_registered_pipelines() {
        let scheduler = Scheduler::new(SchedulerConfig::default());
        scheduler.register(pipeline("p1"), &["default".to_owned()], 0, false);
        scheduler.register(pipeline("p2"), &["default".to_owned()], 0, false);

        let selection = scheduler.select("default", RequestPriority::Medium).unwrap();
        assert!(["p1", "p2"].contains(&selection.pipeline.pipeline_id.as_str()));
    }

    #[test]
    fn unknown_virtual_model_has_no_pipelines() {
        let scheduler = Scheduler::new(SchedulerConfig::default());
        scheduler.register(pipeline("p1"), &["default".to_owned()], 0, false);
        assert!(scheduler.select("longContext", RequestPriority::Medium).is_err());
    }

    #[test]
    fn unrecoverable_error_blacklists_pipeline() {
        let scheduler = Scheduler::new(SchedulerConfig::default());
        scheduler.register(pipeline("p1"), &["default".to_owned()], 0, false);

        let err = GatewayError::Unrecoverable("bad model".to_owned());
        scheduler.record_result("p1", "default", 10, Err(&err));

        assert!(scheduler.is_blacklisted("p1"));
        assert!(scheduler.select("default", RequestPriority::Medium).is_err());
    }

    #[test]
    fn rate_limit_blocks_after_max_error_count() {
        let mut config = SchedulerConfig::default();
        config.max_error_count = 2;
        let scheduler = Scheduler::new(config);
        scheduler.register(pipeline("p1"), &["default".to_owned()], 0, false);

        let err = GatewayError::RateLimit { retry_after_secs: 1 };
        scheduler.record_result("p1", "default", 10, Err(&err));
        assert!(scheduler.select("default", RequestPriority::Medium).is_ok());

        scheduler.record_result("p1", "default", 10, Err(&err));
        assert!(scheduler.select("default", RequestPriority::Medium).is_err());
    }

    #[test]
    fn success_unblocks_nothing_but_resets_error_count() {
        let scheduler = Scheduler::new(SchedulerConfig::default());
        scheduler.register(pipeline("p1"), &["default".to_owned()], 0, false);
        scheduler.record_result("p1", "default", 10, Ok(()));
        assert!(!scheduler.is_blacklisted("p1"));
    }

    #[test]
    fn unregister_removes_from_pool() {
        let scheduler = Scheduler::new(SchedulerConfig::default());
        scheduler.register(pipeline("p1"), &["default".to_owned()], 0, false);
        scheduler.unregister("p1");
        assert!(scheduler.select("default", RequestPriority::Medium).is_err());
    }
}
