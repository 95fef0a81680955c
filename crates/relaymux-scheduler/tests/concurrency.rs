//! Crate-level integration tests for the scheduler's behavior under true
//! concurrent access (spec.md §4.6, §8 "round-robin fairness over a K·n
//! window" — the property must hold when `select` is actually called from
//! multiple threads at once, not just sequentially from a single test
//! thread).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use relaymux_compat::AdapterRegistry;
use relaymux_config::{SchedulerConfig, SelectionAlgorithmConfig};
use relaymux_core::{Protocol, RequestPriority};
use relaymux_pipeline::{Pipeline, PipelineDescriptor, SelectionHint};
use relaymux_scheduler::Scheduler;
use secrecy::SecretString;

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
        Duration::from_secs(300),
        2,
        256 * 1024,
        Duration::from_secs(600),
        Arc::new(AdapterRegistry::new()),
    ))
}

/// Fan out `K * n` concurrent `select` calls across real OS threads via
/// `tokio`'s multi-thread runtime and confirm every pipeline is still
/// chosen exactly `K` times — the round-robin cursor (an `AtomicI64`) must
/// not lose or duplicate advances under contention.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn round_robin_stays_fair_under_concurrent_select() {
    let mut config = SchedulerConfig::default();
    config.algorithm = SelectionAlgorithmConfig::RoundRobin;
    let scheduler = Arc::new(Scheduler::new(config));

    let pipeline_ids = ["p1", "p2", "p3", "p4"];
    for id in pipeline_ids {
        scheduler.register(pipeline(id), &["default".to_owned()], 0, false);
    }

    const K: usize = 50;
    let total_calls = K * pipeline_ids.len();

    let handles: Vec<_> = (0..total_calls)
        .map(|_| {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.select("default", RequestPriority::Medium).unwrap().pipeline.pipeline_id.clone() })
        })
        .collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for handle in handles {
        let pipeline_id = handle.await.unwrap();
        *counts.entry(pipeline_id).or_insert(0) += 1;
    }

    assert_eq!(counts.len(), pipeline_ids.len(), "every registered pipeline should have been selected at least once");
    for id in pipeline_ids {
        assert_eq!(counts.get(id).copied().unwrap_or(0), K, "pipeline {id} was not chosen exactly K times across the K*n window");
    }
}

/// Concurrent `select` + `record_result` calls against the same pipeline
/// must not panic or deadlock, and a pipeline that accumulates enough
/// rate-limit errors under concurrent load still ends up blocked.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_record_result_blocks_pipeline_exactly_once() {
    let mut config = SchedulerConfig::default();
    config.max_error_count = 5;
    let scheduler = Arc::new(Scheduler::new(config));
    scheduler.register(pipeline("flaky"), &["default".to_owned()], 0, false);
    scheduler.register(pipeline("steady"), &["default".to_owned()], 0, false);

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move {
                let err = relaymux_core::GatewayError::RateLimit { retry_after_secs: 1 };
                scheduler.record_result("flaky", "default", 5, Err(&err));
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    assert!(scheduler.select("default", RequestPriority::Medium).unwrap().pipeline.pipeline_id == "steady");
}
