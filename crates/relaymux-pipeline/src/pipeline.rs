//! The Pipeline object (spec.md §4.4, C4)

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use relaymux_compat::AdapterRegistry;
use relaymux_core::{now_unix_secs, CompatibilityTag, GatewayError, PipelineStatus, Protocol, RequestContext};
use secrecy::SecretString;
use serde_json::Value;

use crate::module::{PipelineModule, ProtocolModule, ServerCompatibilityModule, ServerModule, TransformerModule};
use crate::table::PipelineDescriptor;

fn status_to_u8(status: PipelineStatus) -> u8 {
    match status {
        PipelineStatus::Initializing => 0,
        PipelineStatus::Runtime => 1,
        PipelineStatus::Error => 2,
        PipelineStatus::Stopped => 3,
    }
}

fn status_from_u8(value: u8) -> PipelineStatus {
    match value {
        1 => PipelineStatus::Runtime,
        2 => PipelineStatus::Error,
        3 => PipelineStatus::Stopped,
        _ => PipelineStatus::Initializing,
    }
}

/// The canonical concrete routing target (spec.md §3 "Pipeline")
///
/// Bundles the four interchangeable modules (Transformer, Protocol,
/// ServerCompatibility, Server) behind a single `execute` entry point.
/// Status and `lastHandshakeTime` are the only mutable fields post
/// construction — everything else (immutable identity fields) is set once
/// at build time.
pub struct Pipeline {
    /// `<provider>-<target-model>-key<index>`
    pub pipeline_id: String,
    /// Virtual model this pipeline was registered under at build time
    pub virtual_model: String,
    /// Provider name
    pub provider: String,
    /// Target model name at that provider
    pub target_model: String,
    /// Resolved server endpoint
    pub server_endpoint: String,
    /// Wire protocol the provider speaks
    pub protocol: Protocol,
    /// Compatibility tag resolved for this pipeline
    pub server_compatibility: CompatibilityTag,
    /// Unix-epoch seconds this pipeline was constructed
    pub created_at: u64,

    status: AtomicU8,
    last_handshake_time: AtomicU64,

    modules: Vec<Box<dyn PipelineModule>>,
    client: reqwest::Client,
}

impl Pipeline {
    /// Build a pipeline from its table descriptor and shared resources.
    /// Starts in `Initializing`; the caller must call `handshake()` before
    /// registering it with the scheduler (spec.md §3 invariant).
    #[must_use]
    pub fn new(
        descriptor: &PipelineDescriptor,
        api_key: SecretString,
        timeout: Duration,
        max_retries: u32,
        large_body_threshold_bytes: u64,
        long_request_timeout: Duration,
        adapter_registry: Arc<AdapterRegistry>,
    ) -> Self {
        let tag = descriptor.server_compatibility.unwrap_or_else(|| {
            relaymux_compat::derive_tag(None, None, &descriptor.provider, &descriptor.server_endpoint)
        });

        let client = reqwest::Client::new();

        let modules: Vec<Box<dyn PipelineModule>> = vec![
            Box::new(TransformerModule),
            Box::new(ProtocolModule {
                target_model: descriptor.target_model.clone(),
                endpoint: descriptor.server_endpoint.clone(),
                api_key,
                timeout,
            }),
            Box::new(ServerCompatibilityModule { registry: adapter_registry, tag }),
            Box::new(ServerModule { client: client.clone(), max_retries, large_body_threshold_bytes, long_request_timeout }),
        ];

        Self {
            pipeline_id: descriptor.pipeline_id.clone(),
            virtual_model: descriptor.virtual_model.clone(),
            provider: descriptor.provider.clone(),
            target_model: descriptor.target_model.clone(),
            server_endpoint: descriptor.server_endpoint.clone(),
            protocol: descriptor.protocol,
            server_compatibility: tag,
            created_at: now_unix_secs(),
            status: AtomicU8::new(status_to_u8(PipelineStatus::Initializing)),
            last_handshake_time: AtomicU64::new(0),
            modules,
            client,
        }
    }

    /// Current lifecycle status
    #[must_use]
    pub fn status(&self) -> PipelineStatus {
        status_from_u8(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: PipelineStatus) {
        self.status.store(status_to_u8(status), Ordering::Release);
    }

    /// Unix-epoch seconds of the last successful handshake, 0 if never
    #[must_use]
    pub fn last_handshake_time(&self) -> u64 {
        self.last_handshake_time.load(Ordering::Acquire)
    }

    /// Invoke the four modules in order, threading each output into the
    /// next. No retries at this level — retries belong to the Server
    /// module (spec.md §4.4).
    ///
    /// # Errors
    ///
    /// Returns the first module's error; later modules do not run.
    pub async fn execute(&self, request: Value, context: &mut RequestContext) -> Result<Value, GatewayError> {
        let mut current = request;
        for module in &self.modules {
            let start = std::time::Instant::now();
            current = module.process(current, context).await?;
            context.record_layer(module.layer_name(), start.elapsed());
        }
        Ok(current)
    }

    /// Bring the chain live with a lightweight connectivity probe. The
    /// probe's exact form is provider-specific and not prescribed by the
    /// spec; here it is a bare GET against the configured base endpoint
    /// with a short timeout — reaching the server at all (any HTTP status)
    /// counts as success, since only network-level unreachability should
    /// fail a handshake.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::HandshakeFailed` if the probe cannot reach
    /// the upstream at all.
    pub async fn handshake(&self) -> Result<(), GatewayError> {
        let probe = self
            .client
            .get(&self.server_endpoint)
            .timeout(Duration::from_secs(10))
            .send()
            .await;

        match probe {
            Ok(_) => {
                self.last_handshake_time.store(now_unix_secs(), Ordering::Release);
                self.set_status(PipelineStatus::Runtime);
                Ok(())
            }
            Err(e) => {
                self.set_status(PipelineStatus::Error);
                Err(GatewayError::HandshakeFailed { pipeline_id: self.pipeline_id.clone(), reason: e.to_string() })
            }
        }
    }

    /// Cheaper than `handshake`; used by the scheduler's periodic health
    /// check (spec.md §4.6 "Health check"). Never errors — unreachability
    /// is reported as `false`, not propagated.
    pub async fn health_check(&self) -> bool {
        let probe = self
            .client
            .get(&self.server_endpoint)
            .timeout(Duration::from_secs(3))
            .send()
            .await;

        probe.is_ok()
    }

    /// Idempotent: releases no real resources beyond marking the pipeline
    /// `Stopped`, since the underlying `reqwest::Client` owns its own
    /// connection pool and is dropped with the pipeline.
    pub fn stop(&self) {
        self.set_status(PipelineStatus::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> PipelineDescriptor {
        PipelineDescriptor {
            pipeline_id: "openai-gpt-4o-key0".to_owned(),
            virtual_model: "default".to_owned(),
            provider: "openai".to_owned(),
            target_model: "gpt-4o".to_owned(),
            api_key_index: 0,
            protocol: Protocol::Openai,
            transformer_name: None,
            server_compatibility: None,
            server_endpoint: "https://example.invalid/v1/chat/completions".to_owned(),
            selection_hint: crate::table::SelectionHint::default(),
        }
    }

    #[test]
    fn starts_initializing() {
        let pipeline = Pipeline::new(
            &descriptor(),
            SecretString::from("key".to_owned()),
            Duration::from_secs(300),
            2,
            256 * 1024,
            Duration::from_secs(600),
            Arc::new(AdapterRegistry::new()),
        );
        assert_eq!(pipeline.status(), PipelineStatus::Initializing);
        assert_eq!(pipeline.last_handshake_time(), 0);
    }

    #[test]
    fn stop_is_reflected_in_status() {
        let pipeline = Pipeline::new(
            &descriptor(),
            SecretString::from("key".to_owned()),
            Duration::from_secs(300),
            2,
            256 * 1024,
            Duration::from_secs(600),
            Arc::new(AdapterRegistry::new()),
        );
        pipeline.stop();
        assert_eq!(pipeline.status(), PipelineStatus::Stopped);
    }
}
