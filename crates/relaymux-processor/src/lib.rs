//! Layered Request Processor (spec.md §4.5, C5)
//!
//! Wraps `relaymux_pipeline::Pipeline::execute` (the four interchangeable
//! middle layers) with the outer Router layer (virtual-model mapping and
//! pipeline selection via the scheduler) and the optional Retransform
//! layer (response dialect conversion back to what the client spoke).

mod router;

use std::sync::Arc;
use std::time::Instant;

use relaymux_config::RequestConfig;
use relaymux_core::{
    GatewayError, RequestContext, RoutingDecision, VirtualModel, LAYER_RETRANSFORM, LAYER_ROUTER,
};
use relaymux_scheduler::Scheduler;
use relaymux_transform::{CompletionResponse, Dialect};
use serde_json::Value;

pub use router::{map_virtual_model, request_priority};

/// Ties the scheduler and pipeline layers together into the single
/// entry point the (external) HTTP surface calls per inbound request.
pub struct Processor {
    scheduler: Arc<Scheduler>,
    request_config: RequestConfig,
}

impl Processor {
    #[must_use]
    pub fn new(scheduler: Arc<Scheduler>, request_config: RequestConfig) -> Self {
        Self { scheduler, request_config }
    }

    /// Run one request through Router → Transformer → Protocol →
    /// ServerCompatibility → Server → optional Retransform.
    ///
    /// # Errors
    ///
    /// Returns the first layer's error; later layers do not run. The
    /// scheduler is still informed of the failure via `record_result`
    /// before the error propagates.
    pub async fn process(&self, request_id: String, body: Value, client_speaks_anthropic: bool) -> Result<Value, GatewayError> {
        let mut context = RequestContext::new(request_id, client_speaks_anthropic);
        let router_start = Instant::now();

        let original_model = body.get("model").and_then(Value::as_str).unwrap_or_default().to_owned();
        let virtual_model_name = router::map_virtual_model(&body, &self.request_config);
        let priority = router::request_priority(&body);

        let selection = match self.scheduler.select(&virtual_model_name, priority) {
            Ok(selection) => selection,
            Err(err) => {
                context.record_error(err.to_string());
                return Err(err);
            }
        };

        if virtual_model_name == self.request_config.long_context_virtual_model {
            context.metadata.protocol_config.timeout =
                Some(std::time::Duration::from_secs(self.request_config.long_context_timeout_secs));
        }

        context.routing_decision = Some(RoutingDecision {
            original_model,
            virtual_model: VirtualModel::from(virtual_model_name.clone()),
            available_pipelines: selection.available_pipelines.clone(),
            selected_pipeline: selection.pipeline.pipeline_id.clone(),
            reasoning: selection.reasoning.clone(),
            provider_type: selection.pipeline.protocol,
        });
        context.record_layer(LAYER_ROUTER, router_start.elapsed());

        let pipeline = Arc::clone(&selection.pipeline);
        let execute_start = Instant::now();
        let result = pipeline.execute(body, &mut context).await;
        let response_time_ms = u64::try_from(execute_start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let outcome: Result<(), &GatewayError> = result.as_ref().map(|_| ());
        self.scheduler.record_result(&pipeline.pipeline_id, &virtual_model_name, response_time_ms, outcome);

        let response_value = match result {
            Ok(value) => value,
            Err(err) => {
                context.record_error(err.to_string());
                return Err(err);
            }
        };

        if !client_speaks_anthropic {
            return Ok(response_value);
        }

        let retransform_start = Instant::now();
        let completion: CompletionResponse = serde_json::from_value(response_value.clone()).map_err(|e| GatewayError::ParseError(format!("server response did not match the canonical completion shape: {e}")))?;
        let anthropic = relaymux_transform::transform_response(completion, Dialect::Anthropic);
        context.record_layer(LAYER_RETRANSFORM, retransform_start.elapsed());

        Ok(anthropic)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use relaymux_compat::AdapterRegistry;
    use relaymux_config::SchedulerConfig;
    use relaymux_core::Protocol;
    use relaymux_pipeline::{Pipeline, PipelineDescriptor, SelectionHint};
    use secrecy::SecretString;

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
            selection_hint: SelectionHint::default(),
        }
    }

    #[tokio::test]
    async fn no_eligible_pipeline_surfaces_scheduler_error() {
        let scheduler = Arc::new(Scheduler::new(SchedulerConfig::default()));
        let processor = Processor::new(scheduler, RequestConfig::default());

        let body = serde_json::json!({"model": "claude-3", "messages": [{"role": "user", "content": "hi"}]});
        let err = processor.process("req-1".to_owned(), body, true).await.unwrap_err();
        assert!(matches!(err, GatewayError::NoAvailablePipelines { .. }));
    }

    #[tokio::test]
    async fn long_context_request_picks_up_extended_timeout() {
        let scheduler = Arc::new(Scheduler::new(SchedulerConfig::default()));
        let pipeline = Arc::new(Pipeline::new(
            &descriptor(),
            SecretString::from("key".to_owned()),
            Duration::from_secs(300),
            0,
            256 * 1024,
            Duration::from_secs(600),
            Arc::new(AdapterRegistry::new()),
        ));
        scheduler.register(pipeline, &["longContext".to_owned()], 0, false);

        let mut request_config = RequestConfig::default();
        request_config.long_context_token_threshold = 1;
        let processor = Processor::new(scheduler, request_config);

        let body = serde_json::json!({
            "model": "claude-3",
            "max_tokens": 50,
            "messages": [{"role": "user", "content": "word ".repeat(50)}],
        });

        // The upstream is unreachable at this fake endpoint, so this is
        // expected to fail at the Server layer — the point of this test is
        // that routing and timeout selection happen before that failure.
        let result = processor.process("req-1".to_owned(), body, true).await;
        assert!(result.is_err());
    }
}
