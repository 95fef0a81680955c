//! The four interchangeable pipeline modules (spec.md §4.4): Transformer,
//! Protocol, ServerCompatibility, and Server each implement the same
//! `process(input) -> output` interface, making `Pipeline::execute` a
//! uniform fold over a module list rather than four special-cased calls.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relaymux_compat::{AdapterContext, AdapterRegistry};
use relaymux_core::{
    now_unix_secs, GatewayError, Protocol, ProtocolConfig, RequestContext, LAYER_PROTOCOL, LAYER_SERVER,
    LAYER_SERVER_COMPATIBILITY, LAYER_TRANSFORMER,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

/// Common interface shared by all four pipeline modules (spec.md §4.4
/// "interchangeable implementations of a single interface")
#[async_trait]
pub trait PipelineModule: Send + Sync {
    /// Layer name, used for `context.transformations` bookkeeping
    fn layer_name(&self) -> &'static str;

    /// Transform `input`, threading layer-specific state through `context`
    async fn process(&self, input: Value, context: &mut RequestContext) -> Result<Value, GatewayError>;
}

/// Transformer module (spec.md §4.5.2): converts the client's Anthropic
/// request body into the canonical internal shape
pub struct TransformerModule;

#[async_trait]
impl PipelineModule for TransformerModule {
    fn layer_name(&self) -> &'static str {
        LAYER_TRANSFORMER
    }

    async fn process(&self, input: Value, context: &mut RequestContext) -> Result<Value, GatewayError> {
        let protocol = context.routing_decision.as_ref().map_or(Protocol::Openai, |d| d.provider_type);
        let request = relaymux_transform::transform_request(&input, protocol)?;
        let output = serde_json::to_value(&request)
            .map_err(|e| GatewayError::TransformerFailed(format!("failed to serialize internal request: {e}")))?;

        if !relaymux_transform::is_openai_shaped(&output) {
            return Err(GatewayError::FormatViolation {
                layer: LAYER_TRANSFORMER,
                detail: "transformer output is not OpenAI-shaped".to_owned(),
            });
        }

        Ok(output)
    }
}

/// Protocol module (spec.md §4.5.3): resolves endpoint/key/timeout,
/// rewrites `model` to the provider's actual model name
pub struct ProtocolModule {
    /// Provider's actual model name to send upstream (spec.md "cross-provider model rename")
    pub target_model: String,
    /// Fully resolved server endpoint
    pub endpoint: String,
    /// Credential to use for this pipeline
    pub api_key: SecretString,
    /// Per-request timeout, already adjusted for `longContext` etc.
    pub timeout: Duration,
}

#[async_trait]
impl PipelineModule for ProtocolModule {
    fn layer_name(&self) -> &'static str {
        LAYER_PROTOCOL
    }

    async fn process(&self, mut input: Value, context: &mut RequestContext) -> Result<Value, GatewayError> {
        if let Some(obj) = input.as_object_mut() {
            obj.insert("model".to_owned(), Value::String(self.target_model.clone()));
        }

        // The Router layer may have already set a virtual-model-specific
        // timeout (e.g. longContext) on the context before execute() ran;
        // that takes precedence over this pipeline's baked-in default.
        let timeout = context.metadata.protocol_config.timeout.unwrap_or(self.timeout);

        context.metadata.protocol_config = ProtocolConfig {
            endpoint: Some(self.endpoint.clone()),
            api_key: Some(self.api_key.expose_secret().to_owned()),
            timeout: Some(timeout),
            custom_headers: context.metadata.protocol_config.custom_headers.clone(),
        };

        if relaymux_transform::is_anthropic_shaped(&input) {
            return Err(GatewayError::FormatViolation {
                layer: LAYER_PROTOCOL,
                detail: "protocol layer output is anthropic-shaped".to_owned(),
            });
        }

        Ok(input)
    }
}

/// `ServerCompatibility` module (spec.md §4.5.4): applies the provider's
/// compatibility adapter and strips internal field leaks
pub struct ServerCompatibilityModule {
    /// Shared, lazily-populated adapter cache
    pub registry: Arc<AdapterRegistry>,
    /// Tag resolved at table-build time (spec.md §4.1 "Tag derivation")
    pub tag: relaymux_core::CompatibilityTag,
}

#[async_trait]
impl PipelineModule for ServerCompatibilityModule {
    fn layer_name(&self) -> &'static str {
        LAYER_SERVER_COMPATIBILITY
    }

    async fn process(&self, input: Value, context: &mut RequestContext) -> Result<Value, GatewayError> {
        let adapter = self.registry.resolve(self.tag);

        let mut adapter_ctx = AdapterContext::default();
        let mut output = adapter.process(input, &mut adapter_ctx)?;

        context.metadata.protocol_config.custom_headers.extend(adapter_ctx.custom_headers);
        if let Some(endpoint) = adapter_ctx.endpoint_override {
            context.metadata.protocol_config.endpoint = Some(endpoint);
        }

        if let Some(obj) = output.as_object_mut() {
            obj.retain(|key, _| !key.starts_with("__"));
        }

        if !relaymux_transform::is_openai_shaped(&output) && self.tag != relaymux_core::CompatibilityTag::Anthropic {
            return Err(GatewayError::FormatViolation {
                layer: LAYER_SERVER_COMPATIBILITY,
                detail: "server-compatibility output is not OpenAI-shaped".to_owned(),
            });
        }

        Ok(output)
    }
}

/// Server module (spec.md §4.5.5): performs the HTTPS request, with its own
/// retry policy local to this call — `Pipeline::execute` does not retry
/// across the whole module chain.
pub struct ServerModule {
    /// Shared HTTP client (connection pool reused across requests)
    pub client: reqwest::Client,
    /// Number of retry attempts beyond the first, per `maxRetries`
    pub max_retries: u32,
    /// Threshold above which the long-request timeout and heartbeat mode apply
    pub large_body_threshold_bytes: u64,
    /// Timeout used once a request is classified as large-bodied
    pub long_request_timeout: Duration,
}

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

#[async_trait]
impl PipelineModule for ServerModule {
    fn layer_name(&self) -> &'static str {
        LAYER_SERVER
    }

    async fn process(&self, input: Value, context: &mut RequestContext) -> Result<Value, GatewayError> {
        let body = serde_json::to_vec(&input)
            .map_err(|e| GatewayError::Internal(anyhow::anyhow!("failed to serialize request body: {e}")))?;

        let protocol_config = context.metadata.protocol_config.clone();
        let endpoint = protocol_config.endpoint.clone().unwrap_or_default();
        let api_key = protocol_config.api_key.clone().unwrap_or_default();

        let timeout = if (body.len() as u64) > self.large_body_threshold_bytes {
            self.long_request_timeout
        } else {
            protocol_config.timeout.unwrap_or(Duration::from_secs(300))
        };

        let mut attempt = 0u32;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            let result = self.send_once(&endpoint, &api_key, &body, timeout, &protocol_config.custom_headers).await;

            match result {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let retryable = err.is_retryable_at_server();
                    if !retryable || attempt >= self.max_retries {
                        return Err(err);
                    }
                    tracing::warn!(attempt, endpoint = %endpoint, error = %err, "server layer retrying after failure");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    attempt += 1;
                }
            }
        }
    }
}

impl ServerModule {
    async fn send_once(
        &self,
        endpoint: &str,
        api_key: &str,
        body: &[u8],
        timeout: Duration,
        custom_headers: &[(String, String)],
    ) -> Result<Value, GatewayError> {
        let mut builder = self
            .client
            .post(endpoint)
            .timeout(timeout)
            .header(http::header::CONTENT_TYPE, "application/json")
            .header(http::header::CONTENT_LENGTH, body.len())
            .bearer_auth(api_key)
            .body(body.to_vec());

        for (name, value) in custom_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(classify_transport_error)?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status_error(status, &text));
        }

        let text = response.text().await.map_err(|e| GatewayError::Network(e.to_string()))?;
        parse_with_salvage(&text).map(normalize_response)
    }
}

fn classify_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() || err.is_connect() {
        GatewayError::Network(err.to_string())
    } else {
        GatewayError::Recoverable(err.to_string())
    }
}

fn classify_status_error(status: http::StatusCode, body: &str) -> GatewayError {
    match status.as_u16() {
        401 | 403 => GatewayError::Authentication,
        429 => GatewayError::RateLimit { retry_after_secs: 60 },
        408 | 504 => GatewayError::Network(format!("status {status}: {body}")),
        500..=599 => GatewayError::Recoverable(format!("status {status}: {body}")),
        _ => GatewayError::ParseError(format!("unexpected status {status}: {body}")),
    }
}

/// Parse the response body as JSON, attempting a single salvage pass
/// (balance unmatched braces/brackets) on failure before surfacing a parse
/// error (spec.md §4.5.5)
fn parse_with_salvage(text: &str) -> Result<Value, GatewayError> {
    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }

    let salvaged = salvage_json(text);
    serde_json::from_str(&salvaged).map_err(|e| GatewayError::ParseError(format!("{e} (salvage also failed)")))
}

fn salvage_json(text: &str) -> String {
    let mut depth_braces: i64 = 0;
    let mut depth_brackets: i64 = 0;
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth_braces += 1,
            '}' if !in_string => depth_braces -= 1,
            '[' if !in_string => depth_brackets += 1,
            ']' if !in_string => depth_brackets -= 1,
            _ => {}
        }
    }

    let mut fixed = text.to_owned();
    if in_string {
        fixed.push('"');
    }
    for _ in 0..depth_brackets.max(0) {
        fixed.push(']');
    }
    for _ in 0..depth_braces.max(0) {
        fixed.push('}');
    }
    fixed
}

/// Normalize an upstream response into the OpenAI `choices[]` shape
/// (spec.md §4.5.5)
fn normalize_response(value: Value) -> Value {
    if value.get("choices").is_some_and(Value::is_array) {
        return value;
    }

    let message = if let Some(content) = value.get("content").and_then(extract_text) {
        content
    } else if let Some(message) = value.get("message").and_then(extract_text) {
        message
    } else if let Some(text) = value.get("text").and_then(Value::as_str) {
        text.to_owned()
    } else {
        value.to_string()
    };

    serde_json::json!({
        "id": value.get("id").cloned().unwrap_or(Value::Null),
        "created": now_unix_secs(),
        "model": value.get("model").cloned().unwrap_or(Value::Null),
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": message},
            "finish_reason": "stop",
        }],
    })
}

fn extract_text(value: &Value) -> Option<String> {
    value.as_str().map(ToOwned::to_owned).or_else(|| {
        value.as_array().map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str).or_else(|| p.as_str()))
                .collect::<Vec<_>>()
                .join("")
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salvage_closes_unbalanced_braces() {
        let broken = r#"{"choices": [{"message": {"role": "assistant", "content": "hi""#;
        let salvaged = salvage_json(broken);
        let parsed: Value = serde_json::from_str(&salvaged).unwrap();
        assert_eq!(parsed["choices"][0]["message"]["content"], "hi");
    }

    #[test]
    fn normalize_passes_through_existing_choices_shape() {
        let value = serde_json::json!({"choices": [{"message": {"role": "assistant", "content": "hi"}}]});
        let normalized = normalize_response(value.clone());
        assert_eq!(normalized, value);
    }

    #[test]
    fn normalize_wraps_bare_content_field() {
        let value = serde_json::json!({"id": "abc", "model": "m", "content": "hello"});
        let normalized = normalize_response(value);
        assert_eq!(normalized["choices"][0]["message"]["content"], "hello");
        assert_eq!(normalized["choices"][0]["message"]["role"], "assistant");
    }

    #[test]
    fn status_classification_matches_spec_table() {
        assert!(matches!(classify_status_error(http::StatusCode::UNAUTHORIZED, ""), GatewayError::Authentication));
        assert!(matches!(
            classify_status_error(http::StatusCode::TOO_MANY_REQUESTS, ""),
            GatewayError::RateLimit { .. }
        ));
        assert!(matches!(classify_status_error(http::StatusCode::GATEWAY_TIMEOUT, ""), GatewayError::Network(_)));
        assert!(matches!(
            classify_status_error(http::StatusCode::INTERNAL_SERVER_ERROR, ""),
            GatewayError::Recoverable(_)
        ));
    }
}
