use relaymux_core::GatewayError;
use relaymux_transform::{AnthropicRequest, CompletionRequest};

use crate::{Adapter, AdapterContext};

/// Converts the canonical OpenAI-shaped request body into the Anthropic
/// Messages wire shape, for providers whose `protocol` is `anthropic`
/// (spec.md §4.1 `anthropic` tag)
#[derive(Debug, Default)]
pub struct AnthropicAdapter;

impl Adapter for AnthropicAdapter {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn process(&self, request: serde_json::Value, ctx: &mut AdapterContext) -> Result<serde_json::Value, GatewayError> {
        let internal: CompletionRequest = serde_json::from_value(request)
            .map_err(|e| GatewayError::TransformerFailed(format!("anthropic adapter: not openai-shaped: {e}")))?;

        let anthropic = AnthropicRequest::from(&internal);
        ctx.custom_headers.push(("anthropic-version".to_owned(), "2023-06-01".to_owned()));

        serde_json::to_value(anthropic)
            .map_err(|e| GatewayError::TransformerFailed(format!("anthropic adapter: serialize failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_openai_shape_to_anthropic_shape() {
        let body = serde_json::json!({
            "model": "claude-3-opus",
            "messages": [{"role": "user", "content": "hi"}],
            "max_tokens": 50,
        });
        let mut ctx = AdapterContext::default();
        let out = AnthropicAdapter.process(body, &mut ctx).unwrap();
        assert_eq!(out["max_tokens"], 50);
        assert!(out.get("type").is_none());
        assert!(ctx.custom_headers.iter().any(|(k, _)| k == "anthropic-version"));
    }
}
