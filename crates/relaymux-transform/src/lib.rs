//! The Transformer Set (spec.md §4.2, C2): bidirectional dialect converters
//! between the client-facing Anthropic Messages shape and the canonical
//! OpenAI-shaped internal representation the rest of the pipeline operates
//! on.
//!
//! Selection between dialects is driven entirely by the selected
//! provider's `protocol` field (spec.md §4.5.2): `openai` requires an
//! Anthropic→OpenAI conversion, `anthropic` is a passthrough. There is no
//! dynamic registry here — unlike the ServerCompatibility layer's
//! per-provider adapters (`relaymux-compat`), the transformer set is a
//! fixed, closed pair of directions.

pub mod convert;
mod shape;
pub mod types;
pub mod wire;

pub use convert::anthropic::{internal_to_anthropic_stream_events, AnthropicStreamState};
pub use shape::{is_anthropic_shaped, is_openai_shaped};
pub use types::*;
pub use wire::anthropic::{
    AnthropicContent, AnthropicContentBlock, AnthropicErrorDetail, AnthropicErrorResponse, AnthropicMessage,
    AnthropicRequest, AnthropicResponse, AnthropicStreamEvent, AnthropicTool, AnthropicToolChoice, AnthropicUsage,
};

use relaymux_core::{GatewayError, Protocol};

/// Which wire dialect a request or response is expressed in, independent of
/// which provider protocol ultimately receives it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// The canonical OpenAI chat-completions shape
    Openai,
    /// The Anthropic Messages shape
    Anthropic,
}

/// Convert a client request body, in the Anthropic dialect, into the
/// canonical internal request the Protocol layer expects
///
/// # Errors
///
/// Returns [`GatewayError::TransformerFailed`] if `body` does not parse as
/// an Anthropic request.
pub fn transform_request(body: &serde_json::Value, _target_protocol: Protocol) -> Result<CompletionRequest, GatewayError> {
    // Both protocol targets parse into the same canonical internal shape:
    // for an `openai` provider this is a genuine dialect conversion; for an
    // `anthropic` provider the client's own request is already native, and
    // the ServerCompatibility layer's `AnthropicAdapter` re-expands the
    // canonical shape back to the wire format immediately before dispatch
    // (spec.md §4.5.2, §4.5.4).
    let anthropic: AnthropicRequest = serde_json::from_value(body.clone())
        .map_err(|e| GatewayError::TransformerFailed(format!("invalid anthropic request: {e}")))?;
    Ok(anthropic.into())
}

/// Convert the canonical internal response back into the dialect the
/// client originally spoke (spec.md §4.5.6)
#[must_use]
pub fn transform_response(response: CompletionResponse, client_dialect: Dialect) -> serde_json::Value {
    match client_dialect {
        Dialect::Anthropic => {
            let anthropic: AnthropicResponse = response.into();
            serde_json::to_value(anthropic).unwrap_or(serde_json::Value::Null)
        }
        Dialect::Openai => serde_json::to_value(response).unwrap_or(serde_json::Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_request_rejects_malformed_body() {
        let body = serde_json::json!({"foo": "bar"});
        let err = transform_request(&body, Protocol::Openai).unwrap_err();
        assert!(matches!(err, GatewayError::TransformerFailed(_)));
    }

    #[test]
    fn transform_request_accepts_minimal_anthropic_body() {
        let body = serde_json::json!({
            "model": "claude-3",
            "max_tokens": 50,
            "messages": [{"role": "user", "content": "hi"}],
        });
        let req = transform_request(&body, Protocol::Openai).unwrap();
        assert_eq!(req.model, "claude-3");
        assert_eq!(req.messages.len(), 1);
    }
}
