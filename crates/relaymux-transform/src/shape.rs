//! Structural shape predicates used as inter-layer post-conditions
//! (spec.md §4.2 "Validation predicate", §4.5).
//!
//! These operate on the raw JSON value threaded between layers, rather
//! than on a parsed type, because by the time the ServerCompatibility
//! layer has run, the body may carry provider-specific fields an adapter
//! added that don't round-trip through our internal types.

use serde_json::Value;

/// An object is "OpenAI-shaped" iff it has a non-empty `model` field and a
/// `messages` array, and lacks the response-only Anthropic markers
/// (`type: "message"`, a top-level `stop_reason`, or a top-level `content`
/// array) — spec.md §4.2.
#[must_use]
pub fn is_openai_shaped(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };

    let has_model = obj.get("model").and_then(Value::as_str).is_some_and(|s| !s.is_empty());
    let has_messages = obj.get("messages").is_some_and(Value::is_array);

    has_model && has_messages && !is_anthropic_shaped(value)
}

/// Whether `value` carries any of the Anthropic response-shape markers
/// (spec.md §4.2, §4.5.3)
#[must_use]
pub fn is_anthropic_shaped(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };

    let is_message_type = obj.get("type").and_then(Value::as_str) == Some("message");
    let has_stop_reason = obj.contains_key("stop_reason");
    let has_top_level_content_array = obj.get("content").is_some_and(Value::is_array);

    is_message_type || has_stop_reason || has_top_level_content_array
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_request_shape_passes() {
        let v = serde_json::json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hi"}]});
        assert!(is_openai_shaped(&v));
    }

    #[test]
    fn missing_model_fails() {
        let v = serde_json::json!({"messages": []});
        assert!(!is_openai_shaped(&v));
    }

    #[test]
    fn anthropic_response_shape_is_rejected() {
        let v = serde_json::json!({
            "model": "claude-3-opus",
            "type": "message",
            "stop_reason": "end_turn",
            "content": [{"type": "text", "text": "hi"}],
        });
        assert!(!is_openai_shaped(&v));
        assert!(is_anthropic_shaped(&v));
    }

    #[test]
    fn anthropic_request_shape_is_not_flagged_as_response_shaped() {
        let v = serde_json::json!({
            "model": "claude-3-opus",
            "messages": [{"role": "user", "content": "hi"}],
            "system": "be nice",
            "max_tokens": 100,
        });
        assert!(!is_anthropic_shaped(&v));
        assert!(is_openai_shaped(&v));
    }
}
