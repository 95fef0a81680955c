//! Router layer: maps a client request onto a virtual model (spec.md §4.5.1
//! step a)
//!
//! The mapping function is heuristic-plus-configuration, not a fixed table
//! (spec.md §3 GLOSSARY "Virtual model"; §9 explicitly leaves the
//! token-count threshold undetermined). Two request characteristics drive
//! it here: presence of an image content block, and an estimated input
//! token count.

use relaymux_config::RequestConfig;
use relaymux_core::RequestPriority;
use serde_json::Value;

/// Compute the virtual model a request should be routed under.
///
/// Image content takes precedence over length: a long conversation that
/// also contains an image is still routed to `imageProcessing`, since the
/// image is what constrains which pipelines can serve it.
#[must_use]
pub fn map_virtual_model(body: &Value, config: &RequestConfig) -> String {
    if contains_image(body) {
        return config.image_processing_virtual_model.clone();
    }
    if estimate_input_tokens(body) > config.long_context_token_threshold {
        return config.long_context_virtual_model.clone();
    }
    "default".to_owned()
}

/// Read the client-supplied per-request priority (spec.md §4.6
/// "`priority=high`/`low`"), defaulting to medium when absent or
/// unrecognized. This is independent of a pipeline's own configured
/// priority and only affects the priority-based selection algorithm.
#[must_use]
pub fn request_priority(body: &Value) -> RequestPriority {
    match body.get("priority").and_then(Value::as_str) {
        Some(s) if s.eq_ignore_ascii_case("high") => RequestPriority::High,
        Some(s) if s.eq_ignore_ascii_case("low") => RequestPriority::Low,
        _ => RequestPriority::Medium,
    }
}

/// Rough token estimate: total character count of text-ish fields divided
/// by four. Good enough to trigger a routing heuristic; not a tokenizer.
fn estimate_input_tokens(body: &Value) -> usize {
    let mut chars = 0usize;

    if let Some(system) = body.get("system").and_then(Value::as_str) {
        chars += system.len();
    }

    if let Some(messages) = body.get("messages").and_then(Value::as_array) {
        for message in messages {
            chars += content_char_count(message.get("content").unwrap_or(&Value::Null));
        }
    }

    chars / 4
}

fn content_char_count(content: &Value) -> usize {
    match content {
        Value::String(s) => s.len(),
        Value::Array(blocks) => blocks
            .iter()
            .map(|block| block.get("text").and_then(Value::as_str).map_or(0, str::len))
            .sum(),
        _ => 0,
    }
}

/// Whether any message content block is an Anthropic `image` block
fn contains_image(body: &Value) -> bool {
    let Some(messages) = body.get("messages").and_then(Value::as_array) else {
        return false;
    };

    messages.iter().any(|message| match message.get("content") {
        Some(Value::Array(blocks)) => blocks.iter().any(|block| block.get("type").and_then(Value::as_str) == Some("image")),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RequestConfig {
        let mut config = RequestConfig::default();
        config.long_context_token_threshold = 10;
        config
    }

    #[test]
    fn short_plain_text_maps_to_default() {
        let body = serde_json::json!({"messages": [{"role": "user", "content": "hi"}]});
        assert_eq!(map_virtual_model(&body, &config()), "default");
    }

    #[test]
    fn long_text_maps_to_long_context() {
        let body = serde_json::json!({"messages": [{"role": "user", "content": "word ".repeat(50)}]});
        assert_eq!(map_virtual_model(&body, &config()), "longContext");
    }

    #[test]
    fn image_block_maps_to_image_processing_even_if_short() {
        let body = serde_json::json!({
            "messages": [{"role": "user", "content": [{"type": "image", "source": {}}]}],
        });
        assert_eq!(map_virtual_model(&body, &config()), "imageProcessing");
    }

    #[test]
    fn image_takes_precedence_over_length() {
        let mut content: Vec<Value> = vec![Value::from("word ".repeat(50))];
        content.push(serde_json::json!({"type": "image", "source": {}}));
        let body = serde_json::json!({"messages": [{"role": "user", "content": content}]});
        assert_eq!(map_virtual_model(&body, &config()), "imageProcessing");
    }

    #[test]
    fn missing_priority_field_defaults_to_medium() {
        let body = serde_json::json!({"messages": []});
        assert_eq!(request_priority(&body), RequestPriority::Medium);
    }

    #[test]
    fn priority_field_is_case_insensitive() {
        let body = serde_json::json!({"messages": [], "priority": "HIGH"});
        assert_eq!(request_priority(&body), RequestPriority::High);
    }

    #[test]
    fn unrecognized_priority_value_defaults_to_medium() {
        let body = serde_json::json!({"messages": [], "priority": "urgent"});
        assert_eq!(request_priority(&body), RequestPriority::Medium);
    }
}
