use relaymux_core::GatewayError;

use crate::{Adapter, AdapterContext};

/// LM Studio's OpenAI-compatible server rejects an explicit `null`
/// `tool_choice`; strip it rather than send the field at all.
fn strip_null_tool_choice(mut body: serde_json::Value) -> serde_json::Value {
    if let Some(obj) = body.as_object_mut()
        && matches!(obj.get("tool_choice"), Some(serde_json::Value::Null))
    {
        obj.remove("tool_choice");
    }
    body
}

/// LM Studio local inference server (spec.md §4.1 `lmstudio` tag)
#[derive(Debug, Default)]
pub struct LmStudioAdapter;

impl Adapter for LmStudioAdapter {
    fn name(&self) -> &'static str {
        "lmstudio"
    }

    fn process(&self, request: serde_json::Value, _ctx: &mut AdapterContext) -> Result<serde_json::Value, GatewayError> {
        Ok(strip_null_tool_choice(request))
    }
}

/// Ollama local inference server (spec.md §4.1 `ollama` tag)
///
/// Ollama's OpenAI-compatible endpoint accepts the standard body, but
/// ignores `max_tokens` there unless mirrored into its native
/// `options.num_predict` field.
#[derive(Debug, Default)]
pub struct OllamaAdapter;

impl Adapter for OllamaAdapter {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn process(&self, request: serde_json::Value, _ctx: &mut AdapterContext) -> Result<serde_json::Value, GatewayError> {
        let mut body = strip_null_tool_choice(request);

        if let Some(max_tokens) = body.get("max_tokens").and_then(serde_json::Value::as_u64)
            && let Some(obj) = body.as_object_mut()
        {
            obj.insert("options".to_owned(), serde_json::json!({ "num_predict": max_tokens }));
        }

        Ok(body)
    }
}

/// vLLM inference server (spec.md §4.1 `vllm` tag)
///
/// vLLM's OpenAI-compatible server requires `stream` to be present rather
/// than implicitly defaulted.
#[derive(Debug, Default)]
pub struct VllmAdapter;

impl Adapter for VllmAdapter {
    fn name(&self) -> &'static str {
        "vllm"
    }

    fn process(&self, request: serde_json::Value, _ctx: &mut AdapterContext) -> Result<serde_json::Value, GatewayError> {
        let mut body = strip_null_tool_choice(request);
        if let Some(obj) = body.as_object_mut()
            && !obj.contains_key("stream")
        {
            obj.insert("stream".to_owned(), serde_json::Value::Bool(false));
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lmstudio_strips_null_tool_choice() {
        let body = serde_json::json!({"model": "m", "messages": [], "tool_choice": null});
        let mut ctx = AdapterContext::default();
        let out = LmStudioAdapter.process(body, &mut ctx).unwrap();
        assert!(out.get("tool_choice").is_none());
    }

    #[test]
    fn ollama_mirrors_max_tokens_into_options() {
        let body = serde_json::json!({"model": "m", "messages": [], "max_tokens": 128});
        let mut ctx = AdapterContext::default();
        let out = OllamaAdapter.process(body, &mut ctx).unwrap();
        assert_eq!(out["options"]["num_predict"], 128);
    }

    #[test]
    fn vllm_sets_explicit_stream_false() {
        let body = serde_json::json!({"model": "m", "messages": []});
        let mut ctx = AdapterContext::default();
        let out = VllmAdapter.process(body, &mut ctx).unwrap();
        assert_eq!(out["stream"], false);
    }
}
