use relaymux_core::GatewayError;

use crate::{Adapter, AdapterContext};

/// Alibaba Qwen cloud API (spec.md §4.1 `qwen` tag)
///
/// Qwen's OpenAI-compatible endpoint additionally honors a
/// `X-DashScope-SSE` header to disable the default server-sent-event
/// framing when `stream` is false.
#[derive(Debug, Default)]
pub struct QwenAdapter;

impl Adapter for QwenAdapter {
    fn name(&self) -> &'static str {
        "qwen"
    }

    fn process(&self, request: serde_json::Value, ctx: &mut AdapterContext) -> Result<serde_json::Value, GatewayError> {
        ctx.custom_headers.push(("X-DashScope-SSE".to_owned(), "disable".to_owned()));
        Ok(request)
    }
}

/// Alibaba ModelScope (spec.md §4.1 `modelscope` tag)
#[derive(Debug, Default)]
pub struct ModelscopeAdapter;

impl Adapter for ModelscopeAdapter {
    fn name(&self) -> &'static str {
        "modelscope"
    }

    fn process(&self, request: serde_json::Value, ctx: &mut AdapterContext) -> Result<serde_json::Value, GatewayError> {
        ctx.custom_headers.push(("X-ModelScope-Accept-Language".to_owned(), "en".to_owned()));
        Ok(request)
    }
}

/// iFlow cloud API (spec.md §4.1 `iflow` tag)
#[derive(Debug, Default)]
pub struct IflowAdapter;

impl Adapter for IflowAdapter {
    fn name(&self) -> &'static str {
        "iflow"
    }

    fn process(&self, request: serde_json::Value, _ctx: &mut AdapterContext) -> Result<serde_json::Value, GatewayError> {
        Ok(request)
    }
}
