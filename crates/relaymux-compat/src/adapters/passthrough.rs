use relaymux_core::GatewayError;

use crate::{Adapter, AdapterContext};

/// No adjustment: forwards the already OpenAI-shaped body unchanged
/// (spec.md §4.1 default tag)
#[derive(Debug, Default)]
pub struct PassthroughAdapter;

impl Adapter for PassthroughAdapter {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn process(&self, request: serde_json::Value, _ctx: &mut AdapterContext) -> Result<serde_json::Value, GatewayError> {
        Ok(request)
    }
}
