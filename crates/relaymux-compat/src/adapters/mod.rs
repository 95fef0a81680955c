//! Per-tag compatibility adapters

mod anthropic;
mod local;
mod passthrough;
mod qwen_family;

pub use anthropic::AnthropicAdapter;
pub use local::{LmStudioAdapter, OllamaAdapter, VllmAdapter};
pub use passthrough::PassthroughAdapter;
pub use qwen_family::{IflowAdapter, ModelscopeAdapter, QwenAdapter};
