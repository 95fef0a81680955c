use serde::{Deserialize, Serialize};

use super::message::Message;
use super::tool::{ToolChoice, ToolDefinition};

/// Parameters controlling text generation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionParams {
    /// Sampling temperature (0.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Stop sequences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

/// The canonical OpenAI-shaped completion request the Protocol and
/// ServerCompatibility layers operate on (spec.md §4.5.2, §6)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier — rewritten by the Protocol layer to the
    /// provider's actual model name
    pub model: String,
    /// Conversation messages
    pub messages: Vec<Message>,
    /// Generation parameters — flattened so the wire body carries
    /// `max_tokens`/`temperature`/etc. at the top level (spec.md §4.5.5),
    /// not nested under a `params` key
    #[serde(flatten)]
    pub params: CompletionParams,
    /// Tool definitions available to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// How the model should select tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
}

/// Check the structural shape the Protocol layer requires of a request
/// that just left the Transformer layer (spec.md §4.5.2, §8 "format
/// violation"): a model name and at least one message.
#[must_use]
pub fn validate_openai_shape(req: &CompletionRequest) -> bool {
    !req.model.is_empty() && !req.messages.is_empty()
}
