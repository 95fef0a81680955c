//! Internal canonical types used between the Transformer and Server layers
//!
//! These are provider-agnostic and shaped like the OpenAI chat-completions
//! dialect, since that is the Protocol layer's expected input for the
//! common case (spec.md §4.5.2).

pub mod message;
pub mod request;
pub mod response;
pub mod stream;
pub mod tool;

pub use message::{Content, ContentPart, FunctionCall, Message, Role, ToolCall};
pub use request::{validate_openai_shape, CompletionParams, CompletionRequest};
pub use response::{build_tool_call, Choice, ChoiceMessage, CompletionResponse, FinishReason, Usage};
pub use stream::{StreamDelta, StreamEvent, StreamFunctionCall, StreamToolCall};
pub use tool::{FunctionDefinition, ToolChoice, ToolChoiceFunction, ToolChoiceFunctionName, ToolChoiceMode, ToolDefinition};
