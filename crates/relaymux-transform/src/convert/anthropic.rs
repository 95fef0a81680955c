//! Bidirectional Anthropic Messages ↔ internal (OpenAI-shaped) conversion
//!
//! This is the transformer invoked when the selected provider's protocol is
//! `openai` and the inbound request speaks Anthropic (spec.md §4.5.2): the
//! forward direction runs on the way in, the reverse direction runs at
//! §4.5.6 to hand the client back an Anthropic-shaped response.

use crate::types::{
    build_tool_call, Choice, ChoiceMessage, CompletionParams, CompletionRequest, CompletionResponse, Content,
    ContentPart, FinishReason, FunctionDefinition, Message, Role, StreamDelta, StreamEvent, StreamFunctionCall,
    StreamToolCall, ToolCall, ToolChoice, ToolChoiceFunction, ToolChoiceFunctionName, ToolChoiceMode, ToolDefinition,
    Usage,
};
use crate::wire::anthropic::{
    AnthropicContent, AnthropicContentBlock, AnthropicImageSource, AnthropicMessage, AnthropicMessageDelta,
    AnthropicRequest, AnthropicResponse, AnthropicResponseBlock, AnthropicStreamContentBlock, AnthropicStreamDelta,
    AnthropicStreamEvent, AnthropicTool, AnthropicToolChoice, AnthropicUsage,
};

/// Default max tokens when not specified (Anthropic requires the field)
const DEFAULT_MAX_TOKENS: u32 = 4096;
/// Default sampling temperature when the client omits it (spec.md §4.5.5)
const DEFAULT_TEMPERATURE: f64 = 0.7;

// -- Inbound: Anthropic wire format -> internal --

impl From<AnthropicRequest> for CompletionRequest {
    fn from(req: AnthropicRequest) -> Self {
        let mut messages: Vec<Message> = Vec::new();

        if let Some(system) = req.system {
            messages.push(Message {
                role: Role::System,
                content: Content::Text(system),
                name: None,
                tool_calls: None,
                tool_call_id: None,
            });
        }

        for msg in req.messages {
            messages.push(anthropic_message_to_internal(msg));
        }

        Self {
            model: req.model,
            messages,
            params: CompletionParams {
                temperature: Some(req.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
                top_p: req.top_p,
                max_tokens: Some(req.max_tokens),
                stop: req.stop_sequences,
            },
            tools: req.tools.map(|tools| tools.into_iter().map(Into::into).collect()),
            tool_choice: req.tool_choice.map(|tc| anthropic_tool_choice_to_internal(&tc)),
            stream: req.stream.unwrap_or(false),
        }
    }
}

fn anthropic_message_to_internal(msg: AnthropicMessage) -> Message {
    let role = match msg.role.as_str() {
        "assistant" => Role::Assistant,
        _ => Role::User,
    };

    match msg.content {
        AnthropicContent::Text(text) => {
            Message { role, content: Content::Text(text), name: None, tool_calls: None, tool_call_id: None }
        }
        AnthropicContent::Blocks(blocks) => {
            let mut text_parts = Vec::new();
            let mut tool_calls = Vec::new();
            let mut tool_call_id = None;
            let mut tool_result_content = None;

            for block in blocks {
                match block {
                    AnthropicContentBlock::Text { text } => {
                        text_parts.push(ContentPart::Text { text });
                    }
                    AnthropicContentBlock::Image { source } => {
                        let url = if source.source_type == "base64" {
                            let mime = source.media_type.unwrap_or_else(|| "image/png".to_owned());
                            format!("data:{mime};base64,{}", source.data)
                        } else {
                            source.data
                        };
                        text_parts.push(ContentPart::Image { url, detail: None });
                    }
                    AnthropicContentBlock::ToolUse { id, name, input } => {
                        let arguments = serde_json::to_string(&input).unwrap_or_else(|_| "{}".to_owned());
                        tool_calls.push(ToolCall { id, function: crate::types::FunctionCall { name, arguments } });
                    }
                    AnthropicContentBlock::ToolResult { tool_use_id, content, .. } => {
                        tool_call_id = Some(tool_use_id);
                        tool_result_content = content;
                    }
                }
            }

            if let Some(tc_id) = tool_call_id {
                return Message {
                    role: Role::Tool,
                    content: Content::Text(tool_result_content.unwrap_or_default()),
                    name: None,
                    tool_calls: None,
                    tool_call_id: Some(tc_id),
                };
            }

            let content = if text_parts.len() == 1 {
                match text_parts.into_iter().next() {
                    Some(ContentPart::Text { text }) => Content::Text(text),
                    Some(other) => Content::Parts(vec![other]),
                    None => Content::Text(String::new()),
                }
            } else if text_parts.is_empty() {
                Content::Text(String::new())
            } else {
                Content::Parts(text_parts)
            };

            Message {
                role,
                content,
                name: None,
                tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
                tool_call_id: None,
            }
        }
    }
}

impl From<AnthropicTool> for ToolDefinition {
    fn from(tool: AnthropicTool) -> Self {
        Self {
            tool_type: "function".to_owned(),
            function: FunctionDefinition { name: tool.name, description: tool.description, parameters: Some(tool.input_schema) },
        }
    }
}

fn anthropic_tool_choice_to_internal(tc: &AnthropicToolChoice) -> ToolChoice {
    match tc.choice_type.as_str() {
        "any" => ToolChoice::Mode(ToolChoiceMode::Required),
        "tool" => tc.name.as_ref().map_or(ToolChoice::Mode(ToolChoiceMode::Auto), |name| {
            ToolChoice::Function(ToolChoiceFunction {
                tool_type: "function".to_owned(),
                function: ToolChoiceFunctionName { name: name.clone() },
            })
        }),
        _ => ToolChoice::Mode(ToolChoiceMode::Auto),
    }
}

// -- Outbound: internal -> Anthropic wire format --

impl From<&CompletionRequest> for AnthropicRequest {
    fn from(req: &CompletionRequest) -> Self {
        let mut system = None;
        let mut messages = Vec::new();

        for msg in &req.messages {
            if msg.role == Role::System {
                system = Some(msg.content.as_text());
            } else {
                messages.push(internal_message_to_anthropic(msg));
            }
        }

        let tools = req.tools.as_ref().map(|tools| {
            tools
                .iter()
                .map(|t| AnthropicTool {
                    name: t.function.name.clone(),
                    description: t.function.description.clone(),
                    input_schema: t.function.parameters.clone().unwrap_or_else(|| serde_json::json!({"type": "object"})),
                })
                .collect()
        });

        let tool_choice = req.tool_choice.as_ref().map(internal_tool_choice_to_anthropic);

        Self {
            model: req.model.clone(),
            max_tokens: req.params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            messages,
            temperature: req.params.temperature,
            top_p: req.params.top_p,
            stop_sequences: req.params.stop.clone(),
            stream: if req.stream { Some(true) } else { None },
            tools,
            tool_choice,
        }
    }
}

fn internal_message_to_anthropic(msg: &Message) -> AnthropicMessage {
    let role = match msg.role {
        Role::Assistant => "assistant",
        Role::Tool | Role::User | Role::System => "user",
    };

    if msg.role == Role::Tool
        && let Some(tool_call_id) = &msg.tool_call_id
    {
        return AnthropicMessage {
            role: "user".to_owned(),
            content: AnthropicContent::Blocks(vec![AnthropicContentBlock::ToolResult {
                tool_use_id: tool_call_id.clone(),
                content: Some(msg.content.as_text()),
                is_error: None,
            }]),
        };
    }

    if let Some(tool_calls) = &msg.tool_calls {
        let mut blocks: Vec<AnthropicContentBlock> = Vec::new();

        let text = msg.content.as_text();
        if !text.is_empty() {
            blocks.push(AnthropicContentBlock::Text { text });
        }

        for tc in tool_calls {
            let input = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|_| serde_json::json!({}));
            blocks.push(AnthropicContentBlock::ToolUse { id: tc.id.clone(), name: tc.function.name.clone(), input });
        }

        return AnthropicMessage { role: role.to_owned(), content: AnthropicContent::Blocks(blocks) };
    }

    let content = match &msg.content {
        Content::Text(text) => AnthropicContent::Text(text.clone()),
        Content::Parts(parts) => {
            let blocks = parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => AnthropicContentBlock::Text { text: text.clone() },
                    ContentPart::Image { url, .. } => {
                        if let Some(rest) = url.strip_prefix("data:")
                            && let Some((mime_and_encoding, data)) = rest.split_once(',')
                        {
                            let media_type = mime_and_encoding.strip_suffix(";base64").unwrap_or(mime_and_encoding);
                            AnthropicContentBlock::Image {
                                source: AnthropicImageSource {
                                    source_type: "base64".to_owned(),
                                    media_type: Some(media_type.to_owned()),
                                    data: data.to_owned(),
                                },
                            }
                        } else {
                            AnthropicContentBlock::Image {
                                source: AnthropicImageSource { source_type: "url".to_owned(), media_type: None, data: url.clone() },
                            }
                        }
                    }
                })
                .collect();
            AnthropicContent::Blocks(blocks)
        }
    };

    AnthropicMessage { role: role.to_owned(), content }
}

fn internal_tool_choice_to_anthropic(choice: &ToolChoice) -> AnthropicToolChoice {
    match choice {
        ToolChoice::Mode(mode) => match mode {
            ToolChoiceMode::None | ToolChoiceMode::Auto => AnthropicToolChoice { choice_type: "auto".to_owned(), name: None },
            ToolChoiceMode::Required => AnthropicToolChoice { choice_type: "any".to_owned(), name: None },
        },
        ToolChoice::Function(func) => AnthropicToolChoice { choice_type: "tool".to_owned(), name: Some(func.function.name.clone()) },
    }
}

// -- Response conversion: OpenAI-shaped internal <-> Anthropic --

impl From<AnthropicResponse> for CompletionResponse {
    fn from(resp: AnthropicResponse) -> Self {
        let now = relaymux_core::now_unix_secs();

        let mut text_content = String::new();
        let mut tool_calls = Vec::new();

        for block in &resp.content {
            match block {
                AnthropicResponseBlock::Text { text } => text_content.push_str(text),
                AnthropicResponseBlock::ToolUse { id, name, input } => {
                    let arguments = serde_json::to_string(input).unwrap_or_else(|_| "{}".to_owned());
                    tool_calls.push(build_tool_call(id.clone(), name.clone(), arguments));
                }
            }
        }

        // Anthropic's content-block stream has no direct analogue for the
        // OpenAI `content_filter` finish reason, so unrecognized stop
        // reasons surface as `None` rather than being force-fit to `Stop`.
        let finish_reason = resp.stop_reason.as_deref().and_then(|s| match s {
            "end_turn" | "stop" => Some(FinishReason::Stop),
            "max_tokens" => Some(FinishReason::Length),
            "tool_use" => Some(FinishReason::ToolCalls),
            _ => None,
        });

        let message = ChoiceMessage {
            role: "assistant".to_owned(),
            content: if tool_calls.is_empty() {
                Some(text_content)
            } else if text_content.is_empty() {
                None
            } else {
                Some(text_content)
            },
            tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
        };

        Self {
            id: resp.id,
            object: "chat.completion".to_owned(),
            created: now,
            model: resp.model,
            choices: vec![Choice { index: 0, message, finish_reason }],
            usage: Some(Usage {
                prompt_tokens: resp.usage.input_tokens,
                completion_tokens: resp.usage.output_tokens,
                total_tokens: resp.usage.input_tokens + resp.usage.output_tokens,
            }),
        }
    }
}

impl From<CompletionResponse> for AnthropicResponse {
    fn from(resp: CompletionResponse) -> Self {
        let choice = resp.choices.into_iter().next();

        let mut content = Vec::new();
        let mut has_tool_calls = false;
        if let Some(ref c) = choice {
            if let Some(text) = &c.message.content {
                content.push(AnthropicResponseBlock::Text { text: text.clone() });
            }
            if let Some(tool_calls) = &c.message.tool_calls {
                has_tool_calls = !tool_calls.is_empty();
                for tc in tool_calls {
                    let input = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|_| serde_json::json!({}));
                    content.push(AnthropicResponseBlock::ToolUse { id: tc.id.clone(), name: tc.function.name.clone(), input });
                }
            }
        }

        // The upstream may report finish_reason="stop" even when it made
        // tool calls; force tool_use in that case so stop_reason always
        // agrees with the presence of a tool_use block.
        let stop_reason = if has_tool_calls {
            Some("tool_use".to_owned())
        } else {
            choice.as_ref().and_then(|c| c.finish_reason.as_ref()).map(|fr| match fr {
                FinishReason::Stop | FinishReason::ContentFilter => "end_turn".to_owned(),
                FinishReason::Length => "max_tokens".to_owned(),
                FinishReason::ToolCalls => "tool_use".to_owned(),
            })
        };

        let usage = resp.usage.unwrap_or_default();

        Self {
            id: resp.id,
            response_type: "message".to_owned(),
            role: "assistant".to_owned(),
            content,
            model: resp.model,
            stop_reason,
            stop_sequence: None,
            usage: AnthropicUsage { input_tokens: usage.prompt_tokens, output_tokens: usage.completion_tokens },
        }
    }
}

// -- Stream conversion --

/// State tracker for converting Anthropic SSE stream events into the
/// internal stream event representation
#[derive(Debug, Default)]
pub struct AnthropicStreamState {
    current_tool_call_index: u32,
    next_tool_call_index: u32,
}

impl AnthropicStreamState {
    /// Create a new stream state tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert one Anthropic stream event to zero or more internal events
    pub fn convert_event(&mut self, event: &AnthropicStreamEvent) -> Vec<StreamEvent> {
        match event {
            AnthropicStreamEvent::MessageStart { .. } | AnthropicStreamEvent::Ping => Vec::new(),

            AnthropicStreamEvent::ContentBlockStart { content_block, .. } => match content_block {
                AnthropicStreamContentBlock::Text { .. } => Vec::new(),
                AnthropicStreamContentBlock::ToolUse { id, name, .. } => {
                    self.current_tool_call_index = self.next_tool_call_index;
                    self.next_tool_call_index += 1;
                    vec![StreamEvent::Delta(StreamDelta {
                        index: 0,
                        content: None,
                        tool_call: Some(StreamToolCall {
                            index: self.current_tool_call_index,
                            id: Some(id.clone()),
                            function: Some(StreamFunctionCall { name: Some(name.clone()), arguments: None }),
                        }),
                        finish_reason: None,
                    })]
                }
            },

            AnthropicStreamEvent::ContentBlockDelta { delta, .. } => match delta {
                AnthropicStreamDelta::TextDelta { text } => {
                    vec![StreamEvent::Delta(StreamDelta { index: 0, content: Some(text.clone()), tool_call: None, finish_reason: None })]
                }
                AnthropicStreamDelta::InputJsonDelta { partial_json } => {
                    vec![StreamEvent::Delta(StreamDelta {
                        index: 0,
                        content: None,
                        tool_call: Some(StreamToolCall {
                            index: self.current_tool_call_index,
                            id: None,
                            function: Some(StreamFunctionCall { name: None, arguments: Some(partial_json.clone()) }),
                        }),
                        finish_reason: None,
                    })]
                }
            },

            AnthropicStreamEvent::ContentBlockStop { .. } => Vec::new(),

            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                let mut events = Vec::new();

                let finish_reason = delta.stop_reason.as_deref().and_then(|s| match s {
                    "end_turn" | "stop" => Some(FinishReason::Stop),
                    "max_tokens" => Some(FinishReason::Length),
                    "tool_use" => Some(FinishReason::ToolCalls),
                    _ => None,
                });

                if finish_reason.is_some() {
                    events.push(StreamEvent::Delta(StreamDelta { index: 0, content: None, tool_call: None, finish_reason }));
                }

                if let Some(usage) = usage {
                    events.push(StreamEvent::Usage(Usage {
                        prompt_tokens: usage.input_tokens,
                        completion_tokens: usage.output_tokens,
                        total_tokens: usage.input_tokens + usage.output_tokens,
                    }));
                }

                events
            }

            AnthropicStreamEvent::MessageStop => vec![StreamEvent::Done],
        }
    }
}

/// Build Anthropic stream events from one internal stream event, for
/// clients that originally spoke the Anthropic dialect (spec.md §4.5.6)
#[must_use]
pub fn internal_to_anthropic_stream_events(event: &StreamEvent) -> Vec<AnthropicStreamEvent> {
    match event {
        StreamEvent::Delta(delta) => {
            let mut events = Vec::new();

            if let Some(content) = &delta.content {
                events.push(AnthropicStreamEvent::ContentBlockDelta {
                    index: 0,
                    delta: AnthropicStreamDelta::TextDelta { text: content.clone() },
                });
            }

            if let Some(tc) = &delta.tool_call
                && let Some(func) = &tc.function
                && let Some(args) = &func.arguments
            {
                events.push(AnthropicStreamEvent::ContentBlockDelta {
                    index: tc.index,
                    delta: AnthropicStreamDelta::InputJsonDelta { partial_json: args.clone() },
                });
            }

            if let Some(finish_reason) = &delta.finish_reason {
                let stop_reason = match finish_reason {
                    FinishReason::Stop | FinishReason::ContentFilter => "end_turn",
                    FinishReason::Length => "max_tokens",
                    FinishReason::ToolCalls => "tool_use",
                };
                events.push(AnthropicStreamEvent::MessageDelta {
                    delta: AnthropicMessageDelta { stop_reason: Some(stop_reason.to_owned()), stop_sequence: None },
                    usage: None,
                });
            }

            events
        }
        StreamEvent::Usage(usage) => vec![AnthropicStreamEvent::MessageDelta {
            delta: AnthropicMessageDelta::default(),
            usage: Some(AnthropicUsage { input_tokens: usage.prompt_tokens, output_tokens: usage.completion_tokens }),
        }],
        StreamEvent::Done => vec![AnthropicStreamEvent::MessageStop],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_anthropic_request() -> AnthropicRequest {
        AnthropicRequest {
            model: "claude-3".to_owned(),
            max_tokens: 50,
            system: None,
            messages: vec![AnthropicMessage { role: "user".to_owned(), content: AnthropicContent::Text("hi".to_owned()) }],
            temperature: Some(0.7),
            top_p: None,
            stop_sequences: None,
            stream: None,
            tools: None,
            tool_choice: None,
        }
    }

    #[test]
    fn round_trip_preserves_core_fields() {
        let original = sample_anthropic_request();
        let internal: CompletionRequest = original.clone().into();
        let back: AnthropicRequest = (&internal).into();

        assert_eq!(back.model, original.model);
        assert_eq!(back.max_tokens, original.max_tokens);
        assert_eq!(back.temperature, original.temperature);
        assert_eq!(back.messages.len(), original.messages.len());
    }

    #[test]
    fn tool_calls_finish_reason_always_yields_tool_use_block() {
        let resp = CompletionResponse {
            id: "resp-1".to_owned(),
            object: "chat.completion".to_owned(),
            created: 0,
            model: "m".to_owned(),
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage {
                    role: "assistant".to_owned(),
                    content: None,
                    tool_calls: Some(vec![build_tool_call("call-1".to_owned(), "search".to_owned(), "{}".to_owned())]),
                },
                finish_reason: Some(FinishReason::ToolCalls),
            }],
            usage: None,
        };

        let anthropic: AnthropicResponse = resp.into();
        assert_eq!(anthropic.stop_reason.as_deref(), Some("tool_use"));
        assert!(anthropic.content.iter().any(|b| matches!(b, AnthropicResponseBlock::ToolUse { .. })));
    }

    #[test]
    fn stop_finish_reason_with_tool_calls_is_forced_to_tool_use() {
        let resp = CompletionResponse {
            id: "resp-2".to_owned(),
            object: "chat.completion".to_owned(),
            created: 0,
            model: "m".to_owned(),
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage {
                    role: "assistant".to_owned(),
                    content: None,
                    tool_calls: Some(vec![build_tool_call("call-1".to_owned(), "search".to_owned(), "{}".to_owned())]),
                },
                finish_reason: Some(FinishReason::Stop),
            }],
            usage: None,
        };

        let anthropic: AnthropicResponse = resp.into();
        assert_eq!(anthropic.stop_reason.as_deref(), Some("tool_use"));
    }

    #[test]
    fn system_message_becomes_top_level_system_field() {
        let req = CompletionRequest {
            model: "m".to_owned(),
            messages: vec![
                Message { role: Role::System, content: Content::Text("be terse".to_owned()), name: None, tool_calls: None, tool_call_id: None },
                Message { role: Role::User, content: Content::Text("hi".to_owned()), name: None, tool_calls: None, tool_call_id: None },
            ],
            params: CompletionParams::default(),
            tools: None,
            tool_choice: None,
            stream: false,
        };

        let anthropic: AnthropicRequest = (&req).into();
        assert_eq!(anthropic.system.as_deref(), Some("be terse"));
        assert_eq!(anthropic.messages.len(), 1);
    }
}
