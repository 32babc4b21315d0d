//! Translation between the two wire conventions.
//!
//! Requests are translated when a target provider only speaks the other
//! convention; non-streaming responses are translated back so callers
//! always receive the convention they asked in. Only the fields both
//! conventions share survive translation; convention-specific extras are
//! dropped rather than forwarded as unknown parameters.

use relay_core::anthropic::DEFAULT_MAX_TOKENS;
use relay_core::message::content_to_text;
use relay_core::{
    AnthropicUsage, ChatChoice, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
    ContentBlock, MessagesRequest, MessagesResponse, Usage,
};
use serde_json::Value;

/// Chat-completion request to messages-style request.
///
/// System messages move to the dedicated `system` field; `max_tokens`
/// gets the convention's default when absent.
#[must_use]
pub fn openai_to_anthropic(req: &ChatCompletionRequest) -> MessagesRequest {
    let mut system_parts = Vec::new();
    let mut messages = Vec::new();

    for msg in &req.messages {
        if msg.role == "system" {
            let text = msg.content_text();
            if !text.is_empty() {
                system_parts.push(text);
            }
        } else {
            let role = if msg.role == "assistant" {
                "assistant"
            } else {
                "user"
            };
            messages.push(ChatMessage {
                role: role.to_string(),
                content: msg.content.clone(),
                extra: serde_json::Map::new(),
            });
        }
    }

    MessagesRequest {
        model: req.model.clone(),
        messages,
        system: if system_parts.is_empty() {
            None
        } else {
            Some(Value::String(system_parts.join("\n\n")))
        },
        max_tokens: req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        stream: req.stream,
        temperature: req.temperature,
        extra: serde_json::Map::new(),
    }
}

/// Messages-style request to chat-completion request.
#[must_use]
pub fn anthropic_to_openai(req: &MessagesRequest) -> ChatCompletionRequest {
    let mut messages = Vec::new();
    if let Some(system) = &req.system {
        let text = content_to_text(system);
        if !text.is_empty() {
            messages.push(ChatMessage::text("system", text));
        }
    }
    for msg in &req.messages {
        messages.push(ChatMessage {
            role: msg.role.clone(),
            content: msg.content.clone(),
            extra: serde_json::Map::new(),
        });
    }

    ChatCompletionRequest {
        model: req.model.clone(),
        messages,
        stream: req.stream,
        max_tokens: Some(req.max_tokens),
        temperature: req.temperature,
        extra: serde_json::Map::new(),
    }
}

/// Messages-style response to chat-completion response.
#[must_use]
pub fn anthropic_response_to_openai(resp: &MessagesResponse) -> ChatCompletionResponse {
    let usage = Usage {
        prompt_tokens: resp.usage.input_tokens,
        completion_tokens: resp.usage.output_tokens,
        total_tokens: resp.usage.input_tokens + resp.usage.output_tokens,
    };

    ChatCompletionResponse {
        id: resp.id.clone(),
        object: "chat.completion".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: resp.model.clone(),
        choices: vec![ChatChoice {
            index: 0,
            message: ChatMessage::text("assistant", resp.text()),
            finish_reason: resp.stop_reason.as_deref().map(stop_reason_to_finish),
            extra: serde_json::Map::new(),
        }],
        usage: Some(usage),
        extra: serde_json::Map::new(),
    }
}

/// Chat-completion response to messages-style response.
#[must_use]
pub fn openai_response_to_anthropic(resp: &ChatCompletionResponse) -> MessagesResponse {
    let text = resp
        .choices
        .first()
        .map(|c| c.message.content_text())
        .unwrap_or_default();
    let stop_reason = resp
        .choices
        .first()
        .and_then(|c| c.finish_reason.as_deref())
        .map(finish_to_stop_reason);
    let usage = resp.usage.clone().unwrap_or_default();

    MessagesResponse {
        id: resp.id.clone(),
        kind: "message".to_string(),
        role: "assistant".to_string(),
        content: vec![ContentBlock::text(text)],
        model: resp.model.clone(),
        stop_reason,
        stop_sequence: None,
        usage: AnthropicUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            extra: serde_json::Map::new(),
        },
        extra: serde_json::Map::new(),
    }
}

fn stop_reason_to_finish(stop_reason: &str) -> String {
    match stop_reason {
        "end_turn" | "stop_sequence" => "stop",
        "max_tokens" => "length",
        "tool_use" => "tool_calls",
        other => other,
    }
    .to_string()
}

fn finish_to_stop_reason(finish_reason: &str) -> String {
    match finish_reason {
        "stop" => "end_turn",
        "length" => "max_tokens",
        "tool_calls" => "tool_use",
        other => other,
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chat_request(value: Value) -> ChatCompletionRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn system_messages_move_to_system_field() {
        let req = chat_request(json!({
            "model": "m",
            "messages": [
                {"role": "system", "content": "be terse"},
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"},
            ]
        }));
        let out = openai_to_anthropic(&req);
        assert_eq!(out.system, Some(json!("be terse")));
        assert_eq!(out.messages.len(), 2);
        assert_eq!(out.messages[0].role, "user");
        assert_eq!(out.messages[1].role, "assistant");
        assert_eq!(out.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn explicit_max_tokens_survives() {
        let req = chat_request(json!({
            "model": "m",
            "max_tokens": 99,
            "messages": [{"role": "user", "content": "hi"}]
        }));
        assert_eq!(openai_to_anthropic(&req).max_tokens, 99);
    }

    #[test]
    fn anthropic_system_becomes_leading_system_message() {
        let req: MessagesRequest = serde_json::from_value(json!({
            "model": "m",
            "max_tokens": 64,
            "system": "rules",
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .unwrap();
        let out = anthropic_to_openai(&req);
        assert_eq!(out.messages[0].role, "system");
        assert_eq!(out.messages[0].content, json!("rules"));
        assert_eq!(out.max_tokens, Some(64));
    }

    #[test]
    fn anthropic_response_maps_usage_and_stop_reason() {
        let resp: MessagesResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-haiku",
            "content": [{"type": "text", "text": "hi"}],
            "stop_reason": "max_tokens",
            "usage": {"input_tokens": 10, "output_tokens": 7}
        }))
        .unwrap();
        let out = anthropic_response_to_openai(&resp);
        assert_eq!(out.object, "chat.completion");
        assert_eq!(out.choices[0].message.content, json!("hi"));
        assert_eq!(out.choices[0].finish_reason.as_deref(), Some("length"));
        let usage = out.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.completion_tokens, 7);
        assert_eq!(usage.total_tokens, 17);
    }

    #[test]
    fn openai_response_maps_to_message_envelope() {
        let resp: ChatCompletionResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 0,
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "hey"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 4, "completion_tokens": 2, "total_tokens": 6}
        }))
        .unwrap();
        let out = openai_response_to_anthropic(&resp);
        assert_eq!(out.kind, "message");
        assert_eq!(out.content[0].text.as_deref(), Some("hey"));
        assert_eq!(out.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(out.usage.input_tokens, 4);
        assert_eq!(out.usage.output_tokens, 2);
    }
}
