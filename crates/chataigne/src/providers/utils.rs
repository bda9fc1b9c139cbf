use anyhow::{anyhow, Result};
use regex::Regex;
use serde_json::{Map, Value};

use crate::errors::MergeError;
use crate::merge::merge;
use crate::models::message::{MessageHistory, MessagePart};
use crate::models::tool::Tool;

/// Convert the history to OpenAI's API message specification.
///
/// A single left-to-right scan groups adjacent parts into runs, each run
/// producing one wire message:
/// - a user text absorbs every immediately following image into the same
///   `content` list
/// - an assistant text absorbs every immediately following tool request
///   into the same `tool_calls` list
/// - everything else is its own message
pub fn messages_to_openai_spec(messages: &MessageHistory) -> Result<Vec<Value>, MergeError> {
    let parts = messages.as_slice();
    let mut messages_spec = Vec::new();

    let mut i = 0;
    while i < parts.len() {
        let part = &parts[i];
        let mut converted = part.to_openai();
        i += 1;

        match part {
            MessagePart::Text(text) if text.is_user => {
                while matches!(parts.get(i), Some(MessagePart::Image(_))) {
                    converted = merge(converted, parts[i].to_openai())?;
                    i += 1;
                }
            }
            MessagePart::Text(_) => {
                while matches!(parts.get(i), Some(MessagePart::ToolRequest(_))) {
                    converted = merge(converted, parts[i].to_openai())?;
                    i += 1;
                }
            }
            _ => {}
        }

        messages_spec.push(converted);
    }

    Ok(messages_spec)
}

/// Convert the history to Anthropic's API message specification.
///
/// Anthropic represents a whole turn as one message, and treats tool
/// results as user-supplied. A run is the maximal consecutive stretch of
/// parts with the same `is_user_turn` classification, merged into one
/// message.
///
/// The scan is forward-only: a tool request appearing before its assistant
/// text opens a non-user run of its own, so that run's content starts with
/// the `tool_use` entry. Histories built by this crate never produce that
/// order, and the behavior is kept as is.
pub fn messages_to_anthropic_spec(messages: &MessageHistory) -> Result<Vec<Value>, MergeError> {
    let parts = messages.as_slice();
    let mut messages_spec = Vec::new();

    let mut i = 0;
    while i < parts.len() {
        let user_turn = parts[i].is_user_turn();
        let mut converted = parts[i].to_anthropic();
        i += 1;

        while parts.get(i).is_some_and(|part| part.is_user_turn() == user_turn) {
            converted = merge(converted, parts[i].to_anthropic())?;
            i += 1;
        }

        messages_spec.push(converted);
    }

    Ok(messages_spec)
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }
        result.push(tool.to_openai());
    }

    Ok(result)
}

/// Convert internal Tool format to Anthropic's API tool specification
pub fn tools_to_anthropic_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }
        result.push(tool.to_anthropic());
    }

    Ok(result)
}

/// Parse an OpenAI chat completion response into message parts.
pub fn openai_response_to_messages(response: Value) -> Result<Vec<MessagePart>> {
    let answer = &response["choices"][0]["message"];
    let mut parts = Vec::new();

    if let Some(content) = answer.get("content") {
        match content {
            Value::String(text) => parts.push(MessagePart::assistant_text(text)),
            Value::Null => {}
            other => parts.push(MessagePart::assistant_text(format!(
                "Unrecognized content type: {}",
                other
            ))),
        }
    }

    if let Some(tool_calls) = answer.get("tool_calls").and_then(|v| v.as_array()) {
        for tool_call in tool_calls {
            let id = tool_call["id"].as_str().unwrap_or_default().to_string();
            let name = tool_call["function"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            let arguments = tool_call["function"]["arguments"]
                .as_str()
                .unwrap_or_default();

            if !is_valid_function_name(&name) {
                return Err(anyhow!(
                    "The provided function name '{}' had invalid characters, it must match this regex [a-zA-Z0-9_-]+",
                    name
                ));
            }

            let parameters: Map<String, Value> = serde_json::from_str(arguments).map_err(|e| {
                anyhow!("Could not interpret tool use parameters for id {}: {}", id, e)
            })?;

            parts.push(MessagePart::tool_request(name, parameters, id));
        }
    }

    Ok(parts)
}

/// Parse an Anthropic messages response into message parts.
pub fn anthropic_response_to_messages(response: Value) -> Result<Vec<MessagePart>> {
    let content = response
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| anyhow!("Invalid response format from Anthropic API"))?;

    let mut parts = Vec::new();
    for entry in content {
        match entry["type"].as_str() {
            Some("text") => {
                let text = entry["text"]
                    .as_str()
                    .ok_or_else(|| anyhow!("Text content without a text field"))?;
                parts.push(MessagePart::assistant_text(text));
            }
            Some("tool_use") => {
                let name = entry["name"]
                    .as_str()
                    .ok_or_else(|| anyhow!("Tool use without a name"))?;
                let id = entry["id"]
                    .as_str()
                    .ok_or_else(|| anyhow!("Tool use without an id"))?;
                let parameters = entry["input"]
                    .as_object()
                    .cloned()
                    .ok_or_else(|| anyhow!("Tool use input for id {} is not an object", id))?;
                parts.push(MessagePart::tool_request(name, parameters, id));
            }
            other => {
                parts.push(MessagePart::assistant_text(format!(
                    "Unrecognized content type: {}",
                    other.unwrap_or("none")
                )));
            }
        }
    }

    Ok(parts)
}

fn is_valid_function_name(name: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
    re.is_match(name)
}
