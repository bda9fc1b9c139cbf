use std::ops::Index;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessage {
    pub text: String,
    pub is_user: bool,
}

/// A PNG attachment, carried as base64. Images are always user-authored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMessage {
    pub data: String,
}

/// The assistant's request to invoke a tool. `id` is the correlation token
/// assigned by the provider; the matching output carries the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequestMessage {
    pub name: String,
    pub parameters: Map<String, Value>,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutputMessage {
    pub id: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub canceled: bool,
}

/// One atomic element of a conversation.
///
/// Serializes as a tagged object with discriminator `type`, one of
/// `"text" | "image" | "toolrequest" | "tooloutput"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessagePart {
    Text(TextMessage),
    Image(ImageMessage),
    ToolRequest(ToolRequestMessage),
    ToolOutput(ToolOutputMessage),
}

impl MessagePart {
    pub fn user_text<S: Into<String>>(text: S) -> Self {
        MessagePart::Text(TextMessage {
            text: text.into(),
            is_user: true,
        })
    }

    pub fn assistant_text<S: Into<String>>(text: S) -> Self {
        MessagePart::Text(TextMessage {
            text: text.into(),
            is_user: false,
        })
    }

    pub fn image<S: Into<String>>(data: S) -> Self {
        MessagePart::Image(ImageMessage { data: data.into() })
    }

    /// Load a PNG file and wrap it as an image part. The file must already
    /// be a PNG; no re-encoding is attempted.
    pub fn image_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read image file {}", path.display()))?;
        if !bytes.starts_with(PNG_MAGIC) {
            return Err(anyhow!("{} is not a PNG file", path.display()));
        }
        Ok(Self::image(BASE64.encode(bytes)))
    }

    pub fn tool_request<N, I>(name: N, parameters: Map<String, Value>, id: I) -> Self
    where
        N: Into<String>,
        I: Into<String>,
    {
        MessagePart::ToolRequest(ToolRequestMessage {
            name: name.into(),
            parameters,
            id: id.into(),
        })
    }

    pub fn tool_output<I, N, C>(id: I, name: N, content: C, canceled: bool) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        C: Into<String>,
    {
        MessagePart::ToolOutput(ToolOutputMessage {
            id: id.into(),
            name: name.into(),
            content: content.into(),
            canceled,
        })
    }

    pub fn as_text(&self) -> Option<&TextMessage> {
        match self {
            MessagePart::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_tool_request(&self) -> Option<&ToolRequestMessage> {
        match self {
            MessagePart::ToolRequest(request) => Some(request),
            _ => None,
        }
    }

    pub fn as_tool_output(&self) -> Option<&ToolOutputMessage> {
        match self {
            MessagePart::ToolOutput(output) => Some(output),
            _ => None,
        }
    }

    /// Whether this part belongs to the user side of an Anthropic turn.
    /// Tool outputs count as user-supplied there.
    pub fn is_user_turn(&self) -> bool {
        match self {
            MessagePart::Text(text) => text.is_user,
            MessagePart::Image(_) => true,
            MessagePart::ToolRequest(_) => false,
            MessagePart::ToolOutput(_) => true,
        }
    }

    /// This part's own OpenAI wire fragment, before any run grouping.
    pub fn to_openai(&self) -> Value {
        match self {
            MessagePart::Text(text) => json!({
                "role": if text.is_user { "user" } else { "assistant" },
                "content": [{"type": "text", "text": text.text}],
            }),
            MessagePart::Image(image) => json!({
                "role": "user",
                "content": [{
                    "type": "image_url",
                    "image_url": {
                        "url": format!("data:image/png;base64,{}", image.data),
                    },
                }],
            }),
            MessagePart::ToolRequest(request) => json!({
                "role": "assistant",
                "tool_calls": [{
                    "id": request.id,
                    "type": "function",
                    "function": {
                        "name": request.name,
                        "arguments": Value::Object(request.parameters.clone()).to_string(),
                    },
                }],
            }),
            MessagePart::ToolOutput(output) => json!({
                "role": "tool",
                "content": output.content,
                "tool_call_id": output.id,
            }),
        }
    }

    /// This part's own Anthropic wire fragment, before any run grouping.
    pub fn to_anthropic(&self) -> Value {
        match self {
            // Text is identical in both formats
            MessagePart::Text(_) => self.to_openai(),
            MessagePart::Image(image) => json!({
                "role": "user",
                "content": [{
                    "type": "image",
                    "source": {
                        "type": "base64",
                        "media_type": "image/png",
                        "data": image.data,
                    },
                }],
            }),
            MessagePart::ToolRequest(request) => json!({
                "role": "assistant",
                "content": [{
                    "type": "tool_use",
                    "name": request.name,
                    "input": request.parameters,
                    "id": request.id,
                }],
            }),
            MessagePart::ToolOutput(output) => json!({
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": output.id,
                    "content": output.content,
                }],
            }),
        }
    }
}

/// The ordered conversation, owned by the session. Insertion order is the
/// conversation order and is the only ordering signal the normalizers see.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageHistory(Vec<MessagePart>);

impl MessageHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(parts: Vec<MessagePart>) -> Self {
        MessageHistory(parts)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MessagePart> {
        self.0.get(index)
    }

    pub fn last(&self) -> Option<&MessagePart> {
        self.0.last()
    }

    pub fn as_slice(&self) -> &[MessagePart] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MessagePart> {
        self.0.iter()
    }

    pub fn append(&mut self, part: MessagePart) {
        self.0.push(part);
    }

    pub fn extend(&mut self, parts: Vec<MessagePart>) {
        self.0.extend(parts);
    }

    pub fn insert(&mut self, index: usize, part: MessagePart) {
        self.0.insert(index, part);
    }

    pub fn remove(&mut self, index: usize) -> MessagePart {
        self.0.remove(index)
    }
}

impl Index<usize> for MessageHistory {
    type Output = MessagePart;

    fn index(&self, index: usize) -> &MessagePart {
        &self.0[index]
    }
}

impl<'a> IntoIterator for &'a MessageHistory {
    type Item = &'a MessagePart;
    type IntoIter = std::slice::Iter<'a, MessagePart>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for MessageHistory {
    type Item = MessagePart;
    type IntoIter = std::vec::IntoIter<MessagePart>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<MessagePart> for MessageHistory {
    fn from_iter<T: IntoIterator<Item = MessagePart>>(iter: T) -> Self {
        MessageHistory(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_message_serialize_and_back() {
        let parts = vec![
            MessagePart::user_text("User message 1"),
            MessagePart::assistant_text("Assistant message 1"),
            MessagePart::image("image"),
            MessagePart::tool_request("tool_1", params(&[("param1", json!("value1"))]), "1"),
            MessagePart::tool_output("1", "tool_1", "tool output", false),
        ];

        for part in parts {
            let as_json = serde_json::to_value(&part).unwrap();
            let back: MessagePart = serde_json::from_value(as_json).unwrap();
            assert_eq!(back, part);
        }
    }

    #[test]
    fn test_message_history_serialize_and_back() {
        let history = MessageHistory::from_parts(vec![
            MessagePart::user_text("User message 1"),
            MessagePart::assistant_text("Assistant message 1"),
            MessagePart::image("image=="),
            MessagePart::tool_request(
                "tool_1",
                params(&[("param1", json!(17.5)), ("param2", json!("value2"))]),
                "1",
            ),
        ]);

        let expected = json!([
            {"type": "text", "text": "User message 1", "is_user": true},
            {"type": "text", "text": "Assistant message 1", "is_user": false},
            {"type": "image", "data": "image=="},
            {
                "type": "toolrequest",
                "name": "tool_1",
                "parameters": {"param1": 17.5, "param2": "value2"},
                "id": "1",
            },
        ]);

        let dumped = serde_json::to_value(&history).unwrap();
        assert_eq!(dumped, expected);

        let back: MessageHistory = serde_json::from_value(dumped).unwrap();
        assert_eq!(back, history);
    }

    #[test]
    fn test_tool_output_canceled_defaults_to_false() {
        let raw = json!({
            "type": "tooloutput",
            "id": "1",
            "name": "tool_1",
            "content": "ok",
        });

        let part: MessagePart = serde_json::from_value(raw).unwrap();
        let output = part.as_tool_output().unwrap();
        assert!(!output.canceled);
    }

    #[test]
    fn test_is_user_turn_classification() {
        assert!(MessagePart::user_text("hi").is_user_turn());
        assert!(!MessagePart::assistant_text("hi").is_user_turn());
        assert!(MessagePart::image("data").is_user_turn());
        assert!(!MessagePart::tool_request("t", Map::new(), "1").is_user_turn());
        assert!(MessagePart::tool_output("1", "t", "out", false).is_user_turn());
    }

    #[test]
    fn test_tool_request_arguments_keep_declaration_order() {
        let part = MessagePart::tool_request(
            "tool_name",
            params(&[("b", json!(1)), ("a", json!(2))]),
            "1",
        );
        let wire = part.to_openai();
        assert_eq!(
            wire["tool_calls"][0]["function"]["arguments"],
            json!(r#"{"b":1,"a":2}"#)
        );
    }

    #[test]
    fn test_image_from_path_rejects_non_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        assert!(MessagePart::image_from_path(&path).is_err());
    }

    #[test]
    fn test_image_from_path_encodes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.png");
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.extend_from_slice(b"rest of the file");
        std::fs::write(&path, &bytes).unwrap();

        let part = MessagePart::image_from_path(&path).unwrap();
        match part {
            MessagePart::Image(image) => assert_eq!(image.data, BASE64.encode(bytes)),
            other => panic!("Expected an image part, got {:?}", other),
        }
    }
}
