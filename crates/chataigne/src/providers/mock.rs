use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;

use super::base::Provider;
use crate::models::message::{MessageHistory, MessagePart};
use crate::models::tool::Tool;

/// A provider that returns pre-configured replies, for tests and offline
/// sessions.
pub struct MockProvider {
    replies: Arc<Mutex<Vec<Vec<MessagePart>>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of replies; each call to
    /// `complete` consumes the next one.
    pub fn new(replies: Vec<Vec<MessagePart>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies)),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn complete(
        &self,
        _system: &str,
        _messages: &MessageHistory,
        _tools: &[Tool],
    ) -> Result<Vec<MessagePart>> {
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            // Return an empty reply if no more pre-configured responses
            Ok(vec![MessagePart::assistant_text("")])
        } else {
            Ok(replies.remove(0))
        }
    }
}

/// Repeats the most recent user text, prefixed so it is recognizable.
#[derive(Default)]
pub struct EchoProvider;

impl EchoProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &str {
        "Echo"
    }

    async fn complete(
        &self,
        _system: &str,
        messages: &MessageHistory,
        _tools: &[Tool],
    ) -> Result<Vec<MessagePart>> {
        let last_user_text = messages
            .iter()
            .rev()
            .filter_map(|part| part.as_text())
            .find(|text| text.is_user)
            .map(|text| text.text.clone())
            .unwrap_or_default();

        Ok(vec![MessagePart::assistant_text(format!(
            "Echo: {}",
            last_user_text
        ))])
    }
}
