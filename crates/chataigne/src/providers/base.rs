use anyhow::Result;
use async_trait::async_trait;

use crate::models::message::{MessageHistory, MessagePart};
use crate::models::tool::Tool;

/// Base trait for AI providers (OpenAI, Anthropic, etc)
///
/// A provider shapes the history into its wire format, performs the network
/// call, and parses the reply back into message parts. It never mutates the
/// history; the session appends whatever comes back.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name, shown in interfaces.
    fn name(&self) -> &str;

    /// Generate the next message parts for the conversation. Typically zero
    /// or one text part plus zero or more tool requests.
    async fn complete(
        &self,
        system: &str,
        messages: &MessageHistory,
        tools: &[Tool],
    ) -> Result<Vec<MessagePart>>;
}
