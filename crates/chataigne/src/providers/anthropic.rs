use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::base::Provider;
use super::configs::AnthropicProviderConfig;
use super::utils::{
    anthropic_response_to_messages, messages_to_anthropic_spec, tools_to_anthropic_spec,
};
use crate::models::message::{MessageHistory, MessagePart};
use crate::models::tool::Tool;

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(AnthropicProviderConfig::from_env()?)
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        debug!(model = %self.config.model, "posting messages request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            _ => {
                let status = response.status();
                let error_text = response.text().await?;
                Err(anyhow!("Request failed: {} - {}", status, error_text))
            }
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "Anthropic"
    }

    async fn complete(
        &self,
        system: &str,
        messages: &MessageHistory,
        tools: &[Tool],
    ) -> Result<Vec<MessagePart>> {
        let mut payload = json!({
            "model": self.config.model,
            "system": system,
            "messages": messages_to_anthropic_spec(messages)?,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });
        if !tools.is_empty() {
            payload["tools"] = Value::Array(tools_to_anthropic_spec(tools)?);
        }

        let response = self.post(payload).await?;
        anthropic_response_to_messages(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup_mock_server(response_body: Value) -> (MockServer, AnthropicProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test_api_key"))
            .and(header("anthropic-version", "2023-06-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let config = AnthropicProviderConfig::new(
            mock_server.uri(),
            "test_api_key".to_string(),
            "claude-3-5-sonnet-20240620".to_string(),
        );

        let provider = AnthropicProvider::new(config).unwrap();
        (mock_server, provider)
    }

    #[tokio::test]
    async fn test_complete_basic() -> Result<()> {
        let response_body = json!({
            "id": "msg_123",
            "type": "message",
            "role": "assistant",
            "content": [{
                "type": "text",
                "text": "Hello! How can I assist you today?"
            }],
            "model": "claude-3-5-sonnet-20240620",
            "stop_reason": "end_turn",
            "stop_sequence": null,
            "usage": {"input_tokens": 12, "output_tokens": 15}
        });

        let (_, provider) = setup_mock_server(response_body).await;

        let messages = MessageHistory::from_parts(vec![MessagePart::user_text("Hello?")]);
        let parts = provider
            .complete("You are a helpful assistant.", &messages, &[])
            .await?;

        assert_eq!(
            parts,
            vec![MessagePart::assistant_text(
                "Hello! How can I assist you today?"
            )]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_complete_tool_use() -> Result<()> {
        let response_body = json!({
            "id": "msg_456",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "I'll add those for you."},
                {
                    "type": "tool_use",
                    "id": "toolu_1",
                    "name": "custom_add",
                    "input": {"a": 1, "b": 2}
                }
            ],
            "stop_reason": "tool_use"
        });

        let (_, provider) = setup_mock_server(response_body).await;

        let tool = Tool::new(
            "custom_add",
            "Add two numbers",
            vec![
                crate::models::tool::ToolParam::required("a", json!({"type": "integer"})),
                crate::models::tool::ToolParam::required("b", json!({"type": "integer"})),
            ],
        )
        .unwrap();

        let messages = MessageHistory::from_parts(vec![MessagePart::user_text("Add 1 and 2")]);
        let parts = provider
            .complete("Be straightforward.", &messages, &[tool])
            .await?;

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], MessagePart::assistant_text("I'll add those for you."));
        let request = parts[1].as_tool_request().unwrap();
        assert_eq!(request.name, "custom_add");
        assert_eq!(request.id, "toolu_1");
        assert_eq!(request.parameters["a"], json!(1));

        Ok(())
    }
}
