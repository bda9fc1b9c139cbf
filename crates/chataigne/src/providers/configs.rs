use anyhow::{Context, Result};
use std::env;

pub const OPENAI_HOST: &str = "https://api.openai.com";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o";

pub const ANTHROPIC_HOST: &str = "https://api.anthropic.com";
pub const ANTHROPIC_DEFAULT_MODEL: &str = "claude-3-5-sonnet-20240620";
pub const ANTHROPIC_DEFAULT_MAX_TOKENS: i32 = 4096;

// Both upstream APIs are called with a low, fixed temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
}

impl OpenAiProviderConfig {
    pub fn new(host: String, api_key: String, model: String) -> Self {
        Self {
            host,
            api_key,
            model,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn from_env() -> Result<Self> {
        let host = env::var("OPENAI_HOST").unwrap_or_else(|_| OPENAI_HOST.to_string());
        let api_key = env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?;
        let model = env::var("OPENAI_MODEL").unwrap_or_else(|_| OPENAI_DEFAULT_MODEL.to_string());
        Ok(Self::new(host, api_key, model))
    }
}

#[derive(Debug, Clone)]
pub struct AnthropicProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: i32,
}

impl AnthropicProviderConfig {
    pub fn new(host: String, api_key: String, model: String) -> Self {
        Self {
            host,
            api_key,
            model,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: ANTHROPIC_DEFAULT_MAX_TOKENS,
        }
    }

    pub fn from_env() -> Result<Self> {
        let host = env::var("ANTHROPIC_HOST").unwrap_or_else(|_| ANTHROPIC_HOST.to_string());
        let api_key = env::var("ANTHROPIC_API_KEY").context("ANTHROPIC_API_KEY must be set")?;
        let model =
            env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| ANTHROPIC_DEFAULT_MODEL.to_string());
        Ok(Self::new(host, api_key, model))
    }
}
