use anyhow::Result;

use super::anthropic::AnthropicProvider;
use super::base::Provider;
use super::mock::EchoProvider;
use super::openai::OpenAiProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    OpenAi,
    Anthropic,
    Echo,
}

/// Build a provider of the given kind, reading its configuration from the
/// environment. `Echo` needs no configuration.
pub fn get_provider(provider_type: ProviderType) -> Result<Box<dyn Provider>> {
    match provider_type {
        ProviderType::OpenAi => Ok(Box::new(OpenAiProvider::from_env()?)),
        ProviderType::Anthropic => Ok(Box::new(AnthropicProvider::from_env()?)),
        ProviderType::Echo => Ok(Box::new(EchoProvider::new())),
    }
}
