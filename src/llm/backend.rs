use std::env;
use std::fmt;

use async_trait::async_trait;
use clap::ValueEnum;
use reqwest::StatusCode;
use serde_json::{Value, json};
use thiserror::Error;

use crate::llm::bedrock::BedrockClient;
use crate::llm::message::ContentBlock;
use crate::llm::openai::OpenAiClient;
use crate::llm::request::ChatRequest;
use crate::llm::response::{ChatResponse, StopReason};

/// Supported chat providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    Bedrock,
    Openai,
    Fireworks,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Bedrock, Provider::Openai, Provider::Fireworks];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bedrock => "bedrock",
            Self::Openai => "openai",
            Self::Fireworks => "fireworks",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|provider| provider.as_str().eq_ignore_ascii_case(raw))
    }

    /// Human-readable name used in user-facing messages.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Bedrock => "Bedrock",
            Self::Openai => "OpenAI",
            Self::Fireworks => "Fireworks",
        }
    }

    pub fn supported_values() -> String {
        Self::ALL
            .iter()
            .map(|provider| provider.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn api_key_env(self) -> &'static str {
        match self {
            Self::Bedrock => "AWS_BEARER_TOKEN_BEDROCK",
            Self::Openai => "OPENAI_API_KEY",
            Self::Fireworks => "FIREWORKS_API_KEY",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::Bedrock => "anthropic.claude-3-haiku-20240307-v1:0",
            Self::Openai => "gpt-4o-mini",
            Self::Fireworks => "accounts/fireworks/models/kimi-k2-instruct-0905",
        }
    }

    /// Base endpoint used when none is configured.
    pub fn default_endpoint(self, region: &str) -> String {
        match self {
            Self::Bedrock => format!("https://bedrock-runtime.{region}.amazonaws.com"),
            Self::Openai => "https://api.openai.com/v1".to_string(),
            Self::Fireworks => "https://api.fireworks.ai/inference/v1".to_string(),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads a provider key from the environment, ignoring blank values.
pub fn api_key_from_env(provider: Provider) -> Option<String> {
    env::var(provider.api_key_env())
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Failures talking to a chat provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider's key variable is unset or blank.
    #[error("{key_env} is not set in the environment")]
    MissingApiKey {
        provider: Provider,
        key_env: &'static str,
    },
    /// The configured endpoint is not a usable base URL.
    #[error("invalid {provider} endpoint '{endpoint}'")]
    InvalidEndpoint { provider: Provider, endpoint: String },
    /// The request could not be serialized.
    #[error("failed to encode {provider} request")]
    Encode {
        provider: Provider,
        #[source]
        source: serde_json::Error,
    },
    /// Transport failure or an undecodable response body.
    #[error("{provider} request failed")]
    Request {
        provider: Provider,
        #[source]
        source: reqwest::Error,
    },
    /// Non-success HTTP status, with the body as returned.
    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: Provider,
        status: StatusCode,
        body: String,
    },
    /// The reply carried no assistant message.
    #[error("{provider} response did not contain an assistant message")]
    EmptyResponse { provider: Provider },
}

/// Request exactly as it would go over the wire.
#[derive(Debug, Clone)]
pub struct WirePayload {
    pub url: String,
    pub body: Value,
}

/// A chat-completion endpoint.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn provider(&self) -> Provider;

    fn model(&self) -> &str;

    /// Encodes the request into the provider's wire format.
    fn prepare(&self, request: &ChatRequest) -> Result<WirePayload, ProviderError>;

    async fn invoke(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// Connection settings for one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub provider: Provider,
    pub model: String,
    pub region: String,
    pub endpoint: Option<String>,
}

impl ProviderSettings {
    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| self.provider.default_endpoint(&self.region))
    }
}

/// Builds the client for the configured provider, wrapped for dry runs when asked.
pub fn build_backend(
    settings: &ProviderSettings,
    dry_run: bool,
) -> Result<Box<dyn ChatBackend>, ProviderError> {
    let backend: Box<dyn ChatBackend> = match settings.provider {
        Provider::Bedrock => Box::new(BedrockClient::new(settings)?),
        Provider::Openai | Provider::Fireworks => Box::new(OpenAiClient::new(settings)?),
    };

    tracing::debug!(
        provider = %settings.provider,
        model = %settings.model,
        endpoint = %settings.endpoint(),
        api_key_present = api_key_from_env(settings.provider).is_some(),
        dry_run,
        "backend configured"
    );

    if dry_run {
        Ok(Box::new(DryRun::new(backend)))
    } else {
        Ok(backend)
    }
}

pub const DRY_RUN_REPLY: &str = "(dry run: request not sent)";

/// Prints the wire payload instead of sending it.
pub struct DryRun {
    inner: Box<dyn ChatBackend>,
}

impl DryRun {
    pub fn new(inner: Box<dyn ChatBackend>) -> Self {
        Self { inner }
    }

    pub fn describe(&self, request: &ChatRequest) -> Result<Value, ProviderError> {
        let payload = self.inner.prepare(request)?;
        Ok(json!({
            "dry_run": true,
            "provider": self.inner.provider().as_str(),
            "model": self.inner.model(),
            "url": payload.url,
            "request": payload.body,
        }))
    }
}

#[async_trait]
impl ChatBackend for DryRun {
    fn provider(&self) -> Provider {
        self.inner.provider()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    fn prepare(&self, request: &ChatRequest) -> Result<WirePayload, ProviderError> {
        self.inner.prepare(request)
    }

    async fn invoke(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        println!("{}", self.describe(request)?);

        let content = if request.tool_config.is_some() {
            Vec::new()
        } else {
            vec![ContentBlock::text(DRY_RUN_REPLY)]
        };
        Ok(ChatResponse {
            content,
            stop_reason: StopReason::DryRun,
            usage: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parse_is_case_insensitive() {
        assert_eq!(Provider::parse("Bedrock"), Some(Provider::Bedrock));
        assert_eq!(Provider::parse(" fireworks "), Some(Provider::Fireworks));
        assert_eq!(Provider::parse("anthropic"), None);
    }

    #[test]
    fn supported_values_list_every_provider() {
        assert_eq!(Provider::supported_values(), "bedrock, openai, fireworks");
    }

    #[test]
    fn bedrock_endpoint_uses_region() {
        let settings = ProviderSettings {
            provider: Provider::Bedrock,
            model: Provider::Bedrock.default_model().to_string(),
            region: "eu-west-1".to_string(),
            endpoint: None,
        };
        assert_eq!(
            settings.endpoint(),
            "https://bedrock-runtime.eu-west-1.amazonaws.com"
        );
    }

    #[test]
    fn explicit_endpoint_wins() {
        let settings = ProviderSettings {
            provider: Provider::Openai,
            model: "m".to_string(),
            region: "us-east-1".to_string(),
            endpoint: Some("http://localhost:9999/v1".to_string()),
        };
        assert_eq!(settings.endpoint(), "http://localhost:9999/v1");
    }
}
