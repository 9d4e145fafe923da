//! Bedrock Converse API client.
//!
//! Requests are authenticated with a Bedrock API key sent as a bearer token,
//! read from `AWS_BEARER_TOKEN_BEDROCK`.

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::backend::{
    ChatBackend, Provider, ProviderError, ProviderSettings, WirePayload, api_key_from_env,
};
use crate::llm::chat_runtime::post_json;
use crate::llm::message::{ChatMessage, ContentBlock, ToolUse};
use crate::llm::request::ChatRequest;
use crate::llm::response::{ChatResponse, StopReason, Usage};
use crate::llm::tools::{ToolChoice, ToolConfig};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConverseRequest {
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<SystemBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<WireToolConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inference_config: Option<InferenceConfig>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<WireBlock>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum WireBlock {
    Text(String),
    ToolUse(WireToolUse),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireToolUse {
    tool_use_id: String,
    name: String,
    input: Value,
}

#[derive(Debug, Serialize)]
struct SystemBlock {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireToolConfig {
    tools: Vec<WireTool>,
    tool_choice: WireToolChoice,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTool {
    tool_spec: WireToolSpec,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireToolSpec {
    name: String,
    description: String,
    input_schema: WireInputSchema,
}

#[derive(Debug, Serialize)]
struct WireInputSchema {
    json: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum WireToolChoice {
    Auto(EmptyObject),
    Any(EmptyObject),
    Tool(NamedTool),
}

#[derive(Debug, Serialize)]
struct EmptyObject {}

#[derive(Debug, Serialize)]
struct NamedTool {
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InferenceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseResponse {
    output: Option<ConverseOutput>,
    stop_reason: Option<String>,
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    message: Option<OutputMessage>,
}

#[derive(Debug, Deserialize)]
struct OutputMessage {
    #[serde(default)]
    content: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsagePayload {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

/// Client for `POST {endpoint}/model/{modelId}/converse`.
#[derive(Debug, Clone)]
pub struct BedrockClient {
    model: String,
    url: Url,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl BedrockClient {
    pub fn new(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let endpoint = settings.endpoint();
        let url = converse_url(&endpoint, &settings.model).ok_or_else(|| {
            ProviderError::InvalidEndpoint {
                provider: Provider::Bedrock,
                endpoint: endpoint.clone(),
            }
        })?;

        Ok(Self {
            model: settings.model.clone(),
            url,
            api_key: api_key_from_env(Provider::Bedrock),
            client: reqwest::Client::new(),
        })
    }

    /// Overrides the key read from the environment.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

fn converse_url(endpoint: &str, model: &str) -> Option<Url> {
    let mut url = Url::parse(endpoint).ok()?;
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .push("model")
        .push(model)
        .push("converse");
    Some(url)
}

#[async_trait]
impl ChatBackend for BedrockClient {
    fn provider(&self) -> Provider {
        Provider::Bedrock
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn prepare(&self, request: &ChatRequest) -> Result<WirePayload, ProviderError> {
        let body = serde_json::to_value(encode_request(request)).map_err(|source| {
            ProviderError::Encode {
                provider: Provider::Bedrock,
                source,
            }
        })?;
        Ok(WirePayload {
            url: self.url.to_string(),
            body,
        })
    }

    async fn invoke(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingApiKey {
                provider: Provider::Bedrock,
                key_env: Provider::Bedrock.api_key_env(),
            })?;

        tracing::debug!(url = %self.url, model = %self.model, "sending converse request");
        let payload = encode_request(request);
        let body: ConverseResponse = post_json(&self.client, self.url.as_str(), api_key, &payload)
            .await
            .map_err(|failure| failure.into_provider_error(Provider::Bedrock))?;

        decode_response(body)
    }
}

fn encode_request(request: &ChatRequest) -> ConverseRequest {
    let inference = request.inference;
    ConverseRequest {
        messages: request.messages.iter().map(encode_message).collect(),
        system: request
            .system
            .iter()
            .map(|text| SystemBlock { text: text.clone() })
            .collect(),
        tool_config: request.tool_config.as_ref().map(encode_tool_config),
        inference_config: (!inference.is_empty()).then_some(InferenceConfig {
            max_tokens: inference.max_tokens,
            temperature: inference.temperature,
        }),
    }
}

fn encode_message(message: &ChatMessage) -> WireMessage {
    WireMessage {
        role: message.role().as_str(),
        content: message
            .content()
            .iter()
            .map(|block| match block {
                ContentBlock::Text(text) => WireBlock::Text(text.clone()),
                ContentBlock::ToolUse(tool_use) => WireBlock::ToolUse(WireToolUse {
                    tool_use_id: tool_use.id.clone(),
                    name: tool_use.name.clone(),
                    input: tool_use.input.clone(),
                }),
            })
            .collect(),
    }
}

fn encode_tool_config(config: &ToolConfig) -> WireToolConfig {
    WireToolConfig {
        tools: config
            .tools
            .iter()
            .map(|tool| WireTool {
                tool_spec: WireToolSpec {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    input_schema: WireInputSchema {
                        json: tool.input_schema(),
                    },
                },
            })
            .collect(),
        tool_choice: match &config.choice {
            ToolChoice::Auto => WireToolChoice::Auto(EmptyObject {}),
            ToolChoice::Any => WireToolChoice::Any(EmptyObject {}),
            ToolChoice::Tool(name) => WireToolChoice::Tool(NamedTool { name: name.clone() }),
        },
    }
}

fn decode_response(body: ConverseResponse) -> Result<ChatResponse, ProviderError> {
    let message = body
        .output
        .and_then(|output| output.message)
        .ok_or(ProviderError::EmptyResponse {
            provider: Provider::Bedrock,
        })?;

    let usage = body.usage.map(|usage| Usage {
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
        total_tokens: usage.total_tokens,
    });
    if let Some(usage) = usage {
        tracing::info!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "converse usage"
        );
    }

    Ok(ChatResponse {
        content: message.content.iter().filter_map(decode_block).collect(),
        stop_reason: body
            .stop_reason
            .as_deref()
            .map(StopReason::from_wire)
            .unwrap_or(StopReason::EndTurn),
        usage,
    })
}

fn decode_block(block: &Value) -> Option<ContentBlock> {
    if let Some(text) = block.get("text").and_then(Value::as_str) {
        return Some(ContentBlock::text(text));
    }
    if let Some(tool_use) = block.get("toolUse") {
        return Some(ContentBlock::ToolUse(ToolUse {
            id: tool_use["toolUseId"].as_str().unwrap_or("").to_string(),
            name: tool_use["name"].as_str().unwrap_or("").to_string(),
            input: tool_use.get("input").cloned().unwrap_or(Value::Null),
        }));
    }
    tracing::debug!(?block, "skipping unsupported content block");
    None
}
