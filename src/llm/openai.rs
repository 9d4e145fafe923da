use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::llm::backend::{
    ChatBackend, Provider, ProviderError, ProviderSettings, WirePayload, api_key_from_env,
};
use crate::llm::chat_runtime::post_json;
use crate::llm::message::{ChatMessage, ContentBlock, ToolUse};
use crate::llm::request::ChatRequest;
use crate::llm::response::{ChatResponse, StopReason, Usage};
use crate::llm::tools::{ToolChoice, ToolConfig, ToolSpec};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

/// Chat-completions client shared by OpenAI and Fireworks.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    provider: Provider,
    model: String,
    url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let endpoint = settings.endpoint();
        if reqwest::Url::parse(&endpoint).is_err() {
            return Err(ProviderError::InvalidEndpoint {
                provider: settings.provider,
                endpoint,
            });
        }

        Ok(Self {
            provider: settings.provider,
            model: settings.model.clone(),
            url: format!("{}/chat/completions", endpoint.trim_end_matches('/')),
            api_key: api_key_from_env(settings.provider),
            client: reqwest::Client::new(),
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn encode_request(&self, request: &ChatRequest) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.extend(request.messages.iter().map(encode_message));

        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            tools: request
                .tool_config
                .as_ref()
                .map(|config| config.tools.iter().map(encode_tool).collect()),
            tool_choice: request.tool_config.as_ref().map(encode_tool_choice),
            temperature: request.inference.temperature,
            max_tokens: request.inference.max_tokens,
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn prepare(&self, request: &ChatRequest) -> Result<WirePayload, ProviderError> {
        let body = serde_json::to_value(self.encode_request(request)).map_err(|source| {
            ProviderError::Encode {
                provider: self.provider,
                source,
            }
        })?;
        Ok(WirePayload {
            url: self.url.clone(),
            body,
        })
    }

    async fn invoke(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let provider = self.provider;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingApiKey {
                provider,
                key_env: provider.api_key_env(),
            })?;

        tracing::debug!(url = %self.url, model = %self.model, "sending chat completion request");
        let payload = self.encode_request(request);
        let body: ChatCompletionResponse = post_json(&self.client, &self.url, api_key, &payload)
            .await
            .map_err(|failure| failure.into_provider_error(provider))?;

        decode_response(provider, body)
    }
}

fn encode_message(message: &ChatMessage) -> Value {
    let mut map = Map::new();
    map.insert("role".to_string(), json!(message.role().as_str()));
    map.insert("content".to_string(), Value::String(message.text()));

    let tool_calls = message
        .content()
        .iter()
        .filter_map(ContentBlock::as_tool_use)
        .map(|tool_use| {
            json!({
                "id": tool_use.id,
                "type": "function",
                "function": {
                    "name": tool_use.name,
                    "arguments": tool_use.input.to_string(),
                }
            })
        })
        .collect::<Vec<_>>();
    if !tool_calls.is_empty() {
        map.insert("tool_calls".to_string(), Value::Array(tool_calls));
    }
    Value::Object(map)
}

fn encode_tool(tool: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema(),
        }
    })
}

fn encode_tool_choice(config: &ToolConfig) -> Value {
    match &config.choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::Any => json!("required"),
        ToolChoice::Tool(name) => json!({"type": "function", "function": {"name": name}}),
    }
}

fn decode_response(
    provider: Provider,
    body: ChatCompletionResponse,
) -> Result<ChatResponse, ProviderError> {
    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or(ProviderError::EmptyResponse { provider })?;

    let mut content = Vec::new();
    if let Some(text) = choice.message.content.filter(|text| !text.is_empty()) {
        content.push(ContentBlock::Text(text));
    }
    content.extend(
        choice
            .message
            .tool_calls
            .into_iter()
            .filter(|call| !call.function.name.is_empty())
            .map(|call| {
                ContentBlock::ToolUse(ToolUse {
                    id: call.id,
                    name: call.function.name,
                    input: parse_arguments(call.function.arguments),
                })
            }),
    );

    let usage = body.usage.map(|usage| Usage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    });
    if let Some(usage) = usage {
        tracing::info!(
            %provider,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "chat completion usage"
        );
    }

    Ok(ChatResponse {
        content,
        stop_reason: choice
            .finish_reason
            .as_deref()
            .map(StopReason::from_wire)
            .unwrap_or(StopReason::EndTurn),
        usage,
    })
}

/// Arguments arrive as a JSON-encoded string; fall back to the raw value.
fn parse_arguments(arguments: Value) -> Value {
    match arguments {
        Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(provider: Provider) -> OpenAiClient {
        OpenAiClient::new(&ProviderSettings {
            provider,
            model: provider.default_model().to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
        })
        .expect("default endpoint is valid")
    }

    #[test]
    fn system_prompt_is_sent_as_first_message() {
        let request = ChatRequest::new(vec![ChatMessage::user("hi")]).with_system("be nice");
        let payload = client(Provider::Openai)
            .prepare(&request)
            .expect("encodable");

        assert_eq!(payload.url, "https://api.openai.com/v1/chat/completions");
        assert_eq!(
            payload.body["messages"],
            json!([
                {"role": "system", "content": "be nice"},
                {"role": "user", "content": "hi"}
            ])
        );
        assert!(payload.body.get("tools").is_none());
    }

    #[test]
    fn forced_tool_uses_function_choice() {
        let request = ChatRequest::new(vec![ChatMessage::user("hi")])
            .with_tools(ToolConfig::forced(ToolSpec::new("return_x", "Return x")));
        let payload = client(Provider::Fireworks)
            .prepare(&request)
            .expect("encodable");

        assert_eq!(
            payload.url,
            "https://api.fireworks.ai/inference/v1/chat/completions"
        );
        assert_eq!(
            payload.body["tool_choice"],
            json!({"type": "function", "function": {"name": "return_x"}})
        );
        assert_eq!(payload.body["tools"][0]["function"]["name"], "return_x");
        assert_eq!(
            payload.body["tools"][0]["function"]["parameters"]["type"],
            "object"
        );
    }

    #[test]
    fn tool_call_arguments_are_decoded() {
        let body: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "return_movie_info", "arguments": "{\"movies\":[]}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7}
        }))
        .expect("valid body");

        let response = decode_response(Provider::Openai, body).expect("choice present");
        let tool_use = response.tool_use(None).expect("tool call");
        assert_eq!(tool_use.input, json!({"movies": []}));
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.text(), "");
    }

    #[test]
    fn unparsable_arguments_are_kept_raw() {
        assert_eq!(parse_arguments(json!("{oops")), json!("{oops"));
        assert_eq!(parse_arguments(json!({"a": 1})), json!({"a": 1}));
    }

    #[test]
    fn no_choices_is_an_error() {
        let body: ChatCompletionResponse =
            serde_json::from_value(json!({"choices": []})).expect("valid body");
        assert!(matches!(
            decode_response(Provider::Openai, body),
            Err(ProviderError::EmptyResponse { .. })
        ));
    }
}
