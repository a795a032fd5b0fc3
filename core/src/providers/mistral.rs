use crate::error::{AgentError, Result};
use crate::traits::{ChatMessage, ChatRequest, ChatResponse, Provider, ToolCall, ToolSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct MistralRequest<'a> {
    model: String,
    messages: Vec<MistralMessage<'a>>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<MistralTool>>,
}

#[derive(Debug, Serialize)]
struct MistralMessage<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<MistralToolCallRequest<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct MistralToolCallRequest<'a> {
    id: &'a str,
    function: MistralFunctionRequest<'a>,
}

#[derive(Debug, Serialize)]
struct MistralFunctionRequest<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Debug, Serialize)]
struct MistralTool {
    r#type: String,
    function: MistralToolFunction,
}

#[derive(Debug, Serialize)]
struct MistralToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct MistralResponse {
    choices: Vec<MistralChoice>,
}

#[derive(Debug, Deserialize)]
struct MistralChoice {
    message: MistralResponseMessage,
}

#[derive(Debug, Deserialize)]
struct MistralResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<MistralToolCall>>,
}

#[derive(Debug, Deserialize)]
struct MistralToolCall {
    id: String,
    function: MistralFunction,
}

#[derive(Debug, Deserialize)]
struct MistralFunction {
    name: String,
    arguments: String,
}

pub struct MistralProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f64,
}

impl MistralProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.into(),
            model: "mistral-large-latest".to_string(),
            base_url: "https://api.mistral.ai/v1".to_string(),
            temperature: 0.0,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    fn convert_messages<'a>(&self, messages: &'a [ChatMessage]) -> Vec<MistralMessage<'a>> {
        messages
            .iter()
            .map(|m| {
                let tool_calls = m.tool_calls.as_ref().map(|tool_calls| {
                    tool_calls
                        .iter()
                        .map(|tc| MistralToolCallRequest {
                            id: &tc.id,
                            function: MistralFunctionRequest {
                                name: &tc.name,
                                arguments: &tc.arguments,
                            },
                        })
                        .collect()
                });

                MistralMessage {
                    role: &m.role,
                    content: m.content.as_str(),
                    tool_calls,
                    tool_call_id: m.tool_call_id.as_deref(),
                }
            })
            .collect()
    }

    fn convert_tools(&self, tools: &[ToolSpec]) -> Vec<MistralTool> {
        tools
            .iter()
            .map(|t| MistralTool {
                r#type: "function".to_string(),
                function: MistralToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters_schema.clone(),
                },
            })
            .collect()
    }
}

#[async_trait]
impl Provider for MistralProvider {
    async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatResponse> {
        let mistral_request = MistralRequest {
            model: self.model.clone(),
            messages: self.convert_messages(request.messages),
            temperature: self.temperature,
            tools: request.tools.map(|t| self.convert_tools(t)),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&mistral_request)
            .send()
            .await
            .map_err(|e| AgentError::OracleUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AgentError::OracleUnavailable(format!(
                "Mistral API error {}: {}",
                status, error_text
            )));
        }

        let mistral_response: MistralResponse = response
            .json()
            .await
            .map_err(|e| AgentError::OracleUnavailable(e.to_string()))?;

        let choice = mistral_response.choices.into_iter().next().ok_or_else(|| {
            AgentError::ProtocolViolation("no choices in oracle response".to_string())
        })?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|c| ToolCall {
                id: c.id,
                name: c.function.name,
                arguments: c.function.arguments,
            })
            .collect();

        Ok(ChatResponse {
            text: choice.message.content,
            tool_calls,
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}
