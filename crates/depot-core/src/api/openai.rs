//! OpenAI-compatible chat-completions gateway.

use async_trait::async_trait;
use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::api::error::ApiError;
use crate::api::provider::{Decision, ReasoningProvider};
use crate::app::conversation::{Message, MessageData};
use depot_tools::{ToolCall, ToolSchema};

const PROVIDER_NAME: &str = "openai";
const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const HTTP_TIMEOUT_SECS: u64 = 60;

pub struct OpenAiChatGateway {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OpenAiChatGateway {
    pub fn new(
        api_key: &str,
        base_url: Option<String>,
        model: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|_| ApiError::Configuration("Invalid API key format".to_string()))?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(ApiError::Network)?;

        Ok(Self {
            http_client,
            base_url: base_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            model: model.into(),
        })
    }

    fn convert_message(message: &Message) -> WireMessage {
        match &message.data {
            MessageData::System { content } => WireMessage::System {
                content: content.clone(),
            },
            MessageData::User { content } => WireMessage::User {
                content: content.clone(),
            },
            MessageData::Assistant {
                content,
                tool_calls,
            } => WireMessage::Assistant {
                content: if content.is_empty() {
                    None
                } else {
                    Some(content.clone())
                },
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        tool_calls
                            .iter()
                            .map(|call| WireToolCall {
                                id: call.id.clone(),
                                call_type: "function".to_string(),
                                function: WireFunctionCall {
                                    name: call.name.clone(),
                                    arguments: serde_json::to_string(&call.parameters)
                                        .unwrap_or_default(),
                                },
                            })
                            .collect(),
                    )
                },
            },
            MessageData::Tool {
                tool_call_id,
                result,
            } => WireMessage::Tool {
                content: result.llm_format(),
                tool_call_id: tool_call_id.clone(),
            },
        }
    }

    fn convert_response_message(message: &ResponseMessage) -> Result<Decision, ApiError> {
        let mut tool_calls = Vec::new();
        if let Some(wire_calls) = &message.tool_calls {
            for wire_call in wire_calls {
                // Malformed arguments fail the turn; guessing would risk a
                // wrong dangerous dispatch.
                let parameters: serde_json::Value =
                    serde_json::from_str(&wire_call.function.arguments).map_err(|e| {
                        ApiError::MalformedToolCall {
                            provider: PROVIDER_NAME.to_string(),
                            details: format!(
                                "arguments for {} are not valid JSON: {e}",
                                wire_call.function.name
                            ),
                        }
                    })?;
                tool_calls.push(ToolCall {
                    id: wire_call.id.clone(),
                    name: wire_call.function.name.clone(),
                    parameters,
                });
            }
        }

        Ok(Decision {
            content: message.content.clone().unwrap_or_default(),
            tool_calls,
        })
    }
}

#[async_trait]
impl ReasoningProvider for OpenAiChatGateway {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn decide(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<Decision, ApiError> {
        let wire_messages: Vec<WireMessage> = messages.iter().map(Self::convert_message).collect();

        let wire_tools = if tools.is_empty() {
            None
        } else {
            Some(
                tools
                    .iter()
                    .map(|tool| WireTool {
                        tool_type: "function".to_string(),
                        function: WireFunction {
                            name: tool.name.clone(),
                            description: tool.description.clone(),
                            parameters: serde_json::json!({
                                "type": tool.input_schema.schema_type,
                                "properties": tool.input_schema.properties,
                                "required": tool.input_schema.required,
                            }),
                        },
                    })
                    .collect(),
            )
        };

        let request = ChatRequest {
            model: &self.model,
            messages: wire_messages,
            tools: wire_tools,
            temperature: 0.0,
        };

        let response = self
            .http_client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout {
                        provider: PROVIDER_NAME.to_string(),
                    }
                } else {
                    ApiError::Network(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            debug!(target: "openai::chat", "API error status={} body={}", status, body);
            return Err(ApiError::ServerError {
                provider: PROVIDER_NAME.to_string(),
                status_code: status.as_u16(),
                details: body,
            });
        }

        let body_text = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&body_text).map_err(|e| {
            error!(target: "openai::chat", "Failed to parse response: {} body={}", e, body_text);
            ApiError::ResponseParsingError {
                provider: PROVIDER_NAME.to_string(),
                details: e.to_string(),
            }
        })?;

        let Some(choice) = parsed.choices.first() else {
            return Err(ApiError::NoChoices {
                provider: PROVIDER_NAME.to_string(),
            });
        };

        Self::convert_response_message(&choice.message)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    temperature: f32,
}

#[derive(Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: WireFunction,
}

#[derive(Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum WireMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<WireToolCall>>,
    },
    Tool {
        content: String,
        tool_call_id: String,
    },
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: WireFunctionCall,
}

#[derive(Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::conversation::Message;
    use depot_tools::result::{RemovalResult, ToolResult};

    #[test]
    fn assistant_tool_calls_serialize_as_functions() {
        let message = Message::assistant(
            "",
            vec![ToolCall {
                id: "call_1".to_string(),
                name: "get_trip_details".to_string(),
                parameters: serde_json::json!({"trip_id": "trip_1"}),
            }],
        );
        let wire = OpenAiChatGateway::convert_message(&message);
        let value = serde_json::to_value(&wire).unwrap();
        assert_eq!(value["role"], "assistant");
        assert!(value.get("content").is_none());
        assert_eq!(value["tool_calls"][0]["function"]["name"], "get_trip_details");
    }

    #[test]
    fn tool_results_render_through_llm_format() {
        let message = Message::tool(
            "call_1",
            ToolResult::Removal(RemovalResult {
                trip_id: "trip_1".to_string(),
                deployments_removed: 1,
            }),
        );
        let wire = OpenAiChatGateway::convert_message(&message);
        let value = serde_json::to_value(&wire).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["tool_call_id"], "call_1");
        assert!(value["content"].as_str().unwrap().contains("trip_1"));
    }

    #[test]
    fn malformed_arguments_fail_instead_of_guessing() {
        let message = ResponseMessage {
            content: None,
            tool_calls: Some(vec![WireToolCall {
                id: "call_1".to_string(),
                call_type: "function".to_string(),
                function: WireFunctionCall {
                    name: "remove_vehicle_from_trip".to_string(),
                    arguments: "{not json".to_string(),
                },
            }]),
        };
        let err = OpenAiChatGateway::convert_response_message(&message).unwrap_err();
        assert!(matches!(err, ApiError::MalformedToolCall { .. }));
    }

    #[test]
    fn plain_reply_parses_to_decision_without_calls() {
        let body = serde_json::json!({
            "choices": [{"message": {"content": "All good.", "tool_calls": null}}]
        });
        let parsed: ChatResponse = serde_json::from_value(body).unwrap();
        let decision =
            OpenAiChatGateway::convert_response_message(&parsed.choices[0].message).unwrap();
        assert_eq!(decision.content, "All good.");
        assert!(!decision.has_tool_calls());
    }
}
