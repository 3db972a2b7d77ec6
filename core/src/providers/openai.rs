use crate::error::TransportError;
use crate::traits::{
    ChatMessage, ChatRequest, LineStream, PLACEHOLDER_TOOL_CALL_ID, ToolSpec, Transport,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Serialize;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Serialize)]
pub(crate) struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    stream: bool,
    temperature: f64,
    top_p: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<WireFunction<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct WireToolCall<'a> {
    id: &'a str,
    r#type: &'static str,
    function: WireFunction<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    r#type: &'static str,
    function: WireToolFunction<'a>,
}

#[derive(Debug, Serialize)]
struct WireToolFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            max_tokens: 4096,
        }
    }
}

/// Streaming transport for OpenAI-compatible chat-completion endpoints.
pub struct OpenAiTransport {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    sampling: SamplingParams,
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}

impl OpenAiTransport {
    /// `api_url` is the full chat-completions endpoint.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: build_client(DEFAULT_TIMEOUT),
            api_url: api_url.into(),
            api_key: None,
            model: "gpt-4o".to_string(),
            sampling: SamplingParams::default(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        self.api_key = if api_key.is_empty() { None } else { Some(api_key) };
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Bounds each attempt, including reading the streamed body.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    pub(crate) fn build_request<'a>(&'a self, request: &ChatRequest<'a>) -> WireRequest<'a> {
        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(convert_tools(request.tools))
        };
        let tool_choice = tools.as_ref().map(|_| "auto");

        WireRequest {
            model: &self.model,
            messages: convert_messages(request.messages),
            tools,
            tool_choice,
            stream: true,
            temperature: self.sampling.temperature,
            top_p: self.sampling.top_p,
            max_tokens: self.sampling.max_tokens,
        }
    }
}

fn convert_messages(messages: &[ChatMessage]) -> Vec<WireMessage<'_>> {
    messages
        .iter()
        .map(|m| {
            let tool_calls = if m.tool_calls.is_empty() {
                None
            } else {
                Some(
                    m.tool_calls
                        .iter()
                        .map(|tc| WireToolCall {
                            id: wire_call_id(&tc.id),
                            r#type: "function",
                            function: WireFunction {
                                name: &tc.name,
                                arguments: &tc.arguments,
                            },
                        })
                        .collect(),
                )
            };

            WireMessage {
                role: m.role.as_str(),
                content: m.content.as_deref(),
                tool_calls,
                function_call: m.function_call.as_ref().map(|fc| WireFunction {
                    name: &fc.name,
                    arguments: &fc.arguments,
                }),
                tool_call_id: m.tool_call_id.as_deref(),
                name: m.name.as_deref(),
            }
        })
        .collect()
}

/// Ids the backend never sent go out as the placeholder their tool results carry.
fn wire_call_id(id: &str) -> &str {
    if id.is_empty() {
        PLACEHOLDER_TOOL_CALL_ID
    } else {
        id
    }
}

fn convert_tools(tools: &[ToolSpec]) -> Vec<WireTool<'_>> {
    tools
        .iter()
        .map(|t| WireTool {
            r#type: "function",
            function: WireToolFunction {
                name: &t.name,
                description: &t.description,
                parameters: &t.parameters_schema,
            },
        })
        .collect()
}

#[async_trait]
impl Transport for OpenAiTransport {
    async fn open(&self, request: ChatRequest<'_>) -> Result<LineStream, TransportError> {
        let body = self.build_request(&request);

        debug!(
            url = %self.api_url,
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending streaming chat request"
        );

        let mut builder = self.client.post(&self.api_url).json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(TransportError::status(status, error_text));
        }

        let (tx, rx) = tokio::sync::mpsc::channel::<Result<String, TransportError>>(256);

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk_result) = stream.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        buffer.extend_from_slice(&chunk);

                        while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                            let line: Vec<u8> = buffer.drain(..=pos).collect();
                            let line = String::from_utf8_lossy(&line).into_owned();
                            if tx.send(Ok(line)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(TransportError::Request(e))).await;
                        return;
                    }
                }
            }

            if !buffer.is_empty() {
                let line = String::from_utf8_lossy(&buffer).into_owned();
                let _ = tx.send(Ok(line)).await;
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}
