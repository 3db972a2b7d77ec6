use crate::error::TransportError;
use crate::traits::{EventSink, ToolSpec};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Placeholder id for tool results whose originating call carried none.
pub const PLACEHOLDER_TOOL_CALL_ID: &str = "call_1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a conversation history.
///
/// Assistant messages may carry text, structured tool calls, a legacy
/// function call, or text and tool calls together. Tool messages carry the
/// id and name of the call they answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    fn with_role(role: Role, content: Option<String>) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            function_call: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, Some(content.into()))
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, Some(content.into()))
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, Some(content.into()))
    }

    pub fn assistant_with_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::with_role(Role::Assistant, content)
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let tool_call_id = tool_call_id.into();
        let tool_call_id = if tool_call_id.is_empty() {
            PLACEHOLDER_TOOL_CALL_ID.to_string()
        } else {
            tool_call_id
        };

        Self {
            tool_call_id: Some(tool_call_id),
            name: Some(name.into()),
            ..Self::with_role(Role::Tool, Some(content.into()))
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.is_empty())
    }

    pub fn text_or_empty(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// An assistant message that asks for no tool invocation ends the turn.
    pub fn is_final_answer(&self) -> bool {
        self.role == Role::Assistant && self.tool_calls.is_empty() && self.function_call.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Arguments as a JSON object; anything unparseable or non-object is `{}`.
    pub fn arguments_object(&self) -> serde_json::Value {
        match serde_json::from_str::<serde_json::Value>(&self.arguments) {
            Ok(value @ serde_json::Value::Object(_)) => value,
            _ => {
                if !self.arguments.trim().is_empty() {
                    tracing::warn!(
                        tool = %self.name,
                        arguments = %self.arguments,
                        "Unparseable tool arguments, invoking with an empty object"
                    );
                }
                serde_json::Value::Object(serde_json::Map::new())
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub messages: &'a [ChatMessage],
    pub tools: &'a [ToolSpec],
    pub events: &'a EventSink,
}

/// Raw lines of one streamed response body.
pub type LineStream = BoxStream<'static, Result<String, TransportError>>;

/// Opens one streaming chat-completion request and yields its body line by line.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, request: ChatRequest<'_>) -> Result<LineStream, TransportError>;
}

/// Produces one finalized assistant message per call.
///
/// Implementations absorb backend failures into the returned message, so the
/// conversation stays a well-formed log whether or not the backend answered.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn chat(&self, request: ChatRequest<'_>) -> ChatMessage;
}
