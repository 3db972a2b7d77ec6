use crate::agent::{ContextBuilder, ToolRegistry, extract_tool_calls};
use crate::traits::{
    AgentEvent, ChatMessage, ChatRequest, ConversationHistory, EventSink, Provider, Role, ToolCall,
};
use anyhow::Result;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_MAX_STEPS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    /// The model answered without requesting tools.
    Answered,
    /// Every step requested tools; the history ends wherever the last step left it.
    StepBudgetExhausted,
}

/// Outcome of one agent turn.
#[derive(Debug, Clone)]
pub struct Turn {
    pub history: ConversationHistory,
    /// Model calls made during the turn.
    pub steps: usize,
    pub status: TurnStatus,
}

impl Turn {
    pub fn final_answer(&self) -> Option<&str> {
        if self.status != TurnStatus::Answered {
            return None;
        }
        self.history
            .last()
            .filter(|m| m.is_final_answer())
            .and_then(|m| m.content.as_deref())
    }
}

pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    context_builder: ContextBuilder,
    tool_registry: Arc<ToolRegistry>,
    max_steps: usize,
    events: EventSink,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, tool_registry: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            context_builder: ContextBuilder::new(),
            tool_registry,
            max_steps: DEFAULT_MAX_STEPS,
            events: EventSink::detached(),
        }
    }

    pub fn with_context_builder(mut self, context_builder: ContextBuilder) -> Self {
        self.context_builder = context_builder;
        self
    }

    /// At least one model call is always made.
    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max.max(1);
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub async fn process(&self, message: &str) -> Result<String> {
        let turn = self.process_with_history(vec![], message).await?;
        Ok(turn.final_answer().unwrap_or_default().to_string())
    }

    /// Appends `message` to `history` (seeding a system prompt into fresh
    /// sessions) and runs the loop. Only an empty message is an error.
    pub async fn process_with_history(
        &self,
        history: ConversationHistory,
        message: &str,
    ) -> Result<Turn> {
        let history = self.context_builder.build_messages(history, message)?;
        Ok(self.run(history).await)
    }

    /// Alternates model calls and tool dispatch until the model stops asking
    /// for tools or the step budget runs out.
    pub async fn run(&self, mut history: ConversationHistory) -> Turn {
        let tools = self.tool_registry.get_specs();

        for step in 1..=self.max_steps {
            self.events.emit(AgentEvent::StepStarted { step });
            debug!(step, messages = history.len(), "Calling model");

            let response = self
                .provider
                .chat(ChatRequest {
                    messages: &history,
                    tools: &tools,
                    events: &self.events,
                })
                .await;
            history.push(response);
            promote_fallback_calls(&mut history);

            let calls = history.last().map(pending_calls).unwrap_or_default();
            if calls.is_empty() {
                debug!(step, "Model answered");
                return Turn {
                    history,
                    steps: step,
                    status: TurnStatus::Answered,
                };
            }

            self.events.emit(AgentEvent::ToolCalls(calls.clone()));
            for result in self.execute_tool_calls(&calls).await {
                self.events.emit(AgentEvent::ToolResult {
                    tool_call_id: result.tool_call_id.clone().unwrap_or_default(),
                    name: result.name.clone().unwrap_or_default(),
                    content: result.text_or_empty().to_string(),
                });
                history.push(result);
            }
        }

        warn!(max_steps = self.max_steps, "Step budget exhausted");
        Turn {
            history,
            steps: self.max_steps,
            status: TurnStatus::StepBudgetExhausted,
        }
    }

    /// Runs all calls concurrently. Results come back in call order.
    async fn execute_tool_calls(&self, calls: &[ToolCall]) -> Vec<ChatMessage> {
        let executions = calls.iter().map(|call| async move {
            debug!(tool = %call.name, id = %call.id, "Executing tool");
            let result = self
                .tool_registry
                .execute(&call.name, call.arguments_object())
                .await;
            let content = serde_json::to_string(&result).unwrap_or_else(|_| "{}".to_string());
            ChatMessage::tool_result(call.id.clone(), call.name.clone(), content)
        });

        join_all(executions).await
    }
}

/// Rewrites the last assistant message when its text turns out to be
/// tool-call JSON.
fn promote_fallback_calls(history: &mut ConversationHistory) {
    let Some(last) = history.last_mut() else {
        return;
    };
    if last.role != Role::Assistant || last.has_tool_calls() || !last.has_content() {
        return;
    }

    let calls = extract_tool_calls(last.text_or_empty());
    if calls.is_empty() {
        return;
    }

    debug!(count = calls.len(), "Promoted tool calls found in message text");
    last.tool_calls = calls;
    last.content = None;
}

fn pending_calls(message: &ChatMessage) -> Vec<ToolCall> {
    if message.role != Role::Assistant {
        return Vec::new();
    }
    if message.has_tool_calls() {
        message.tool_calls.clone()
    } else {
        message.function_call.iter().cloned().collect()
    }
}
