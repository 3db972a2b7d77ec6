use crate::traits::ToolCall;
use tokio::sync::mpsc;

/// Progress of a running turn, for callers that render it live.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    StepStarted {
        step: usize,
    },
    Token(String),
    ToolCalls(Vec<ToolCall>),
    ToolResult {
        tool_call_id: String,
        name: String,
        content: String,
    },
    ConnectionError(String),
}

/// Optional receiver of [`AgentEvent`]s. Emitting into a detached sink is a no-op.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<AgentEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<AgentEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn detached() -> Self {
        Self::default()
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AgentEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.tx {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(event);
        }
    }
}
