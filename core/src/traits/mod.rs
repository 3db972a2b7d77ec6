pub mod event;
pub mod provider;
pub mod session;
pub mod tool;

pub use event::{AgentEvent, EventSink};
pub use provider::{
    ChatMessage, ChatRequest, LineStream, PLACEHOLDER_TOOL_CALL_ID, Provider, Role, ToolCall,
    Transport,
};
pub use session::{ConversationHistory, SessionStore};
pub use tool::{FnTool, Tool, ToolSpec};
