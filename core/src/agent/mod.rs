pub mod context;
pub mod fallback;
pub mod loop_;
pub mod registry;

pub use context::ContextBuilder;
pub use fallback::extract_tool_calls;
pub use loop_::{AgentLoop, DEFAULT_MAX_STEPS, Turn, TurnStatus};
pub use registry::{ToolRegistry, UNKNOWN_TOOL_ERROR};
