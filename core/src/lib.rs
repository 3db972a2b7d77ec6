pub mod agent;
pub mod config;
pub mod error;
pub mod providers;
pub mod session;
pub mod tools;
pub mod traits;

pub use agent::{AgentLoop, ContextBuilder, ToolRegistry, Turn, TurnStatus};
pub use config::*;
pub use error::TransportError;
pub use providers::*;
pub use session::{InMemorySessionStore, JsonFileSessionStore, create_session_store};
pub use tools::*;
pub use traits::*;
