use crate::traits::{FnTool, Tool, ToolSpec};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const UNKNOWN_TOOL_ERROR: &str = "Unknown tool";

pub struct ToolRegistry {
    tools: Mutex<Vec<Arc<dyn Tool>>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Mutex::new(Vec::new()),
        }
    }

    fn tools(&self) -> MutexGuard<'_, Vec<Arc<dyn Tool>>> {
        self.tools.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a tool, replacing any earlier tool with the same name.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools();
        tools.retain(|t| t.name() != tool.name());
        tools.push(tool);
    }

    pub fn register_fn<F, Fut>(&self, spec: ToolSpec, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.register(Arc::new(FnTool::new(spec, handler)));
    }

    pub fn get_specs(&self) -> Vec<ToolSpec> {
        self.tools().iter().map(|t| t.spec()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools().iter().any(|t| t.name() == name)
    }

    pub fn len(&self) -> usize {
        self.tools().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools().is_empty()
    }

    /// Invokes `name` with `args`. Unknown tools and handler failures come
    /// back as `{"error": ...}` objects instead of errors.
    pub async fn execute(&self, name: &str, args: Value) -> Value {
        let tool = self.tools().iter().find(|t| t.name() == name).cloned();

        match tool {
            Some(tool) => match tool.execute(args).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(tool = name, error = %e, "Tool execution failed");
                    json!({ "error": format!("Execution failed: {}", e) })
                }
            },
            None => {
                tracing::warn!(tool = name, "Model requested an unknown tool");
                json!({ "error": UNKNOWN_TOOL_ERROR })
            }
        }
    }
}
