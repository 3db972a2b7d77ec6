use crate::tools::extract_string_arg_opt;
use crate::traits::Tool;
use async_trait::async_trait;
use serde_json::json;

/// Canned search results. Stands in for a real search backend.
pub struct SearchWebTool;

#[async_trait]
impl Tool for SearchWebTool {
    fn name(&self) -> &str {
        "search_web"
    }

    fn description(&self) -> &str {
        "Search the web for information."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let query = extract_string_arg_opt(&args, "query", "No query provided");

        Ok(json!({
            "results": format!("Search results for '{}' are not available offline.", query)
        }))
    }
}
