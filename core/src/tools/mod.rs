use crate::agent::ToolRegistry;
use serde_json::Value;
use std::sync::Arc;

pub mod graphic_art;
pub mod search_web;

pub use graphic_art::GraphicArtTool;
pub use search_web::SearchWebTool;

/// Registers the bundled demo tools.
pub fn register_builtin_tools(registry: &ToolRegistry) {
    registry.register(Arc::new(SearchWebTool));
    registry.register(Arc::new(GraphicArtTool));
}

pub fn extract_string_arg(args: &Value, key: &str) -> anyhow::Result<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing '{}' parameter", key))
        .map(|s| s.to_string())
}

pub fn extract_string_arg_opt(args: &Value, key: &str, default: &str) -> String {
    args.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or(default)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtin_tools_are_advertised_in_order() {
        let registry = ToolRegistry::new();
        register_builtin_tools(&registry);

        let names: Vec<_> = registry.get_specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["search_web", "graphic_art"]);
    }

    #[test]
    fn string_args() {
        let args = json!({"query": "x", "n": 3});
        assert_eq!(extract_string_arg(&args, "query").unwrap(), "x");
        assert!(extract_string_arg(&args, "n").is_err());
        assert_eq!(extract_string_arg_opt(&args, "missing", "d"), "d");
    }
}
