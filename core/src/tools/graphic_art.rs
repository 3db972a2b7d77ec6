use crate::tools::extract_string_arg_opt;
use crate::traits::Tool;
use async_trait::async_trait;
use serde_json::json;

const IMAGE_ID_MIN: u32 = 100;
const IMAGE_ID_MAX: u32 = 300;

/// Returns a stock photo URL picked from the prompt.
pub struct GraphicArtTool;

impl GraphicArtTool {
    /// Same prompt, same picture.
    pub fn image_id(prompt: &str) -> u32 {
        let digest = md5::compute(prompt.as_bytes());
        let seed = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        IMAGE_ID_MIN + seed % (IMAGE_ID_MAX - IMAGE_ID_MIN + 1)
    }
}

#[async_trait]
impl Tool for GraphicArtTool {
    fn name(&self) -> &str {
        "graphic_art"
    }

    fn description(&self) -> &str {
        "Generate graphic art based on a prompt."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "The prompt describing the desired graphic art."
                }
            },
            "required": ["prompt"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let prompt = extract_string_arg_opt(&args, "prompt", "beautiful landscape");
        let id = Self::image_id(&prompt);

        Ok(json!({
            "image_url": format!("https://picsum.photos/id/{}/800/600", id)
        }))
    }
}
