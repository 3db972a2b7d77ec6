use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const RELAY_DIR: &str = ".relay";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, friendly AI assistant.

- For greetings, introductions, self-explanation, or general knowledge questions: answer directly from your knowledge. Do NOT call any tools.
- Use the 'search_web' tool ONLY when the user explicitly asks to search the web or needs current/external information.
- Use the 'graphic_art' tool ONLY when the user asks to generate graphic art or an image.
- Never call tools for normal conversation.
- When you decide to use a tool, output ONLY the tool_calls in the correct format - no extra text.
- After receiving tool results, give a clear final answer based on them.";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionBackend {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Full chat-completions endpoint.
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    /// Per-attempt request timeout.
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub max_steps: usize,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    /// Seeded into new sessions; empty disables it.
    pub system_prompt: String,
    pub session_store: SessionBackend,
    #[serde(skip)]
    pub relay_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: "http://127.0.0.1:8080/v1/chat/completions".to_string(),
            api_key: String::new(),
            model: "llama-3.1-8b-instruct".to_string(),
            timeout_secs: 600,
            max_retries: 3,
            max_steps: 8,
            temperature: 0.7,
            top_p: 0.95,
            max_tokens: 4096,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            session_store: SessionBackend::File,
            relay_dir: get_relay_dir(),
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        if config_exists() {
            load_config()
        } else {
            Ok(Config::default())
        }
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.relay_dir.join("sessions")
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.relay_dir = get_relay_dir();
        Ok(config)
    }
}

pub fn get_relay_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(RELAY_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_relay_dir().join("config.toml")
}

pub fn ensure_relay_dir() -> Result<PathBuf> {
    let relay_dir = get_relay_dir();

    if !relay_dir.exists() {
        std::fs::create_dir_all(&relay_dir).with_context(|| {
            format!("Failed to create relay directory at {}", relay_dir.display())
        })?;
    }

    Ok(relay_dir)
}

pub fn load_config() -> Result<Config> {
    load_config_from(&get_config_path())
}

pub fn load_config_from(config_path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(config_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            anyhow::anyhow!("Config file not found. Run 'relay onboard' to set up your configuration.")
        } else {
            anyhow::anyhow!("Failed to read config from {}: {}", config_path.display(), e)
        }
    })?;

    Config::from_toml(&content)
        .with_context(|| format!("Failed to parse config from {}", config_path.display()))
}

pub fn save_config(config: &Config) -> Result<()> {
    ensure_relay_dir()?;
    save_config_to(config, &get_config_path())
}

pub fn save_config_to(config: &Config, config_path: &Path) -> Result<()> {
    let content =
        toml::to_string_pretty(config).with_context(|| "Failed to serialize config to TOML")?;

    std::fs::write(config_path, content)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    tracing::info!(path = %config_path.display(), "Config saved");
    Ok(())
}

pub fn config_exists() -> bool {
    get_config_path().exists()
}
