use crate::traits::{ChatMessage, ConversationHistory};
use anyhow::Result;
use std::path::{Path, PathBuf};

const BOOTSTRAP_FILE: &str = "SYSTEM.md";
const BOOTSTRAP_MAX_CHARS: usize = 20_000;

/// Builds the messages that open a turn: the system prompt for fresh
/// sessions, then the user's message.
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    pub system_prompt: String,
    pub bootstrap_dir: Option<PathBuf>,
    pub runtime_context: bool,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Appends `SYSTEM.md` from `dir`, when present, to the system prompt.
    pub fn with_bootstrap_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.bootstrap_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn with_runtime_context(mut self, enabled: bool) -> Self {
        self.runtime_context = enabled;
        self
    }

    pub fn build_system_prompt(&self) -> Option<String> {
        let mut parts = vec![];

        let base = self.system_prompt.trim();
        if !base.is_empty() {
            parts.push(base.to_string());
        }

        if let Some(bootstrap) = self.load_bootstrap_file() {
            parts.push(bootstrap);
        }

        if parts.is_empty() {
            return None;
        }

        if self.runtime_context {
            parts.push(self.get_runtime_context());
        }

        Some(parts.join("\n\n---\n\n"))
    }

    fn get_runtime_context(&self) -> String {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M (%A)");
        format!("## Runtime Context\n\nCurrent time: {}", timestamp)
    }

    fn load_bootstrap_file(&self) -> Option<String> {
        let path = self.bootstrap_dir.as_ref()?.join(BOOTSTRAP_FILE);
        let content = std::fs::read_to_string(path).ok()?;
        let trimmed = content.trim();

        if trimmed.is_empty() {
            return None;
        }

        if trimmed.chars().count() > BOOTSTRAP_MAX_CHARS {
            let truncated: String = trimmed.chars().take(BOOTSTRAP_MAX_CHARS).collect();
            Some(format!(
                "{}\n\n[... truncated at {} chars]",
                truncated, BOOTSTRAP_MAX_CHARS
            ))
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Seeds a fresh session with the system prompt. Existing histories are left alone.
    pub fn seed(&self, history: &mut ConversationHistory) {
        if history.is_empty()
            && let Some(prompt) = self.build_system_prompt()
        {
            history.push(ChatMessage::system(prompt));
        }
    }

    pub fn build_messages(
        &self,
        mut history: ConversationHistory,
        user_message: &str,
    ) -> Result<ConversationHistory> {
        let user_message = user_message.trim();
        if user_message.is_empty() {
            anyhow::bail!("Empty message");
        }

        self.seed(&mut history);
        history.push(ChatMessage::user(user_message));
        Ok(history)
    }
}
