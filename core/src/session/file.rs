use crate::traits::{ChatMessage, ConversationHistory, SessionStore};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    session_id: String,
    updated_at: DateTime<Utc>,
    messages: ConversationHistory,
}

/// Stores each session as a JSON document under one directory.
///
/// File names are the md5 of the session id, so arbitrary ids are safe.
pub struct JsonFileSessionStore {
    dir: PathBuf,
}

impl JsonFileSessionStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.dir
            .join(format!("{:x}.json", md5::compute(session_id.as_bytes())))
    }
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self, session_id: &str) -> anyhow::Result<ConversationHistory> {
        let path = self.session_path(session_id);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(session = session_id, "No stored session, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read session {}", path.display()));
            }
        };

        let file: SessionFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session {}", path.display()))?;

        Ok(file.messages)
    }

    async fn save(&self, session_id: &str, history: &[ChatMessage]) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create sessions directory {}", self.dir.display()))?;

        let file = SessionFile {
            session_id: session_id.to_string(),
            updated_at: Utc::now(),
            messages: history.to_vec(),
        };
        let content = serde_json::to_string_pretty(&file)?;

        let path = self.session_path(session_id);
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content)
            .await
            .with_context(|| format!("Failed to write session {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("Failed to replace session {}", path.display()))?;

        debug!(session = session_id, messages = history.len(), "Session saved");
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> anyhow::Result<()> {
        let path = self.session_path(session_id);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(session = session_id, "Session cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove session {}", path.display())),
        }
    }
}
