use crate::traits::{ChatMessage, ConversationHistory, SessionStore};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Process-local session store.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, ConversationHistory>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self, session_id: &str) -> anyhow::Result<ConversationHistory> {
        let sessions = self.sessions.lock().await;
        Ok(sessions.get(session_id).cloned().unwrap_or_default())
    }

    async fn save(&self, session_id: &str, history: &[ChatMessage]) -> anyhow::Result<()> {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(session_id.to_string(), history.to_vec());
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> anyhow::Result<()> {
        self.sessions.lock().await.remove(session_id);
        Ok(())
    }
}
