use crate::traits::ChatMessage;
use async_trait::async_trait;

/// An ordered message log per session.
pub type ConversationHistory = Vec<ChatMessage>;

/// Persistence for conversation histories, keyed by session id.
///
/// Loading an unknown session yields an empty history.
#[async_trait]
pub trait SessionStore: Send + Sync {
    fn name(&self) -> &str;

    async fn load(&self, session_id: &str) -> anyhow::Result<ConversationHistory>;

    async fn save(&self, session_id: &str, history: &[ChatMessage]) -> anyhow::Result<()>;

    async fn clear(&self, session_id: &str) -> anyhow::Result<()>;
}
