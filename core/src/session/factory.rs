use crate::config::{Config, SessionBackend};
use crate::session::{InMemorySessionStore, JsonFileSessionStore};
use crate::traits::SessionStore;
use std::sync::Arc;

pub fn create_session_store(config: &Config) -> Arc<dyn SessionStore> {
    match config.session_store {
        SessionBackend::File => Arc::new(JsonFileSessionStore::new(config.sessions_dir())),
        SessionBackend::Memory => Arc::new(InMemorySessionStore::new()),
    }
}
