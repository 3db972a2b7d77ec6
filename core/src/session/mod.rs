pub mod factory;
pub mod file;
pub mod memory;

pub use factory::create_session_store;
pub use file::JsonFileSessionStore;
pub use memory::InMemorySessionStore;
