pub mod memory;
pub mod providers;
pub mod sqlite;

pub use memory::MemoryBackend;
pub use providers::{MemoryBackendProvider, SqliteBackendProvider};
pub use sqlite::SqliteBackend;
