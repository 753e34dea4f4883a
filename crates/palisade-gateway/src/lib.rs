//! Profile-driven entity gateway: backend routing, the interceptor pipeline,
//! and linkage resolution.

use std::sync::Arc;

use palisade_core::ProviderCatalog;
use palisade_store::{MemoryBackendProvider, SqliteBackendProvider};

pub mod gateway;
pub mod linkage;
pub mod options;
pub mod pipeline;
pub mod routing;

pub use gateway::EntityGateway;
pub use options::CallOptions;
pub use routing::BackendRouter;

/// Catalog with the built-in obfuscators and both storage providers.
#[must_use]
pub fn default_catalog() -> ProviderCatalog {
    let mut catalog = ProviderCatalog::with_builtins();
    catalog.register_backend(Arc::new(MemoryBackendProvider));
    catalog.register_backend(Arc::new(SqliteBackendProvider));
    catalog
}
