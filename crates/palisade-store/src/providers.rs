//! Backend providers wired into the provider catalog.

use std::sync::Arc;

use async_trait::async_trait;

use palisade_core::{
    BackendProvider, CoreError, CoreResult, EntityBackend, EnvironmentProfile, ProfileRegistry,
};

use crate::memory::MemoryBackend;
use crate::sqlite::SqliteBackend;

const DEFAULT_SQLITE_URL: &str = "sqlite::memory:";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Opens in-process [`MemoryBackend`] instances. Registered as `memory`.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryBackendProvider;

#[async_trait]
impl BackendProvider for MemoryBackendProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn open(
        &self,
        _environment: &EnvironmentProfile,
        registry: Arc<ProfileRegistry>,
    ) -> CoreResult<Arc<dyn EntityBackend>> {
        let backend = MemoryBackend::new();
        backend.prepare(registry).await?;
        Ok(Arc::new(backend))
    }
}

/// Opens pooled [`SqliteBackend`] instances. Registered as `database`.
///
/// Environment arguments: `url` (defaults to an in-memory database) and
/// `max_connections`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SqliteBackendProvider;

#[async_trait]
impl BackendProvider for SqliteBackendProvider {
    fn name(&self) -> &str {
        "database"
    }

    async fn open(
        &self,
        environment: &EnvironmentProfile,
        registry: Arc<ProfileRegistry>,
    ) -> CoreResult<Arc<dyn EntityBackend>> {
        let url = match environment.argument("url") {
            Some(value) => value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| {
                    CoreError::validation(format!(
                        "environment `{}`: argument `url` must be a string",
                        environment.name
                    ))
                })?,
            None => DEFAULT_SQLITE_URL.to_string(),
        };
        let max_connections = match environment.argument("max_connections") {
            Some(value) => value
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    CoreError::validation(format!(
                        "environment `{}`: argument `max_connections` must be a positive integer",
                        environment.name
                    ))
                })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let backend = SqliteBackend::connect(&url, max_connections).await?;
        backend.prepare(registry).await?;
        Ok(Arc::new(backend))
    }
}
