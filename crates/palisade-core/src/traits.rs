use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::EnvironmentProfile;
use crate::error::CoreResult;
use crate::mask::FilterMask;
use crate::record::Record;
use crate::registry::ProfileRegistry;

/// High level status reported by a storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendStatus {
    Healthy,
    Degraded,
}

/// Abstraction over per-type record storage implementations.
///
/// Implementations receive records already shaped by the gateway (defaults
/// injected, obfuscation applied) and evaluate filter masks against stored
/// state. Multiple masks combine as a union; expressions within one mask
/// must all hold.
#[async_trait]
pub trait EntityBackend: Send + Sync {
    /// Materializes storage for every entity type in the registry.
    /// Idempotent; called at connect time and again on registry reload.
    async fn prepare(&self, registry: Arc<ProfileRegistry>) -> CoreResult<()>;

    /// Fetches the first record of `entity_type` matched by any mask.
    async fn fetch_first(
        &self,
        entity_type: &str,
        masks: &[FilterMask],
    ) -> CoreResult<Option<Record>>;

    /// Fetches all records of `entity_type` matched by any mask.
    async fn fetch_all(&self, entity_type: &str, masks: &[FilterMask]) -> CoreResult<Vec<Record>>;

    /// Inserts a record and returns its stored form (generated keys filled).
    async fn insert(&self, entity_type: &str, record: Record) -> CoreResult<Record>;

    /// Applies `patch` to the first matched record.
    /// Returns the updated stored form, or `None` when nothing matched.
    async fn update(
        &self,
        entity_type: &str,
        masks: &[FilterMask],
        patch: Record,
    ) -> CoreResult<Option<Record>>;

    /// Removes the first matched record and returns its prior state.
    async fn remove(&self, entity_type: &str, masks: &[FilterMask])
        -> CoreResult<Option<Record>>;

    /// Reports backend health.
    async fn status(&self) -> CoreResult<BackendStatus>;
}

impl std::fmt::Debug for dyn EntityBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn EntityBackend")
    }
}

/// Named factory producing storage backends from environment profiles.
#[async_trait]
pub trait BackendProvider: Send + Sync {
    /// Provider name matched against `EnvironmentProfile::backend`.
    fn name(&self) -> &str;

    /// Opens a backend for the given environment.
    async fn open(
        &self,
        environment: &EnvironmentProfile,
        registry: Arc<ProfileRegistry>,
    ) -> CoreResult<Arc<dyn EntityBackend>>;
}

/// Reversible value transformation applied to declared fields at rest.
pub trait Obfuscator: Send + Sync {
    /// Encodes a plain value into its stored form.
    fn obfuscate(&self, value: &Value) -> CoreResult<Value>;

    /// Decodes a stored value back into its plain form.
    fn deobfuscate(&self, value: &Value) -> CoreResult<Value>;
}

/// Named factory producing obfuscator instances.
pub trait ObfuscatorProvider: Send + Sync {
    /// Provider name referenced by profile obfuscation tables.
    fn name(&self) -> &str;

    /// Creates the obfuscator.
    fn open(&self) -> Arc<dyn Obfuscator>;
}
