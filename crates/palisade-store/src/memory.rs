//! In-memory storage backend.
//!
//! Records live in per-type vectors behind one lock, in insertion order, so
//! "first match" means oldest match. Filter masks are evaluated in process,
//! which makes this the only backend that serves deep masks natively.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use palisade_core::value::values_equal;
use palisade_core::{
    BackendStatus, CoreError, CoreResult, EntityBackend, EntityProfile, FilterMask,
    ProfileRegistry, Record,
};

#[derive(Default)]
struct State {
    registry: Option<Arc<ProfileRegistry>>,
    tables: HashMap<String, Vec<Record>>,
    counters: HashMap<String, i64>,
}

/// Volatile record store.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<RwLock<State>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> CoreResult<Arc<ProfileRegistry>> {
        self.inner
            .read()
            .registry
            .clone()
            .ok_or_else(|| CoreError::backend_unavailable("memory backend has not been prepared"))
    }
}

fn matches_any(masks: &[FilterMask], record: &Record) -> CoreResult<bool> {
    if masks.is_empty() {
        return Ok(true);
    }
    for mask in masks {
        if mask.matches(record)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Fills every declared field, carrying input values and `Null` elsewhere.
/// Input fields the profile does not declare are dropped.
fn shape_record(profile: &EntityProfile, input: &Record) -> Record {
    let mut stored = Record::new();
    for field in profile.fields() {
        let value = input.get(field.name()).cloned().unwrap_or(Value::Null);
        stored.set(field.name(), value);
    }
    stored
}

fn check_not_null(
    profile: &EntityProfile,
    entity_type: &str,
    record: &Record,
) -> CoreResult<()> {
    for field in profile.fields() {
        if field.is_autoincrement() {
            continue;
        }
        let is_null = record.get(field.name()).map_or(true, Value::is_null);
        if is_null && (field.is_not_null() || field.is_required()) {
            return Err(CoreError::constraint(format!(
                "NOT NULL constraint failed: {entity_type}.{}",
                field.name()
            )));
        }
    }
    Ok(())
}

/// Checks unique fields and the primary-key tuple against every record in
/// the table except the one at `skip`.
fn check_unique(
    profile: &EntityProfile,
    entity_type: &str,
    candidate: &Record,
    table: &[Record],
    skip: Option<usize>,
) -> CoreResult<()> {
    for field in profile.fields() {
        if !field.is_unique() {
            continue;
        }
        let value = match candidate.get(field.name()) {
            Some(value) if !value.is_null() => value,
            _ => continue,
        };
        for (index, existing) in table.iter().enumerate() {
            if Some(index) == skip {
                continue;
            }
            if existing
                .get(field.name())
                .map_or(false, |other| values_equal(other, value))
            {
                return Err(CoreError::constraint(format!(
                    "UNIQUE constraint failed: {entity_type}.{}",
                    field.name()
                )));
            }
        }
    }

    let keys = profile.key_fields();
    if !keys.is_empty() {
        for (index, existing) in table.iter().enumerate() {
            if Some(index) == skip {
                continue;
            }
            let collides = keys.iter().all(|key| {
                match (candidate.get(key), existing.get(key)) {
                    (Some(a), Some(b)) if !a.is_null() => values_equal(a, b),
                    _ => false,
                }
            });
            if collides {
                return Err(CoreError::constraint(format!(
                    "UNIQUE constraint failed: {entity_type}.{}",
                    keys.join(", ")
                )));
            }
        }
    }

    Ok(())
}

#[async_trait]
impl EntityBackend for MemoryBackend {
    async fn prepare(&self, registry: Arc<ProfileRegistry>) -> CoreResult<()> {
        let mut state = self.inner.write();
        for entity_type in registry.entity_types() {
            state.tables.entry(entity_type.to_string()).or_default();
            state.counters.entry(entity_type.to_string()).or_insert(0);
        }
        debug!(
            "memory backend prepared: {} entity types",
            registry.entity_types().len()
        );
        state.registry = Some(registry);
        Ok(())
    }

    async fn fetch_first(
        &self,
        entity_type: &str,
        masks: &[FilterMask],
    ) -> CoreResult<Option<Record>> {
        let registry = self.registry()?;
        registry.profile(entity_type)?;

        let state = self.inner.read();
        if let Some(table) = state.tables.get(entity_type) {
            for record in table {
                if matches_any(masks, record)? {
                    return Ok(Some(record.clone()));
                }
            }
        }
        Ok(None)
    }

    async fn fetch_all(&self, entity_type: &str, masks: &[FilterMask]) -> CoreResult<Vec<Record>> {
        let registry = self.registry()?;
        registry.profile(entity_type)?;

        let state = self.inner.read();
        let mut matched = Vec::new();
        if let Some(table) = state.tables.get(entity_type) {
            for record in table {
                if matches_any(masks, record)? {
                    matched.push(record.clone());
                }
            }
        }
        Ok(matched)
    }

    async fn insert(&self, entity_type: &str, record: Record) -> CoreResult<Record> {
        let registry = self.registry()?;
        let profile = registry.profile(entity_type)?;

        let mut state = self.inner.write();
        let mut stored = shape_record(profile, &record);

        for field in profile.fields() {
            if !field.is_autoincrement() {
                continue;
            }
            match stored.get(field.name()).and_then(Value::as_i64) {
                Some(explicit) => {
                    // keep the counter ahead of explicitly assigned keys
                    let counter = state.counters.entry(entity_type.to_string()).or_insert(0);
                    *counter = (*counter).max(explicit);
                }
                None => {
                    let counter = state.counters.entry(entity_type.to_string()).or_insert(0);
                    *counter += 1;
                    stored.set(field.name(), Value::from(*counter));
                }
            }
        }

        check_not_null(profile, entity_type, &stored)?;
        let table = state.tables.entry(entity_type.to_string()).or_default();
        check_unique(profile, entity_type, &stored, table, None)?;

        table.push(stored.clone());
        Ok(stored)
    }

    async fn update(
        &self,
        entity_type: &str,
        masks: &[FilterMask],
        patch: Record,
    ) -> CoreResult<Option<Record>> {
        let registry = self.registry()?;
        let profile = registry.profile(entity_type)?;

        let mut state = self.inner.write();
        let table = match state.tables.get_mut(entity_type) {
            Some(table) => table,
            None => return Ok(None),
        };

        let mut found = None;
        for (index, record) in table.iter().enumerate() {
            if matches_any(masks, record)? {
                found = Some(index);
                break;
            }
        }
        let index = match found {
            Some(index) => index,
            None => return Ok(None),
        };

        let mut updated = table[index].clone();
        for (field, value) in patch.iter() {
            if profile.field(field).is_some() {
                updated.set(field.clone(), value.clone());
            }
        }

        check_not_null(profile, entity_type, &updated)?;
        check_unique(profile, entity_type, &updated, table, Some(index))?;

        table[index] = updated.clone();
        Ok(Some(updated))
    }

    async fn remove(
        &self,
        entity_type: &str,
        masks: &[FilterMask],
    ) -> CoreResult<Option<Record>> {
        let registry = self.registry()?;
        registry.profile(entity_type)?;

        let mut state = self.inner.write();
        let table = match state.tables.get_mut(entity_type) {
            Some(table) => table,
            None => return Ok(None),
        };

        let mut found = None;
        for (index, record) in table.iter().enumerate() {
            if matches_any(masks, record)? {
                found = Some(index);
                break;
            }
        }
        match found {
            Some(index) => Ok(Some(table.remove(index))),
            None => Ok(None),
        }
    }

    async fn status(&self) -> CoreResult<BackendStatus> {
        Ok(BackendStatus::Healthy)
    }
}
