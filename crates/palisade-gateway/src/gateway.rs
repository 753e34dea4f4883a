//! Entity data interface.

use std::sync::Arc;

use futures::future::try_join_all;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use palisade_core::{
    BackendStatus, ComparisonOp, CoreError, CoreResult, EntityBackend, EntityProfile,
    EnvironmentProfile, FilterMask, GatewayRuleSet, LinkageProfile, Operation, PalisadeConfig,
    ProfileRegistry, ProviderCatalog, Record,
};

use crate::options::CallOptions;
use crate::pipeline;
use crate::routing::BackendRouter;

/// Builds an equality mask over the record's key tuple, matching values as
/// the record carries them.
pub(crate) fn key_mask(profile: &EntityProfile, record: &Record) -> FilterMask {
    profile
        .key_fields()
        .into_iter()
        .fold(FilterMask::empty(), |mask, field| {
            let value = record.get(field).cloned().unwrap_or(Value::Null);
            mask.with_expression(field, ComparisonOp::Equals, value)
        })
}

/// Facade over profile-driven entity storage.
///
/// Every operation resolves the entity type's compiled rule set from the
/// current registry snapshot, walks the interceptor steps around backend
/// dispatch, and hands back plain records. Authorization denial and no-match
/// both come back as an empty result, never as an error.
pub struct EntityGateway {
    registry: RwLock<Arc<ProfileRegistry>>,
    router: BackendRouter,
    catalog: ProviderCatalog,
}

impl std::fmt::Debug for EntityGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityGateway").finish_non_exhaustive()
    }
}

impl EntityGateway {
    /// Compiles the profiles, opens one backend per environment, and returns
    /// the connected gateway.
    pub async fn connect(
        entities: impl IntoIterator<Item = EntityProfile>,
        linkages: impl IntoIterator<Item = LinkageProfile>,
        environments: impl IntoIterator<Item = EnvironmentProfile>,
        catalog: ProviderCatalog,
    ) -> CoreResult<Self> {
        let registry = Arc::new(ProfileRegistry::build(entities, linkages, &catalog)?);
        let environments: Vec<EnvironmentProfile> = environments.into_iter().collect();
        let router = BackendRouter::connect(&environments, &catalog, Arc::clone(&registry)).await?;
        debug!("entity gateway connected: {} environments", environments.len());
        Ok(Self {
            registry: RwLock::new(registry),
            router,
            catalog,
        })
    }

    /// Like [`EntityGateway::connect`], with environments taken from loaded
    /// configuration.
    pub async fn connect_with_config(
        config: &PalisadeConfig,
        entities: impl IntoIterator<Item = EntityProfile>,
        linkages: impl IntoIterator<Item = LinkageProfile>,
        catalog: ProviderCatalog,
    ) -> CoreResult<Self> {
        Self::connect(entities, linkages, config.routing_environments(), catalog).await
    }

    /// Current registry snapshot. In-flight calls keep the snapshot they
    /// started with across a reload.
    #[must_use]
    pub fn registry(&self) -> Arc<ProfileRegistry> {
        self.registry.read().clone()
    }

    /// Replaces the compiled profiles.
    ///
    /// Backends re-prepare against the new registry first; the swap itself is
    /// atomic and only calls that start afterwards see the new profiles.
    pub async fn reload(
        &self,
        entities: impl IntoIterator<Item = EntityProfile>,
        linkages: impl IntoIterator<Item = LinkageProfile>,
    ) -> CoreResult<()> {
        let registry = Arc::new(ProfileRegistry::build(entities, linkages, &self.catalog)?);
        self.router.prepare_all(&registry).await?;
        *self.registry.write() = registry;
        debug!("entity gateway registry reloaded");
        Ok(())
    }

    /// Health of every routed backend, paired with its environment name.
    pub async fn backend_status(&self) -> CoreResult<Vec<(String, BackendStatus)>> {
        self.router.statuses().await
    }

    /// First record matching any of `filters`, else `None`.
    pub async fn get(
        &self,
        entity_type: &str,
        filters: &[FilterMask],
        options: &CallOptions,
    ) -> CoreResult<Option<Record>> {
        let registry = self.registry();
        let profile = registry.profile(entity_type)?;
        let rules = registry.rules(entity_type)?;
        if !pipeline::authorize(entity_type, rules, options) {
            return Ok(None);
        }
        let backend = self.router.backend_for(entity_type)?;
        self.prepared_get(profile, rules, backend, filters, options)
            .await
    }

    /// Every record matching any of `filters`, in backend order.
    pub async fn get_all(
        &self,
        entity_type: &str,
        filters: &[FilterMask],
        options: &CallOptions,
    ) -> CoreResult<Vec<Record>> {
        let registry = self.registry();
        let profile = registry.profile(entity_type)?;
        let rules = registry.rules(entity_type)?;
        if !pipeline::authorize(entity_type, rules, options) {
            return Ok(Vec::new());
        }
        pipeline::validate_masks(profile, filters)?;
        let masks = pipeline::obfuscate_masks(rules, filters)?;
        let masks = pipeline::apply_visibility(rules, masks, options);
        let backend = self.router.backend_for(entity_type)?;
        let fetched = backend.fetch_all(entity_type, &masks).await?;
        let mut records = Vec::with_capacity(fetched.len());
        for mut record in fetched {
            pipeline::deobfuscate_record(rules, &mut record)?;
            records.push(record.project(profile));
        }
        Ok(records)
    }

    /// Batch form of [`EntityGateway::get`]: one lookup per filter list,
    /// fanned out concurrently. Misses are dropped from the result.
    pub async fn get_batch(
        &self,
        entity_type: &str,
        filters_list: &[Vec<FilterMask>],
        options: &CallOptions,
    ) -> CoreResult<Vec<Record>> {
        let registry = self.registry();
        let profile = registry.profile(entity_type)?;
        let rules = registry.rules(entity_type)?;
        if !pipeline::authorize(entity_type, rules, options) {
            return Ok(Vec::new());
        }
        let backend = self.router.backend_for(entity_type)?;
        let fetches = filters_list
            .iter()
            .map(|filters| self.prepared_get(profile, rules, backend, filters, options));
        let outcomes = try_join_all(fetches).await?;
        Ok(outcomes.into_iter().flatten().collect())
    }

    /// Creates one record and returns it as stored, defaults injected and
    /// backend-assigned identity reflected. `None` when access is denied.
    pub async fn post(
        &self,
        entity_type: &str,
        record: Record,
        options: &CallOptions,
    ) -> CoreResult<Option<Record>> {
        let registry = self.registry();
        let profile = registry.profile(entity_type)?;
        let rules = registry.rules(entity_type)?;
        if !pipeline::authorize(entity_type, rules, options) {
            return Ok(None);
        }
        let backend = self.router.backend_for(entity_type)?;
        let created = self.prepared_post(profile, rules, backend, record).await?;
        Ok(Some(created))
    }

    /// Batch creation, applied in order. The first backend fault aborts the
    /// remainder; records created before it stay created.
    pub async fn post_batch(
        &self,
        entity_type: &str,
        records: Vec<Record>,
        options: &CallOptions,
    ) -> CoreResult<Vec<Record>> {
        let registry = self.registry();
        let profile = registry.profile(entity_type)?;
        let rules = registry.rules(entity_type)?;
        if !pipeline::authorize(entity_type, rules, options) {
            return Ok(Vec::new());
        }
        let backend = self.router.backend_for(entity_type)?;
        let mut created = Vec::with_capacity(records.len());
        for record in records {
            created.push(self.prepared_post(profile, rules, backend, record).await?);
        }
        Ok(created)
    }

    /// Updates the first record matching any of `filters` with the fields of
    /// `patch`; absent fields stay untouched. `None` on no match.
    pub async fn patch(
        &self,
        entity_type: &str,
        filters: &[FilterMask],
        patch: Record,
        options: &CallOptions,
    ) -> CoreResult<Option<Record>> {
        let registry = self.registry();
        let profile = registry.profile(entity_type)?;
        let rules = registry.rules(entity_type)?;
        if !pipeline::authorize(entity_type, rules, options) {
            return Ok(None);
        }
        let backend = self.router.backend_for(entity_type)?;
        self.prepared_patch(profile, rules, backend, filters, patch, options)
            .await
    }

    /// Zip-wise batch form of [`EntityGateway::patch`]: the n-th patch
    /// applies under the n-th filter list. Misses are dropped.
    pub async fn patch_batch(
        &self,
        entity_type: &str,
        filters_list: &[Vec<FilterMask>],
        patches: Vec<Record>,
        options: &CallOptions,
    ) -> CoreResult<Vec<Record>> {
        if filters_list.len() != patches.len() {
            return Err(CoreError::validation(format!(
                "patch batch carries {} filter lists but {} patches",
                filters_list.len(),
                patches.len()
            )));
        }
        let registry = self.registry();
        let profile = registry.profile(entity_type)?;
        let rules = registry.rules(entity_type)?;
        if !pipeline::authorize(entity_type, rules, options) {
            return Ok(Vec::new());
        }
        let backend = self.router.backend_for(entity_type)?;
        let mut updated = Vec::new();
        for (filters, patch) in filters_list.iter().zip(patches) {
            let outcome = self
                .prepared_patch(profile, rules, backend, filters, patch, options)
                .await?;
            if let Some(record) = outcome {
                updated.push(record);
            }
        }
        Ok(updated)
    }

    /// Removes the first record matching any of `filters` and returns its
    /// last-known state.
    ///
    /// Types that keep deleted records are soft-marked through their delete
    /// rules instead, unless the caller forces a physical delete.
    pub async fn delete(
        &self,
        entity_type: &str,
        filters: &[FilterMask],
        options: &CallOptions,
    ) -> CoreResult<Option<Record>> {
        let registry = self.registry();
        let profile = registry.profile(entity_type)?;
        let rules = registry.rules(entity_type)?;
        if !pipeline::authorize(entity_type, rules, options) {
            return Ok(None);
        }
        let backend = self.router.backend_for(entity_type)?;
        self.prepared_delete(profile, rules, backend, filters, options)
            .await
    }

    /// Batch form of [`EntityGateway::delete`], applied in order. Misses are
    /// dropped.
    pub async fn delete_batch(
        &self,
        entity_type: &str,
        filters_list: &[Vec<FilterMask>],
        options: &CallOptions,
    ) -> CoreResult<Vec<Record>> {
        let registry = self.registry();
        let profile = registry.profile(entity_type)?;
        let rules = registry.rules(entity_type)?;
        if !pipeline::authorize(entity_type, rules, options) {
            return Ok(Vec::new());
        }
        let backend = self.router.backend_for(entity_type)?;
        let mut removed = Vec::new();
        for filters in filters_list {
            let outcome = self
                .prepared_delete(profile, rules, backend, filters, options)
                .await?;
            if let Some(record) = outcome {
                removed.push(record);
            }
        }
        Ok(removed)
    }

    async fn prepared_get(
        &self,
        profile: &EntityProfile,
        rules: &GatewayRuleSet,
        backend: &Arc<dyn EntityBackend>,
        filters: &[FilterMask],
        options: &CallOptions,
    ) -> CoreResult<Option<Record>> {
        pipeline::validate_masks(profile, filters)?;
        let masks = pipeline::obfuscate_masks(rules, filters)?;
        let masks = pipeline::apply_visibility(rules, masks, options);
        match backend.fetch_first(profile.name(), &masks).await? {
            Some(mut record) => {
                pipeline::deobfuscate_record(rules, &mut record)?;
                Ok(Some(record.project(profile)))
            }
            None => Ok(None),
        }
    }

    async fn prepared_post(
        &self,
        profile: &EntityProfile,
        rules: &GatewayRuleSet,
        backend: &Arc<dyn EntityBackend>,
        mut record: Record,
    ) -> CoreResult<Record> {
        pipeline::inject_defaults(rules, Operation::Post, &mut record);
        pipeline::obfuscate_record(rules, &mut record)?;
        let mut created = backend.insert(profile.name(), record).await?;
        pipeline::deobfuscate_record(rules, &mut created)?;
        Ok(created.project(profile))
    }

    async fn prepared_patch(
        &self,
        profile: &EntityProfile,
        rules: &GatewayRuleSet,
        backend: &Arc<dyn EntityBackend>,
        filters: &[FilterMask],
        mut patch: Record,
        options: &CallOptions,
    ) -> CoreResult<Option<Record>> {
        pipeline::validate_masks(profile, filters)?;
        pipeline::inject_defaults(rules, Operation::Patch, &mut patch);
        pipeline::obfuscate_record(rules, &mut patch)?;
        let masks = pipeline::obfuscate_masks(rules, filters)?;
        let masks = pipeline::apply_visibility(rules, masks, options);
        match backend.update(profile.name(), &masks, patch).await? {
            Some(mut updated) => {
                pipeline::deobfuscate_record(rules, &mut updated)?;
                Ok(Some(updated.project(profile)))
            }
            None => Ok(None),
        }
    }

    async fn prepared_delete(
        &self,
        profile: &EntityProfile,
        rules: &GatewayRuleSet,
        backend: &Arc<dyn EntityBackend>,
        filters: &[FilterMask],
        options: &CallOptions,
    ) -> CoreResult<Option<Record>> {
        pipeline::validate_masks(profile, filters)?;
        let masks = pipeline::obfuscate_masks(rules, filters)?;
        let masks = pipeline::apply_visibility(rules, masks, options);

        if rules.keeps_deleted() && !options.forces_delete() {
            let prior = match backend.fetch_first(profile.name(), &masks).await? {
                Some(prior) => prior,
                None => return Ok(None),
            };
            let mut marks = Record::new();
            for (field, rule) in rules.defaults(Operation::Delete) {
                marks.set(field.clone(), rule.apply(&prior));
            }
            pipeline::obfuscate_record(rules, &mut marks)?;
            let selector = key_mask(profile, &prior);
            match backend.update(profile.name(), &[selector], marks).await? {
                Some(mut marked) => {
                    pipeline::deobfuscate_record(rules, &mut marked)?;
                    Ok(Some(marked.project(profile)))
                }
                None => Ok(None),
            }
        } else {
            match backend.remove(profile.name(), &masks).await? {
                Some(mut removed) => {
                    pipeline::deobfuscate_record(rules, &mut removed)?;
                    Ok(Some(removed.project(profile)))
                }
                None => Ok(None),
            }
        }
    }
}
