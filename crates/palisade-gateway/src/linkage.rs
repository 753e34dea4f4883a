//! Linkage resolver: cross-entity relationships over the gateway operations.
//!
//! The resolver owns no dispatch machinery of its own. Every strategy
//! composes the public gateway operations, so authorization, visibility and
//! obfuscation apply per touched entity type exactly as they would for a
//! direct call.

use std::collections::HashSet;

use serde_json::{json, Value};

use palisade_core::linkage::{parse_key, stringify_key, LinkageKey, MANUAL_LINKAGE_TYPE};
use palisade_core::{
    ComparisonOp, CoreError, CoreResult, FilterMask, LinkageKind, LinkageProfile, Record,
};

use crate::gateway::{key_mask, EntityGateway};
use crate::options::CallOptions;

/// Equality constraints identifying the junction records of one linkage and
/// source record.
fn junction_mask(linkage: &str, source_type: &str, source_key: &str) -> FilterMask {
    FilterMask::empty()
        .with_expression("linkage", ComparisonOp::Equals, json!(linkage))
        .with_expression("source_type", ComparisonOp::Equals, json!(source_type))
        .with_expression("source_key", ComparisonOp::Equals, json!(source_key))
}

/// Narrows `mask` to one junction pair by appending the target constraints.
fn pair_mask(mask: FilterMask, target_type: &str, target_key: &str) -> FilterMask {
    mask.with_expression("target_type", ComparisonOp::Equals, json!(target_type))
        .with_expression("target_key", ComparisonOp::Equals, json!(target_key))
}

/// Appends one equality to every mask, so each disjunct carries the
/// constraint. No masks means the constraint stands alone.
fn and_equals(masks: &[FilterMask], field: &str, value: &Value) -> Vec<FilterMask> {
    let masks = if masks.is_empty() {
        vec![FilterMask::empty()]
    } else {
        masks.to_vec()
    };
    masks
        .into_iter()
        .map(|mask| mask.with_expression(field.to_string(), ComparisonOp::Equals, value.clone()))
        .collect()
}

fn linkage_key_value(record: &Record, key: &LinkageKey) -> Value {
    record.get(&key.column).cloned().unwrap_or(Value::Null)
}

impl EntityGateway {
    /// Records of the linkage's target type related to the single source
    /// record matching `source_filters`. Empty when the source is absent.
    pub async fn get_linked(
        &self,
        name: &str,
        source_filters: &[FilterMask],
        target_filters: &[FilterMask],
        options: &CallOptions,
    ) -> CoreResult<Vec<Record>> {
        let registry = self.registry();
        let linkage = registry.linkage(name)?;
        let source = match self.get(linkage.source(), source_filters, options).await? {
            Some(source) => source,
            None => return Ok(Vec::new()),
        };

        match linkage.kind() {
            LinkageKind::ForeignKey { source_key, .. } => {
                let column = format!("{}_{}", linkage.source(), source_key.column);
                let key_value = linkage_key_value(&source, source_key);
                if key_value.is_null() {
                    return Ok(Vec::new());
                }
                let masks = and_equals(target_filters, &column, &key_value);
                self.get_all(linkage.target(), &masks, options).await
            }
            LinkageKind::Manual {
                source_key,
                target_key,
            } => {
                let encoded = stringify_key(&linkage_key_value(&source, source_key))?;
                let junctions = self
                    .get_all(
                        MANUAL_LINKAGE_TYPE,
                        &[junction_mask(name, linkage.source(), &encoded)],
                        options,
                    )
                    .await?;

                let mut seen = HashSet::new();
                let mut masks = Vec::new();
                for junction in &junctions {
                    let text = match junction.get("target_key").and_then(Value::as_str) {
                        Some(text) => text,
                        None => continue,
                    };
                    if seen.insert(text.to_string()) {
                        masks.push(FilterMask::empty().with_expression(
                            target_key.column.clone(),
                            ComparisonOp::Equals,
                            parse_key(target_key.kind, text)?,
                        ));
                    }
                }
                if masks.is_empty() {
                    return Ok(Vec::new());
                }
                self.get_all(linkage.target(), &masks, options).await
            }
            LinkageKind::FilterMasks { templates } => {
                let vocabulary = registry.vocabulary();
                let mut materialized = Vec::with_capacity(templates.len());
                for template in templates {
                    let relative = FilterMask::relative(
                        [(
                            template.target_field.clone(),
                            template.operator.as_str(),
                            json!(template.source_field),
                        )],
                        vocabulary,
                    )?;
                    materialized.push(relative.resolve_relative(&source)?);
                }
                let combined = combine_filters(&materialized, target_filters);
                self.get_all(linkage.target(), &combined, options).await
            }
        }
    }

    /// Relates the single source matching `source_filters` to every target
    /// matching `target_filters`, returning the affected targets.
    ///
    /// Foreign-key linkages point the targets' linkage column at the source;
    /// manual linkages write junction records, skipping pairs already linked.
    /// Filter-mask linkages derive relationships and cannot store them.
    pub async fn link(
        &self,
        name: &str,
        source_filters: &[FilterMask],
        target_filters: &[FilterMask],
        options: &CallOptions,
    ) -> CoreResult<Vec<Record>> {
        let registry = self.registry();
        let linkage = registry.linkage(name)?;
        if matches!(linkage.kind(), LinkageKind::FilterMasks { .. }) {
            return Err(CoreError::unsupported_linkage(name, "link"));
        }
        let source = match self.get(linkage.source(), source_filters, options).await? {
            Some(source) => source,
            None => return Ok(Vec::new()),
        };

        match linkage.kind() {
            LinkageKind::ForeignKey { source_key, .. } => {
                let column = format!("{}_{}", linkage.source(), source_key.column);
                let key_value = linkage_key_value(&source, source_key);
                if key_value.is_null() {
                    return Ok(Vec::new());
                }
                self.repoint_targets(linkage, target_filters, &column, key_value, options)
                    .await
            }
            LinkageKind::Manual {
                source_key,
                target_key,
            } => {
                let encoded = stringify_key(&linkage_key_value(&source, source_key))?;
                let targets = self.get_all(linkage.target(), target_filters, options).await?;
                for target in &targets {
                    let target_encoded = stringify_key(&linkage_key_value(target, target_key))?;
                    let pair = pair_mask(
                        junction_mask(name, linkage.source(), &encoded),
                        linkage.target(),
                        &target_encoded,
                    );
                    let linked = self
                        .get(MANUAL_LINKAGE_TYPE, &[pair], options)
                        .await?
                        .is_some();
                    if linked {
                        continue;
                    }
                    let junction = Record::from_value(json!({
                        "linkage": name,
                        "source_type": linkage.source(),
                        "source_key": encoded,
                        "target_type": linkage.target(),
                        "target_key": target_encoded,
                    }))?;
                    self.post(MANUAL_LINKAGE_TYPE, junction, options).await?;
                }
                Ok(targets)
            }
            LinkageKind::FilterMasks { .. } => Err(CoreError::unsupported_linkage(name, "link")),
        }
    }

    /// Severs the relationship between the single source matching
    /// `source_filters` and the targets matching `target_filters`, returning
    /// how many links were removed. Empty target filters sever every link of
    /// the source.
    pub async fn unlink(
        &self,
        name: &str,
        source_filters: &[FilterMask],
        target_filters: &[FilterMask],
        options: &CallOptions,
    ) -> CoreResult<usize> {
        let registry = self.registry();
        let linkage = registry.linkage(name)?;
        if matches!(linkage.kind(), LinkageKind::FilterMasks { .. }) {
            return Err(CoreError::unsupported_linkage(name, "unlink"));
        }
        let source = match self.get(linkage.source(), source_filters, options).await? {
            Some(source) => source,
            None => return Ok(0),
        };

        match linkage.kind() {
            LinkageKind::ForeignKey { source_key, .. } => {
                let column = format!("{}_{}", linkage.source(), source_key.column);
                let key_value = linkage_key_value(&source, source_key);
                if key_value.is_null() {
                    return Ok(0);
                }
                let masks = and_equals(target_filters, &column, &key_value);
                let repointed = self
                    .repoint_targets(linkage, &masks, &column, Value::Null, options)
                    .await?;
                Ok(repointed.len())
            }
            LinkageKind::Manual {
                source_key,
                target_key,
            } => {
                let encoded = stringify_key(&linkage_key_value(&source, source_key))?;
                let mut severed = 0;
                if target_filters.is_empty() {
                    let junction = junction_mask(name, linkage.source(), &encoded);
                    while self
                        .delete(MANUAL_LINKAGE_TYPE, &[junction.clone()], options)
                        .await?
                        .is_some()
                    {
                        severed += 1;
                    }
                } else {
                    let targets = self.get_all(linkage.target(), target_filters, options).await?;
                    for target in &targets {
                        let target_encoded =
                            stringify_key(&linkage_key_value(target, target_key))?;
                        let pair = pair_mask(
                            junction_mask(name, linkage.source(), &encoded),
                            linkage.target(),
                            &target_encoded,
                        );
                        while self
                            .delete(MANUAL_LINKAGE_TYPE, &[pair.clone()], options)
                            .await?
                            .is_some()
                        {
                            severed += 1;
                        }
                    }
                }
                Ok(severed)
            }
            LinkageKind::FilterMasks { .. } => Err(CoreError::unsupported_linkage(name, "unlink")),
        }
    }

    /// Patches the linkage column of every target matching `target_filters`
    /// to `value`, returning the patched records.
    async fn repoint_targets(
        &self,
        linkage: &LinkageProfile,
        target_filters: &[FilterMask],
        column: &str,
        value: Value,
        options: &CallOptions,
    ) -> CoreResult<Vec<Record>> {
        let registry = self.registry();
        let target_profile = registry.profile(linkage.target())?;
        let targets = self.get_all(linkage.target(), target_filters, options).await?;
        let mut affected = Vec::with_capacity(targets.len());
        for target in &targets {
            let selector = key_mask(target_profile, target);
            let mut patch = Record::new();
            patch.set(column, value.clone());
            let outcome = self
                .patch(linkage.target(), &[selector], patch, options)
                .await?;
            if let Some(record) = outcome {
                affected.push(record);
            }
        }
        Ok(affected)
    }
}

/// Cross-product conjunction: every derived mask joined with every caller
/// mask. Without caller masks the derived masks stand alone.
fn combine_filters(derived: &[FilterMask], callers: &[FilterMask]) -> Vec<FilterMask> {
    if callers.is_empty() {
        return derived.to_vec();
    }
    let mut combined = Vec::with_capacity(derived.len() * callers.len());
    for mask in derived {
        for caller in callers {
            let mut merged = caller.clone();
            for expression in mask.expressions() {
                merged = merged.with_expression(
                    expression.field().to_string(),
                    expression.op(),
                    expression.value().clone(),
                );
            }
            combined.push(merged);
        }
    }
    combined
}
