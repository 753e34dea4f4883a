//! Profile registry: validated profiles compiled into per-type rule sets.
//!
//! The registry is built once from entity and linkage profiles, validated
//! eagerly so malformed profiles fail at startup rather than mid-call, and
//! then shared read-only. Hot reload swaps the whole registry atomically.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::linkage::{
    manual_linkage_profile, LinkageKey, LinkageKind, LinkageProfile, MANUAL_LINKAGE_TYPE,
};
use crate::profile::{DefaultRule, EntityProfile, FieldKind, Operation};
use crate::providers::ProviderCatalog;
use crate::record::Record;
use crate::traits::Obfuscator;
use crate::vocabulary::OperatorVocabulary;

/// Compiled per-type rules the gateway applies around backend dispatch.
#[derive(Clone)]
pub struct GatewayRuleSet {
    authorize: Option<String>,
    obfuscate: HashMap<String, Arc<dyn Obfuscator>>,
    deobfuscate: HashMap<String, Arc<dyn Obfuscator>>,
    defaults: HashMap<Operation, Vec<(String, DefaultRule)>>,
    keep_deleted: bool,
    active_markers: Vec<(String, Value)>,
}

impl GatewayRuleSet {
    /// Stored credential digest, when the type requires authorization.
    #[must_use]
    pub fn authorize_digest(&self) -> Option<&str> {
        self.authorize.as_deref()
    }

    /// Obfuscator for a field on the write path, if declared.
    #[must_use]
    pub fn obfuscator(&self, field: &str) -> Option<&dyn Obfuscator> {
        self.obfuscate.get(field).map(Arc::as_ref)
    }

    /// Field obfuscators applied before dispatch.
    #[must_use]
    pub fn obfuscations(&self) -> &HashMap<String, Arc<dyn Obfuscator>> {
        &self.obfuscate
    }

    /// Field obfuscators reversed on results.
    #[must_use]
    pub fn deobfuscations(&self) -> &HashMap<String, Arc<dyn Obfuscator>> {
        &self.deobfuscate
    }

    /// Default rules for an operation, in field declaration order.
    #[must_use]
    pub fn defaults(&self, operation: Operation) -> &[(String, DefaultRule)] {
        self.defaults
            .get(&operation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether delete marks records instead of removing them.
    #[must_use]
    pub fn keeps_deleted(&self) -> bool {
        self.keep_deleted
    }

    /// Marker values identifying soft-deleted records, one per field with a
    /// delete rule. Empty unless the type keeps deleted records.
    #[must_use]
    pub fn active_markers(&self) -> &[(String, Value)] {
        &self.active_markers
    }
}

/// Immutable, validated collection of entity and linkage profiles.
pub struct ProfileRegistry {
    entities: HashMap<String, EntityProfile>,
    rules: HashMap<String, GatewayRuleSet>,
    linkages: HashMap<String, LinkageProfile>,
    vocabulary: OperatorVocabulary,
}

impl ProfileRegistry {
    /// Builds a registry with the canonical operator vocabulary.
    pub fn build(
        entities: impl IntoIterator<Item = EntityProfile>,
        linkages: impl IntoIterator<Item = LinkageProfile>,
        catalog: &ProviderCatalog,
    ) -> CoreResult<Self> {
        Self::build_with_vocabulary(entities, linkages, catalog, OperatorVocabulary::default())
    }

    /// Builds a registry with a caller-supplied operator vocabulary.
    pub fn build_with_vocabulary(
        entities: impl IntoIterator<Item = EntityProfile>,
        linkages: impl IntoIterator<Item = LinkageProfile>,
        catalog: &ProviderCatalog,
        vocabulary: OperatorVocabulary,
    ) -> CoreResult<Self> {
        let mut entity_map: HashMap<String, EntityProfile> = HashMap::new();
        for profile in entities {
            validate_profile(&profile)?;
            if entity_map.contains_key(profile.name()) {
                return Err(CoreError::validation(format!(
                    "duplicate entity type `{}`",
                    profile.name()
                )));
            }
            entity_map.insert(profile.name().to_string(), profile);
        }

        let mut linkage_map: HashMap<String, LinkageProfile> = HashMap::new();
        let mut needs_junction = false;
        for linkage in linkages {
            validate_linkage(&linkage, &entity_map, &vocabulary)?;
            if linkage_map.contains_key(linkage.name()) {
                return Err(CoreError::validation(format!(
                    "duplicate linkage `{}`",
                    linkage.name()
                )));
            }
            needs_junction |= matches!(linkage.kind(), LinkageKind::Manual { .. });
            linkage_map.insert(linkage.name().to_string(), linkage);
        }

        if needs_junction {
            let junction = manual_linkage_profile();
            entity_map.insert(junction.name().to_string(), junction);
        }

        let mut rules = HashMap::new();
        for (name, profile) in &entity_map {
            rules.insert(name.clone(), compile_rules(profile, catalog)?);
        }

        debug!(
            "profile registry compiled: {} entity types, {} linkages",
            entity_map.len(),
            linkage_map.len()
        );

        Ok(Self {
            entities: entity_map,
            rules,
            linkages: linkage_map,
            vocabulary,
        })
    }

    /// Looks up an entity profile.
    pub fn profile(&self, entity_type: &str) -> CoreResult<&EntityProfile> {
        self.entities
            .get(entity_type)
            .ok_or_else(|| CoreError::unknown_entity_type(entity_type))
    }

    /// Looks up the compiled rule set for an entity type.
    pub fn rules(&self, entity_type: &str) -> CoreResult<&GatewayRuleSet> {
        self.rules
            .get(entity_type)
            .ok_or_else(|| CoreError::unknown_entity_type(entity_type))
    }

    /// Key fields of an entity type, in declaration order.
    pub fn key_fields(&self, entity_type: &str) -> CoreResult<Vec<&str>> {
        Ok(self.profile(entity_type)?.key_fields())
    }

    /// Default rules an operation applies for an entity type.
    pub fn defaults(
        &self,
        entity_type: &str,
        operation: Operation,
    ) -> CoreResult<&[(String, DefaultRule)]> {
        Ok(self.rules(entity_type)?.defaults(operation))
    }

    /// Looks up a linkage profile.
    pub fn linkage(&self, name: &str) -> CoreResult<&LinkageProfile> {
        self.linkages
            .get(name)
            .ok_or_else(|| CoreError::unknown_linkage(name))
    }

    /// Whether an entity type is registered.
    #[must_use]
    pub fn contains(&self, entity_type: &str) -> bool {
        self.entities.contains_key(entity_type)
    }

    /// All registered entity type names, sorted for deterministic iteration.
    #[must_use]
    pub fn entity_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.entities.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// All registered linkage names, sorted.
    #[must_use]
    pub fn linkage_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.linkages.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Operator vocabulary masks are resolved against.
    #[must_use]
    pub fn vocabulary(&self) -> &OperatorVocabulary {
        &self.vocabulary
    }
}

/// Key kinds that survive the junction string round trip.
const JUNCTION_KEY_KINDS: [FieldKind; 4] = [
    FieldKind::Int,
    FieldKind::Str,
    FieldKind::Char,
    FieldKind::Text,
];

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Profile names and field names end up as SQL identifiers, so they are
/// restricted to `[A-Za-z_][A-Za-z0-9_]*` up front.
fn validate_identifier(context: &str, name: &str) -> CoreResult<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(CoreError::validation(format!(
            "{context} `{name}` is not a valid identifier"
        )))
    }
}

fn validate_profile(profile: &EntityProfile) -> CoreResult<()> {
    validate_identifier("entity type", profile.name())?;
    if profile.name() == MANUAL_LINKAGE_TYPE {
        return Err(CoreError::validation(format!(
            "entity type `{MANUAL_LINKAGE_TYPE}` is reserved"
        )));
    }
    if profile.fields().is_empty() {
        return Err(CoreError::validation(format!(
            "entity type `{}` declares no fields",
            profile.name()
        )));
    }

    let mut seen = HashSet::new();
    for field in profile.fields() {
        validate_identifier("field", field.name())?;
        if !seen.insert(field.name()) {
            return Err(CoreError::validation(format!(
                "entity type `{}` declares field `{}` twice",
                profile.name(),
                field.name()
            )));
        }
        if field.is_autoincrement() && field.kind() != FieldKind::Int {
            return Err(CoreError::validation(format!(
                "autoincrement field `{}.{}` must be an integer",
                profile.name(),
                field.name()
            )));
        }
    }

    let key_count = profile.key_fields().len();
    for field in profile.fields() {
        if field.is_autoincrement() && (!field.is_key() || key_count > 1) {
            return Err(CoreError::validation(format!(
                "autoincrement field `{}.{}` must be the sole key",
                profile.name(),
                field.name()
            )));
        }
    }

    for field in profile.meta().obfuscate.keys() {
        if profile.field(field).is_none() {
            return Err(CoreError::validation(format!(
                "entity type `{}` obfuscates undeclared field `{field}`",
                profile.name()
            )));
        }
    }
    for field in profile.meta().deobfuscate.keys() {
        if profile.field(field).is_none() {
            return Err(CoreError::validation(format!(
                "entity type `{}` deobfuscates undeclared field `{field}`",
                profile.name()
            )));
        }
    }

    if profile.meta().keep_deleted {
        let has_delete_rule = profile
            .fields()
            .iter()
            .any(|field| field.default_for(Operation::Delete).is_some());
        if !has_delete_rule {
            return Err(CoreError::validation(format!(
                "entity type `{}` keeps deleted records but has no delete rule to mark them",
                profile.name()
            )));
        }
    }

    Ok(())
}

fn validate_linkage_key(
    linkage: &LinkageProfile,
    side: &str,
    profile: &EntityProfile,
    key: &LinkageKey,
    junction: bool,
) -> CoreResult<()> {
    let field = profile.field(&key.column).ok_or_else(|| {
        CoreError::validation(format!(
            "linkage `{}` {side} key `{}` is not declared on `{}`",
            linkage.name(),
            key.column,
            profile.name()
        ))
    })?;
    if field.kind() != key.kind {
        return Err(CoreError::validation(format!(
            "linkage `{}` {side} key `{}` is declared as `{}` but the profile says `{}`",
            linkage.name(),
            key.column,
            key.kind.name(),
            field.kind().name()
        )));
    }
    if junction && !JUNCTION_KEY_KINDS.contains(&key.kind) {
        return Err(CoreError::validation(format!(
            "linkage `{}` {side} key `{}` has kind `{}`, which cannot be carried in a junction record",
            linkage.name(),
            key.column,
            key.kind.name()
        )));
    }
    Ok(())
}

fn validate_linkage(
    linkage: &LinkageProfile,
    entities: &HashMap<String, EntityProfile>,
    vocabulary: &OperatorVocabulary,
) -> CoreResult<()> {
    if linkage.name().is_empty() {
        return Err(CoreError::validation("linkage name must not be empty"));
    }
    if linkage.source() == MANUAL_LINKAGE_TYPE || linkage.target() == MANUAL_LINKAGE_TYPE {
        return Err(CoreError::validation(format!(
            "linkage `{}` may not involve the reserved type `{MANUAL_LINKAGE_TYPE}`",
            linkage.name()
        )));
    }
    let source = entities
        .get(linkage.source())
        .ok_or_else(|| CoreError::unknown_entity_type(linkage.source()))?;
    let target = entities
        .get(linkage.target())
        .ok_or_else(|| CoreError::unknown_entity_type(linkage.target()))?;

    match linkage.kind() {
        LinkageKind::ForeignKey {
            source_key,
            target_key,
        } => {
            validate_linkage_key(linkage, "source", source, source_key, false)?;
            validate_linkage_key(linkage, "target", target, target_key, false)?;
            let column = format!("{}_{}", linkage.source(), source_key.column);
            let declared = target.field(&column).ok_or_else(|| {
                CoreError::validation(format!(
                    "linkage `{}` expects foreign-key column `{column}` on `{}`",
                    linkage.name(),
                    linkage.target()
                ))
            })?;
            if declared.kind() != source_key.kind {
                return Err(CoreError::validation(format!(
                    "foreign-key column `{column}` on `{}` must have kind `{}`",
                    linkage.target(),
                    source_key.kind.name()
                )));
            }
        }
        LinkageKind::Manual {
            source_key,
            target_key,
        } => {
            validate_linkage_key(linkage, "source", source, source_key, true)?;
            validate_linkage_key(linkage, "target", target, target_key, true)?;
        }
        LinkageKind::FilterMasks { templates } => {
            if templates.is_empty() {
                return Err(CoreError::validation(format!(
                    "linkage `{}` declares no expression templates",
                    linkage.name()
                )));
            }
            for template in templates {
                if vocabulary.resolve(&template.operator).is_none() {
                    return Err(CoreError::invalid_operator(&template.operator));
                }
                if target.field(&template.target_field).is_none() {
                    return Err(CoreError::validation(format!(
                        "linkage `{}` template references undeclared target field `{}`",
                        linkage.name(),
                        template.target_field
                    )));
                }
                if source.field(&template.source_field).is_none() {
                    return Err(CoreError::validation(format!(
                        "linkage `{}` template references undeclared source field `{}`",
                        linkage.name(),
                        template.source_field
                    )));
                }
            }
        }
    }

    Ok(())
}

fn compile_rules(profile: &EntityProfile, catalog: &ProviderCatalog) -> CoreResult<GatewayRuleSet> {
    let mut obfuscate = HashMap::new();
    for (field, obfuscator_name) in &profile.meta().obfuscate {
        obfuscate.insert(field.clone(), resolve_obfuscator(profile, obfuscator_name, catalog)?);
    }
    let mut deobfuscate = HashMap::new();
    for (field, obfuscator_name) in &profile.meta().deobfuscate {
        deobfuscate.insert(
            field.clone(),
            resolve_obfuscator(profile, obfuscator_name, catalog)?,
        );
    }

    let mut defaults: HashMap<Operation, Vec<(String, DefaultRule)>> = HashMap::new();
    for field in profile.fields() {
        for operation in [
            Operation::Get,
            Operation::Post,
            Operation::Patch,
            Operation::Delete,
        ] {
            if let Some(rule) = field.default_for(operation) {
                defaults
                    .entry(operation)
                    .or_default()
                    .push((field.name().to_string(), rule.clone()));
            }
        }
    }

    // Marker values are what the delete rules would write into a fresh
    // record; visibility filtering excludes records carrying them.
    let active_markers = if profile.meta().keep_deleted {
        let empty = Record::new();
        defaults
            .get(&Operation::Delete)
            .map(|rules| {
                rules
                    .iter()
                    .map(|(field, rule)| (field.clone(), rule.apply(&empty)))
                    .collect()
            })
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    Ok(GatewayRuleSet {
        authorize: profile.meta().authorize.clone(),
        obfuscate,
        deobfuscate,
        defaults,
        keep_deleted: profile.meta().keep_deleted,
        active_markers,
    })
}

fn resolve_obfuscator(
    profile: &EntityProfile,
    name: &str,
    catalog: &ProviderCatalog,
) -> CoreResult<Arc<dyn Obfuscator>> {
    let provider = catalog.obfuscator(name).ok_or_else(|| {
        let mut known = catalog.obfuscator_names();
        known.sort_unstable();
        CoreError::validation(format!(
            "entity type `{}` references unknown obfuscator `{name}` (known: {})",
            profile.name(),
            known.join(", ")
        ))
    })?;
    Ok(provider.open())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_credential;
    use crate::linkage::LinkageTemplate;
    use crate::profile::FieldProfile;
    use serde_json::json;

    fn widget_profile() -> EntityProfile {
        EntityProfile::new("widget")
            .with_field(
                FieldProfile::new("id", FieldKind::Int)
                    .key()
                    .autoincrement()
                    .required(),
            )
            .with_field(FieldProfile::new("name", FieldKind::Str).required())
            .with_field(
                FieldProfile::new("status", FieldKind::Str)
                    .post_default(DefaultRule::constant(json!("unknown"))),
            )
            .with_field(
                FieldProfile::new("inactive", FieldKind::Char)
                    .delete_default(DefaultRule::constant(json!("X"))),
            )
            .with_field(FieldProfile::new("secret", FieldKind::Text))
            .obfuscate("secret", "base64")
            .deobfuscate("secret", "base64")
            .keep_deleted(true)
    }

    fn gadget_profile() -> EntityProfile {
        EntityProfile::new("gadget")
            .with_field(FieldProfile::new("id", FieldKind::Int).key().autoincrement())
            .with_field(FieldProfile::new("widget_id", FieldKind::Int))
            .with_field(FieldProfile::new("size", FieldKind::Int))
    }

    #[test]
    fn test_build_compiles_rules() {
        let registry = ProfileRegistry::build(
            [widget_profile()],
            [],
            &ProviderCatalog::with_builtins(),
        )
        .unwrap();

        let rules = registry.rules("widget").unwrap();
        assert!(rules.obfuscator("secret").is_some());
        assert!(rules.obfuscator("name").is_none());
        assert!(rules.keeps_deleted());
        assert_eq!(rules.active_markers(), &[("inactive".to_string(), json!("X"))]);

        let post = rules.defaults(Operation::Post);
        assert_eq!(post.len(), 1);
        assert_eq!(post[0].0, "status");
        assert_eq!(rules.defaults(Operation::Get).len(), 0);
    }

    #[test]
    fn test_registry_level_accessors() {
        let registry = ProfileRegistry::build(
            [widget_profile()],
            [],
            &ProviderCatalog::with_builtins(),
        )
        .unwrap();

        assert_eq!(registry.key_fields("widget").unwrap(), vec!["id"]);
        let deletes = registry.defaults("widget", Operation::Delete).unwrap();
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].0, "inactive");
        assert!(matches!(
            registry.key_fields("ghost"),
            Err(CoreError::UnknownEntityType { .. })
        ));
    }

    #[test]
    fn test_unknown_entity_type() {
        let registry =
            ProfileRegistry::build([], [], &ProviderCatalog::with_builtins()).unwrap();
        assert!(matches!(
            registry.profile("ghost"),
            Err(CoreError::UnknownEntityType { .. })
        ));
    }

    #[test]
    fn test_duplicate_entity_type_rejected() {
        let result = ProfileRegistry::build(
            [widget_profile(), widget_profile()],
            [],
            &ProviderCatalog::with_builtins(),
        );
        assert!(matches!(result, Err(CoreError::Validation { .. })));
    }

    #[test]
    fn test_bad_identifiers_rejected() {
        let profile = EntityProfile::new("drop table; --")
            .with_field(FieldProfile::new("id", FieldKind::Int).key());
        let result = ProfileRegistry::build([profile], [], &ProviderCatalog::with_builtins());
        assert!(matches!(result, Err(CoreError::Validation { .. })));

        let profile = EntityProfile::new("widget")
            .with_field(FieldProfile::new("na me", FieldKind::Str));
        let result = ProfileRegistry::build([profile], [], &ProviderCatalog::with_builtins());
        assert!(matches!(result, Err(CoreError::Validation { .. })));
    }

    #[test]
    fn test_reserved_type_rejected() {
        let profile = EntityProfile::new(MANUAL_LINKAGE_TYPE)
            .with_field(FieldProfile::new("id", FieldKind::Int).key());
        let result = ProfileRegistry::build([profile], [], &ProviderCatalog::with_builtins());
        assert!(matches!(result, Err(CoreError::Validation { .. })));
    }

    #[test]
    fn test_unknown_obfuscator_rejected() {
        let profile = EntityProfile::new("widget")
            .with_field(FieldProfile::new("secret", FieldKind::Text))
            .obfuscate("secret", "rot13");
        let result = ProfileRegistry::build([profile], [], &ProviderCatalog::with_builtins());
        assert!(matches!(result, Err(CoreError::Validation { .. })));
    }

    #[test]
    fn test_obfuscating_undeclared_field_rejected() {
        let profile = EntityProfile::new("widget")
            .with_field(FieldProfile::new("id", FieldKind::Int).key())
            .obfuscate("ghost", "base64");
        let result = ProfileRegistry::build([profile], [], &ProviderCatalog::with_builtins());
        assert!(matches!(result, Err(CoreError::Validation { .. })));
    }

    #[test]
    fn test_keep_deleted_requires_delete_rule() {
        let profile = EntityProfile::new("widget")
            .with_field(FieldProfile::new("id", FieldKind::Int).key())
            .keep_deleted(true);
        let result = ProfileRegistry::build([profile], [], &ProviderCatalog::with_builtins());
        assert!(matches!(result, Err(CoreError::Validation { .. })));
    }

    #[test]
    fn test_authorize_digest_compiled() {
        let profile = EntityProfile::new("vault")
            .with_field(FieldProfile::new("id", FieldKind::Int).key())
            .authorize(hash_credential("sesame"));
        let registry =
            ProfileRegistry::build([profile], [], &ProviderCatalog::with_builtins()).unwrap();
        assert_eq!(
            registry.rules("vault").unwrap().authorize_digest(),
            Some(hash_credential("sesame").as_str())
        );
    }

    #[test]
    fn test_foreign_key_linkage_validation() {
        let linkage = LinkageProfile::new(
            "widget_gadgets",
            "widget",
            "gadget",
            LinkageKind::ForeignKey {
                source_key: LinkageKey::new("id", FieldKind::Int),
                target_key: LinkageKey::new("id", FieldKind::Int),
            },
        );

        // gadget declares widget_id, so the linkage is accepted
        let registry = ProfileRegistry::build(
            [widget_profile(), gadget_profile()],
            [linkage.clone()],
            &ProviderCatalog::with_builtins(),
        )
        .unwrap();
        assert_eq!(registry.linkage_names(), vec!["widget_gadgets"]);

        // without the column the linkage is rejected
        let bare_gadget = EntityProfile::new("gadget")
            .with_field(FieldProfile::new("id", FieldKind::Int).key());
        let result = ProfileRegistry::build(
            [widget_profile(), bare_gadget],
            [linkage],
            &ProviderCatalog::with_builtins(),
        );
        assert!(matches!(result, Err(CoreError::Validation { .. })));
    }

    #[test]
    fn test_linkage_to_unknown_type_rejected() {
        let linkage = LinkageProfile::new(
            "widget_ghosts",
            "widget",
            "ghost",
            LinkageKind::FilterMasks {
                templates: vec![LinkageTemplate::new("name", "equals", "name")],
            },
        );
        let result = ProfileRegistry::build(
            [widget_profile()],
            [linkage],
            &ProviderCatalog::with_builtins(),
        );
        assert!(matches!(result, Err(CoreError::UnknownEntityType { .. })));
    }

    #[test]
    fn test_manual_linkage_registers_junction() {
        let linkage = LinkageProfile::new(
            "uses",
            "widget",
            "gadget",
            LinkageKind::Manual {
                source_key: LinkageKey::new("id", FieldKind::Int),
                target_key: LinkageKey::new("id", FieldKind::Int),
            },
        );
        let registry = ProfileRegistry::build(
            [widget_profile(), gadget_profile()],
            [linkage],
            &ProviderCatalog::with_builtins(),
        )
        .unwrap();

        assert!(registry.contains(MANUAL_LINKAGE_TYPE));
        assert!(registry.rules(MANUAL_LINKAGE_TYPE).is_ok());

        // no manual linkage, no junction type
        let registry = ProfileRegistry::build(
            [widget_profile(), gadget_profile()],
            [],
            &ProviderCatalog::with_builtins(),
        )
        .unwrap();
        assert!(!registry.contains(MANUAL_LINKAGE_TYPE));
    }

    #[test]
    fn test_manual_linkage_key_kinds_checked() {
        let scaled = EntityProfile::new("scaled")
            .with_field(FieldProfile::new("factor", FieldKind::Float).key());
        let linkage = LinkageProfile::new(
            "scales",
            "scaled",
            "gadget",
            LinkageKind::Manual {
                source_key: LinkageKey::new("factor", FieldKind::Float),
                target_key: LinkageKey::new("id", FieldKind::Int),
            },
        );
        let result = ProfileRegistry::build(
            [scaled, gadget_profile()],
            [linkage],
            &ProviderCatalog::with_builtins(),
        );
        assert!(matches!(result, Err(CoreError::Validation { .. })));
    }

    #[test]
    fn test_template_operator_resolved_at_build() {
        let linkage = LinkageProfile::new(
            "similar",
            "widget",
            "gadget",
            LinkageKind::FilterMasks {
                templates: vec![LinkageTemplate::new("size", "bigger_than", "id")],
            },
        );
        let result = ProfileRegistry::build(
            [widget_profile(), gadget_profile()],
            [linkage],
            &ProviderCatalog::with_builtins(),
        );
        assert!(matches!(result, Err(CoreError::InvalidOperator { .. })));
    }

    #[test]
    fn test_entity_types_sorted() {
        let registry = ProfileRegistry::build(
            [gadget_profile(), widget_profile()],
            [],
            &ProviderCatalog::with_builtins(),
        )
        .unwrap();
        assert_eq!(registry.entity_types(), vec!["gadget", "widget"]);
    }
}
