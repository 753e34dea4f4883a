//! Cross-cutting steps applied around every backend dispatch.
//!
//! Each gateway operation resolves the type's compiled rule set and walks the
//! applicable steps in a fixed order: authorization, default injection,
//! obfuscation, soft-delete visibility, dispatch, then deobfuscation and
//! projection on the way out. The steps are plain functions over the rule
//! set, so single and batch call shapes share them unchanged.

use tracing::debug;

use palisade_core::auth::credential_matches;
use palisade_core::{
    ComparisonOp, CoreError, CoreResult, EntityProfile, FilterMask, GatewayRuleSet, Operation,
    Record,
};

use crate::options::CallOptions;

/// Checks the type's credential requirement against the call options.
///
/// Denial is a value, not an error; callers translate `false` into an empty
/// result so denied access reads the same as no match.
#[must_use]
pub fn authorize(entity_type: &str, rules: &GatewayRuleSet, options: &CallOptions) -> bool {
    match rules.authorize_digest() {
        Some(expected) => {
            let granted = credential_matches(expected, options.credential());
            if !granted {
                debug!("authorization denied for entity type `{}`", entity_type);
            }
            granted
        }
        None => true,
    }
}

/// Applies the operation's default rules to the in-flight record.
///
/// Rules overwrite whatever the caller supplied for the field.
pub fn inject_defaults(rules: &GatewayRuleSet, operation: Operation, record: &mut Record) {
    for (field, rule) in rules.defaults(operation) {
        let value = rule.apply(record);
        record.set(field.clone(), value);
    }
}

/// Obfuscates the declared fields of an outbound record in place.
pub fn obfuscate_record(rules: &GatewayRuleSet, record: &mut Record) -> CoreResult<()> {
    for (field, obfuscator) in rules.obfuscations() {
        let masked = match record.get(field) {
            Some(value) => obfuscator.obfuscate(value)?,
            None => continue,
        };
        record.set(field.clone(), masked);
    }
    Ok(())
}

/// Reverses field obfuscation on a record coming back from a backend.
pub fn deobfuscate_record(rules: &GatewayRuleSet, record: &mut Record) -> CoreResult<()> {
    for (field, obfuscator) in rules.deobfuscations() {
        let cleared = match record.get(field) {
            Some(value) => obfuscator.deobfuscate(value)?,
            None => continue,
        };
        record.set(field.clone(), cleared);
    }
    Ok(())
}

/// Obfuscates filter values for fields with an obfuscate rule, so filters
/// compare against what the backend actually stores.
pub fn obfuscate_masks(
    rules: &GatewayRuleSet,
    masks: &[FilterMask],
) -> CoreResult<Vec<FilterMask>> {
    masks
        .iter()
        .map(|mask| {
            mask.map_values(|field, value| match rules.obfuscator(field) {
                Some(obfuscator) => obfuscator.obfuscate(value),
                None => Ok(value.clone()),
            })
        })
        .collect()
}

/// Narrows a selection to active records on types that keep deleted ones.
///
/// Every mask gets the marker exclusions appended, so each disjunct stays
/// active-only; with no caller masks the exclusions form the sole mask.
/// Callers opting into inactive records pass through untouched.
#[must_use]
pub fn apply_visibility(
    rules: &GatewayRuleSet,
    masks: Vec<FilterMask>,
    options: &CallOptions,
) -> Vec<FilterMask> {
    if !rules.keeps_deleted() || options.includes_inactive() {
        return masks;
    }
    let markers = rules.active_markers();
    if markers.is_empty() {
        return masks;
    }
    let masks = if masks.is_empty() {
        vec![FilterMask::empty()]
    } else {
        masks
    };
    masks
        .into_iter()
        .map(|mask| {
            markers.iter().fold(mask, |mask, (field, marker)| {
                mask.with_expression(field.clone(), ComparisonOp::NotEquals, marker.clone())
            })
        })
        .collect()
}

/// Rejects flat masks naming fields the profile does not declare.
///
/// Deep masks address nested values a profile cannot describe and are left
/// to the backend.
pub fn validate_masks(profile: &EntityProfile, masks: &[FilterMask]) -> CoreResult<()> {
    for mask in masks {
        if mask.is_deep() {
            continue;
        }
        for expression in mask.expressions() {
            if profile.field(expression.field()).is_none() {
                return Err(CoreError::field_not_found(expression.field()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use palisade_core::auth::hash_credential;
    use palisade_core::{
        DefaultRule, FieldKind, FieldProfile, ProfileRegistry, ProviderCatalog,
    };

    fn registry() -> ProfileRegistry {
        let account = EntityProfile::new("account")
            .authorize(hash_credential("letmein"))
            .keep_deleted(true)
            .with_field(
                FieldProfile::new("id", FieldKind::Int)
                    .key()
                    .autoincrement()
                    .required(),
            )
            .with_field(
                FieldProfile::new("secret", FieldKind::Text)
                    .post_default(DefaultRule::constant(json!("plain"))),
            )
            .with_field(
                FieldProfile::new("status", FieldKind::Str)
                    .post_default(DefaultRule::constant(json!("open")))
                    .delete_default(DefaultRule::constant(json!("closed"))),
            )
            .obfuscate("secret", "base64")
            .deobfuscate("secret", "base64");
        ProfileRegistry::build([account], [], &ProviderCatalog::with_builtins()).unwrap()
    }

    #[test]
    fn test_authorize_checks_credential() {
        let registry = registry();
        let rules = registry.rules("account").unwrap();

        assert!(authorize(
            "account",
            rules,
            &CallOptions::new().with_credential("letmein")
        ));
        assert!(!authorize(
            "account",
            rules,
            &CallOptions::new().with_credential("wrong")
        ));
        assert!(!authorize("account", rules, &CallOptions::new()));
    }

    #[test]
    fn test_inject_defaults_overwrites() {
        let registry = registry();
        let rules = registry.rules("account").unwrap();

        let mut record = Record::from_value(json!({"status": "custom"})).unwrap();
        inject_defaults(rules, Operation::Post, &mut record);
        assert_eq!(record.get("status"), Some(&json!("open")));
        assert_eq!(record.get("secret"), Some(&json!("plain")));
    }

    #[test]
    fn test_record_obfuscation_round_trip() {
        let registry = registry();
        let rules = registry.rules("account").unwrap();

        let mut record = Record::from_value(json!({"secret": "hi", "id": 1})).unwrap();
        obfuscate_record(rules, &mut record).unwrap();
        assert_eq!(record.get("secret"), Some(&json!("aGk=")));
        assert_eq!(record.get("id"), Some(&json!(1)));

        deobfuscate_record(rules, &mut record).unwrap();
        assert_eq!(record.get("secret"), Some(&json!("hi")));
    }

    #[test]
    fn test_mask_obfuscation_targets_declared_fields() {
        let registry = registry();
        let rules = registry.rules("account").unwrap();

        let mask = FilterMask::new(
            [("secret", "==", json!("hi")), ("id", "==", json!(1))],
            registry.vocabulary(),
        )
        .unwrap();
        let masked = obfuscate_masks(rules, &[mask]).unwrap();
        assert_eq!(masked[0].expressions()[0].value(), &json!("aGk="));
        assert_eq!(masked[0].expressions()[1].value(), &json!(1));
    }

    #[test]
    fn test_visibility_appends_marker_exclusions() {
        let registry = registry();
        let rules = registry.rules("account").unwrap();

        let masks = apply_visibility(rules, Vec::new(), &CallOptions::new());
        assert_eq!(masks.len(), 1);
        assert_eq!(masks[0].expressions().len(), 1);
        assert_eq!(masks[0].expressions()[0].field(), "status");
        assert_eq!(masks[0].expressions()[0].value(), &json!("closed"));

        let caller = FilterMask::new([("id", "==", json!(1))], registry.vocabulary()).unwrap();
        let masks = apply_visibility(rules, vec![caller], &CallOptions::new());
        assert_eq!(masks[0].expressions().len(), 2);

        let caller = FilterMask::new([("id", "==", json!(1))], registry.vocabulary()).unwrap();
        let masks =
            apply_visibility(rules, vec![caller], &CallOptions::new().include_inactive());
        assert_eq!(masks[0].expressions().len(), 1);
    }

    #[test]
    fn test_validate_masks_rejects_undeclared_flat_fields() {
        let registry = registry();
        let profile = registry.profile("account").unwrap();

        let mask = FilterMask::new([("serial", "==", json!(1))], registry.vocabulary()).unwrap();
        let err = validate_masks(profile, &[mask]).unwrap_err();
        assert!(matches!(err, CoreError::FieldNotFound { field } if field == "serial"));

        let mask =
            FilterMask::deep([("meta.serial", "==", json!(1))], registry.vocabulary()).unwrap();
        validate_masks(profile, &[mask]).unwrap();
    }
}
