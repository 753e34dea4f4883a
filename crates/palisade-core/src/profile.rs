//! Declarative entity profiles.
//!
//! A profile describes one entity type: its fields (with storage kind and
//! constraint flags), per-operation default rules, and the gateway metadata
//! (authorization token, obfuscation assignments, soft-delete policy).
//! Profiles are data; backends derive their native schema from them and the
//! gateway compiles them into rule sets.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::record::Record;

/// Storage kind of a profile field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Integer values.
    Int,
    /// Floating point values.
    Float,
    /// Boolean values.
    Bool,
    /// Single characters or short markers.
    Char,
    /// Short strings.
    Str,
    /// Unbounded text.
    Text,
    /// Timestamps, carried as ISO-8601 strings.
    Datetime,
}

impl FieldKind {
    /// Canonical kind name, as used in profile listings.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Char => "char",
            Self::Str => "str",
            Self::Text => "text",
            Self::Datetime => "datetime",
        }
    }
}

/// Gateway operations that can carry default rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Read operations.
    Get,
    /// Creation operations.
    Post,
    /// Update operations.
    Patch,
    /// Deletion operations.
    Delete,
}

impl Operation {
    /// Lowercase operation name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Patch => "patch",
            Self::Delete => "delete",
        }
    }
}

/// A default-value rule: a pure function over the in-flight record.
///
/// Rules run during the gateway's default-injection step and overwrite the
/// target field with their result. A rule receives the record as it stands,
/// so it can derive its value from other fields.
#[derive(Clone)]
pub struct DefaultRule(Arc<dyn Fn(&Record) -> Value + Send + Sync>);

impl DefaultRule {
    /// Rule that always yields `value`.
    #[must_use]
    pub fn constant(value: Value) -> Self {
        Self(Arc::new(move |_| value.clone()))
    }

    /// Rule that yields the current UTC timestamp as an ISO-8601 string.
    #[must_use]
    pub fn timestamp() -> Self {
        Self(Arc::new(|_| {
            Value::String(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string())
        }))
    }

    /// Rule computed from the in-flight record.
    #[must_use]
    pub fn compute<F>(rule: F) -> Self
    where
        F: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(rule))
    }

    /// Applies the rule to a record.
    #[must_use]
    pub fn apply(&self, record: &Record) -> Value {
        (self.0)(record)
    }
}

impl fmt::Debug for DefaultRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DefaultRule")
    }
}

/// Declaration of a single profile field.
#[derive(Clone, Debug)]
pub struct FieldProfile {
    name: String,
    kind: FieldKind,
    key: bool,
    autoincrement: bool,
    required: bool,
    unique: bool,
    not_null: bool,
    description: Option<String>,
    defaults: HashMap<Operation, DefaultRule>,
}

impl FieldProfile {
    /// Creates a field declaration with all flags cleared.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            key: false,
            autoincrement: false,
            required: false,
            unique: false,
            not_null: false,
            description: None,
            defaults: HashMap::new(),
        }
    }

    /// Marks the field as part of the entity key.
    #[must_use]
    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    /// Marks the field as backend-assigned on insert.
    #[must_use]
    pub fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    /// Marks the field as required on creation.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the field as unique across the entity type.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Forbids null values for the field.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Attaches a human-readable description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attaches a default rule for creation.
    #[must_use]
    pub fn post_default(mut self, rule: DefaultRule) -> Self {
        self.defaults.insert(Operation::Post, rule);
        self
    }

    /// Attaches a default rule for updates.
    #[must_use]
    pub fn patch_default(mut self, rule: DefaultRule) -> Self {
        self.defaults.insert(Operation::Patch, rule);
        self
    }

    /// Attaches a default rule for deletion; for soft-deleted types this rule
    /// produces the inactive marker.
    #[must_use]
    pub fn delete_default(mut self, rule: DefaultRule) -> Self {
        self.defaults.insert(Operation::Delete, rule);
        self
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage kind.
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Whether the field is part of the entity key.
    #[must_use]
    pub fn is_key(&self) -> bool {
        self.key
    }

    /// Whether the backend assigns the field on insert.
    #[must_use]
    pub fn is_autoincrement(&self) -> bool {
        self.autoincrement
    }

    /// Whether the field is required on creation.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Whether values must be unique across the entity type.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Whether null values are forbidden.
    #[must_use]
    pub fn is_not_null(&self) -> bool {
        self.not_null
    }

    /// Field description, if declared.
    #[must_use]
    pub fn describe(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Default rule for `operation`, if declared.
    #[must_use]
    pub fn default_for(&self, operation: Operation) -> Option<&DefaultRule> {
        self.defaults.get(&operation)
    }
}

/// Profile metadata: the cross-cutting concerns attached to an entity type.
#[derive(Clone, Debug, Default)]
pub struct ProfileMeta {
    /// Logical schema or namespace the type belongs to.
    pub schema: Option<String>,
    /// Human-readable description of the type.
    pub description: Option<String>,
    /// Obfuscator name per field, applied to inbound data and filter values.
    pub obfuscate: HashMap<String, String>,
    /// Obfuscator name per field, applied to outbound data.
    pub deobfuscate: HashMap<String, String>,
    /// SHA-256 hex digest of the credential required to touch the type.
    pub authorize: Option<String>,
    /// Whether deletes mark records inactive instead of removing them.
    pub keep_deleted: bool,
}

/// Declarative description of one entity type.
#[derive(Clone, Debug)]
pub struct EntityProfile {
    name: String,
    fields: Vec<FieldProfile>,
    meta: ProfileMeta,
}

impl EntityProfile {
    /// Creates an empty profile for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            meta: ProfileMeta::default(),
        }
    }

    /// Appends a field declaration.
    #[must_use]
    pub fn with_field(mut self, field: FieldProfile) -> Self {
        self.fields.push(field);
        self
    }

    /// Sets the logical schema.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.meta.schema = Some(schema.into());
        self
    }

    /// Sets the type description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.meta.description = Some(description.into());
        self
    }

    /// Requires a credential whose SHA-256 hex digest equals `token` for
    /// every operation on the type.
    #[must_use]
    pub fn authorize(mut self, token: impl Into<String>) -> Self {
        self.meta.authorize = Some(token.into());
        self
    }

    /// Assigns the named obfuscator to `field` for inbound values.
    #[must_use]
    pub fn obfuscate(mut self, field: impl Into<String>, obfuscator: impl Into<String>) -> Self {
        self.meta.obfuscate.insert(field.into(), obfuscator.into());
        self
    }

    /// Assigns the named obfuscator to `field` for outbound values.
    #[must_use]
    pub fn deobfuscate(mut self, field: impl Into<String>, obfuscator: impl Into<String>) -> Self {
        self.meta
            .deobfuscate
            .insert(field.into(), obfuscator.into());
        self
    }

    /// Switches the type to soft deletion.
    #[must_use]
    pub fn keep_deleted(mut self, keep: bool) -> Self {
        self.meta.keep_deleted = keep;
        self
    }

    /// Entity type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields, in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldProfile] {
        &self.fields
    }

    /// Looks up a field declaration by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldProfile> {
        self.fields.iter().find(|field| field.name() == name)
    }

    /// Profile metadata.
    #[must_use]
    pub fn meta(&self) -> &ProfileMeta {
        &self.meta
    }

    /// Names of the fields flagged as keys, in declaration order.
    ///
    /// A profile that flags no key falls back to the full field set, so the
    /// key tuple is never empty.
    #[must_use]
    pub fn key_fields(&self) -> Vec<&str> {
        let keys: Vec<&str> = self
            .fields
            .iter()
            .filter(|field| field.is_key())
            .map(FieldProfile::name)
            .collect();
        if keys.is_empty() {
            return self.fields.iter().map(FieldProfile::name).collect();
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_round_trip() {
        let profile = EntityProfile::new("model")
            .schema("machine_learning")
            .description("Local model files.")
            .keep_deleted(true)
            .with_field(
                FieldProfile::new("id", FieldKind::Int)
                    .key()
                    .autoincrement()
                    .required(),
            )
            .with_field(
                FieldProfile::new("status", FieldKind::Str)
                    .required()
                    .post_default(DefaultRule::constant(json!("unknown"))),
            )
            .with_field(FieldProfile::new("created", FieldKind::Datetime).post_default(
                DefaultRule::timestamp(),
            ))
            .with_field(
                FieldProfile::new("inactive", FieldKind::Char)
                    .delete_default(DefaultRule::constant(json!("X"))),
            );

        assert_eq!(profile.name(), "model");
        assert_eq!(profile.fields().len(), 4);
        assert_eq!(profile.key_fields(), vec!["id"]);
        assert!(profile.meta().keep_deleted);
        assert_eq!(profile.meta().schema.as_deref(), Some("machine_learning"));
        assert!(profile.field("id").unwrap().is_autoincrement());
        assert!(profile.field("missing").is_none());
    }

    #[test]
    fn test_key_fields_fall_back_to_all_fields() {
        let profile = EntityProfile::new("note")
            .with_field(FieldProfile::new("title", FieldKind::Str))
            .with_field(FieldProfile::new("body", FieldKind::Text));
        assert_eq!(profile.key_fields(), vec!["title", "body"]);
    }

    #[test]
    fn test_default_rules() {
        let record = Record::from_value(json!({"name": "alpha"})).unwrap();

        let constant = DefaultRule::constant(json!("open"));
        assert_eq!(constant.apply(&record), json!("open"));

        let computed = DefaultRule::compute(|record| {
            record.get("name").cloned().unwrap_or(Value::Null)
        });
        assert_eq!(computed.apply(&record), json!("alpha"));

        let stamp = DefaultRule::timestamp().apply(&record);
        let text = stamp.as_str().unwrap();
        assert_eq!(text.len(), "2026-01-01 00:00:00".len());
    }

    #[test]
    fn test_field_defaults_by_operation() {
        let field = FieldProfile::new("status", FieldKind::Str)
            .post_default(DefaultRule::constant(json!("open")))
            .delete_default(DefaultRule::constant(json!("closed")));
        assert!(field.default_for(Operation::Post).is_some());
        assert!(field.default_for(Operation::Patch).is_none());
        let rule = field.default_for(Operation::Delete).unwrap();
        assert_eq!(rule.apply(&Record::new()), json!("closed"));
    }
}
