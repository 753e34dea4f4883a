//! Linkage profiles: declarative relationships between entity types.
//!
//! Three strategies are supported. Foreign-key linkages follow a key column
//! the target type carries for the source. Manual linkages go through a
//! reserved junction type whose records pair stringified source and target
//! keys. Filter-mask linkages derive target constraints from source field
//! values through expression templates.

use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::profile::{EntityProfile, FieldKind, FieldProfile};

/// Reserved entity type backing manual linkages.
pub const MANUAL_LINKAGE_TYPE: &str = "manual_linkage";

/// Profile of the junction type backing manual linkages.
///
/// Registered automatically; records are created and removed only by the
/// linkage operations.
#[must_use]
pub fn manual_linkage_profile() -> EntityProfile {
    EntityProfile::new(MANUAL_LINKAGE_TYPE)
        .description("Junction records for manual linkages.")
        .with_field(
            FieldProfile::new("id", FieldKind::Int)
                .key()
                .autoincrement()
                .required(),
        )
        .with_field(
            FieldProfile::new("linkage", FieldKind::Str)
                .required()
                .description("Linkage name."),
        )
        .with_field(
            FieldProfile::new("source_type", FieldKind::Str)
                .required()
                .description("Source entity type."),
        )
        .with_field(
            FieldProfile::new("source_key", FieldKind::Text)
                .required()
                .description("Stringified source key."),
        )
        .with_field(
            FieldProfile::new("target_type", FieldKind::Str)
                .required()
                .description("Target entity type."),
        )
        .with_field(
            FieldProfile::new("target_key", FieldKind::Text)
                .required()
                .description("Stringified target key."),
        )
}

/// A key column on one side of a linkage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkageKey {
    /// Column carrying the key value.
    pub column: String,
    /// Declared kind of the key value.
    pub kind: FieldKind,
}

impl LinkageKey {
    /// Creates a linkage key declaration.
    #[must_use]
    pub fn new(column: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            column: column.into(),
            kind,
        }
    }
}

/// One expression template of a filter-mask linkage.
///
/// At resolution time the template materializes into the constraint
/// `(target_field, operator, source[source_field])`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkageTemplate {
    /// Field on the target type the constraint applies to.
    pub target_field: String,
    /// Operator name, resolved against the active vocabulary.
    pub operator: String,
    /// Field on the source record the comparison value is taken from.
    pub source_field: String,
}

impl LinkageTemplate {
    /// Creates an expression template.
    #[must_use]
    pub fn new(
        target_field: impl Into<String>,
        operator: impl Into<String>,
        source_field: impl Into<String>,
    ) -> Self {
        Self {
            target_field: target_field.into(),
            operator: operator.into(),
            source_field: source_field.into(),
        }
    }
}

/// Resolution strategy of a linkage.
#[derive(Clone, Debug)]
pub enum LinkageKind {
    /// The target type carries a column `{source}_{source_key.column}`
    /// holding the source's key value.
    ForeignKey {
        /// Key column on the source type.
        source_key: LinkageKey,
        /// Key column on the target type.
        target_key: LinkageKey,
    },
    /// Pairs are stored as junction records under the reserved type.
    Manual {
        /// Key column on the source type.
        source_key: LinkageKey,
        /// Key column on the target type.
        target_key: LinkageKey,
    },
    /// Target constraints are derived from source fields through templates.
    FilterMasks {
        /// Expression templates, one target constraint each.
        templates: Vec<LinkageTemplate>,
    },
}

/// Declarative description of one relationship between entity types.
#[derive(Clone, Debug)]
pub struct LinkageProfile {
    name: String,
    source: String,
    target: String,
    kind: LinkageKind,
}

impl LinkageProfile {
    /// Creates a linkage profile.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        kind: LinkageKind,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            target: target.into(),
            kind,
        }
    }

    /// Linkage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source entity type.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Target entity type.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Resolution strategy.
    #[must_use]
    pub fn kind(&self) -> &LinkageKind {
        &self.kind
    }

    /// For foreign-key linkages, the column on the target type holding the
    /// source's key value.
    #[must_use]
    pub fn foreign_key_column(&self) -> Option<String> {
        match &self.kind {
            LinkageKind::ForeignKey { source_key, .. } => {
                Some(format!("{}_{}", self.source, source_key.column))
            }
            _ => None,
        }
    }
}

/// Encodes a key value for junction storage.
///
/// Only integer and string keys survive the string round trip; everything
/// else is rejected.
pub fn stringify_key(value: &Value) -> CoreResult<String> {
    match value {
        Value::Number(number) if number.is_i64() => Ok(number.to_string()),
        Value::String(text) => Ok(text.clone()),
        other => Err(CoreError::validation(format!(
            "key value {other} cannot be carried in a junction record"
        ))),
    }
}

/// Decodes a junction key string back into a typed value.
pub fn parse_key(kind: FieldKind, text: &str) -> CoreResult<Value> {
    match kind {
        FieldKind::Int => text
            .parse::<i64>()
            .map(Value::from)
            .map_err(|err| CoreError::validation(format!("junction key `{text}`: {err}"))),
        FieldKind::Str | FieldKind::Char | FieldKind::Text => Ok(Value::String(text.to_string())),
        other => Err(CoreError::validation(format!(
            "junction keys of kind `{}` are not supported",
            other.name()
        ))),
    }
}
