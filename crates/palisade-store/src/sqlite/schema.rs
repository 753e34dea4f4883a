//! Table derivation from entity profiles.

use palisade_core::profile::FieldKind;
use palisade_core::EntityProfile;

use super::translate::quote_identifier;

fn column_type(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Int | FieldKind::Bool => "INTEGER",
        FieldKind::Float => "REAL",
        FieldKind::Char | FieldKind::Str | FieldKind::Text | FieldKind::Datetime => "TEXT",
    }
}

/// Builds the idempotent DDL statement for one entity type.
///
/// A sole integer key with autoincrement becomes `INTEGER PRIMARY KEY
/// AUTOINCREMENT`; any other key set, including the full-tuple fallback of
/// a keyless profile, becomes a table-level primary key.
pub fn create_table_sql(profile: &EntityProfile) -> String {
    let keys = profile.key_fields();
    let inline_key = keys.len() == 1
        && profile
            .field(keys[0])
            .map_or(false, |field| field.is_autoincrement());

    let mut columns = Vec::with_capacity(profile.fields().len() + 1);
    for field in profile.fields() {
        let mut parts = vec![
            quote_identifier(field.name()),
            column_type(field.kind()).to_string(),
        ];
        if inline_key && field.is_key() {
            parts.push("PRIMARY KEY AUTOINCREMENT".to_string());
        } else {
            if field.is_unique() {
                parts.push("UNIQUE".to_string());
            }
            if field.is_not_null() || field.is_required() {
                parts.push("NOT NULL".to_string());
            }
        }
        columns.push(parts.join(" "));
    }

    if !inline_key && !keys.is_empty() {
        let list = keys
            .iter()
            .map(|key| quote_identifier(key))
            .collect::<Vec<_>>()
            .join(", ");
        columns.push(format!("PRIMARY KEY ({list})"));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_identifier(profile.name()),
        columns.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_core::profile::FieldProfile;

    #[test]
    fn test_autoincrement_key_inlined() {
        let profile = EntityProfile::new("widget")
            .with_field(
                FieldProfile::new("id", FieldKind::Int)
                    .key()
                    .autoincrement(),
            )
            .with_field(FieldProfile::new("name", FieldKind::Str).required().unique())
            .with_field(FieldProfile::new("weight", FieldKind::Float));

        assert_eq!(
            create_table_sql(&profile),
            "CREATE TABLE IF NOT EXISTS \"widget\" (\
             \"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"name\" TEXT UNIQUE NOT NULL, \
             \"weight\" REAL)"
        );
    }

    #[test]
    fn test_composite_key_at_table_level() {
        let profile = EntityProfile::new("shipment")
            .with_field(FieldProfile::new("region", FieldKind::Str).key())
            .with_field(FieldProfile::new("number", FieldKind::Int).key())
            .with_field(FieldProfile::new("sealed", FieldKind::Bool).not_null());

        assert_eq!(
            create_table_sql(&profile),
            "CREATE TABLE IF NOT EXISTS \"shipment\" (\
             \"region\" TEXT, \
             \"number\" INTEGER, \
             \"sealed\" INTEGER NOT NULL, \
             PRIMARY KEY (\"region\", \"number\"))"
        );
    }

    #[test]
    fn test_keyless_profile_keys_the_full_tuple() {
        let profile = EntityProfile::new("note")
            .with_field(FieldProfile::new("body", FieldKind::Text))
            .with_field(FieldProfile::new("written", FieldKind::Datetime));

        assert_eq!(
            create_table_sql(&profile),
            "CREATE TABLE IF NOT EXISTS \"note\" (\
             \"body\" TEXT, \
             \"written\" TEXT, \
             PRIMARY KEY (\"body\", \"written\"))"
        );
    }
}
