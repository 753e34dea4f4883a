//! Filter mask translation into bindable SQLite predicates.
//!
//! Expressions become `IS` / `IS NOT` / `instr` / `IN` forms so null
//! handling matches in-process mask evaluation: equality treats two nulls
//! as equal, and negated operators match rows whose column is null. Values
//! are always bound, never interpolated; field names are checked against
//! the profile before they reach the SQL text.

use palisade_core::{ComparisonOp, CoreError, CoreResult, EntityProfile, FilterMask};
use serde_json::Value;

/// A scalar ready to bind into a SQLite query.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Null,
}

/// Converts a JSON scalar into its bindable form.
/// Arrays and objects have no column representation and are rejected.
pub fn sql_value(value: &Value) -> CoreResult<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(flag) => Ok(SqlValue::Integer(i64::from(*flag))),
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                Ok(SqlValue::Integer(integer))
            } else if let Some(real) = number.as_f64() {
                Ok(SqlValue::Real(real))
            } else {
                Err(CoreError::validation(format!(
                    "number {number} is out of bindable range"
                )))
            }
        }
        Value::String(text) => Ok(SqlValue::Text(text.clone())),
        structured => Err(CoreError::validation(format!(
            "value {structured} cannot be stored in a column"
        ))),
    }
}

/// A WHERE clause with its bind values.
#[derive(Clone, Debug, Default)]
pub struct WherePredicate {
    pub clause: String,
    pub binds: Vec<SqlValue>,
}

/// Translates masks into one predicate: masks OR-combine, expressions
/// within a mask AND-combine, no masks matches everything.
pub fn build_where(profile: &EntityProfile, masks: &[FilterMask]) -> CoreResult<WherePredicate> {
    if masks.is_empty() {
        return Ok(WherePredicate {
            clause: "1".to_string(),
            binds: Vec::new(),
        });
    }

    let mut groups = Vec::with_capacity(masks.len());
    let mut binds = Vec::new();
    for mask in masks {
        groups.push(mask_group(profile, mask, &mut binds)?);
    }

    Ok(WherePredicate {
        clause: groups.join(" OR "),
        binds,
    })
}

fn mask_group(
    profile: &EntityProfile,
    mask: &FilterMask,
    binds: &mut Vec<SqlValue>,
) -> CoreResult<String> {
    if mask.is_deep() {
        return Err(CoreError::validation(
            "deep filter masks cannot be translated to columns",
        ));
    }
    if mask.is_relative() {
        return Err(CoreError::validation(
            "relative filter masks must be resolved before dispatch",
        ));
    }
    if mask.is_empty() {
        return Ok("(1)".to_string());
    }

    let mut parts = Vec::with_capacity(mask.expressions().len());
    for expression in mask.expressions() {
        let field = expression.field();
        if profile.field(field).is_none() {
            return Err(CoreError::field_not_found(field));
        }
        parts.push(expression_predicate(
            field,
            expression.op(),
            expression.value(),
            binds,
        )?);
    }
    Ok(format!("({})", parts.join(" AND ")))
}

fn expression_predicate(
    field: &str,
    op: ComparisonOp,
    value: &Value,
    binds: &mut Vec<SqlValue>,
) -> CoreResult<String> {
    let column = quote_identifier(field);
    match op {
        ComparisonOp::Equals => {
            binds.push(sql_value(value)?);
            Ok(format!("{column} IS ?"))
        }
        ComparisonOp::NotEquals => {
            binds.push(sql_value(value)?);
            Ok(format!("{column} IS NOT ?"))
        }
        ComparisonOp::Contains => {
            // a non-string needle is contained in no stored scalar
            if !value.is_string() {
                return Ok("0".to_string());
            }
            binds.push(sql_value(value)?);
            Ok(format!("instr({column}, ?) > 0"))
        }
        ComparisonOp::NotContains => {
            if !value.is_string() {
                return Ok("1".to_string());
            }
            binds.push(sql_value(value)?);
            Ok(format!("(instr({column}, ?) = 0 OR {column} IS NULL)"))
        }
        ComparisonOp::IsContained => membership(&column, value, false, binds),
        ComparisonOp::NotIsContained => membership(&column, value, true, binds),
    }
}

/// `IN` / `NOT IN` forms. A null element in the collection stands for
/// "the column is null", mirroring in-process membership; a string
/// collection means substring containment of the column value.
fn membership(
    column: &str,
    collection: &Value,
    negate: bool,
    binds: &mut Vec<SqlValue>,
) -> CoreResult<String> {
    let elements = match collection {
        Value::Array(elements) => elements,
        Value::String(_) => {
            binds.push(sql_value(collection)?);
            return Ok(if negate {
                format!("(instr(?, {column}) = 0 OR {column} IS NULL)")
            } else {
                format!("instr(?, {column}) > 0")
            });
        }
        other => {
            return Err(CoreError::validation(format!(
                "membership comparisons need an array or string collection, got {other}"
            )))
        }
    };

    let mut placeholders = Vec::new();
    let mut has_null = false;
    for element in elements {
        match sql_value(element)? {
            SqlValue::Null => has_null = true,
            scalar => {
                binds.push(scalar);
                placeholders.push("?");
            }
        }
    }

    if placeholders.is_empty() {
        return Ok(match (negate, has_null) {
            (false, false) => "0".to_string(),
            (false, true) => format!("{column} IS NULL"),
            (true, false) => "1".to_string(),
            (true, true) => format!("{column} IS NOT NULL"),
        });
    }

    let list = placeholders.join(", ");
    Ok(match (negate, has_null) {
        (false, false) => format!("{column} IN ({list})"),
        (false, true) => format!("({column} IN ({list}) OR {column} IS NULL)"),
        (true, false) => format!("({column} NOT IN ({list}) OR {column} IS NULL)"),
        (true, true) => format!("({column} NOT IN ({list}) AND {column} IS NOT NULL)"),
    })
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{name}\"")
}
