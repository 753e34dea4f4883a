//! Predicate masks: backend-independent filter constraints.
//!
//! A filter mask carries a list of constraint expressions of the form
//! `(field, operator, value)`. A datum matches the mask when every expression
//! holds; "or"-logic is expressed by passing several masks and accepting any
//! match. Flat masks address top-level fields, deep masks address
//! dot-separated paths into nested values, and relative masks compare against
//! values unwrapped from a separate reference record.

use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use crate::vocabulary::{ComparisonOp, OperatorVocabulary};

/// One constraint inside a filter mask.
#[derive(Clone, Debug, PartialEq)]
pub struct Expression {
    field: String,
    op: ComparisonOp,
    value: Value,
}

impl Expression {
    /// Field (or dot-separated field path, for deep masks) the constraint applies to.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Comparison operator.
    #[must_use]
    pub fn op(&self) -> ComparisonOp {
        self.op
    }

    /// Comparison value. For relative masks this is a field path into the
    /// reference record.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Field lookup on flat data.
///
/// Fails when the datum does not carry the field at all; a field that is
/// present with a null value resolves normally.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlatResolver;

impl FlatResolver {
    fn resolve<'a>(&self, datum: &'a Record, field: &str) -> CoreResult<Option<&'a Value>> {
        match datum.get(field) {
            Some(value) => Ok(Some(value)),
            None => Err(CoreError::field_not_found(field)),
        }
    }
}

/// Field lookup along a dot-separated path into nested objects.
///
/// A path whose intermediate or final segment is absent resolves to nothing
/// rather than an error, so deep masks silently skip data that does not carry
/// the nested shape.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeepResolver;

impl DeepResolver {
    fn resolve<'a>(&self, datum: &'a Record, path: &str) -> CoreResult<Option<&'a Value>> {
        let mut segments = path.split('.');
        let first = match segments.next() {
            Some(segment) => segment,
            None => return Ok(None),
        };
        let mut current = match datum.get(first) {
            Some(value) => value,
            None => return Ok(None),
        };
        for segment in segments {
            match current {
                Value::Object(map) => match map.get(segment) {
                    Some(next) => current = next,
                    None => return Ok(None),
                },
                _ => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}

#[derive(Clone, Copy, Debug)]
enum Resolver {
    Flat(FlatResolver),
    Deep(DeepResolver),
}

impl Resolver {
    fn resolve<'a>(&self, datum: &'a Record, field: &str) -> CoreResult<Option<&'a Value>> {
        match self {
            Self::Flat(flat) => flat.resolve(datum, field),
            Self::Deep(deep) => deep.resolve(datum, field),
        }
    }
}

/// An immutable conjunction of filter expressions.
#[derive(Clone, Debug)]
pub struct FilterMask {
    expressions: Vec<Expression>,
    resolver: Resolver,
    relative: bool,
}

impl FilterMask {
    /// Builds a flat mask from `(field, operator, value)` triples.
    ///
    /// Every operator name is resolved against `vocabulary` up front; an
    /// unknown name fails the whole construction.
    pub fn new<F, O>(
        expressions: impl IntoIterator<Item = (F, O, Value)>,
        vocabulary: &OperatorVocabulary,
    ) -> CoreResult<Self>
    where
        F: Into<String>,
        O: AsRef<str>,
    {
        Self::build(expressions, vocabulary, false, false)
    }

    /// A flat mask with no constraints; matches everything until extended
    /// with [`FilterMask::with_expression`].
    #[must_use]
    pub fn empty() -> Self {
        Self {
            expressions: Vec::new(),
            resolver: Resolver::Flat(FlatResolver),
            relative: false,
        }
    }

    /// Builds a deep mask whose fields are dot-separated paths.
    pub fn deep<F, O>(
        expressions: impl IntoIterator<Item = (F, O, Value)>,
        vocabulary: &OperatorVocabulary,
    ) -> CoreResult<Self>
    where
        F: Into<String>,
        O: AsRef<str>,
    {
        Self::build(expressions, vocabulary, true, false)
    }

    /// Builds a relative mask whose comparison values are field paths into a
    /// reference record supplied at evaluation time.
    pub fn relative<F, O>(
        expressions: impl IntoIterator<Item = (F, O, Value)>,
        vocabulary: &OperatorVocabulary,
    ) -> CoreResult<Self>
    where
        F: Into<String>,
        O: AsRef<str>,
    {
        Self::build(expressions, vocabulary, false, true)
    }

    /// Builds a mask that is both deep and relative: fields and comparison
    /// values are dot-separated paths.
    pub fn deep_relative<F, O>(
        expressions: impl IntoIterator<Item = (F, O, Value)>,
        vocabulary: &OperatorVocabulary,
    ) -> CoreResult<Self>
    where
        F: Into<String>,
        O: AsRef<str>,
    {
        Self::build(expressions, vocabulary, true, true)
    }

    fn build<F, O>(
        expressions: impl IntoIterator<Item = (F, O, Value)>,
        vocabulary: &OperatorVocabulary,
        deep: bool,
        relative: bool,
    ) -> CoreResult<Self>
    where
        F: Into<String>,
        O: AsRef<str>,
    {
        let expressions = expressions
            .into_iter()
            .map(|(field, operator, value)| {
                let name = operator.as_ref();
                let op = vocabulary
                    .resolve(name)
                    .ok_or_else(|| CoreError::invalid_operator(name))?;
                Ok(Expression {
                    field: field.into(),
                    op,
                    value,
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;
        let resolver = if deep {
            Resolver::Deep(DeepResolver)
        } else {
            Resolver::Flat(FlatResolver)
        };
        Ok(Self {
            expressions,
            resolver,
            relative,
        })
    }

    /// The mask's expressions.
    #[must_use]
    pub fn expressions(&self) -> &[Expression] {
        &self.expressions
    }

    /// Whether fields are resolved as dot-separated paths.
    #[must_use]
    pub fn is_deep(&self) -> bool {
        matches!(self.resolver, Resolver::Deep(_))
    }

    /// Whether comparison values are paths into a reference record.
    #[must_use]
    pub fn is_relative(&self) -> bool {
        self.relative
    }

    /// Whether the mask constrains nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// Checks the mask against a datum.
    ///
    /// Relative masks cannot be checked without a reference record and fail
    /// with a missing-reference error; use [`FilterMask::matches_with`].
    pub fn matches(&self, datum: &Record) -> CoreResult<bool> {
        self.matches_with(datum, None)
    }

    /// Checks the mask against a datum, unwrapping relative comparison values
    /// from `reference`.
    pub fn matches_with(&self, datum: &Record, reference: Option<&Record>) -> CoreResult<bool> {
        for expression in &self.expressions {
            let comparison = match self.comparison_value(expression, reference)? {
                Some(value) => value,
                None => return Ok(false),
            };
            let datum_value = match self.resolver.resolve(datum, &expression.field)? {
                Some(value) => value,
                None => return Ok(false),
            };
            if !expression.op.evaluate(datum_value, &comparison) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Materializes a relative mask into a literal one by unwrapping every
    /// comparison value from `reference`.
    ///
    /// Non-relative masks come back unchanged.
    pub fn resolve_relative(&self, reference: &Record) -> CoreResult<Self> {
        if !self.relative {
            return Ok(self.clone());
        }
        let expressions = self
            .expressions
            .iter()
            .map(|expression| {
                let value = self
                    .reference_value(expression, reference)?
                    .ok_or_else(|| CoreError::missing_reference(expression.field.clone()))?;
                Ok(Expression {
                    field: expression.field.clone(),
                    op: expression.op,
                    value,
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Self {
            expressions,
            resolver: self.resolver,
            relative: false,
        })
    }

    /// Appends one expression built from an already-resolved operator.
    #[must_use]
    pub fn with_expression(
        mut self,
        field: impl Into<String>,
        op: ComparisonOp,
        value: Value,
    ) -> Self {
        self.expressions.push(Expression {
            field: field.into(),
            op,
            value,
        });
        self
    }

    /// Produces a copy with every comparison value passed through `transform`.
    ///
    /// The transform receives the expression's field and current value.
    /// Relative masks come back untouched, their values are paths rather than
    /// data.
    pub fn map_values<F>(&self, transform: F) -> CoreResult<Self>
    where
        F: Fn(&str, &Value) -> CoreResult<Value>,
    {
        if self.relative {
            return Ok(self.clone());
        }
        let expressions = self
            .expressions
            .iter()
            .map(|expression| {
                Ok(Expression {
                    field: expression.field.clone(),
                    op: expression.op,
                    value: transform(&expression.field, &expression.value)?,
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Self {
            expressions,
            resolver: self.resolver,
            relative: false,
        })
    }

    fn comparison_value(
        &self,
        expression: &Expression,
        reference: Option<&Record>,
    ) -> CoreResult<Option<Value>> {
        if !self.relative {
            return Ok(Some(expression.value.clone()));
        }
        let reference =
            reference.ok_or_else(|| CoreError::missing_reference(expression.field.clone()))?;
        self.reference_value(expression, reference)
    }

    fn reference_value(
        &self,
        expression: &Expression,
        reference: &Record,
    ) -> CoreResult<Option<Value>> {
        let path = expression.value.as_str().ok_or_else(|| {
            CoreError::validation(format!(
                "relative comparison on `{}` requires a field path value",
                expression.field
            ))
        })?;
        Ok(self.resolver.resolve(reference, path)?.cloned())
    }
}
