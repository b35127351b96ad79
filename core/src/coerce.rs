//! Conversion of raw strings into typed [`Value`]s.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::types::{FieldKind, FieldSpec, Value};

/// A value could not be converted to its field's type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    #[error("`{0}` is not a boolean")]
    NotABoolean(String),
    #[error("`{0}` is not a number")]
    NotANumber(String),
    #[error("`{0}` is not an integer")]
    NotAnInteger(String),
    /// Failure reported by a custom [`ValueParser`].
    #[error("{0}")]
    Custom(String),
}

impl CoercionError {
    pub fn custom(message: impl Into<String>) -> Self {
        CoercionError::Custom(message.into())
    }
}

/// Read-only view handed to custom parsers.
///
/// Flags are coerced root command first, in declaration order, then the
/// selected command's positional args; `flags` and `args` hold everything
/// coerced before the current field.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub flags: &'a BTreeMap<String, Value>,
    pub args: &'a BTreeMap<String, Value>,
    pub env: &'a HashMap<String, String>,
    /// `var_name` of the field being coerced.
    pub field: &'a str,
}

impl ParseContext<'_> {
    pub fn flag(&self, var_name: &str) -> Option<&Value> {
        self.flags.get(var_name)
    }

    pub fn arg(&self, var_name: &str) -> Option<&Value> {
        self.args.get(var_name)
    }
}

/// Field-specific replacement for built-in coercion.
///
/// Implementations may suspend; the parser awaits one field at a time. Plain
/// closures `Fn(&str, &ParseContext) -> Result<Value, CoercionError>` implement
/// this trait.
///
/// # Examples
///
/// ```
/// use flagtree_core::{CoercionError, ParseContext, Value, ValueParser};
///
/// let upper = |raw: &str, _ctx: &ParseContext<'_>| -> Result<Value, CoercionError> {
///     Ok(Value::String(raw.to_uppercase()))
/// };
/// fn assert_parser<P: ValueParser>(_: &P) {}
/// assert_parser(&upper);
/// ```
pub trait ValueParser: Send + Sync {
    fn parse<'a>(
        &'a self,
        raw: &'a str,
        ctx: &'a ParseContext<'a>,
    ) -> BoxFuture<'a, Result<Value, CoercionError>>;
}

impl<F> ValueParser for F
where
    F: Fn(&str, &ParseContext<'_>) -> Result<Value, CoercionError> + Send + Sync,
{
    fn parse<'a>(
        &'a self,
        raw: &'a str,
        ctx: &'a ParseContext<'a>,
    ) -> BoxFuture<'a, Result<Value, CoercionError>> {
        Box::pin(futures::future::ready(self(raw, ctx)))
    }
}

impl fmt::Debug for dyn ValueParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValueParser")
    }
}

const TRUE_WORDS: &[&str] = &["1", "t", "true", "y", "yes"];
const FALSE_WORDS: &[&str] = &["0", "f", "false", "n", "no"];

/// Converts `raw` to a value of `kind` using the built-in rules.
///
/// # Examples
///
/// ```
/// use flagtree_core::{coerce, FieldKind, Value};
///
/// assert_eq!(coerce(FieldKind::Bool, "YES").unwrap(), Value::Bool(true));
/// assert_eq!(coerce(FieldKind::Int, "-1.2e5").unwrap(), Value::Int(-120000));
/// assert!(coerce(FieldKind::Int, "1.2").is_err());
/// assert_eq!(coerce(FieldKind::Float, "2.5").unwrap(), Value::Float(2.5));
/// ```
pub fn coerce(kind: FieldKind, raw: &str) -> Result<Value, CoercionError> {
    match kind {
        FieldKind::String => Ok(Value::String(raw.to_string())),
        FieldKind::Path => Ok(Value::Path(PathBuf::from(raw))),
        FieldKind::Bool => parse_bool(raw).map(Value::Bool),
        FieldKind::Int => parse_int(raw).map(Value::Int),
        FieldKind::Float => parse_float(raw).map(Value::Float),
    }
}

fn parse_bool(raw: &str) -> Result<bool, CoercionError> {
    let lowered = raw.to_ascii_lowercase();
    if TRUE_WORDS.contains(&lowered.as_str()) {
        Ok(true)
    } else if FALSE_WORDS.contains(&lowered.as_str()) {
        Ok(false)
    } else {
        Err(CoercionError::NotABoolean(raw.to_string()))
    }
}

fn parse_float(raw: &str) -> Result<f64, CoercionError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if !value.is_nan() => Ok(value),
        _ => Err(CoercionError::NotANumber(raw.to_string())),
    }
}

fn parse_int(raw: &str) -> Result<i64, CoercionError> {
    if let Ok(value) = raw.trim().parse::<i64>() {
        return Ok(value);
    }
    let value = parse_float(raw)?;
    // i64::MAX as f64 rounds up to 2^63, which is already out of range.
    let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
    if value.is_finite() && value.fract() == 0.0 && in_range {
        Ok(value as i64)
    } else {
        Err(CoercionError::NotAnInteger(raw.to_string()))
    }
}

/// Coerces one raw string for `field`, preferring its custom parser.
pub(crate) async fn coerce_field(
    field: &FieldSpec,
    raw: &str,
    ctx: &ParseContext<'_>,
) -> Result<Value, CoercionError> {
    match &field.parser {
        Some(parser) => parser.parse(raw, ctx).await,
        None => coerce(field.kind, raw),
    }
}
