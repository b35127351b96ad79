//! Declarative field and command types.
//!
//! These are the inputs to [`App::new`](crate::App::new). They can be built
//! in code with the `with_*` methods or deserialized from YAML/JSON with
//! [`serde`]; runtime hooks (custom parsers, completers, actions) are only
//! settable from code.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::coerce::ValueParser;
use crate::complete::Completer;
use crate::run::Action;

/// The type a field's raw strings are coerced to.
///
/// # Examples
///
/// ```
/// use flagtree_core::FieldKind;
///
/// assert_eq!(FieldKind::default(), FieldKind::String);
/// assert!(FieldKind::Bool.is_bool());
/// assert_eq!(FieldKind::Float.placeholder(), "number");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Passed through unchanged (the default).
    #[default]
    String,
    /// `1/t/true/y/yes` or `0/f/false/n/no`, case-insensitive.
    #[serde(alias = "boolean")]
    Bool,
    /// A number with no fractional part; exponent notation is accepted.
    #[serde(alias = "integer")]
    Int,
    /// Any floating-point number.
    #[serde(alias = "number")]
    Float,
    /// A file system path, passed through unchanged.
    Path,
}

impl FieldKind {
    /// Returns `true` for [`FieldKind::Bool`].
    pub fn is_bool(self) -> bool {
        matches!(self, FieldKind::Bool)
    }

    /// Placeholder shown in help output for a value of this kind.
    pub fn placeholder(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Bool => "bool",
            FieldKind::Int => "int",
            FieldKind::Float => "number",
            FieldKind::Path => "path",
        }
    }
}

/// An unparsed value: one string, or an ordered list for repeated fields.
///
/// Deserializes from a scalar or a sequence of scalars; numbers and booleans
/// are kept in their textual form so they go through normal coercion.
///
/// # Examples
///
/// ```
/// use flagtree_core::RawValue;
///
/// let many = RawValue::Many(vec!["a".into(), "b".into()]);
/// assert_eq!(many.iter().collect::<Vec<_>>(), vec!["a", "b"]);
/// assert_eq!(RawValue::from("x").iter().count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Single(#[serde(deserialize_with = "scalar_string")] String),
    Many(#[serde(deserialize_with = "scalar_strings")] Vec<String>),
}

impl RawValue {
    /// Iterates the contained strings in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            RawValue::Single(value) => std::slice::from_ref(value),
            RawValue::Many(values) => values,
        };
        slice.iter().map(String::as_str)
    }

    /// Converts to the shape a field expects: a list when `repeated`,
    /// otherwise the first value.
    pub fn shaped(self, repeated: bool) -> RawValue {
        match (self, repeated) {
            (RawValue::Single(value), true) => RawValue::Many(vec![value]),
            (RawValue::Many(mut values), false) if !values.is_empty() => {
                RawValue::Single(values.swap_remove(0))
            }
            (other, _) => other,
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Single(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Single(value)
    }
}

impl From<Vec<String>> for RawValue {
    fn from(values: Vec<String>) -> Self {
        RawValue::Many(values)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.iter().collect::<Vec<_>>().join(", ");
        f.write_str(&joined)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Bool(value) => value.to_string(),
            Scalar::Int(value) => value.to_string(),
            Scalar::Float(value) => value.to_string(),
            Scalar::Str(value) => value,
        }
    }
}

fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Scalar::deserialize(deserializer)?.into_string())
}

fn scalar_strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let items = Vec::<Scalar>::deserialize(deserializer)?;
    Ok(items.into_iter().map(Scalar::into_string).collect())
}

fn allowed_strings<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<String>>, D::Error> {
    let items = Option::<Vec<Scalar>>::deserialize(deserializer)?;
    Ok(items.map(|items| items.into_iter().map(Scalar::into_string).collect()))
}

/// A typed, coerced value stored in [`Results`](crate::Results).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Path(PathBuf),
    List(Vec<Value>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            Value::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            Value::Path(path) => path.to_str(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::String(value) => f.write_str(value),
            Value::Path(path) => write!(f, "{}", path.display()),
            Value::List(values) => {
                let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// Shape shared by flags and positional arguments.
///
/// `var_name` is the key under which the coerced value is stored; it
/// defaults to `name` with dashes turned into underscores.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(default)]
    pub kind: FieldKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(default)]
    pub var_name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub repeated: bool,
    #[serde(
        default,
        alias = "allow",
        deserialize_with = "allowed_strings",
        skip_serializing_if = "Option::is_none"
    )]
    pub allowed_values: Option<Vec<String>>,
    #[serde(default, alias = "default", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<RawValue>,
    #[serde(default, alias = "env", skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
    #[serde(skip)]
    pub parser: Option<Arc<dyn ValueParser>>,
    #[serde(skip)]
    pub completer: Option<Arc<dyn Completer>>,
}

impl FieldSpec {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            kind,
            name: name.to_string(),
            var_name: default_var_name(name),
            ..Default::default()
        }
    }

    /// Returns `true` if `value` passes the allow-list (or there is none).
    pub fn allows(&self, value: &str) -> bool {
        self.allowed_values
            .as_ref()
            .is_none_or(|allowed| allowed.iter().any(|candidate| candidate == value))
    }
}

pub(crate) fn default_var_name(name: &str) -> String {
    name.replace('-', "_")
}

macro_rules! field_builders {
    ($ty:ty) => {
        impl $ty {
            /// Sets the help text.
            pub fn with_help(mut self, help: &str) -> Self {
                self.field.help = Some(help.to_string());
                self
            }

            /// Overrides the results key.
            pub fn with_var_name(mut self, var_name: &str) -> Self {
                self.field.var_name = var_name.to_string();
                self
            }

            /// Marks the field as required.
            pub fn required(mut self) -> Self {
                self.field.required = true;
                self
            }

            /// Lets the field collect multiple values.
            pub fn repeated(mut self) -> Self {
                self.field.repeated = true;
                self
            }

            /// Restricts values to the given set.
            pub fn with_allowed<I, S>(mut self, values: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.field.allowed_values = Some(values.into_iter().map(Into::into).collect());
                self
            }

            /// Sets the static default, used when neither argv nor the
            /// environment provides a value.
            pub fn with_default(mut self, value: impl Into<RawValue>) -> Self {
                self.field.default_value = Some(value.into());
                self
            }

            /// Sets the environment variable consulted before the default.
            pub fn with_env(mut self, env_var: &str) -> Self {
                self.field.env_var = Some(env_var.to_string());
                self
            }

            /// Replaces built-in coercion for this field.
            pub fn with_parser(mut self, parser: impl ValueParser + 'static) -> Self {
                self.field.parser = Some(Arc::new(parser));
                self
            }

            /// Supplies completion suggestions for this field's value.
            pub fn with_completer(mut self, completer: impl Completer + 'static) -> Self {
                self.field.completer = Some(Arc::new(completer));
                self
            }
        }
    };
}

/// A named, non-positional option (`--name`, `-c`).
///
/// Boolean flags are also matched by `--no-name`.
///
/// # Examples
///
/// ```
/// use flagtree_core::{FieldKind, FlagSpec};
///
/// let verbose = FlagSpec::boolean("verbose").with_short('v');
/// assert_eq!(verbose.long_form(), "--verbose");
/// assert_eq!(verbose.short_form().as_deref(), Some("-v"));
///
/// let output = FlagSpec::new("output-dir", FieldKind::Path);
/// assert_eq!(output.field.var_name, "output_dir");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlagSpec {
    #[serde(flatten)]
    pub field: FieldSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<char>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg_display_name: Option<String>,
}

impl FlagSpec {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            field: FieldSpec::new(name, kind),
            ..Default::default()
        }
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    pub fn with_short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    /// Sets the placeholder shown after the flag in help output.
    pub fn with_display_name(mut self, display: &str) -> Self {
        self.arg_display_name = Some(display.to_string());
        self
    }

    pub fn long_form(&self) -> String {
        format!("--{}", self.field.name)
    }

    pub fn short_form(&self) -> Option<String> {
        self.short.map(|c| format!("-{c}"))
    }

    /// Placeholder for the flag's value in help output.
    pub fn value_placeholder(&self) -> String {
        let name = self
            .arg_display_name
            .as_deref()
            .unwrap_or(self.field.kind.placeholder());
        format!("<{name}>")
    }
}

field_builders!(FlagSpec);

/// A positional argument, bound by ordinal position within its command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArgSpec {
    #[serde(flatten)]
    pub field: FieldSpec,
}

impl ArgSpec {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            field: FieldSpec::new(name, kind),
        }
    }

    /// `<name>` for required args, `[name]` otherwise; `...` when repeated.
    pub fn usage(&self) -> String {
        let dots = if self.field.repeated { "..." } else { "" };
        if self.field.required {
            format!("<{}{dots}>", self.field.name)
        } else {
            format!("[{}{dots}]", self.field.name)
        }
    }
}

field_builders!(ArgSpec);

/// Declarative command node: own flags, positional args, and children.
///
/// # Examples
///
/// ```
/// use flagtree_core::{ArgSpec, CommandSpec, FieldKind, FlagSpec};
///
/// let spec = CommandSpec::new("deploy")
///     .with_flag(FlagSpec::boolean("dry-run"))
///     .with_subcommand(
///         CommandSpec::new("service").with_arg(ArgSpec::new("name", FieldKind::String).required()),
///     );
///
/// assert_eq!(spec.subcommands[0].name, "service");
/// assert_eq!(spec.flags.len(), 1);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(default)]
    pub flags: Vec<FlagSpec>,
    #[serde(default)]
    pub args: Vec<ArgSpec>,
    #[serde(default, alias = "commands")]
    pub subcommands: Vec<CommandSpec>,
    #[serde(skip)]
    pub action: Option<Arc<dyn Action>>,
}

impl CommandSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }

    pub fn with_flag(mut self, flag: FlagSpec) -> Self {
        self.flags.push(flag);
        self
    }

    pub fn with_arg(mut self, arg: ArgSpec) -> Self {
        self.args.push(arg);
        self
    }

    pub fn with_subcommand(mut self, sub: CommandSpec) -> Self {
        self.subcommands.push(sub);
        self
    }

    /// Sets the callback invoked by [`App::run`](crate::App::run) when this
    /// command is selected.
    pub fn with_action(mut self, action: impl Action + 'static) -> Self {
        self.action = Some(Arc::new(action));
        self
    }
}
