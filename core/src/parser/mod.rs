//! Two-phase argv parsing.
//!
//! The structural pass walks the command tree and the token queue together,
//! classifying tokens and collecting raw string candidates; it is fully
//! synchronous and decides which command is selected. The value pass then
//! coerces candidates root command first, awaiting custom parsers one at a
//! time. User-input problems never abort a parse: they are accumulated in
//! [`Results::errors`].

mod session;
mod structural;
mod values;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::debug;

use crate::coerce::CoercionError;
use crate::schema::{App, CommandId};
use crate::types::Value;

pub(crate) use session::{ParseMode, ParseSession};
pub(crate) use structural::walk as structural_walk;

/// Environment variables visible to a parse.
pub type Env = HashMap<String, String>;

/// Interpreter executables that may precede the real binary in argv.
pub const KNOWN_RUNTIMES: &[&str] = &["node", "nodejs", "bun", "deno"];

/// A problem with user input, recorded during parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no flag for `{token}` in command `{command}`")]
    UnknownFlag { token: String, command: String },
    #[error("flag `{flag}` expects a value")]
    MissingValue { flag: String },
    #[error("flag `{flag}` was given more than once")]
    DuplicateFlag { flag: String },
    #[error("`{value}` is not one of the allowed values for `{field}` ({allowed})")]
    DisallowedValue {
        field: String,
        value: String,
        allowed: String,
    },
    #[error("no such subcommand or positional argument `{token}` in command `{command}`")]
    UnknownPositional { token: String, command: String },
    #[error("unexpected extra positional argument `{token}` in command `{command}`")]
    ExtraPositional { token: String, command: String },
    #[error("invalid value for `{field}`: {source}")]
    InvalidValue {
        field: String,
        #[source]
        source: CoercionError,
    },
    #[error("`{field}` is required but not provided")]
    MissingRequired { field: String },
}

impl Serialize for ParseError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of a parse: the selected command, typed values, and errors.
///
/// Always returned, even when `errors` is non-empty, so the caller can
/// decide how to react.
#[derive(Debug, Clone, Serialize)]
pub struct Results {
    pub binary_name: String,
    #[serde(skip)]
    pub command: CommandId,
    /// Subcommand names below the root leading to the selected command.
    pub command_path: Vec<String>,
    pub flags: BTreeMap<String, Value>,
    pub args: BTreeMap<String, Value>,
    pub errors: Vec<ParseError>,
}

impl Results {
    pub(crate) fn new(binary_name: String, command: CommandId) -> Self {
        Self {
            binary_name,
            command,
            command_path: Vec::new(),
            flags: BTreeMap::new(),
            args: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn flag(&self, var_name: &str) -> Option<&Value> {
        self.flags.get(var_name)
    }

    pub fn arg(&self, var_name: &str) -> Option<&Value> {
        self.args.get(var_name)
    }

    /// `true` if the flag resolved to boolean `true`.
    pub fn flag_is_set(&self, var_name: &str) -> bool {
        self.flag(var_name).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Splits argv into the binary's base name and the tokens after it.
///
/// Leading interpreter entries (see [`KNOWN_RUNTIMES`]) are skipped before
/// the binary path.
///
/// # Examples
///
/// ```
/// use flagtree_core::split_argv;
///
/// let (name, tokens) = split_argv(["/usr/bin/node", "/opt/tools/cli.js", "run", "-v"]);
/// assert_eq!(name, "cli.js");
/// assert_eq!(tokens, vec!["run", "-v"]);
/// ```
pub fn split_argv<I, S>(argv: I) -> (String, Vec<String>)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut tokens = argv.into_iter().map(Into::into).peekable();
    while tokens.next_if(|entry| is_runtime(entry)).is_some() {}

    let binary_name = tokens
        .next()
        .map(|path| base_name(&path))
        .unwrap_or_default();
    (binary_name, tokens.collect())
}

fn is_runtime(entry: &str) -> bool {
    Path::new(entry)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| KNOWN_RUNTIMES.contains(&stem))
}

fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
        .to_string()
}

impl App {
    /// Parses a full argv (binary path first) against this tree.
    pub async fn parse<I, S>(&self, argv: I, env: &Env) -> Results
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (binary_name, tokens) = split_argv(argv);
        self.parse_tokens(binary_name, tokens, env).await
    }

    /// Blocking wrapper around [`App::parse`].
    ///
    /// # Examples
    ///
    /// ```
    /// use flagtree_core::*;
    ///
    /// let app = App::new(
    ///     CommandSpec::new("tool").with_flag(FlagSpec::new("level", FieldKind::Int).with_short('l')),
    /// )
    /// .unwrap();
    ///
    /// let results = app.parse_blocking(["tool", "-l3"], &Env::new());
    /// assert!(results.is_ok());
    /// assert_eq!(results.flag("level"), Some(&Value::Int(3)));
    /// ```
    pub fn parse_blocking<I, S>(&self, argv: I, env: &Env) -> Results
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        futures::executor::block_on(self.parse(argv, env))
    }

    /// Parses tokens that have already had the binary path removed.
    pub async fn parse_tokens(&self, binary_name: String, tokens: Vec<String>, env: &Env) -> Results {
        let mut session = ParseSession::new(binary_name, tokens, self.root());
        structural::run(self, &mut session, env);
        values::run(self, &mut session, env).await;

        let results = session.into_results();
        debug!(
            command = %self.qualified_name(results.command),
            flags = results.flags.len(),
            args = results.args.len(),
            errors = results.errors.len(),
            "Parse finished"
        );
        results
    }
}
