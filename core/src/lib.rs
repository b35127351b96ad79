//! Declarative command trees and the argv parser that drives them.
//!
//! This crate turns a tree of commands, flags and positional arguments into
//! a parser for process arguments:
//!
//! - [`CommandSpec`], [`FlagSpec`], [`ArgSpec`]: the declarative input,
//!   built in code or loaded from YAML/JSON ([`load_spec`]).
//! - [`App`]: the validated, immutable tree; construction fails with a
//!   [`SchemaError`] on programmer mistakes such as duplicate subcommands.
//! - [`App::parse`]: the two-phase parser. A synchronous structural pass
//!   picks the command and collects raw strings, then a value pass coerces
//!   them (awaiting custom [`ValueParser`]s one at a time). User mistakes
//!   are collected in [`Results::errors`] rather than aborting.
//! - [`App::complete`]: shell completion suggestions, plus
//!   [`completion_script`] for bash registration.
//! - [`App::help`] and [`align`]: help rendering with aligned columns.
//! - [`App::run`]: parse, print help or errors, dispatch to an [`Action`],
//!   and report an exit code.
//!
//! # Example
//!
//! ```
//! use flagtree_core::*;
//!
//! let app = App::new(
//!     CommandSpec::new("git")
//!         .with_flag(FlagSpec::boolean("verbose").with_short('v'))
//!         .with_subcommand(
//!             CommandSpec::new("commit")
//!                 .with_flag(FlagSpec::new("message", FieldKind::String).with_short('m').required())
//!                 .with_flag(FlagSpec::new("author", FieldKind::String).with_env("GIT_AUTHOR")),
//!         ),
//! )
//! .unwrap();
//!
//! let mut env = Env::new();
//! env.insert("GIT_AUTHOR".into(), "ada".into());
//!
//! let results = app.parse_blocking(["git", "commit", "-m", "fix", "-v"], &env);
//! assert!(results.is_ok());
//! assert_eq!(results.command_path, vec!["commit"]);
//! assert_eq!(results.flag("message"), Some(&Value::String("fix".into())));
//! assert_eq!(results.flag("author"), Some(&Value::String("ada".into())));
//! assert!(results.flag_is_set("verbose"));
//!
//! let results = app.parse_blocking(["git", "commit"], &env);
//! assert_eq!(results.error_messages(), vec!["`--message` is required but not provided"]);
//! ```

mod align;
mod coerce;
mod complete;
mod config;
mod help;
mod parser;
mod run;
mod schema;
mod types;
mod validate;

pub use align::{AlignOptions, align};
pub use coerce::{CoercionError, ParseContext, ValueParser, coerce};
pub use complete::{Completer, CompletionContext, completion_script, suggest};
pub use config::{ConfigError, SpecFormat, load_spec};
pub use parser::{Env, KNOWN_RUNTIMES, ParseError, Results, split_argv};
pub use run::{Action, ActionError, RunIo};
pub use schema::{
    App, COMPLETION_SCRIPT_FLAG, Command, CommandId, FlagKey, GET_COMPLETIONS_FLAG, HELP_FLAG,
};
pub use types::{ArgSpec, CommandSpec, FieldKind, FieldSpec, FlagSpec, RawValue, Value};
pub use validate::{SchemaError, validate_spec};
