//! Command tree validation.
//!
//! Catches programmer errors in a [`CommandSpec`] before any argv is parsed:
//! duplicate subcommands, clashing flag names or result keys, and repeated
//! positionals that are not last.
//!
//! # Examples
//!
//! ```
//! use flagtree_core::*;
//!
//! let spec = CommandSpec::new("git").with_subcommand(CommandSpec::new("commit"));
//! assert!(validate_spec(&spec).is_empty());
//!
//! let spec = spec.with_subcommand(CommandSpec::new("commit"));
//! assert_eq!(
//!     validate_spec(&spec),
//!     vec![SchemaError::DuplicateSubcommand {
//!         parent: "git".into(),
//!         name: "commit".into(),
//!     }]
//! );
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::types::{ArgSpec, CommandSpec, FieldSpec, FlagSpec, default_var_name};

/// Structural problems in a command tree definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("command name cannot be empty (under `{0}`)")]
    EmptyCommandName(String),
    #[error("duplicate subcommand `{name}` under `{parent}`")]
    DuplicateSubcommand { parent: String, name: String },
    #[error("invalid flag name `{name}` in `{command}`")]
    InvalidFlagName { command: String, name: String },
    #[error("invalid short flag `-{short}` in `{command}`")]
    InvalidShortFlag { command: String, short: char },
    #[error("duplicate flag `{flag}` in `{command}`")]
    DuplicateFlag { command: String, flag: String },
    #[error("argument name cannot be empty in `{0}`")]
    EmptyArgName(String),
    #[error("variable name `{var_name}` is used by more than one field visible in `{command}`")]
    DuplicateVarName { command: String, var_name: String },
    #[error("repeated argument `{arg}` must be the last positional of `{command}`")]
    RepeatedArgNotLast { command: String, arg: String },
    #[error("`{field}` in `{command}` has a list default but is not repeated")]
    ListDefaultOnSingleField { command: String, field: String },
}

/// Validates a command tree, collecting every problem found.
pub fn validate_spec(spec: &CommandSpec) -> Vec<SchemaError> {
    let mut errors = Vec::new();

    if spec.name.trim().is_empty() {
        errors.push(SchemaError::EmptyCommandName("<root>".to_string()));
    }

    let mut path = vec![spec.name.trim().to_string()];
    validate_command(spec, &mut path, &[], &mut errors);
    errors
}

fn validate_command(
    spec: &CommandSpec,
    path: &mut Vec<String>,
    inherited_vars: &[String],
    errors: &mut Vec<SchemaError>,
) {
    let command = path.join(" ");

    let mut visible_vars: Vec<String> = inherited_vars.to_vec();
    validate_flags(&spec.flags, &command, &mut visible_vars, errors);
    validate_args(&spec.args, &command, errors);

    let mut seen: HashSet<&str> = HashSet::new();
    for sub in &spec.subcommands {
        let name = sub.name.trim();
        if name.is_empty() {
            errors.push(SchemaError::EmptyCommandName(command.clone()));
            continue;
        }
        if !seen.insert(name) {
            errors.push(SchemaError::DuplicateSubcommand {
                parent: command.clone(),
                name: name.to_string(),
            });
            continue;
        }

        path.push(name.to_string());
        validate_command(sub, path, &visible_vars, errors);
        path.pop();
    }
}

fn validate_flags(
    flags: &[FlagSpec],
    command: &str,
    visible_vars: &mut Vec<String>,
    errors: &mut Vec<SchemaError>,
) {
    let mut names = HashSet::new();
    let mut shorts = HashSet::new();

    for flag in flags {
        let name = flag.field.name.as_str();
        if name.is_empty()
            || name.starts_with('-')
            || name.contains('=')
            || name.chars().any(char::is_whitespace)
        {
            errors.push(SchemaError::InvalidFlagName {
                command: command.to_string(),
                name: name.to_string(),
            });
            continue;
        }
        if !names.insert(name) {
            errors.push(SchemaError::DuplicateFlag {
                command: command.to_string(),
                flag: flag.long_form(),
            });
        }

        if let Some(short) = flag.short {
            if short == '-' || short == '=' || short.is_whitespace() {
                errors.push(SchemaError::InvalidShortFlag {
                    command: command.to_string(),
                    short,
                });
            } else if !shorts.insert(short) {
                errors.push(SchemaError::DuplicateFlag {
                    command: command.to_string(),
                    flag: format!("-{short}"),
                });
            }
        }

        let var_name = effective_var_name(&flag.field);
        if visible_vars.contains(&var_name) {
            errors.push(SchemaError::DuplicateVarName {
                command: command.to_string(),
                var_name,
            });
        } else {
            visible_vars.push(var_name);
        }

        check_default_shape(&flag.field, command, errors);
    }
}

fn validate_args(args: &[ArgSpec], command: &str, errors: &mut Vec<SchemaError>) {
    let mut vars = HashSet::new();

    for (index, arg) in args.iter().enumerate() {
        if arg.field.name.trim().is_empty() {
            errors.push(SchemaError::EmptyArgName(command.to_string()));
            continue;
        }
        if arg.field.repeated && index + 1 != args.len() {
            errors.push(SchemaError::RepeatedArgNotLast {
                command: command.to_string(),
                arg: arg.field.name.clone(),
            });
        }
        let var_name = effective_var_name(&arg.field);
        if !vars.insert(var_name.clone()) {
            errors.push(SchemaError::DuplicateVarName {
                command: command.to_string(),
                var_name,
            });
        }
        check_default_shape(&arg.field, command, errors);
    }
}

fn check_default_shape(field: &FieldSpec, command: &str, errors: &mut Vec<SchemaError>) {
    if let Some(crate::RawValue::Many(_)) = &field.default_value {
        if !field.repeated {
            errors.push(SchemaError::ListDefaultOnSingleField {
                command: command.to_string(),
                field: field.name.clone(),
            });
        }
    }
}

pub(crate) fn effective_var_name(field: &FieldSpec) -> String {
    if field.var_name.is_empty() {
        default_var_name(&field.name)
    } else {
        field.var_name.clone()
    }
}
