//! The synchronous structural pass.
//!
//! One token at a time: flags (`--name`, `--name=value`, `--no-name`, `-c`,
//! `-cVALUE`), subcommand names while no positional has been consumed at the
//! current level, and positional values otherwise. A literal `--` switches to
//! [`ParseMode::PositionalOnly`] for the rest of the queue.

use std::collections::BTreeMap;

use tracing::debug;

use crate::schema::{App, FlagKey};
use crate::types::{FieldSpec, FlagSpec, RawValue};

use super::session::{ParseMode, ParseSession, push_candidate};
use super::{Env, ParseError};

const SEPARATOR: &str = "--";

pub(crate) fn run(app: &App, session: &mut ParseSession, env: &Env) {
    walk(app, session);
    resolve_defaults(app, session, env);
}

/// Consumes every queued token, leaving defaults unresolved.
pub(crate) fn walk(app: &App, session: &mut ParseSession) {
    while let Some(token) = session.next_token() {
        if session.mode == ParseMode::ParsingFlags {
            if token == SEPARATOR {
                debug!("Separator seen, remaining tokens are positional");
                session.mode = ParseMode::PositionalOnly;
                continue;
            }
            if token.starts_with('-') && token != "-" {
                match_flag(app, session, &token);
                continue;
            }
            if session.positional_index == 0 {
                if let Some(child) = app.child(session.results.command, &token) {
                    debug!(command = %token, "Entering subcommand");
                    session.results.command = child;
                    session.results.command_path.push(token);
                    continue;
                }
            }
        }
        match_positional(app, session, token);
    }
}

/// Resolves `token` to a flag plus any value carried inside the token.
fn lookup_flag<'a>(
    app: &'a App,
    session: &ParseSession,
    token: &str,
) -> Option<(&'a FlagSpec, Option<String>)> {
    let command = session.results.command;

    if let Some(body) = token.strip_prefix("--") {
        let (name, inline) = match body.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (body, None),
        };
        if let Some(flag) = app.find_flag(command, FlagKey::Name(name)) {
            return Some((flag, inline));
        }
        let negated = name.strip_prefix("no-").filter(|_| inline.is_none())?;
        return app
            .find_flag(command, FlagKey::Name(negated))
            .filter(|flag| flag.field.kind.is_bool())
            .map(|flag| (flag, Some("false".to_string())));
    }

    let mut chars = token[1..].chars();
    let short = chars.next()?;
    let rest = chars.as_str();
    let inline = (!rest.is_empty()).then(|| rest.to_string());
    app.find_flag(command, FlagKey::Short(short))
        .map(|flag| (flag, inline))
}

fn match_flag(app: &App, session: &mut ParseSession, token: &str) {
    let Some((flag, inline)) = lookup_flag(app, session, token) else {
        debug!(token, "No matching flag");
        session.error(ParseError::UnknownFlag {
            token: token.to_string(),
            command: app.qualified_name(session.results.command),
        });
        return;
    };

    let value = match inline {
        Some(value) => value,
        None if flag.field.kind.is_bool() => "true".to_string(),
        None => match session.next_token() {
            Some(value) => value,
            None => {
                session.error(ParseError::MissingValue {
                    flag: flag.long_form(),
                });
                return;
            }
        },
    };

    if flag.deprecated {
        debug!(flag = %flag.long_form(), "Deprecated flag used");
    }
    let rejected = if flag.field.allows(&value) {
        None
    } else {
        Some(disallowed(&flag.field, flag.long_form(), &value))
    };
    if push_candidate(&mut session.candidates.flags, &flag.field, value).is_err() {
        // A duplicate's value is discarded along with any allow-list error.
        session.error(ParseError::DuplicateFlag {
            flag: flag.long_form(),
        });
        return;
    }
    if let Some(error) = rejected {
        session.error(error);
    }
}

fn match_positional(app: &App, session: &mut ParseSession, token: String) {
    let command = app.command(session.results.command);

    let Some(arg) = command.args.get(session.positional_index) else {
        let error = if session.positional_index == 0 {
            ParseError::UnknownPositional {
                token,
                command: app.qualified_name(session.results.command),
            }
        } else {
            ParseError::ExtraPositional {
                token,
                command: app.qualified_name(session.results.command),
            }
        };
        session.error(error);
        session.positional_index += 1;
        return;
    };

    if !arg.field.allows(&token) {
        session.error(disallowed(&arg.field, arg.usage(), &token));
    }

    // Repeated slots keep the cursor and absorb every later positional.
    if !arg.field.repeated {
        session.positional_index += 1;
    }
    // Cursor slots are distinct, so only a repeated slot can see a second value.
    let _ = push_candidate(&mut session.candidates.args, &arg.field, token);
}

fn disallowed(field: &FieldSpec, display: String, value: &str) -> ParseError {
    ParseError::DisallowedValue {
        field: display,
        value: value.to_string(),
        allowed: field
            .allowed_values
            .as_deref()
            .unwrap_or_default()
            .join(", "),
    }
}

/// Fills unset fields from the environment, then static defaults.
///
/// Covers the flags of every command on the selected path and the
/// positional args of the selected command.
fn resolve_defaults(app: &App, session: &mut ParseSession, env: &Env) {
    let selected = session.results.command;

    for id in app.ancestry(selected) {
        for flag in &app.command(id).flags {
            let resolved = resolve_field(
                &flag.field,
                flag.long_form(),
                &session.candidates.flags,
                env,
                &mut session.results.errors,
            );
            if let Some(value) = resolved {
                session
                    .candidates
                    .flags
                    .insert(flag.field.var_name.clone(), value);
            }
        }
    }

    for arg in &app.command(selected).args {
        let resolved = resolve_field(
            &arg.field,
            arg.usage(),
            &session.candidates.args,
            env,
            &mut session.results.errors,
        );
        if let Some(value) = resolved {
            session
                .candidates
                .args
                .insert(arg.field.var_name.clone(), value);
        }
    }
}

fn resolve_field(
    field: &FieldSpec,
    display: String,
    existing: &BTreeMap<String, RawValue>,
    env: &Env,
    errors: &mut Vec<ParseError>,
) -> Option<RawValue> {
    if existing.contains_key(&field.var_name) {
        return None;
    }

    let from_env = field
        .env_var
        .as_deref()
        .and_then(|name| env.get(name))
        .map(|value| RawValue::Single(value.clone()));
    let source = if from_env.is_some() { "env" } else { "default" };
    let value = from_env
        .or_else(|| field.default_value.clone())?
        .shaped(field.repeated);

    if let Some(bad) = value.iter().find(|item| !field.allows(item)) {
        errors.push(disallowed(field, display, bad));
        return None;
    }

    debug!(field = %field.var_name, source, "Resolved unset field");
    Some(value)
}

#[cfg(test)]
mod tests {
    use crate::{App, ArgSpec, CommandSpec, FieldKind, FlagSpec};

    use super::*;

    fn app() -> App {
        App::new(
            CommandSpec::new("tool")
                .with_flag(FlagSpec::boolean("verbose").with_short('v'))
                .with_flag(FlagSpec::new("name", FieldKind::String).with_short('n'))
                .with_flag(FlagSpec::new("tag", FieldKind::String).with_short('t').repeated())
                .with_subcommand(
                    CommandSpec::new("copy")
                        .with_arg(ArgSpec::new("src", FieldKind::Path))
                        .with_arg(ArgSpec::new("dest", FieldKind::Path)),
                )
                .with_subcommand(
                    CommandSpec::new("echo")
                        .with_arg(ArgSpec::new("words", FieldKind::String).repeated()),
                ),
        )
        .unwrap()
    }

    fn scan(app: &App, tokens: &[&str]) -> ParseSession {
        let mut session = ParseSession::new(
            "tool".into(),
            tokens.iter().map(|t| t.to_string()).collect(),
            app.root(),
        );
        run(app, &mut session, &Env::new());
        session
    }

    #[test]
    fn test_long_short_and_inline_values() {
        let app = app();
        let session = scan(&app, &["--name=alice", "-v", "-tone", "-t", "two"]);

        assert!(session.results.errors.is_empty());
        assert_eq!(session.candidates.flags["name"], RawValue::from("alice"));
        assert_eq!(session.candidates.flags["verbose"], RawValue::from("true"));
        assert_eq!(
            session.candidates.flags["tag"],
            RawValue::Many(vec!["one".into(), "two".into()])
        );
    }

    #[test]
    fn test_value_consumed_even_if_it_looks_like_a_flag() {
        let app = app();
        let session = scan(&app, &["--name", "--verbose"]);

        assert_eq!(session.candidates.flags["name"], RawValue::from("--verbose"));
        assert!(!session.candidates.flags.contains_key("verbose"));
    }

    #[test]
    fn test_negated_boolean() {
        let app = app();
        let session = scan(&app, &["--no-verbose"]);
        assert_eq!(session.candidates.flags["verbose"], RawValue::from("false"));

        let session = scan(&app, &["--no-name"]);
        assert!(matches!(
            session.results.errors.as_slice(),
            [ParseError::UnknownFlag { .. }]
        ));
    }

    #[test]
    fn test_missing_value_and_duplicate() {
        let app = app();
        let session = scan(&app, &["-n", "a", "--name", "b", "-n"]);

        assert_eq!(session.candidates.flags["name"], RawValue::from("a"));
        assert_eq!(
            session.results.errors,
            vec![
                ParseError::DuplicateFlag { flag: "--name".into() },
                ParseError::MissingValue { flag: "--name".into() },
            ]
        );
    }

    #[test]
    fn test_duplicate_reports_only_duplicate() {
        let app = App::new(
            CommandSpec::new("tool").with_flag(
                FlagSpec::new("level", FieldKind::String).with_allowed(["low", "high"]),
            ),
        )
        .unwrap();

        let session = scan(&app, &["--level", "low", "--level=mid"]);
        assert_eq!(session.candidates.flags["level"], RawValue::from("low"));
        assert_eq!(
            session.results.errors,
            vec![ParseError::DuplicateFlag { flag: "--level".into() }]
        );
    }

    #[test]
    fn test_subcommand_dispatch_and_inherited_flags() {
        let app = app();
        let session = scan(&app, &["copy", "-v", "a", "b"]);

        assert_eq!(session.results.command_path, vec!["copy"]);
        assert_eq!(session.candidates.flags["verbose"], RawValue::from("true"));
        assert_eq!(session.candidates.args["src"], RawValue::from("a"));
        assert_eq!(session.candidates.args["dest"], RawValue::from("b"));
    }

    #[test]
    fn test_no_dispatch_after_positional() {
        let app = app();
        let session = scan(&app, &["echo", "copy", "echo"]);

        assert_eq!(session.results.command_path, vec!["echo"]);
        assert_eq!(
            session.candidates.args["words"],
            RawValue::Many(vec!["copy".into(), "echo".into()])
        );
    }

    #[test]
    fn test_separator_makes_everything_positional() {
        let app = app();
        let session = scan(&app, &["echo", "--", "-v", "--name", "copy"]);

        assert!(session.results.errors.is_empty());
        assert!(!session.candidates.flags.contains_key("verbose"));
        assert_eq!(
            session.candidates.args["words"],
            RawValue::Many(vec!["-v".into(), "--name".into(), "copy".into()])
        );
    }

    #[test]
    fn test_unknown_then_extra_positional() {
        let app = app();
        let session = scan(&app, &["nope", "again"]);

        assert_eq!(
            session.results.errors,
            vec![
                ParseError::UnknownPositional {
                    token: "nope".into(),
                    command: "tool".into(),
                },
                ParseError::ExtraPositional {
                    token: "again".into(),
                    command: "tool".into(),
                },
            ]
        );
    }

    #[test]
    fn test_lone_dash_is_positional() {
        let app = app();
        let session = scan(&app, &["copy", "-", "out"]);
        assert_eq!(session.candidates.args["src"], RawValue::from("-"));
    }

    #[test]
    fn test_env_beats_default_and_argv_beats_env() {
        let app = App::new(
            CommandSpec::new("tool").with_flag(
                FlagSpec::new("port", FieldKind::Int)
                    .with_env("TOOL_PORT")
                    .with_default("80"),
            ),
        )
        .unwrap();
        let env: Env = [("TOOL_PORT".to_string(), "8080".to_string())].into();

        let mut session = ParseSession::new("tool".into(), vec![], app.root());
        run(&app, &mut session, &env);
        assert_eq!(session.candidates.flags["port"], RawValue::from("8080"));

        let mut session = ParseSession::new("tool".into(), vec![], app.root());
        run(&app, &mut session, &Env::new());
        assert_eq!(session.candidates.flags["port"], RawValue::from("80"));

        let tokens = vec!["--port".to_string(), "1".to_string()];
        let mut session = ParseSession::new("tool".into(), tokens, app.root());
        run(&app, &mut session, &env);
        assert_eq!(session.candidates.flags["port"], RawValue::from("1"));
    }

    #[test]
    fn test_disallowed_default_is_dropped() {
        let app = App::new(
            CommandSpec::new("tool").with_flag(
                FlagSpec::new("mode", FieldKind::String)
                    .with_allowed(["dev", "prod"])
                    .with_env("MODE"),
            ),
        )
        .unwrap();
        let env: Env = [("MODE".to_string(), "test".to_string())].into();

        let mut session = ParseSession::new("tool".into(), vec![], app.root());
        run(&app, &mut session, &env);

        assert!(!session.candidates.flags.contains_key("mode"));
        assert_eq!(
            session.results.errors,
            vec![ParseError::DisallowedValue {
                field: "--mode".into(),
                value: "test".into(),
                allowed: "dev, prod".into(),
            }]
        );
    }

    #[test]
    fn test_disallowed_flag_value_is_kept() {
        let app = App::new(
            CommandSpec::new("tool").with_flag(
                FlagSpec::new("level", FieldKind::String).with_allowed(["low", "high"]),
            ),
        )
        .unwrap();

        let session = scan(&app, &["--level=mid"]);
        assert_eq!(session.candidates.flags["level"], RawValue::from("mid"));
        assert_eq!(
            session.results.errors,
            vec![ParseError::DisallowedValue {
                field: "--level".into(),
                value: "mid".into(),
                allowed: "low, high".into(),
            }]
        );
    }
}
