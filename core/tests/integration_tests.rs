use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use flagtree_core::*;

/// A small `git`-like tree used by most scenarios.
fn git() -> App {
    App::new(
        CommandSpec::new("git")
            .with_help("The stupid content tracker")
            .with_flag(FlagSpec::boolean("verbose").with_short('V'))
            .with_flag(FlagSpec::new("color", FieldKind::String).with_allowed(["auto", "always", "never"]))
            .with_subcommand(
                CommandSpec::new("commit")
                    .with_help("Record changes")
                    .with_flag(FlagSpec::new("message", FieldKind::String).with_short('m').repeated())
                    .with_flag(FlagSpec::boolean("amend"))
                    .with_flag(
                        FlagSpec::new("author", FieldKind::String)
                            .with_env("GIT_AUTHOR_NAME")
                            .with_default("nobody"),
                    )
                    .with_arg(ArgSpec::new("paths", FieldKind::Path).repeated()),
            )
            .with_subcommand(
                CommandSpec::new("log")
                    .with_flag(FlagSpec::new("max-count", FieldKind::Int).with_short('n'))
                    .with_arg(ArgSpec::new("revision", FieldKind::String)),
            ),
    )
    .unwrap()
}

fn env(pairs: &[(&str, &str)]) -> Env {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[test]
fn boolean_flags_without_value_or_default_stay_unset() {
    let app = git();
    let results = app.parse_blocking(["git", "commit"], &Env::new());

    assert!(results.is_ok(), "{:?}", results.errors);
    assert!(results.flag("amend").is_none());
    assert!(results.flag("verbose").is_none());
    assert!(!results.flag_is_set("amend"));
}

#[test]
fn int_accepts_whole_exponent_forms_only() {
    let app = git();

    let results = app.parse_blocking(["git", "log", "-n", "-1.2e5"], &Env::new());
    assert!(results.is_ok(), "{:?}", results.errors);
    assert_eq!(results.flag("max_count"), Some(&Value::Int(-120_000)));

    let results = app.parse_blocking(["git", "log", "-n", "-3.5e3"], &Env::new());
    assert_eq!(results.flag("max_count"), Some(&Value::Int(-3500)));

    for bad in ["1.2", "-3.5e-3", "1.25e0", "ten"] {
        let results = app.parse_blocking(["git", "log", "--max-count", bad], &Env::new());
        assert_eq!(results.errors.len(), 1, "{bad}");
        assert!(results.flag("max_count").is_none());
    }
}

#[test]
fn repeated_flags_keep_encounter_order() {
    let app = git();
    let results = app.parse_blocking(["git", "commit", "-m", "abc", "--message", "xyz"], &Env::new());

    assert_eq!(
        results.flag("message"),
        Some(&Value::List(vec![Value::String("abc".into()), Value::String("xyz".into())]))
    );
}

#[test]
fn separator_turns_flags_into_extra_positionals() {
    let app = git();
    let results = app.parse_blocking(["git", "log", "main", "--", "--verbose"], &Env::new());

    assert!(results.flag("verbose").is_none());
    assert_eq!(
        results.errors,
        vec![ParseError::ExtraPositional {
            token: "--verbose".into(),
            command: "git log".into(),
        }]
    );
}

#[test]
fn separator_feeds_repeated_positional() {
    let app = git();
    let results = app.parse_blocking(["git", "commit", "--", "-weird", "log"], &Env::new());

    assert!(results.is_ok(), "{:?}", results.errors);
    assert_eq!(
        results.arg("paths"),
        Some(&Value::List(vec![
            Value::Path(PathBuf::from("-weird")),
            Value::Path(PathBuf::from("log")),
        ]))
    );
}

#[test]
fn disallowed_value_is_reported_and_kept() {
    let app = git();
    let results = app.parse_blocking(["git", "--color", "sometimes"], &Env::new());

    assert_eq!(
        results.error_messages(),
        vec!["`sometimes` is not one of the allowed values for `--color` (auto, always, never)"]
    );
    assert_eq!(results.flag("color"), Some(&Value::String("sometimes".into())));
}

#[test]
fn env_overrides_default_and_argv_overrides_env() {
    let app = git();

    let results = app.parse_blocking(["git", "commit"], &Env::new());
    assert_eq!(results.flag("author"), Some(&Value::String("nobody".into())));

    let vars = env(&[("GIT_AUTHOR_NAME", "ada")]);
    let results = app.parse_blocking(["git", "commit"], &vars);
    assert_eq!(results.flag("author"), Some(&Value::String("ada".into())));

    let results = app.parse_blocking(["git", "commit", "--author=grace"], &vars);
    assert_eq!(results.flag("author"), Some(&Value::String("grace".into())));
}

#[test]
fn errors_accumulate_instead_of_aborting() {
    let app = git();
    let results = app.parse_blocking(
        ["git", "--bogus", "log", "-n", "x", "HEAD", "extra"],
        &Env::new(),
    );

    assert_eq!(results.command_path, vec!["log"]);
    assert_eq!(results.arg("revision"), Some(&Value::String("HEAD".into())));
    assert_eq!(
        results.error_messages(),
        vec![
            "no flag for `--bogus` in command `git`",
            "unexpected extra positional argument `extra` in command `git log`",
            "invalid value for `--max-count`: `x` is not a number",
        ]
    );
}

#[test]
fn runtime_prefix_is_stripped_from_argv() {
    let app = git();
    let results = app.parse_blocking(["/usr/local/bin/node", "/srv/git.js", "log"], &Env::new());

    assert_eq!(results.binary_name, "git.js");
    assert_eq!(results.command_path, vec!["log"]);
}

#[test]
fn results_serialize_to_plain_json() {
    let app = git();
    let results = app.parse_blocking(["git", "log", "-n", "3", "--color=nope"], &Env::new());
    let json = serde_json::to_value(&results).unwrap();

    assert_eq!(json["command_path"], serde_json::json!(["log"]));
    assert_eq!(json["flags"]["max_count"], serde_json::json!(3));
    assert_eq!(json["errors"].as_array().unwrap().len(), 1);
    assert!(json["errors"][0].as_str().unwrap().contains("`nope`"));
}

// ---------------------------------------------------------------------------
// Custom hooks
// ---------------------------------------------------------------------------

#[test]
fn custom_parser_reads_earlier_fields() {
    let app = App::new(
        CommandSpec::new("convert")
            .with_flag(FlagSpec::new("unit", FieldKind::String).with_default("m"))
            .with_arg(ArgSpec::new("length", FieldKind::Float).with_parser(
                |raw: &str, ctx: &ParseContext<'_>| -> Result<Value, CoercionError> {
                    let value = match coerce(FieldKind::Float, raw)? {
                        Value::Float(value) => value,
                        other => return Err(CoercionError::custom(format!("unexpected {other}"))),
                    };
                    match ctx.flag("unit").and_then(Value::as_str) {
                        Some("km") => Ok(Value::Float(value * 1000.0)),
                        Some("m") => Ok(Value::Float(value)),
                        unit => Err(CoercionError::custom(format!("unknown unit {unit:?}"))),
                    }
                },
            )),
    )
    .unwrap();

    let results = app.parse_blocking(["convert", "--unit", "km", "1.5"], &Env::new());
    assert_eq!(results.arg("length"), Some(&Value::Float(1500.0)));

    let results = app.parse_blocking(["convert", "--unit", "mi", "1"], &Env::new());
    assert_eq!(
        results.error_messages(),
        vec!["invalid value for `[length]`: unknown unit Some(\"mi\")"]
    );
}

// ---------------------------------------------------------------------------
// Schema construction
// ---------------------------------------------------------------------------

#[test]
fn duplicate_subcommand_fails_at_construction() {
    let spec = CommandSpec::new("git")
        .with_subcommand(CommandSpec::new("log"))
        .with_subcommand(CommandSpec::new("log"));

    let err = App::new(spec).unwrap_err();
    assert_eq!(
        err,
        SchemaError::DuplicateSubcommand {
            parent: "git".into(),
            name: "log".into(),
        }
    );
}

#[test]
fn user_flag_cannot_shadow_builtin_help() {
    let spec = CommandSpec::new("tool").with_flag(FlagSpec::boolean("help"));
    assert!(matches!(App::new(spec), Err(SchemaError::DuplicateFlag { .. })));
}

// ---------------------------------------------------------------------------
// Alignment and help
// ---------------------------------------------------------------------------

#[test]
fn align_pads_to_min_width_and_expands_multiline_cells() {
    let rows = align(&["a\tbb", "ccc\td"], &AlignOptions::default());
    assert_eq!(rows, vec!["a           bb        ", "ccc         d         "]);

    let rows = align(&["x\ty\nz"], &AlignOptions::default());
    assert_eq!(rows, vec!["x           y         ", "            z         "]);
}

#[test]
fn help_for_subcommand_shows_inherited_flags() {
    let app = git();
    let commit = app.find_command(&["commit"]).unwrap();
    let help = app.help("git", commit);

    assert!(help.starts_with("Usage:\n  git commit [flags] [paths...]\n\nRecord changes\n"));
    assert!(help.contains("-m, --message <string>"));
    assert!(help.contains("[env: GIT_AUTHOR_NAME]"));
    let globals = help.split("Global Flags:\n").nth(1).unwrap();
    assert!(globals.contains("-V, --verbose"));
    assert!(globals.contains("[one of: auto, always, never]"));
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

#[test]
fn completion_follows_the_tree() {
    let app = git();
    let none = Env::new();

    assert_eq!(app.complete_blocking(["git", "--get-completions", ""], &none), vec!["commit", "log"]);
    assert_eq!(
        app.complete_blocking(["git", "--get-completions", "log", "--color", ""], &none),
        vec!["auto", "always", "never"]
    );

    let flags = app.complete_blocking(["git", "--get-completions", "commit", "--"], &none);
    assert!(flags.contains(&"--amend".to_string()));
    assert!(flags.contains(&"--verbose".to_string()));
    assert!(!flags.contains(&"--max-count".to_string()));
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

#[test]
fn run_reports_exit_codes() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let app = App::new(
        CommandSpec::new("todo").with_subcommand(
            CommandSpec::new("add")
                .with_arg(ArgSpec::new("item", FieldKind::String).required())
                .with_action(move |results: &Results| -> Result<(), ActionError> {
                    let item = results.arg("item").map(ToString::to_string).unwrap_or_default();
                    if item == "fail" {
                        return Err(format!("cannot add {item}").into());
                    }
                    recorder.lock().unwrap().push(item);
                    Ok(())
                }),
        ),
    )
    .unwrap();

    let run = |argv: &[&str]| {
        let (mut out, mut err) = (SharedBuf::default(), SharedBuf::default());
        let code = {
            let mut io = RunIo {
                out: &mut out,
                err: &mut err,
            };
            app.run_blocking(argv.iter().copied(), &Env::new(), &mut io)
        };
        (code, out.text(), err.text())
    };

    assert_eq!(run(&["todo", "add", "milk"]).0, 0);
    assert_eq!(*seen.lock().unwrap(), vec!["milk".to_string()]);

    let (code, _, err) = run(&["todo", "add", "fail"]);
    assert_eq!((code, err.as_str()), (1, "error: cannot add fail\n"));

    let (code, _, err) = run(&["todo", "add"]);
    assert_eq!(code, 1);
    assert!(err.starts_with("error: `<item>` is required but not provided\n"));

    let (code, out, _) = run(&["todo", "add", "--help"]);
    assert_eq!(code, 0);
    assert!(out.starts_with("Usage:\n  todo add [flags] <item>"));

    let (code, _, err) = run(&["todo"]);
    assert_eq!(code, 1);
    assert!(err.contains("Commands:\n  add"));
}
