//! Shell completion suggestions.
//!
//! Shells call the binary once per completion request with the words typed
//! so far and cannot tell "cursor right after a word" from "cursor after a
//! word and a space". Suggestions are therefore a superset that the shell
//! filters by prefix.

use std::fmt;

use futures::future::BoxFuture;
use tracing::debug;

use crate::parser::{Env, ParseMode, ParseSession, Results, split_argv, structural_walk};
use crate::schema::{App, CommandId, FlagKey, GET_COMPLETIONS_FLAG};
use crate::types::{FieldSpec, FlagSpec};

/// What a [`Completer`] gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct CompletionContext<'a> {
    /// The word being completed; empty after a trailing space.
    pub current: &'a str,
    pub previous: Option<&'a str>,
    /// Outcome of parsing the whole invocation.
    pub results: &'a Results,
    pub env: &'a Env,
}

/// Produces suggestions for a field's value.
///
/// Plain closures `Fn(&CompletionContext) -> Vec<String>` implement this
/// trait.
pub trait Completer: Send + Sync {
    fn complete<'a>(&'a self, ctx: &'a CompletionContext<'a>) -> BoxFuture<'a, Vec<String>>;
}

impl<F> Completer for F
where
    F: Fn(&CompletionContext<'_>) -> Vec<String> + Send + Sync,
{
    fn complete<'a>(&'a self, ctx: &'a CompletionContext<'a>) -> BoxFuture<'a, Vec<String>> {
        Box::pin(futures::future::ready(self(ctx)))
    }
}

impl fmt::Debug for dyn Completer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Completer")
    }
}

fn is_completion_request(token: &str) -> bool {
    token
        .strip_prefix("--")
        .and_then(|rest| rest.strip_prefix(GET_COMPLETIONS_FLAG))
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('='))
}

impl App {
    /// Parses `argv` and returns completion suggestions for its last word.
    ///
    /// # Examples
    ///
    /// ```
    /// use flagtree_core::*;
    ///
    /// let app = App::new(
    ///     CommandSpec::new("tool")
    ///         .with_flag(FlagSpec::new("format", FieldKind::String).with_allowed(["json", "yaml"]))
    ///         .with_subcommand(CommandSpec::new("build"))
    ///         .with_subcommand(CommandSpec::new("bench")),
    /// )
    /// .unwrap();
    /// let env = Env::new();
    ///
    /// let words = app.complete_blocking(["tool", "--get-completions", "b"], &env);
    /// assert_eq!(words, vec!["build", "bench"]);
    ///
    /// let words = app.complete_blocking(["tool", "--format", ""], &env);
    /// assert_eq!(words, vec!["json", "yaml"]);
    /// ```
    pub async fn complete<I, S>(&self, argv: I, env: &Env) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (binary_name, tokens) = split_argv(argv);
        let results = self.parse_tokens(binary_name, tokens.clone(), env).await;
        suggest(self, &tokens, &results, env).await
    }

    /// Blocking wrapper around [`App::complete`].
    pub fn complete_blocking<I, S>(&self, argv: I, env: &Env) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        futures::executor::block_on(self.complete(argv, env))
    }
}

/// Computes suggestions from the raw tokens of an invocation whose parse
/// produced `results`.
pub async fn suggest(app: &App, tokens: &[String], results: &Results, env: &Env) -> Vec<String> {
    let words: Vec<&str> = tokens
        .iter()
        .map(String::as_str)
        .filter(|token| !is_completion_request(token))
        .collect();
    let (current, before) = match words.split_last() {
        Some((current, before)) => (*current, before),
        None => ("", &[][..]),
    };
    let previous = before.last().copied();

    // Re-derive the command and positional cursor the current word belongs to.
    let mut scan = ParseSession::new(
        results.binary_name.clone(),
        before.iter().map(|word| word.to_string()).collect(),
        app.root(),
    );
    structural_walk(app, &mut scan);
    let command = scan.results.command;
    let positional_only = scan.mode == ParseMode::PositionalOnly;

    let ctx = CompletionContext {
        current,
        previous,
        results,
        env,
    };

    if !positional_only {
        let pending = previous
            .and_then(|word| flag_for_word(app, command, word))
            .filter(|flag| !flag.field.kind.is_bool());
        if let Some(flag) = pending {
            debug!(flag = %flag.long_form(), "Completing flag value");
            return field_suggestions(&flag.field, &ctx).await;
        }
    }

    let mut suggestions = Vec::new();

    if !positional_only && scan.positional_index == 0 {
        for (name, _) in &app.command(command).children {
            push_unique(&mut suggestions, name.clone());
        }
    }

    let args = &app.command(command).args;
    let slot = args
        .get(scan.positional_index)
        .or_else(|| args.last().filter(|arg| arg.field.repeated));
    if let Some(arg) = slot {
        for value in field_suggestions(&arg.field, &ctx).await {
            push_unique(&mut suggestions, value);
        }
    }

    if !positional_only && current.starts_with('-') {
        for flag in app.visible_flags(command) {
            for form in flag_forms(flag, current) {
                push_unique(&mut suggestions, form);
            }
        }
    }

    if suggestions.is_empty() {
        debug!("No specific suggestions, listing all flags");
        for flag in app.visible_flags(command) {
            if !flag.hidden {
                push_unique(&mut suggestions, flag.long_form());
            }
        }
    }

    suggestions
}

/// The flag a whole word names exactly (`--name` or `-c`).
fn flag_for_word<'a>(app: &'a App, command: CommandId, word: &str) -> Option<&'a FlagSpec> {
    if let Some(name) = word.strip_prefix("--") {
        if name.is_empty() || name.contains('=') {
            return None;
        }
        return app.find_flag(command, FlagKey::Name(name));
    }
    let mut chars = word.strip_prefix('-')?.chars();
    match (chars.next(), chars.next()) {
        (Some(short), None) => app.find_flag(command, FlagKey::Short(short)),
        _ => None,
    }
}

/// Display forms of `flag` worth offering for the partial word `current`.
fn flag_forms(flag: &FlagSpec, current: &str) -> Vec<String> {
    let mut forms = Vec::new();
    let long = flag.long_form();

    // Hidden flags only show up once the user has typed into their name.
    let targets_hidden = current.len() > 2 && long.starts_with(current);
    if !flag.hidden || targets_hidden {
        forms.push(long);
    }

    if let Some(short) = flag.short_form() {
        if !flag.hidden && (current == "-" || current == short) {
            forms.push(short);
        }
    }
    forms
}

async fn field_suggestions(field: &FieldSpec, ctx: &CompletionContext<'_>) -> Vec<String> {
    if let Some(completer) = &field.completer {
        return completer.complete(ctx).await;
    }
    field.allowed_values.clone().unwrap_or_default()
}

fn push_unique(out: &mut Vec<String>, value: String) {
    if !out.contains(&value) {
        out.push(value);
    }
}

/// Bash registration script for `binary_name`.
///
/// The script calls `binary_name --get-completions` with the words up to
/// the cursor and hands the output to `compgen`.
pub fn completion_script(binary_name: &str) -> String {
    let function: String = binary_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    format!(
        r#"###-begin-{binary_name}-completions-###
#
# {binary_name} command completion script
#
# Installation: {binary_name} --completion-script >> ~/.bashrc
#    or {binary_name} --completion-script >> ~/.bash_profile on OSX.
#
_{function}_completions()
{{
    local cur_word suggestions

    cur_word="${{COMP_WORDS[COMP_CWORD]}}"
    suggestions=$({binary_name} --get-completions "${{COMP_WORDS[@]:1:$COMP_CWORD}}")

    local IFS=$'\n'
    COMPREPLY=( $(compgen -W "${{suggestions}}" -- "${{cur_word}}") )
    return 0
}}
complete -o bashdefault -o default -F _{function}_completions {binary_name}
###-end-{binary_name}-completions-###
"#
    )
}
