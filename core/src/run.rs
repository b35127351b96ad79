//! Parse, dispatch, and report an exit code.

use std::error::Error;
use std::fmt;
use std::io::Write;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::complete::{completion_script, suggest};
use crate::parser::{Env, Results, split_argv};
use crate::schema::{App, COMPLETION_SCRIPT_FLAG, GET_COMPLETIONS_FLAG, HELP_FLAG};
use crate::types::default_var_name;

/// Error returned by an [`Action`].
pub type ActionError = Box<dyn Error + Send + Sync>;

/// Work attached to a command, run when that command is selected.
///
/// Plain closures `Fn(&Results) -> Result<(), ActionError>` implement this
/// trait.
pub trait Action: Send + Sync {
    fn call<'a>(&'a self, results: &'a Results) -> BoxFuture<'a, Result<(), ActionError>>;
}

impl<F> Action for F
where
    F: Fn(&Results) -> Result<(), ActionError> + Send + Sync,
{
    fn call<'a>(&'a self, results: &'a Results) -> BoxFuture<'a, Result<(), ActionError>> {
        Box::pin(futures::future::ready(self(results)))
    }
}

impl fmt::Debug for dyn Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Action")
    }
}

/// Output sinks for [`App::run`].
pub struct RunIo<'a> {
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
}

impl fmt::Debug for RunIo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunIo").finish_non_exhaustive()
    }
}

impl App {
    /// Parses `argv` and acts on the outcome, returning the process exit
    /// code.
    ///
    /// Checked in order:
    ///
    /// 1. `--completion-script`: print the bash script, exit 0.
    /// 2. `--get-completions`: print one suggestion per line, exit 0.
    /// 3. `--help`: print help to `out`, exit 0, even if parsing failed.
    /// 4. Parse errors: print them and the command's help to `err`, exit 1.
    /// 5. No action on the selected command: help to `err`, exit 1.
    /// 6. Run the action; exit 0, or 1 after printing its error.
    ///
    /// Failing to write to a sink yields exit code 1.
    pub async fn run<I, S>(&self, argv: I, env: &Env, io: &mut RunIo<'_>) -> i32
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (binary_name, tokens) = split_argv(argv);
        let results = self
            .parse_tokens(binary_name.clone(), tokens.clone(), env)
            .await;

        match self.dispatch(&binary_name, &tokens, &results, env, io).await {
            Ok(code) => code,
            Err(error) => {
                warn!(error = %error, "Failed to write command output");
                1
            }
        }
    }

    /// Blocking wrapper around [`App::run`].
    ///
    /// # Examples
    ///
    /// ```
    /// use flagtree_core::*;
    ///
    /// let app = App::new(
    ///     CommandSpec::new("greet")
    ///         .with_arg(ArgSpec::new("name", FieldKind::String).required())
    ///         .with_action(|results: &Results| -> Result<(), ActionError> {
    ///             let name = results.arg("name").and_then(Value::as_str).unwrap_or_default();
    ///             if name.is_empty() {
    ///                 return Err("empty name".into());
    ///             }
    ///             Ok(())
    ///         }),
    /// )
    /// .unwrap();
    ///
    /// let (mut out, mut err) = (Vec::new(), Vec::new());
    /// let mut io = RunIo { out: &mut out, err: &mut err };
    /// assert_eq!(app.run_blocking(["greet", "ada"], &Env::new(), &mut io), 0);
    /// assert_eq!(app.run_blocking(["greet"], &Env::new(), &mut io), 1);
    /// assert!(String::from_utf8(err).unwrap().contains("`<name>` is required"));
    /// ```
    pub fn run_blocking<I, S>(&self, argv: I, env: &Env, io: &mut RunIo<'_>) -> i32
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        futures::executor::block_on(self.run(argv, env, io))
    }

    async fn dispatch(
        &self,
        binary_name: &str,
        tokens: &[String],
        results: &Results,
        env: &Env,
        io: &mut RunIo<'_>,
    ) -> std::io::Result<i32> {
        if results.flag_is_set(&default_var_name(COMPLETION_SCRIPT_FLAG)) {
            write!(io.out, "{}", completion_script(binary_name))?;
            return Ok(0);
        }

        if results.flag_is_set(&default_var_name(GET_COMPLETIONS_FLAG)) {
            let suggestions = suggest(self, tokens, results, env).await;
            for suggestion in suggestions {
                writeln!(io.out, "{suggestion}")?;
            }
            return Ok(0);
        }

        let help = self.help(binary_name, results.command);

        if results.flag_is_set(HELP_FLAG) {
            write!(io.out, "{help}")?;
            return Ok(0);
        }

        if !results.is_ok() {
            debug!(errors = results.errors.len(), "Parse failed");
            for error in &results.errors {
                writeln!(io.err, "error: {error}")?;
            }
            writeln!(io.err)?;
            write!(io.err, "{help}")?;
            return Ok(1);
        }

        let Some(action) = &self.command(results.command).action else {
            debug!(command = %self.qualified_name(results.command), "No action, showing help");
            write!(io.err, "{help}")?;
            return Ok(1);
        };

        match action.call(results).await {
            Ok(()) => Ok(0),
            Err(error) => {
                writeln!(io.err, "error: {error}")?;
                Ok(1)
            }
        }
    }
}
