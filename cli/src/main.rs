use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand};
use flagtree_core::{App, Env, Results, completion_script, load_spec, validate_spec};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;

/// CLI-specific output format enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "flagtree", version, disable_help_subcommand = true)]
#[command(about = "Parse, document and complete command lines described by a schema file")]
struct Cli {
    /// Log engine decisions to stderr (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse an argument vector against a schema and print the results.
    Parse(ParseArgs),
    /// Print help text for a command in a schema.
    Help(HelpArgs),
    /// Print completion suggestions for partially typed words.
    Complete(CompleteArgs),
    /// Print the bash completion registration script.
    CompletionScript(CompletionScriptArgs),
    /// Validate one or more schema files.
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
struct SchemaArgs {
    /// Schema file (.yaml, .yml or .json).
    #[arg(long)]
    schema: PathBuf,
}

#[derive(Debug, Args)]
struct EnvArgs {
    /// Extra environment variable visible to the parser (KEY=VALUE).
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    vars: Vec<(String, String)>,
    /// Ignore the process environment.
    #[arg(long)]
    clear_env: bool,
}

#[derive(Debug, Args)]
struct ParseArgs {
    #[command(flatten)]
    schema: SchemaArgs,
    #[command(flatten)]
    env: EnvArgs,
    /// Output format.
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
    /// Arguments to parse, after `--`; the binary name is the schema's root name.
    #[arg(last = true)]
    argv: Vec<String>,
}

#[derive(Debug, Args)]
struct HelpArgs {
    #[command(flatten)]
    schema: SchemaArgs,
    /// Subcommand path below the root, e.g. `remote add`.
    path: Vec<String>,
}

#[derive(Debug, Args)]
struct CompleteArgs {
    #[command(flatten)]
    schema: SchemaArgs,
    #[command(flatten)]
    env: EnvArgs,
    /// Words typed so far, after `--`; the last one is being completed.
    #[arg(last = true)]
    words: Vec<String>,
}

#[derive(Debug, Args)]
struct CompletionScriptArgs {
    #[command(flatten)]
    schema: SchemaArgs,
    /// Binary name to register (default: the schema's root name).
    #[arg(long)]
    name: Option<String>,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Schema files to check.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

/// Machine-readable outcome of `flagtree parse`.
#[derive(Debug, Serialize)]
struct ParseReport<'a> {
    ok: bool,
    command: String,
    #[serde(flatten)]
    results: &'a Results,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Parse(args) => run_parse(args),
        Command::Help(args) => run_help(args),
        Command::Complete(args) => run_complete(args),
        Command::CompletionScript(args) => run_completion_script(args),
        Command::Validate(args) => run_validate(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_app(path: &Path) -> Result<App, String> {
    App::from_file(path).map_err(|err| format!("Failed to load schema '{}': {err}", path.display()))
}

fn build_env(args: &EnvArgs) -> Env {
    let mut env: Env = if args.clear_env {
        Env::new()
    } else {
        std::env::vars().collect()
    };
    env.extend(args.vars.iter().cloned());
    env
}

fn run_parse(args: ParseArgs) -> Result<(), String> {
    let app = load_app(&args.schema.schema)?;
    let env = build_env(&args.env);

    let argv = std::iter::once(app.name().to_string()).chain(args.argv);
    let results = app.parse_blocking(argv, &env);
    let report = ParseReport {
        ok: results.is_ok(),
        command: app.qualified_name(results.command),
        results: &results,
    };

    let rendered = match args.format {
        CliOutputFormat::Json => serde_json::to_string_pretty(&report)
            .map_err(|e| format!("JSON serialization failed: {e}"))?,
        CliOutputFormat::Yaml => {
            serde_yaml::to_string(&report).map_err(|e| format!("YAML serialization failed: {e}"))?
        }
    };
    println!("{}", rendered.trim_end());

    if !results.is_ok() {
        return Err(format!("{} parse error(s)", results.errors.len()));
    }
    Ok(())
}

fn run_help(args: HelpArgs) -> Result<(), String> {
    let app = load_app(&args.schema.schema)?;
    let id = app
        .find_command(&args.path)
        .ok_or_else(|| format!("no command '{}' in schema", args.path.join(" ")))?;
    print!("{}", app.help(app.name(), id));
    Ok(())
}

fn run_complete(args: CompleteArgs) -> Result<(), String> {
    let app = load_app(&args.schema.schema)?;
    let env = build_env(&args.env);

    let mut words = args.words;
    if words.is_empty() {
        words.push(String::new());
    }
    debug!(words = words.len(), "Completing");

    let argv = std::iter::once(app.name().to_string()).chain(words);
    for suggestion in app.complete_blocking(argv, &env) {
        println!("{suggestion}");
    }
    Ok(())
}

fn run_completion_script(args: CompletionScriptArgs) -> Result<(), String> {
    let app = load_app(&args.schema.schema)?;
    let name = args.name.as_deref().unwrap_or(app.name());
    print!("{}", completion_script(name));
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), String> {
    let mut invalid = 0usize;
    for path in &args.inputs {
        let spec = load_spec(path)
            .map_err(|err| format!("Failed to load schema '{}': {err}", path.display()))?;
        let mut errors = validate_spec(&spec);
        if errors.is_empty() {
            // Also catches clashes with the built-in flags.
            match App::new(spec) {
                Ok(_) => continue,
                Err(err) => errors.push(err),
            }
        }
        invalid += 1;
        eprintln!("{}:", path.display());
        for error in errors {
            eprintln!("  {error}");
        }
    }

    if invalid > 0 {
        return Err(format!(
            "{invalid} of {} schema file(s) are invalid",
            args.inputs.len()
        ));
    }
    println!("Validated {} schema file(s).", args.inputs.len());
    Ok(())
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty variable name in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
