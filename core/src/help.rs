//! Help text for a command.

use crate::align::{AlignOptions, align};
use crate::schema::{App, CommandId};
use crate::types::{ArgSpec, FieldSpec, FlagSpec};

impl App {
    /// Renders help for command `id` as invoked through `binary_name`.
    ///
    /// Sections appear in this order, each only when non-empty: usage,
    /// the command's help text, subcommands, positional arguments, own
    /// flags, and flags inherited from ancestors. Hidden flags are left out.
    ///
    /// # Examples
    ///
    /// ```
    /// use flagtree_core::*;
    ///
    /// let app = App::new(
    ///     CommandSpec::new("tool")
    ///         .with_subcommand(
    ///             CommandSpec::new("open").with_arg(ArgSpec::new("target", FieldKind::String).required()),
    ///         ),
    /// )
    /// .unwrap();
    ///
    /// let open = app.find_command(&["open"]).unwrap();
    /// let help = app.help("tool", open);
    /// assert!(help.starts_with("Usage:\n  tool open [flags] <target>\n"));
    /// assert!(help.contains("Global Flags:"));
    /// ```
    pub fn help(&self, binary_name: &str, id: CommandId) -> String {
        let command = self.command(id);
        let invocation = std::iter::once(binary_name.to_string())
            .chain(self.command_path(id))
            .collect::<Vec<_>>()
            .join(" ");

        let mut sections = Vec::new();

        let mut usage = format!("{invocation} [flags]");
        for arg in &command.args {
            usage.push(' ');
            usage.push_str(&arg.usage());
        }
        let mut usage_lines = vec![usage];
        if !command.children.is_empty() {
            usage_lines.push(format!("{invocation} <command>"));
        }
        sections.push(section("Usage:", usage_lines));

        if let Some(help) = command.help.as_deref().filter(|help| !help.is_empty()) {
            sections.push(help.to_string());
        }

        let commands: Vec<String> = command
            .children
            .iter()
            .map(|(name, child)| {
                let help = self.command(*child).help.clone().unwrap_or_default();
                format!("{name}\t{help}")
            })
            .collect();
        if !commands.is_empty() {
            sections.push(section("Commands:", aligned(&commands)));
        }

        let args: Vec<String> = command.args.iter().map(arg_row).collect();
        if !args.is_empty() {
            sections.push(section("Arguments:", aligned(&args)));
        }

        let own: Vec<String> = flag_rows(command.flags.iter());
        if !own.is_empty() {
            sections.push(section("Flags:", aligned(&own)));
        }

        let inherited: Vec<String> = flag_rows(self.inherited_flags(id).into_iter());
        if !inherited.is_empty() {
            sections.push(section("Global Flags:", aligned(&inherited)));
        }

        let mut rendered = sections.join("\n\n");
        rendered.push('\n');
        rendered
    }
}

fn section(title: &str, lines: Vec<String>) -> String {
    std::iter::once(title.to_string())
        .chain(lines.into_iter().map(|line| format!("  {line}")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn aligned(rows: &[String]) -> Vec<String> {
    align(rows, &AlignOptions::default())
        .into_iter()
        .map(|row| row.trim_end().to_string())
        .collect()
}

fn arg_row(arg: &ArgSpec) -> String {
    format!("{}\t{}", arg.usage(), description(&arg.field, false))
}

fn flag_rows<'a>(flags: impl Iterator<Item = &'a FlagSpec>) -> Vec<String> {
    flags
        .filter(|flag| !flag.hidden)
        .map(|flag| {
            let mut forms = match flag.short_form() {
                Some(short) => format!("{short}, {}", flag.long_form()),
                None => format!("    {}", flag.long_form()),
            };
            if !flag.field.kind.is_bool() {
                forms.push(' ');
                forms.push_str(&flag.value_placeholder());
            }
            format!("{forms}\t{}", description(&flag.field, flag.deprecated))
        })
        .collect()
}

/// Help text followed by one annotation per line.
fn description(field: &FieldSpec, deprecated: bool) -> String {
    let mut lines = Vec::new();
    if let Some(help) = field.help.as_deref().filter(|help| !help.is_empty()) {
        lines.push(help.to_string());
    }
    if field.required {
        lines.push("[required]".to_string());
    }
    if field.repeated {
        lines.push("[repeatable]".to_string());
    }
    if let Some(default) = &field.default_value {
        lines.push(format!("[default: {default}]"));
    }
    if let Some(env_var) = &field.env_var {
        lines.push(format!("[env: {env_var}]"));
    }
    if let Some(allowed) = &field.allowed_values {
        lines.push(format!("[one of: {}]", allowed.join(", ")));
    }
    if deprecated {
        lines.push("[deprecated]".to_string());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use crate::{CommandSpec, FieldKind};

    use super::*;

    #[test]
    fn test_root_help_layout() {
        let app = App::new(
            CommandSpec::new("tool")
                .with_help("Does things")
                .with_flag(
                    FlagSpec::boolean("verbose")
                        .with_short('v')
                        .with_help("Talk more"),
                )
                .with_subcommand(CommandSpec::new("open").with_help("Open a target")),
        )
        .unwrap();

        let expected = "\
Usage:
  tool [flags]
  tool <command>

Does things

Commands:
  open        Open a target

Flags:
  -v, --verbose  Talk more
  -h, --help     Show help
";
        assert_eq!(app.help("tool", app.root()), expected);
    }

    #[test]
    fn test_annotations_stack_in_description() {
        let app = App::new(
            CommandSpec::new("tool").with_flag(
                FlagSpec::new("color", FieldKind::String)
                    .with_help("When to use color")
                    .with_default("auto")
                    .with_env("TOOL_COLOR")
                    .with_allowed(["auto", "never"])
                    .deprecated(),
            ),
        )
        .unwrap();

        let help = app.help("tool", app.root());
        let lines: Vec<&str> = help.lines().collect();
        let start = lines
            .iter()
            .position(|line| line.contains("--color <string>"))
            .unwrap();
        assert!(lines[start].ends_with("When to use color"));
        assert!(lines[start + 1].ends_with("[default: auto]"));
        assert!(lines[start + 2].ends_with("[env: TOOL_COLOR]"));
        assert!(lines[start + 3].ends_with("[one of: auto, never]"));
        assert!(lines[start + 4].ends_with("[deprecated]"));
        assert!(lines[start + 1].starts_with("                "));
    }

    #[test]
    fn test_hidden_flags_are_omitted() {
        let app = App::new(
            CommandSpec::new("tool").with_flag(FlagSpec::boolean("secret").hidden()),
        )
        .unwrap();
        let help = app.help("tool", app.root());
        assert!(!help.contains("--secret"));
        assert!(!help.contains("--get-completions"));
        assert!(!help.contains("--completion-script"));
    }

    #[test]
    fn test_subcommand_lists_args_and_global_flags() {
        let app = App::new(
            CommandSpec::new("tool")
                .with_flag(FlagSpec::boolean("verbose"))
                .with_subcommand(
                    CommandSpec::new("copy")
                        .with_flag(
                            FlagSpec::new("mode", FieldKind::Int).with_display_name("octal"),
                        )
                        .with_arg(ArgSpec::new("from", FieldKind::Path).required())
                        .with_arg(ArgSpec::new("to", FieldKind::Path).repeated()),
                ),
        )
        .unwrap();

        let copy = app.find_command(&["copy"]).unwrap();
        let help = app.help("tool", copy);
        assert!(help.starts_with("Usage:\n  tool copy [flags] <from> [to...]\n\n"));
        assert!(!help.contains("<command>"));

        let arguments = help.split("Arguments:\n").nth(1).unwrap();
        assert!(arguments.starts_with("  <from>      [required]\n  [to...]     [repeatable]\n"));

        let flags = help.split("\nFlags:\n").nth(1).unwrap();
        assert!(flags.starts_with("      --mode <octal>"));

        let globals = help.split("Global Flags:\n").nth(1).unwrap();
        assert!(globals.contains("--verbose"));
        assert!(globals.contains("-h, --help"));
    }
}
