//! The validated, immutable command tree.
//!
//! [`App::new`] consumes a [`CommandSpec`], checks it with
//! [`validate_spec`](crate::validate_spec), adds the built-in flags to the
//! root, and flattens the tree into an arena addressed by [`CommandId`].
//! Each node keeps a single `parent` link used for name qualification and
//! flag inheritance.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::run::Action;
use crate::types::{ArgSpec, CommandSpec, FlagSpec};
use crate::validate::{SchemaError, effective_var_name, validate_spec};

/// Long name of the built-in help flag.
pub const HELP_FLAG: &str = "help";
/// Long name of the hidden flag that prints the shell registration script.
pub const COMPLETION_SCRIPT_FLAG: &str = "completion-script";
/// Long name of the hidden flag that prints completion suggestions.
pub const GET_COMPLETIONS_FLAG: &str = "get-completions";

/// Index of a command in an [`App`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CommandId(usize);

/// Key kinds a flag can be looked up by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKey<'a> {
    /// Long name without dashes.
    Name(&'a str),
    Short(char),
    VarName(&'a str),
}

impl FlagKey<'_> {
    fn matches(&self, flag: &FlagSpec) -> bool {
        match *self {
            FlagKey::Name(name) => flag.field.name == name,
            FlagKey::Short(short) => flag.short == Some(short),
            FlagKey::VarName(var_name) => flag.field.var_name == var_name,
        }
    }
}

/// A node in the command tree.
#[derive(Debug)]
pub struct Command {
    pub name: String,
    pub help: Option<String>,
    pub parent: Option<CommandId>,
    /// Children in declaration order; names are unique.
    pub children: Vec<(String, CommandId)>,
    pub flags: Vec<FlagSpec>,
    pub args: Vec<ArgSpec>,
    pub action: Option<Arc<dyn Action>>,
}

impl Command {
    pub fn find_flag(&self, key: FlagKey<'_>) -> Option<&FlagSpec> {
        self.flags.iter().find(|flag| key.matches(flag))
    }

    pub fn child(&self, name: &str) -> Option<CommandId> {
        self.children
            .iter()
            .find(|(child, _)| child == name)
            .map(|(_, id)| *id)
    }
}

/// A validated command tree, ready to parse argument vectors.
///
/// # Examples
///
/// ```
/// use flagtree_core::*;
///
/// let app = App::new(
///     CommandSpec::new("tool")
///         .with_flag(FlagSpec::boolean("verbose").with_short('v'))
///         .with_subcommand(CommandSpec::new("build")),
/// )
/// .unwrap();
///
/// let build = app.find_command(&["build"]).unwrap();
/// assert_eq!(app.qualified_name(build), "tool build");
/// // Inherited from the root.
/// assert!(app.find_flag(build, FlagKey::Short('v')).is_some());
/// ```
#[derive(Debug)]
pub struct App {
    commands: Vec<Command>,
}

impl App {
    /// Validates `spec` and builds the tree.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchemaError`] found, e.g. a subcommand name
    /// registered twice under the same parent.
    pub fn new(mut spec: CommandSpec) -> Result<Self, SchemaError> {
        spec.flags.extend(builtin_flags());

        if let Some(error) = validate_spec(&spec).into_iter().next() {
            return Err(error);
        }

        let mut app = App {
            commands: Vec::new(),
        };
        app.insert(spec, None);
        debug!(commands = app.commands.len(), "Built command tree");
        Ok(app)
    }

    fn insert(&mut self, spec: CommandSpec, parent: Option<CommandId>) -> CommandId {
        let id = CommandId(self.commands.len());
        let CommandSpec {
            name,
            help,
            mut flags,
            mut args,
            subcommands,
            action,
        } = spec;

        for flag in &mut flags {
            flag.field.var_name = effective_var_name(&flag.field);
        }
        for arg in &mut args {
            arg.field.var_name = effective_var_name(&arg.field);
        }

        self.commands.push(Command {
            name: name.trim().to_string(),
            help,
            parent,
            children: Vec::new(),
            flags,
            args,
            action,
        });

        for sub in subcommands {
            let child = self.insert(sub, Some(id));
            let name = self.commands[child.0].name.clone();
            self.commands[id.0].children.push((name, child));
        }
        id
    }

    pub fn root(&self) -> CommandId {
        CommandId(0)
    }

    pub fn command(&self, id: CommandId) -> &Command {
        &self.commands[id.0]
    }

    /// Name of the root command.
    pub fn name(&self) -> &str {
        &self.commands[0].name
    }

    pub fn child(&self, id: CommandId, name: &str) -> Option<CommandId> {
        self.command(id).child(name)
    }

    /// Resolves a path of subcommand names starting below the root.
    pub fn find_command<S: AsRef<str>>(&self, path: &[S]) -> Option<CommandId> {
        path.iter()
            .try_fold(self.root(), |id, name| self.child(id, name.as_ref()))
    }

    /// Commands from the root down to `id`, inclusive.
    pub fn ancestry(&self, id: CommandId) -> Vec<CommandId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.command(current).parent {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    /// Subcommand names from below the root down to `id`.
    pub fn command_path(&self, id: CommandId) -> Vec<String> {
        self.ancestry(id)
            .into_iter()
            .skip(1)
            .map(|id| self.command(id).name.clone())
            .collect()
    }

    /// Space-joined names from the root down to `id`, e.g. `"git remote add"`.
    pub fn qualified_name(&self, id: CommandId) -> String {
        self.ancestry(id)
            .into_iter()
            .map(|id| self.command(id).name.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Looks a flag up on `id`, then on its ancestors, nearest first.
    pub fn find_flag(&self, id: CommandId, key: FlagKey<'_>) -> Option<&FlagSpec> {
        let mut current = Some(id);
        while let Some(cmd) = current {
            let command = self.command(cmd);
            if let Some(flag) = command.find_flag(key) {
                return Some(flag);
            }
            current = command.parent;
        }
        None
    }

    /// Every flag usable at `id`: own flags first, then inherited ones,
    /// nearest ancestor first.
    pub fn visible_flags(&self, id: CommandId) -> Vec<&FlagSpec> {
        let mut flags = Vec::new();
        let mut current = Some(id);
        while let Some(cmd) = current {
            let command = self.command(cmd);
            flags.extend(command.flags.iter());
            current = command.parent;
        }
        flags
    }

    /// Flags declared on ancestors of `id`, nearest ancestor first.
    pub fn inherited_flags(&self, id: CommandId) -> Vec<&FlagSpec> {
        match self.command(id).parent {
            Some(parent) => self.visible_flags(parent),
            None => Vec::new(),
        }
    }
}

fn builtin_flags() -> Vec<FlagSpec> {
    vec![
        FlagSpec::boolean(HELP_FLAG)
            .with_short('h')
            .with_help("Show help"),
        FlagSpec::boolean(COMPLETION_SCRIPT_FLAG)
            .hidden()
            .with_help("Print the shell completion script"),
        FlagSpec::boolean(GET_COMPLETIONS_FLAG)
            .hidden()
            .with_help("Print completion suggestions for the given words"),
    ]
}
