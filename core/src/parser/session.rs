use std::collections::BTreeMap;

use crate::schema::CommandId;
use crate::types::{FieldSpec, RawValue};

use super::{ParseError, Results};

/// Whether flag markers are still recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    #[default]
    ParsingFlags,
    /// Entered after a literal `--`; every later token is positional.
    PositionalOnly,
}

/// Raw strings captured by the structural pass, keyed by `var_name`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidates {
    pub flags: BTreeMap<String, RawValue>,
    pub args: BTreeMap<String, RawValue>,
}

/// Adds `value` for `field`. Repeated fields append; a second value for a
/// single field is rejected and the first one kept.
pub(crate) fn push_candidate(
    slot: &mut BTreeMap<String, RawValue>,
    field: &FieldSpec,
    value: String,
) -> Result<(), String> {
    if !field.repeated {
        if slot.contains_key(&field.var_name) {
            return Err(value);
        }
        slot.insert(field.var_name.clone(), RawValue::Single(value));
        return Ok(());
    }

    let entry = slot
        .entry(field.var_name.clone())
        .or_insert_with(|| RawValue::Many(Vec::new()));
    match entry {
        RawValue::Many(values) => values.push(value),
        RawValue::Single(first) => {
            let first = std::mem::take(first);
            *entry = RawValue::Many(vec![first, value]);
        }
    }
    Ok(())
}

/// State owned by one parse call.
#[derive(Debug)]
pub(crate) struct ParseSession {
    /// Remaining tokens, reversed so the next one is at the end.
    remaining: Vec<String>,
    pub candidates: Candidates,
    pub mode: ParseMode,
    /// Cursor into the selected command's positional args.
    pub positional_index: usize,
    pub results: Results,
}

impl ParseSession {
    pub fn new(binary_name: String, mut tokens: Vec<String>, root: CommandId) -> Self {
        tokens.reverse();
        Self {
            remaining: tokens,
            candidates: Candidates::default(),
            mode: ParseMode::default(),
            positional_index: 0,
            results: Results::new(binary_name, root),
        }
    }

    pub fn next_token(&mut self) -> Option<String> {
        self.remaining.pop()
    }

    pub fn error(&mut self, error: ParseError) {
        self.results.errors.push(error);
    }

    pub fn into_results(self) -> Results {
        self.results
    }
}
