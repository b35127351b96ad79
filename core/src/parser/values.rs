//! The value pass: coerces candidates into typed results.
//!
//! Order is part of the contract: flags of each command from the root down
//! to the selected command, each in declaration order, then the selected
//! command's positional args. Custom parsers can rely on earlier fields
//! already being present in their [`ParseContext`].

use std::collections::BTreeMap;

use tracing::debug;

use crate::coerce::{ParseContext, coerce_field};
use crate::schema::App;
use crate::types::{FieldSpec, RawValue, Value};

use super::session::ParseSession;
use super::{Env, ParseError};

#[derive(Clone, Copy)]
enum Slot {
    Flag,
    Arg,
}

pub(crate) async fn run(app: &App, session: &mut ParseSession, env: &Env) {
    let selected = session.results.command;

    for id in app.ancestry(selected) {
        for flag in &app.command(id).flags {
            coerce_into(&flag.field, flag.long_form(), Slot::Flag, session, env).await;
        }
    }
    for arg in &app.command(selected).args {
        coerce_into(&arg.field, arg.usage(), Slot::Arg, session, env).await;
    }
}

fn candidates(session: &ParseSession, slot: Slot) -> &BTreeMap<String, RawValue> {
    match slot {
        Slot::Flag => &session.candidates.flags,
        Slot::Arg => &session.candidates.args,
    }
}

async fn coerce_into(
    field: &FieldSpec,
    display: String,
    slot: Slot,
    session: &mut ParseSession,
    env: &Env,
) {
    let Some(raw) = candidates(session, slot).get(&field.var_name).cloned() else {
        if field.required {
            session.error(ParseError::MissingRequired { field: display });
        }
        return;
    };

    let mut values = Vec::new();
    let mut failed = false;
    for item in raw.iter() {
        let outcome = {
            let ctx = ParseContext {
                flags: &session.results.flags,
                args: &session.results.args,
                env,
                field: &field.var_name,
            };
            coerce_field(field, item, &ctx).await
        };
        match outcome {
            Ok(value) => values.push(value),
            Err(source) => {
                failed = true;
                session.error(ParseError::InvalidValue {
                    field: display.clone(),
                    source,
                });
            }
        }
    }

    if failed {
        debug!(field = %field.var_name, "Coercion failed, field left unset");
        return;
    }

    let value = match raw {
        RawValue::Many(_) => Value::List(values),
        RawValue::Single(_) => match values.pop() {
            Some(value) => value,
            None => return,
        },
    };
    let target = match slot {
        Slot::Flag => &mut session.results.flags,
        Slot::Arg => &mut session.results.args,
    };
    target.insert(field.var_name.clone(), value);
}
