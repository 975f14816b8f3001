//! Query matcher and bulk executor.

use dexlab_store::{CanonicalRow, Field, FieldValue, Patch, WorkingSet};

use crate::parser::{parse, ParsedCommand};

pub const UNRECOGNIZED_MESSAGE: &str = "Could not understand command.";

/// What the user sees after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
    /// Rows changed or removed. Zero whenever `success` is false.
    pub affected: usize,
}

impl CommandOutcome {
    fn ok(affected: usize, message: String) -> Self {
        Self {
            success: true,
            message,
            affected,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            affected: 0,
        }
    }
}

/// Ids of rows whose `field` equals `value`, ignoring case. List fields
/// match when any element does; rows lacking the field never match.
pub fn matching_ids(rows: &[CanonicalRow], field: &Field, value: &FieldValue) -> Vec<String> {
    rows.iter()
        .filter(|row| {
            row.get(field)
                .is_some_and(|current| current.matches_ignore_case(value))
        })
        .map(|row| row.id.clone())
        .collect()
}

/// Execute a parsed command against the working set.
///
/// Matching and mutation happen under one write lock, so no other writer
/// can change the set between computing the matches and applying the edit.
pub fn execute(command: &ParsedCommand, set: &WorkingSet) -> CommandOutcome {
    let (filter_field, filter_value) = match command {
        ParsedCommand::Update {
            filter_field,
            filter_value,
            ..
        }
        | ParsedCommand::Delete {
            filter_field,
            filter_value,
        } => (filter_field, filter_value),
        ParsedCommand::Unrecognized => return CommandOutcome::failed(UNRECOGNIZED_MESSAGE),
    };

    let outcome = set.transaction(|tx| {
        let ids = matching_ids(tx.rows(), filter_field, filter_value);
        if ids.is_empty() {
            return CommandOutcome::failed(format!(
                "No rows found where {filter_field} is {filter_value}"
            ));
        }

        match command {
            ParsedCommand::Update {
                target_field,
                new_value,
                ..
            } => {
                let patch = Patch::single(target_field.clone(), new_value.clone());
                match tx.update_many(&ids, &patch) {
                    Ok(n) => CommandOutcome::ok(n, format!("Updated {n} rows.")),
                    Err(err) => CommandOutcome::failed(format!("Update rejected: {err}.")),
                }
            }
            ParsedCommand::Delete { .. } => {
                let n = tx.delete_many(&ids);
                CommandOutcome::ok(n, format!("Deleted {n} rows."))
            }
            ParsedCommand::Unrecognized => CommandOutcome::failed(UNRECOGNIZED_MESSAGE),
        }
    });

    if outcome.success {
        tracing::info!(command = %command, affected = outcome.affected, "command applied");
    } else {
        tracing::debug!(command = %command, message = %outcome.message, "command not applied");
    }
    outcome
}

/// Parse and execute in one step.
pub fn run(text: &str, set: &WorkingSet) -> CommandOutcome {
    execute(&parse(text), set)
}
