//! Sentence grammar for bulk edits.
//!
//! Input is lower-cased and trimmed, then tried against an ordered list of
//! rules; the first rule whose pattern matches decides the outcome. A rule
//! that matches but whose condition is malformed yields `Unrecognized`
//! instead of falling through to a later rule.
//!
//! | # | shape                                                            |
//! |---|------------------------------------------------------------------|
//! | 1 | `set\|update <field> to <value> for all <plural> of type <type>` |
//! | 2 | `set\|update <field> to <value> where <field2> is <value2>`      |
//! | 3 | `delete [rows] where <field> is <value>`                         |

use dexlab_store::{column_id_from_label, Field, FieldValue, Stat};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedCommand {
    Update {
        target_field: Field,
        new_value: FieldValue,
        filter_field: Field,
        filter_value: FieldValue,
    },
    Delete {
        filter_field: Field,
        filter_value: FieldValue,
    },
    Unrecognized,
}

impl fmt::Display for ParsedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParsedCommand::Update {
                target_field,
                new_value,
                filter_field,
                filter_value,
            } => write!(
                f,
                "update {target_field} = {new_value} where {filter_field} is {filter_value}"
            ),
            ParsedCommand::Delete {
                filter_field,
                filter_value,
            } => write!(f, "delete where {filter_field} is {filter_value}"),
            ParsedCommand::Unrecognized => f.write_str("unrecognized"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleKind {
    UpdateByType,
    UpdateWhere,
    DeleteWhere,
}

#[derive(Debug)]
struct GrammarRule {
    name: &'static str,
    kind: RuleKind,
    regex: Regex,
}

fn rules() -> &'static [GrammarRule] {
    static RULES: OnceLock<Vec<GrammarRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        [
            (
                "update_by_type",
                RuleKind::UpdateByType,
                r"^(?:set|update)\s+(.+?)\s+to\s+(.+?)\s+for\s+all\s+\S+\s+of\s+type\s+(.+)$",
            ),
            (
                "update_where",
                RuleKind::UpdateWhere,
                r"^(?:set|update)\s+(.+?)\s+to\s+(.+?)\s+where\s+(.+)$",
            ),
            (
                "delete_where",
                RuleKind::DeleteWhere,
                r"^delete\s+(?:rows\s+)?where\s+(.+)$",
            ),
        ]
        .into_iter()
        .map(|(name, kind, pattern)| GrammarRule {
            name,
            kind,
            regex: Regex::new(pattern).unwrap(),
        })
        .collect()
    })
}

fn condition_separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"\s+is\s+").unwrap())
}

/// Parse one command sentence. Never fails; unparseable text is
/// [`ParsedCommand::Unrecognized`].
pub fn parse(text: &str) -> ParsedCommand {
    let lower = text.trim().to_lowercase();

    for rule in rules() {
        let Some(caps) = rule.regex.captures(&lower) else {
            continue;
        };
        let group = |i: usize| caps.get(i).map(|m| m.as_str().trim()).unwrap_or_default();

        let parsed = match rule.kind {
            RuleKind::UpdateByType => ParsedCommand::Update {
                target_field: map_field(group(1)),
                new_value: parse_value(group(2)),
                filter_field: Field::Categories,
                filter_value: parse_value(group(3)),
            },
            RuleKind::UpdateWhere => match split_condition(group(3)) {
                Some((filter_field, filter_value)) => ParsedCommand::Update {
                    target_field: map_field(group(1)),
                    new_value: parse_value(group(2)),
                    filter_field,
                    filter_value,
                },
                None => ParsedCommand::Unrecognized,
            },
            RuleKind::DeleteWhere => match split_condition(group(1)) {
                Some((filter_field, filter_value)) => ParsedCommand::Delete {
                    filter_field,
                    filter_value,
                },
                None => ParsedCommand::Unrecognized,
            },
        };
        tracing::debug!(rule = rule.name, command = %parsed, "parsed command");
        return parsed;
    }

    ParsedCommand::Unrecognized
}

/// `<field> is <value>`, split on exactly one `is`.
fn split_condition(condition: &str) -> Option<(Field, FieldValue)> {
    let parts: Vec<&str> = condition_separator().split(condition).collect();
    match parts.as_slice() {
        [field, value] if !field.trim().is_empty() && !value.trim().is_empty() => {
            Some((map_field(field), parse_value(value)))
        }
        _ => None,
    }
}

/// Resolve a field token through the synonym table. Tokens with no synonym
/// go through [`Field::parse`], so canonical keys work; anything else is
/// read as a dynamic column label (`fan favorite` → `fan_favorite`).
pub fn map_field(token: &str) -> Field {
    let token = token.trim().to_lowercase();
    match token.as_str() {
        "hp" => Field::Stat(Stat::Hp),
        "attack" => Field::Stat(Stat::Attack),
        "defense" => Field::Stat(Stat::Defense),
        "sp. atk" | "special attack" => Field::Stat(Stat::SpecialAttack),
        "sp. def" | "special defense" => Field::Stat(Stat::SpecialDefense),
        "speed" => Field::Stat(Stat::Speed),
        "gen" | "generation" => Field::Classification,
        "name" => Field::Name,
        "type" | "types" => Field::Categories,
        "ability" | "abilities" => Field::Capabilities,
        "image" | "sprite" => Field::Image,
        "id" => Field::Id,
        other => match Field::parse(other) {
            Field::Dynamic(label) => Field::Dynamic(column_id_from_label(&label)),
            fixed => fixed,
        },
    }
}

/// Coerce a value token: a full finite number, then `true`/`false`, else text.
pub fn parse_value(token: &str) -> FieldValue {
    let token = token.trim();
    if let Ok(n) = token.parse::<f64>() {
        if n.is_finite() {
            return FieldValue::Number(n);
        }
    }
    match token {
        "true" => FieldValue::Bool(true),
        "false" => FieldValue::Bool(false),
        _ => FieldValue::text(token),
    }
}
