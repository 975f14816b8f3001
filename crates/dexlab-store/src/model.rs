//! Canonical row shape and the typed values that flow through patches,
//! filters and exports.
//!
//! A row is a fixed struct for the fields every record has, plus a side map
//! (`dynamic`) for user-declared columns keyed by column id.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::StoreError;

// ============================================================================
// Field values
// ============================================================================

/// A loosely-typed value as it appears in a command, a patch or a CSV cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    /// String form used for case-insensitive comparison and display.
    ///
    /// Whole numbers print without a fractional part, so `100.0` and the
    /// command token `100` compare equal.
    pub fn display_string(&self) -> String {
        match self {
            FieldValue::Null => "null".to_string(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Number(n) => format_number(*n),
            FieldValue::Text(s) => s.clone(),
            FieldValue::List(items) => items.join(","),
        }
    }

    /// Case-insensitive equality on the display form. Lists match when any
    /// element equals `needle`.
    pub fn matches_ignore_case(&self, needle: &FieldValue) -> bool {
        let needle = needle.display_string().to_lowercase();
        match self {
            FieldValue::List(items) => items.iter().any(|item| item.to_lowercase() == needle),
            other => other.display_string().to_lowercase() == needle,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

// ============================================================================
// Fields
// ============================================================================

/// The six editable base statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stat {
    Hp,
    Attack,
    Defense,
    SpecialAttack,
    SpecialDefense,
    Speed,
}

impl Stat {
    pub const ALL: [Stat; 6] = [
        Stat::Hp,
        Stat::Attack,
        Stat::Defense,
        Stat::SpecialAttack,
        Stat::SpecialDefense,
        Stat::Speed,
    ];

    /// Canonical (camelCase) key.
    pub fn key(self) -> &'static str {
        match self {
            Stat::Hp => "hp",
            Stat::Attack => "attack",
            Stat::Defense => "defense",
            Stat::SpecialAttack => "specialAttack",
            Stat::SpecialDefense => "specialDefense",
            Stat::Speed => "speed",
        }
    }

    /// Name the remote catalog uses in its stat list.
    pub fn source_name(self) -> &'static str {
        match self {
            Stat::Hp => "hp",
            Stat::Attack => "attack",
            Stat::Defense => "defense",
            Stat::SpecialAttack => "special-attack",
            Stat::SpecialDefense => "special-defense",
            Stat::Speed => "speed",
        }
    }

    /// Human label, also accepted as a CSV header.
    pub fn label(self) -> &'static str {
        match self {
            Stat::Hp => "HP",
            Stat::Attack => "Attack",
            Stat::Defense => "Defense",
            Stat::SpecialAttack => "Sp. Atk",
            Stat::SpecialDefense => "Sp. Def",
            Stat::Speed => "Speed",
        }
    }
}

/// A field of a canonical row, fixed or dynamic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Id,
    SourceId,
    Name,
    Image,
    Categories,
    Classification,
    Capabilities,
    Stat(Stat),
    Dynamic(String),
}

impl Field {
    /// Fixed fields in export order.
    pub const FIXED: [Field; 13] = [
        Field::Id,
        Field::SourceId,
        Field::Name,
        Field::Image,
        Field::Categories,
        Field::Classification,
        Field::Capabilities,
        Field::Stat(Stat::Hp),
        Field::Stat(Stat::Attack),
        Field::Stat(Stat::Defense),
        Field::Stat(Stat::SpecialAttack),
        Field::Stat(Stat::SpecialDefense),
        Field::Stat(Stat::Speed),
    ];

    /// Resolve a field key. Canonical keys match ignoring ASCII case;
    /// anything else names a dynamic column.
    pub fn parse(key: &str) -> Field {
        let key = key.trim();
        Field::FIXED
            .iter()
            .find(|f| f.key().eq_ignore_ascii_case(key))
            .cloned()
            .unwrap_or_else(|| Field::Dynamic(key.to_string()))
    }

    pub fn key(&self) -> &str {
        match self {
            Field::Id => "id",
            Field::SourceId => "sourceId",
            Field::Name => "name",
            Field::Image => "image",
            Field::Categories => "categories",
            Field::Classification => "classification",
            Field::Capabilities => "capabilities",
            Field::Stat(stat) => stat.key(),
            Field::Dynamic(id) => id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Field::Id => "ID",
            Field::SourceId => "Source ID",
            Field::Name => "Name",
            Field::Image => "Image",
            Field::Categories => "Types",
            Field::Classification => "Generation",
            Field::Capabilities => "Abilities",
            Field::Stat(stat) => stat.label(),
            Field::Dynamic(id) => id,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ============================================================================
// Dynamic columns
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Number,
    Boolean,
}

impl ColumnKind {
    pub fn default_value(self) -> FieldValue {
        match self {
            ColumnKind::Text => FieldValue::Text(String::new()),
            ColumnKind::Number => FieldValue::Number(0.0),
            ColumnKind::Boolean => FieldValue::Bool(false),
        }
    }

    /// Parse a raw cell for this column; unparsable input becomes the default.
    pub fn parse_cell(self, raw: &str) -> FieldValue {
        let raw = raw.trim();
        match self {
            ColumnKind::Text => FieldValue::Text(raw.to_string()),
            ColumnKind::Number => raw
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(FieldValue::Number)
                .unwrap_or_else(|| self.default_value()),
            ColumnKind::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" => FieldValue::Bool(true),
                _ => FieldValue::Bool(false),
            },
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColumnKind::Text => "text",
            ColumnKind::Number => "number",
            ColumnKind::Boolean => "boolean",
        })
    }
}

/// A user-declared extra column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicColumn {
    pub id: String,
    pub label: String,
    pub kind: ColumnKind,
}

impl DynamicColumn {
    /// Declare a column from its label; the id is the label lower-cased with
    /// whitespace runs replaced by `_`.
    pub fn from_label(label: &str, kind: ColumnKind) -> Self {
        Self {
            id: column_id_from_label(label),
            label: label.trim().to_string(),
            kind,
        }
    }

    /// True when the id is empty or would collide with a built-in field.
    /// Underscores are ignored so `special_attack` counts as `specialAttack`.
    pub fn is_reserved(&self) -> bool {
        let folded = self.id.replace('_', "");
        folded.trim().is_empty()
            || Field::FIXED
                .iter()
                .any(|field| field.key().eq_ignore_ascii_case(&folded))
    }
}

pub fn column_id_from_label(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseStats {
    pub hp: u32,
    pub attack: u32,
    pub defense: u32,
    pub special_attack: u32,
    pub special_defense: u32,
    pub speed: u32,
}

impl BaseStats {
    pub fn get(&self, stat: Stat) -> u32 {
        match stat {
            Stat::Hp => self.hp,
            Stat::Attack => self.attack,
            Stat::Defense => self.defense,
            Stat::SpecialAttack => self.special_attack,
            Stat::SpecialDefense => self.special_defense,
            Stat::Speed => self.speed,
        }
    }

    pub fn set(&mut self, stat: Stat, value: u32) {
        let slot = match stat {
            Stat::Hp => &mut self.hp,
            Stat::Attack => &mut self.attack,
            Stat::Defense => &mut self.defense,
            Stat::SpecialAttack => &mut self.special_attack,
            Stat::SpecialDefense => &mut self.special_defense,
            Stat::Speed => &mut self.speed,
        };
        *slot = value;
    }
}

/// One record of the working set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRow {
    pub id: String,
    pub source_id: u64,
    pub name: String,
    pub image: Option<String>,
    pub categories: Vec<String>,
    pub classification: u32,
    pub capabilities: Vec<String>,
    #[serde(flatten)]
    pub stats: BaseStats,
    #[serde(default)]
    pub dynamic: BTreeMap<String, FieldValue>,
}

impl CanonicalRow {
    /// A row with every field at its empty default, as used by imports.
    pub fn blank(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_id: 0,
            name: "Unknown".to_string(),
            image: None,
            categories: Vec::new(),
            classification: 1,
            capabilities: Vec::new(),
            stats: BaseStats::default(),
            dynamic: BTreeMap::new(),
        }
    }

    /// Read a field. Returns `None` only for dynamic fields the row lacks.
    pub fn get(&self, field: &Field) -> Option<FieldValue> {
        let value = match field {
            Field::Id => FieldValue::Text(self.id.clone()),
            Field::SourceId => FieldValue::Number(self.source_id as f64),
            Field::Name => FieldValue::Text(self.name.clone()),
            Field::Image => self
                .image
                .clone()
                .map(FieldValue::Text)
                .unwrap_or(FieldValue::Null),
            Field::Categories => FieldValue::List(self.categories.clone()),
            Field::Classification => FieldValue::Number(self.classification as f64),
            Field::Capabilities => FieldValue::List(self.capabilities.clone()),
            Field::Stat(stat) => FieldValue::Number(self.stats.get(*stat) as f64),
            Field::Dynamic(id) => return self.dynamic.get(id).cloned(),
        };
        Some(value)
    }

    pub(crate) fn assign(&mut self, assignment: &Assignment) {
        match assignment {
            Assignment::SourceId(v) => self.source_id = *v,
            Assignment::Name(v) => self.name = v.clone(),
            Assignment::Image(v) => self.image = v.clone(),
            Assignment::Categories(v) => self.categories = v.clone(),
            Assignment::Classification(v) => self.classification = *v,
            Assignment::Capabilities(v) => self.capabilities = v.clone(),
            Assignment::Stat(stat, v) => self.stats.set(*stat, *v),
            Assignment::Dynamic(id, v) => {
                self.dynamic.insert(id.clone(), v.clone());
            }
        }
    }
}

// ============================================================================
// Patches
// ============================================================================

/// A set of field assignments applied to one or more rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    fields: Vec<(Field, FieldValue)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: Field, value: FieldValue) -> Self {
        Self::new().set(field, value)
    }

    pub fn set(mut self, field: Field, value: FieldValue) -> Self {
        self.fields.retain(|(f, _)| f != &field);
        self.fields.push((field, value));
        self
    }

    /// Type-check every assignment against the fixed schema and the declared
    /// columns. Nothing is applied unless every assignment is valid.
    pub(crate) fn resolve(&self, columns: &[DynamicColumn]) -> Result<Vec<Assignment>, StoreError> {
        self.fields
            .iter()
            .map(|(field, value)| Assignment::resolve(field, value, columns))
            .collect()
    }
}

/// A validated, typed assignment to one field.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Assignment {
    SourceId(u64),
    Name(String),
    Image(Option<String>),
    Categories(Vec<String>),
    Classification(u32),
    Capabilities(Vec<String>),
    Stat(Stat, u32),
    Dynamic(String, FieldValue),
}

impl Assignment {
    fn resolve(
        field: &Field,
        value: &FieldValue,
        columns: &[DynamicColumn],
    ) -> Result<Self, StoreError> {
        let invalid = |expected: &str| StoreError::InvalidPatch {
            field: field.key().to_string(),
            value: value.display_string(),
            expected: expected.to_string(),
        };

        match field {
            Field::Id => Err(StoreError::ReadOnlyField(field.key().to_string())),
            Field::SourceId => whole_number(value, u64::MAX as f64)
                .map(|n| Assignment::SourceId(n as u64))
                .ok_or_else(|| invalid("a non-negative whole number")),
            Field::Classification => whole_number(value, u32::MAX as f64)
                .map(|n| Assignment::Classification(n as u32))
                .ok_or_else(|| invalid("a non-negative whole number")),
            Field::Stat(stat) => whole_number(value, u32::MAX as f64)
                .map(|n| Assignment::Stat(*stat, n as u32))
                .ok_or_else(|| invalid("a non-negative whole number")),
            Field::Name => match value {
                FieldValue::Text(_) | FieldValue::Number(_) | FieldValue::Bool(_) => {
                    Ok(Assignment::Name(value.display_string()))
                }
                _ => Err(invalid("text")),
            },
            Field::Image => match value {
                FieldValue::Null => Ok(Assignment::Image(None)),
                FieldValue::Text(s) => Ok(Assignment::Image(Some(s.clone()))),
                _ => Err(invalid("text or null")),
            },
            Field::Categories => to_list(value)
                .map(Assignment::Categories)
                .ok_or_else(|| invalid("a list of names")),
            Field::Capabilities => to_list(value)
                .map(Assignment::Capabilities)
                .ok_or_else(|| invalid("a list of names")),
            Field::Dynamic(id) => {
                let column = columns
                    .iter()
                    .find(|c| &c.id == id)
                    .ok_or_else(|| StoreError::UnknownColumn(id.clone()))?;
                let coerced = match (column.kind, value) {
                    (ColumnKind::Number, FieldValue::Number(n)) => FieldValue::Number(*n),
                    (ColumnKind::Boolean, FieldValue::Bool(b)) => FieldValue::Bool(*b),
                    (
                        ColumnKind::Text,
                        FieldValue::Text(_) | FieldValue::Number(_) | FieldValue::Bool(_),
                    ) => FieldValue::Text(value.display_string()),
                    (kind, _) => return Err(invalid(&kind.to_string())),
                };
                Ok(Assignment::Dynamic(id.clone(), coerced))
            }
        }
    }
}

fn whole_number(value: &FieldValue, max: f64) -> Option<f64> {
    match value {
        FieldValue::Number(n) if n.is_finite() && *n >= 0.0 && n.fract() == 0.0 && *n <= max => {
            Some(*n)
        }
        _ => None,
    }
}

/// Lists accept a list value or a single comma-separated text value.
fn to_list(value: &FieldValue) -> Option<Vec<String>> {
    match value {
        FieldValue::List(items) => Some(items.clone()),
        FieldValue::Text(s) => Some(split_list(s)),
        _ => None,
    }
}

/// Split a `|`- or `,`-separated cell into trimmed, non-empty items.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(|c| c == '|' || c == ',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
