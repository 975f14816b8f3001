//! CSV import and export.
//!
//! Import takes arbitrary headers plus a field → header mapping. Anything the
//! mapping does not cover (or a cell that does not parse) falls back to the
//! blank-row default instead of failing the import. Every imported row gets a
//! fresh UUID.
//!
//! Export writes the fixed fields by canonical key, then the dynamic columns in
//! declaration order, so an exported file re-imports with [`ColumnMapping::auto`].

use std::collections::BTreeMap;
use std::io::{Read, Write};

use uuid::Uuid;

use crate::model::{split_list, CanonicalRow, DynamicColumn, Field, FieldValue};

#[derive(Debug, thiserror::Error)]
pub enum TabularError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid column mapping `{0}` (expected field=Header)")]
    Mapping(String),
}

/// Which CSV header feeds which field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMapping {
    fields: BTreeMap<Field, String>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Guess a mapping by matching each header against field labels and keys,
    /// ignoring case.
    pub fn auto(headers: &[String]) -> Self {
        let mut mapping = Self::new();
        for field in Field::FIXED.iter().filter(|f| **f != Field::Id) {
            let hit = headers.iter().find(|h| {
                let h = h.trim();
                h.eq_ignore_ascii_case(field.label()) || h.eq_ignore_ascii_case(field.key())
            });
            if let Some(header) = hit {
                mapping.fields.insert(field.clone(), header.clone());
            }
        }
        mapping
    }

    pub fn with(mut self, field: Field, header: impl Into<String>) -> Self {
        self.fields.insert(field, header.into());
        self
    }

    /// Parse a `field=Header` pair as given on the command line.
    pub fn parse_pair(pair: &str) -> Result<(Field, String), TabularError> {
        let (field, header) = pair
            .split_once('=')
            .ok_or_else(|| TabularError::Mapping(pair.to_string()))?;
        let (field, header) = (field.trim(), header.trim());
        if field.is_empty() || header.is_empty() {
            return Err(TabularError::Mapping(pair.to_string()));
        }
        Ok((Field::parse(field), header.to_string()))
    }

    pub fn header_for(&self, field: &Field) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Read the header row only, for building a mapping before the import.
pub fn read_headers<R: Read>(reader: R) -> Result<Vec<String>, TabularError> {
    let mut csv = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    Ok(csv.headers()?.iter().map(str::to_string).collect())
}

/// Import rows from CSV. Dynamic columns not named in the mapping are filled
/// from a header equal to the column id or label, when present.
pub fn import_csv<R: Read>(
    reader: R,
    mapping: &ColumnMapping,
    columns: &[DynamicColumn],
) -> Result<Vec<CanonicalRow>, TabularError> {
    let mut csv = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers: Vec<String> = csv.headers()?.iter().map(str::to_string).collect();
    let position = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

    let mut plan: Vec<(Field, usize)> = Vec::new();
    for (field, header) in &mapping.fields {
        match (field, position(header)) {
            (Field::Id, _) => {}
            (Field::Dynamic(id), _) if !columns.iter().any(|c| &c.id == id) => {
                tracing::warn!(column = %id, "mapping names an undeclared column; skipped");
            }
            (_, Some(idx)) => plan.push((field.clone(), idx)),
            (_, None) => {
                tracing::warn!(field = %field, header = %header, "mapped header not found");
            }
        }
    }
    for column in columns {
        let field = Field::Dynamic(column.id.clone());
        if mapping.fields.contains_key(&field) {
            continue;
        }
        if let Some(idx) = position(&column.id).or_else(|| position(&column.label)) {
            plan.push((field, idx));
        }
    }

    let mut rows = Vec::new();
    for record in csv.records() {
        let record = record?;
        let mut row = CanonicalRow::blank(Uuid::new_v4().to_string());
        for (field, idx) in &plan {
            if let Some(cell) = record.get(*idx) {
                apply_cell(&mut row, field, cell, columns);
            }
        }
        rows.push(row);
    }

    tracing::info!(rows = rows.len(), mapped = plan.len(), "CSV import parsed");
    Ok(rows)
}

fn apply_cell(row: &mut CanonicalRow, field: &Field, cell: &str, columns: &[DynamicColumn]) {
    let cell = cell.trim();
    if cell.is_empty() {
        return;
    }
    match field {
        Field::Id => {}
        Field::SourceId => row.source_id = parse_source_id(cell),
        Field::Name => row.name = cell.to_string(),
        Field::Image => row.image = Some(cell.to_string()),
        Field::Categories => row.categories = split_list(cell),
        Field::Classification => row.classification = parse_count(cell),
        Field::Capabilities => row.capabilities = split_list(cell),
        Field::Stat(stat) => row.stats.set(*stat, parse_count(cell)),
        Field::Dynamic(id) => {
            if let Some(column) = columns.iter().find(|c| &c.id == id) {
                row.dynamic.insert(id.clone(), column.kind.parse_cell(cell));
            }
        }
    }
}

/// Non-negative whole number, or 0 for anything else.
fn parse_count(cell: &str) -> u32 {
    match cell.parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 && n <= u32::MAX as f64 => n.trunc() as u32,
        _ => 0,
    }
}

/// Like [`parse_count`] but over the full `u64` range.
fn parse_source_id(cell: &str) -> u64 {
    cell.parse::<u64>().unwrap_or_else(|_| match cell.parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 && n < u64::MAX as f64 => n.trunc() as u64,
        _ => 0,
    })
}

/// Write every row with fixed fields first, then dynamic columns.
pub fn export_csv<W: Write>(
    rows: &[CanonicalRow],
    columns: &[DynamicColumn],
    writer: W,
) -> Result<(), TabularError> {
    let mut csv = csv::Writer::from_writer(writer);

    let fields: Vec<Field> = Field::FIXED
        .iter()
        .cloned()
        .chain(columns.iter().map(|c| Field::Dynamic(c.id.clone())))
        .collect();
    csv.write_record(fields.iter().map(Field::key))?;

    for row in rows {
        let cells = fields.iter().map(|field| match row.get(field) {
            Some(FieldValue::List(items)) => items.join("|"),
            Some(FieldValue::Null) | None => String::new(),
            Some(value) => value.display_string(),
        });
        csv.write_record(cells)?;
    }
    csv.flush()?;
    Ok(())
}
