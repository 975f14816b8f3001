//! Raw catalog record → canonical row.
//!
//! Pure: the classification is resolved by the caller through the lookup
//! cache before this runs.

use dexlab_store::{BaseStats, CanonicalRow, Stat};
use std::collections::BTreeMap;

use crate::source::RawSourceRecord;

/// Prefix for ids of ingested rows.
pub const ID_PREFIX: &str = "pokeapi";

/// Stable row id for a catalog record; the same record always maps to the
/// same id, so re-ingestion overwrites instead of duplicating.
pub fn row_id(source_id: u64) -> String {
    format!("{ID_PREFIX}-{source_id}")
}

pub fn normalize(raw: &RawSourceRecord, classification: u32) -> CanonicalRow {
    let mut stats = BaseStats::default();
    for stat in Stat::ALL {
        stats.set(stat, stat_value(raw, stat));
    }

    CanonicalRow {
        id: row_id(raw.id),
        source_id: raw.id,
        name: capitalize_first(&raw.name),
        image: raw.sprites.front_default.clone(),
        categories: raw.types.iter().map(|t| t.kind.name.clone()).collect(),
        classification,
        capabilities: raw.abilities.iter().map(|a| a.ability.name.clone()).collect(),
        stats,
        dynamic: BTreeMap::new(),
    }
}

fn stat_value(raw: &RawSourceRecord, stat: Stat) -> u32 {
    raw.stats
        .iter()
        .find(|s| s.stat.name == stat.source_name())
        .map(|s| s.base_stat)
        .unwrap_or(0)
}

fn capitalize_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
