//! Working-set behaviour: identity, dynamic columns, bulk edits, snapshots.

use super::*;
use tempfile::tempdir;

fn row(source_id: u64, name: &str, categories: &[&str]) -> CanonicalRow {
    let mut row = CanonicalRow::blank(format!("pokeapi-{source_id}"));
    row.source_id = source_id;
    row.name = name.to_string();
    row.categories = categories.iter().map(|c| c.to_string()).collect();
    row
}

fn starters() -> WorkingSet {
    let set = WorkingSet::new();
    set.append_batch(vec![
        row(1, "Bulbasaur", &["grass", "poison"]),
        row(4, "Charmander", &["fire"]),
        row(7, "Squirtle", &["water"]),
    ]);
    set
}

#[test]
fn test_append_upserts_by_identity() {
    let set = starters();
    let mut again = row(4, "Charmander", &["fire"]);
    again.stats.hp = 39;

    let added = set.append_batch(vec![again]);

    assert_eq!(added, 0, "re-ingesting an id must not add a row");
    assert_eq!(set.len(), 3);
    assert_eq!(set.get("pokeapi-4").unwrap().stats.hp, 39);
}

#[test]
fn test_replace_all_keeps_columns() {
    let set = starters();
    set.declare_column(DynamicColumn::from_label("Nickname", ColumnKind::Text))
        .unwrap();

    set.replace_all(vec![row(25, "Pikachu", &["electric"])]);

    assert_eq!(set.len(), 1);
    assert_eq!(set.columns().len(), 1);
    let pika = set.get("pokeapi-25").unwrap();
    assert_eq!(pika.dynamic.get("nickname"), Some(&FieldValue::text("")));
}

#[test]
fn test_declare_column_backfills_every_row() {
    let set = starters();

    let added = set
        .declare_column(DynamicColumn {
            id: "nickname".to_string(),
            label: "Nickname".to_string(),
            kind: ColumnKind::Text,
        })
        .unwrap();

    assert!(added);
    for r in set.rows() {
        assert_eq!(r.dynamic.get("nickname"), Some(&FieldValue::text("")));
        assert_eq!(r.dynamic.len(), 1);
    }
}

#[test]
fn test_declare_duplicate_column_is_noop() {
    let set = starters();
    set.declare_column(DynamicColumn::from_label("Rating", ColumnKind::Number))
        .unwrap();
    set.update_one(
        "pokeapi-1",
        &Patch::single(Field::Dynamic("rating".into()), FieldValue::Number(5.0)),
    )
    .unwrap();

    let added = set
        .declare_column(DynamicColumn::from_label("rating", ColumnKind::Boolean))
        .unwrap();

    assert!(!added);
    assert_eq!(set.columns().len(), 1);
    assert_eq!(set.columns()[0].kind, ColumnKind::Number);
    assert_eq!(
        set.get("pokeapi-1").unwrap().dynamic.get("rating"),
        Some(&FieldValue::Number(5.0)),
        "existing values must survive a duplicate declaration"
    );
}

#[test]
fn test_declare_column_rejects_builtin_and_empty_ids() {
    let set = starters();

    for label in ["Speed", "HP", "Source Id", "special attack", "   ", ""] {
        let err = set
            .declare_column(DynamicColumn::from_label(label, ColumnKind::Text))
            .unwrap_err();
        assert!(matches!(err, StoreError::ReservedColumn(_)), "{label:?}");
    }

    assert!(set.columns().is_empty());
    assert!(set.rows().iter().all(|r| r.dynamic.is_empty()));
}

#[test]
fn test_snapshot_with_reserved_column_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(
        &path,
        r#"{"version": 1, "columns": [{"id": "speed", "label": "Speed", "kind": "text"}], "rows": []}"#,
    )
    .unwrap();

    let err = WorkingSet::load_snapshot(&path).unwrap_err();
    assert!(matches!(err, StoreError::ReservedColumn(c) if c == "speed"));
}

#[test]
fn test_inserted_rows_conform_to_declared_columns() {
    let set = WorkingSet::new();
    set.declare_column(DynamicColumn::from_label("Shiny", ColumnKind::Boolean))
        .unwrap();

    let mut stray = row(150, "Mewtwo", &["psychic"]);
    stray.dynamic.insert("undeclared".into(), FieldValue::text("x"));
    set.append_batch(vec![stray]);

    let stored = set.get("pokeapi-150").unwrap();
    assert_eq!(stored.dynamic.len(), 1);
    assert_eq!(stored.dynamic.get("shiny"), Some(&FieldValue::Bool(false)));
}

#[test]
fn test_update_many_is_all_or_nothing() {
    let set = starters();
    let patch = Patch::single(Field::Stat(Stat::Hp), FieldValue::Number(100.0));

    let err = set
        .update_many(&["pokeapi-1".to_string(), "missing".to_string()], &patch)
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownRow(id) if id == "missing"));
    assert_eq!(set.get("pokeapi-1").unwrap().stats.hp, 0);

    let err = set
        .update_many(
            &["pokeapi-1".to_string()],
            &Patch::single(Field::Stat(Stat::Hp), FieldValue::text("lots")),
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidPatch { .. }));

    let updated = set
        .update_many(&["pokeapi-1".to_string(), "pokeapi-7".to_string()], &patch)
        .unwrap();
    assert_eq!(updated, 2);
    assert_eq!(set.get("pokeapi-1").unwrap().stats.hp, 100);
    assert_eq!(set.get("pokeapi-4").unwrap().stats.hp, 0);
    assert_eq!(set.get("pokeapi-7").unwrap().stats.hp, 100);
}

#[test]
fn test_id_is_read_only() {
    let set = starters();
    let err = set
        .update_one("pokeapi-1", &Patch::single(Field::Id, FieldValue::text("x")))
        .unwrap_err();
    assert!(matches!(err, StoreError::ReadOnlyField(_)));
}

#[test]
fn test_update_unknown_dynamic_column_fails() {
    let set = starters();
    let err = set
        .update_one(
            "pokeapi-1",
            &Patch::single(Field::Dynamic("mood".into()), FieldValue::text("happy")),
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownColumn(c) if c == "mood"));
}

#[test]
fn test_delete_many_keeps_index_consistent() {
    let set = starters();

    let removed = set.delete_many(&["pokeapi-1".to_string(), "nope".to_string()]);

    assert_eq!(removed, 1);
    assert_eq!(set.len(), 2);
    assert!(set.get("pokeapi-1").is_none());
    // positions shifted; lookups must still land on the right rows
    assert_eq!(set.get("pokeapi-7").unwrap().name, "Squirtle");
    set.update_one(
        "pokeapi-7",
        &Patch::single(Field::Name, FieldValue::text("Wartortle")),
    )
    .unwrap();
    assert_eq!(set.get("pokeapi-7").unwrap().name, "Wartortle");
    assert_eq!(set.get("pokeapi-4").unwrap().name, "Charmander");
}

#[test]
fn test_transaction_reads_and_writes_under_one_lock() {
    let set = starters();

    let removed = set.transaction(|tx| {
        let ids: Vec<String> = tx
            .rows()
            .iter()
            .filter(|r| r.categories.iter().any(|c| c == "fire"))
            .map(|r| r.id.clone())
            .collect();
        tx.delete_many(&ids)
    });

    assert_eq!(removed, 1);
    assert_eq!(set.len(), 2);
}

#[test]
fn test_snapshot_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("set.json");

    let set = starters();
    set.declare_column(DynamicColumn::from_label("Nickname", ColumnKind::Text))
        .unwrap();
    set.update_one(
        "pokeapi-4",
        &Patch::single(Field::Dynamic("nickname".into()), FieldValue::text("Char")),
    )
    .unwrap();
    set.save_snapshot(&path).unwrap();

    let loaded = WorkingSet::load_snapshot(&path).unwrap();
    assert_eq!(loaded.rows(), set.rows());
    assert_eq!(loaded.columns(), set.columns());
}

#[test]
fn test_missing_snapshot_is_empty() {
    let dir = tempdir().unwrap();
    let loaded = WorkingSet::load_snapshot(&dir.path().join("absent.json")).unwrap();
    assert!(loaded.is_empty());
}

#[test]
fn test_snapshot_version_mismatch_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("old.json");
    std::fs::write(&path, r#"{"version": 0, "columns": [], "rows": []}"#).unwrap();

    let err = WorkingSet::load_snapshot(&path).unwrap_err();
    assert!(matches!(err, StoreError::Snapshot(_)));
}
