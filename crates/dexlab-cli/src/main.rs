//! Dexlab CLI
//!
//! Command-line interface for:
//! - Fetching the remote catalog into a local working set
//! - Running bulk-edit commands (`set hp to 100 where types is fire`)
//! - Importing and exporting CSV
//! - Declaring dynamic columns
//!
//! The working set lives in a JSON snapshot between invocations.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use dexlab_store::tabular::{self, ColumnMapping};
use dexlab_store::{ColumnKind, DynamicColumn, Field, StoreConfig, WorkingSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

mod fetch;
mod logging;
mod repl;

#[derive(Parser)]
#[command(name = "dexlab")]
#[command(
    author,
    version,
    about = "Dexlab: pull a catalog into a working set and bulk-edit it with short commands"
)]
struct Cli {
    /// Working-set snapshot file (default: ./dexlab.json)
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace the working set with a fresh catalog ingestion.
    Fetch {
        /// Catalog API root (default: DEXLAB_BASE_URL or PokeAPI)
        #[arg(long)]
        base_url: Option<String>,
        /// Detail requests issued concurrently per batch
        #[arg(long)]
        batch_size: Option<usize>,
        /// Index size requested from the catalog
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Run one command, e.g. `dexlab run set hp to 100 where types is fire`.
    Run {
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        words: Vec<String>,
    },

    /// Interactive command shell.
    Repl,

    /// Replace the working set with rows from a CSV file.
    Import {
        input: PathBuf,
        /// Explicit mapping `field=Header`; repeatable. Unmapped fields are
        /// matched to headers by name.
        #[arg(long = "map", value_name = "FIELD=HEADER")]
        mappings: Vec<String>,
        /// Upsert into the current rows instead of replacing them
        #[arg(long)]
        append: bool,
    },

    /// Write the working set to a CSV file.
    Export { output: PathBuf },

    /// Manage dynamic columns.
    Columns {
        #[command(subcommand)]
        command: ColumnCommands,
    },

    /// Print rows.
    Show {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum ColumnCommands {
    /// Declare a column; every row gets the kind's default value.
    Add {
        label: String,
        #[arg(long, value_enum, default_value_t = KindArg::Text)]
        kind: KindArg,
    },
    /// List declared columns.
    List,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Text,
    Number,
    Boolean,
}

impl From<KindArg> for ColumnKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Text => ColumnKind::Text,
            KindArg::Number => ColumnKind::Number,
            KindArg::Boolean => ColumnKind::Boolean,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    let store = StoreConfig {
        snapshot_path: cli
            .snapshot
            .unwrap_or_else(|| StoreConfig::default().snapshot_path),
    };
    let path = store.snapshot_path.as_path();
    let set = WorkingSet::load_snapshot(path)
        .with_context(|| format!("loading working set from {}", path.display()))?;

    match cli.command {
        Commands::Fetch {
            base_url,
            batch_size,
            limit,
        } => {
            let config = fetch::resolve_config(&fetch::FetchOverrides {
                base_url,
                batch_size,
                limit,
            })?;
            fetch::cmd_fetch(&set, &config)?;
            save(&set, path)?;
        }
        Commands::Run { words } => {
            let outcome = dexlab_command::run(&words.join(" "), &set);
            repl::print_outcome(&outcome);
            if outcome.success {
                save(&set, path)?;
            }
        }
        Commands::Repl => repl::cmd_repl(&set, path)?,
        Commands::Import {
            input,
            mappings,
            append,
        } => {
            let imported = cmd_import(&set, &input, &mappings, append)?;
            println!("{} {imported} rows", "Imported".green().bold());
            save(&set, path)?;
        }
        Commands::Export { output } => {
            let file = File::create(&output)
                .with_context(|| format!("creating {}", output.display()))?;
            tabular::export_csv(&set.rows(), &set.columns(), file)?;
            println!(
                "{} {} rows to {}",
                "Exported".green().bold(),
                set.len(),
                output.display()
            );
        }
        Commands::Columns { command } => match command {
            ColumnCommands::Add { label, kind } => {
                let column = DynamicColumn::from_label(&label, kind.into());
                let id = column.id.clone();
                if cmd_add_column(&set, &label, column)? {
                    println!("{} column `{id}`", "Added".green().bold());
                    save(&set, path)?;
                } else {
                    println!("{} column `{id}` already exists", "Unchanged:".yellow().bold());
                }
            }
            ColumnCommands::List => print_columns(&set),
        },
        Commands::Show { limit } => print_rows(&set, limit),
    }

    Ok(())
}

fn save(set: &WorkingSet, path: &Path) -> Result<()> {
    set.save_snapshot(path)
        .with_context(|| format!("saving working set to {}", path.display()))
}

/// Declare a column unless its label is empty or already means a built-in
/// field to the command parser (`type`, `gen`, `sp. atk`, ...).
fn cmd_add_column(set: &WorkingSet, label: &str, column: DynamicColumn) -> Result<bool> {
    if label.trim().is_empty() {
        bail!("column label must not be empty");
    }
    let field = dexlab_command::map_field(label);
    if !matches!(field, Field::Dynamic(_)) {
        bail!("`{}` already refers to the built-in field `{field}`", label.trim());
    }
    set.declare_column(column)
        .with_context(|| format!("declaring column `{}`", label.trim()))
}

fn cmd_import(set: &WorkingSet, input: &Path, mappings: &[String], append: bool) -> Result<usize> {
    let open = || {
        File::open(input)
            .map(BufReader::new)
            .with_context(|| format!("opening {}", input.display()))
    };

    let headers = tabular::read_headers(open()?)?;
    let mut mapping = ColumnMapping::auto(&headers);
    for pair in mappings {
        let (field, header) = ColumnMapping::parse_pair(pair)?;
        mapping = mapping.with(field, header);
    }
    if mapping.header_for(&Field::Name).is_none() {
        tracing::warn!("no header mapped to name; imported rows will be named Unknown");
    }

    let rows = tabular::import_csv(open()?, &mapping, &set.columns())?;
    let count = rows.len();
    if append {
        set.append_batch(rows);
    } else {
        set.replace_all(rows);
    }
    Ok(count)
}

fn print_columns(set: &WorkingSet) {
    let columns = set.columns();
    if columns.is_empty() {
        println!("No dynamic columns.");
        return;
    }
    for column in columns {
        println!("  {:<20} {:<20} {}", column.id.bold(), column.label, column.kind);
    }
}

fn print_rows(set: &WorkingSet, limit: usize) {
    let rows = set.rows();
    let columns = set.columns();

    println!(
        "{}",
        format!(
            "{:<14} {:<14} {:<18} {:>3} {:>4} {:>4} {:>4} {:>4} {:>4} {:>4}",
            "ID", "Name", "Types", "Gen", "HP", "Atk", "Def", "SpA", "SpD", "Spe"
        )
        .bold()
    );
    for row in rows.iter().take(limit) {
        let mut line = format!(
            "{:<14} {:<14} {:<18} {:>3} {:>4} {:>4} {:>4} {:>4} {:>4} {:>4}",
            row.id,
            row.name,
            row.categories.join("/"),
            row.classification,
            row.stats.hp,
            row.stats.attack,
            row.stats.defense,
            row.stats.special_attack,
            row.stats.special_defense,
            row.stats.speed
        );
        for column in &columns {
            if let Some(value) = row.dynamic.get(&column.id) {
                line.push_str(&format!("  {}={}", column.id, value));
            }
        }
        println!("{line}");
    }
    if rows.len() > limit {
        println!("{}", format!("... {} more rows", rows.len() - limit).dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn run_joins_words() {
        let cli = Cli::try_parse_from(["dexlab", "run", "delete", "where", "name", "is", "mew"])
            .unwrap();
        match cli.command {
            Commands::Run { words } => assert_eq!(words.join(" "), "delete where name is mew"),
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn run_accepts_negative_values() {
        let cli = Cli::try_parse_from(["dexlab", "run", "set", "hp", "to", "-5", "where", "id", "is", "x"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Run { ref words } if words[3] == "-5"));
    }

    #[test]
    fn add_column_rejects_builtin_synonyms() {
        let set = WorkingSet::new();
        for label in ["Speed", "type", "Gen", "sp. atk", "  "] {
            let column = DynamicColumn::from_label(label, ColumnKind::Text);
            assert!(cmd_add_column(&set, label, column).is_err(), "{label:?}");
        }
        assert!(set.columns().is_empty());

        let column = DynamicColumn::from_label("Nickname", ColumnKind::Text);
        assert!(cmd_add_column(&set, "Nickname", column).unwrap());
        let again = DynamicColumn::from_label("nickname", ColumnKind::Text);
        assert!(!cmd_add_column(&set, "nickname", again).unwrap());
    }

    #[test]
    fn import_maps_headers_and_replaces_rows() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("mons.csv");
        std::fs::write(&csv, "Pokemon,HP,Types\nEevee,55,normal\nGhastly,30,ghost|poison\n")
            .unwrap();

        let set = WorkingSet::new();
        set.append_batch(vec![dexlab_store::CanonicalRow::blank("pokeapi-1")]);

        let count = cmd_import(&set, &csv, &["name=Pokemon".to_string()], false).unwrap();

        assert_eq!(count, 2);
        assert_eq!(set.len(), 2);
        let rows = set.rows();
        assert_eq!(rows[0].name, "Eevee");
        assert_eq!(rows[0].stats.hp, 55);
        assert_eq!(rows[1].categories, vec!["ghost", "poison"]);
    }

    #[test]
    fn import_append_keeps_existing_rows() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("one.csv");
        std::fs::write(&csv, "Name\nMew\n").unwrap();

        let set = WorkingSet::new();
        set.append_batch(vec![dexlab_store::CanonicalRow::blank("pokeapi-1")]);

        cmd_import(&set, &csv, &[], true).unwrap();
        assert_eq!(set.len(), 2);
    }
}
