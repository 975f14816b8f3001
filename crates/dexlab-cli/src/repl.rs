//! Interactive command shell over the working set.
//!
//! By default we use `rustyline` for line editing and history.
//! A minimal stdin-based fallback exists behind `--no-default-features`.

use anyhow::Result;
#[cfg(feature = "repl-rustyline")]
use anyhow::anyhow;
use colored::Colorize;
use dexlab_command::CommandOutcome;
use dexlab_store::WorkingSet;
use std::path::Path;

use crate::print_rows;

const PROMPT: &str = "dexlab> ";

enum ReplControl {
    Continue,
    Exit,
}

pub fn cmd_repl(set: &WorkingSet, snapshot: &Path) -> Result<()> {
    println!("{}", "Dexlab REPL".green().bold());
    println!(
        "{} rows loaded. Type `help` for commands. Type `exit` to quit.\n",
        set.len()
    );

    #[cfg(feature = "repl-rustyline")]
    {
        return cmd_repl_rustyline(set, snapshot);
    }
    #[cfg(not(feature = "repl-rustyline"))]
    {
        return cmd_repl_simple(set, snapshot);
    }
}

#[cfg(not(feature = "repl-rustyline"))]
fn cmd_repl_simple(set: &WorkingSet, snapshot: &Path) -> Result<()> {
    use std::io::{self, Write};

    let stdin = io::stdin();
    loop {
        print!("{}", PROMPT.cyan().bold());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }

        match dispatch_line(set, snapshot, line.trim()) {
            Ok(ReplControl::Continue) => {}
            Ok(ReplControl::Exit) => break,
            Err(e) => eprintln!("{} {e}", "error:".red().bold()),
        }
    }
    Ok(())
}

#[cfg(feature = "repl-rustyline")]
fn cmd_repl_rustyline(set: &WorkingSet, snapshot: &Path) -> Result<()> {
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    let mut rl = DefaultEditor::new().map_err(|e| anyhow!("failed to init rustyline: {e}"))?;

    loop {
        let line = match rl.readline(PROMPT) {
            Ok(l) => l,
            Err(ReadlineError::Eof) => break,
            Err(ReadlineError::Interrupted) => continue,
            Err(e) => return Err(anyhow!("readline error: {e}")),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        rl.add_history_entry(line)
            .map_err(|e| anyhow!("failed to record history: {e}"))?;

        match dispatch_line(set, snapshot, line) {
            Ok(ReplControl::Continue) => {}
            Ok(ReplControl::Exit) => break,
            Err(e) => eprintln!("{} {e}", "error:".red().bold()),
        }
    }
    Ok(())
}

fn dispatch_line(set: &WorkingSet, snapshot: &Path, line: &str) -> Result<ReplControl> {
    let mut words = line.split_whitespace();
    match (words.next(), words.next()) {
        (None, _) => {}
        (Some("exit" | "quit"), None) => return Ok(ReplControl::Exit),
        (Some("help"), None) => print_help(),
        (Some("count"), None) => println!("{} rows", set.len()),
        (Some("columns"), None) => crate::print_columns(set),
        (Some("show"), limit) => {
            let limit = limit.and_then(|n| n.parse().ok()).unwrap_or(20);
            print_rows(set, limit);
        }
        _ => {
            let outcome = dexlab_command::run(line, set);
            print_outcome(&outcome);
            if outcome.success {
                set.save_snapshot(snapshot)?;
            }
        }
    }
    Ok(ReplControl::Continue)
}

pub fn print_outcome(outcome: &CommandOutcome) {
    if outcome.success {
        println!("{} {}", "ok:".green().bold(), outcome.message);
    } else {
        println!("{} {}", "no change:".yellow().bold(), outcome.message);
    }
}

fn print_help() {
    println!("{}", "Commands:".bold());
    println!("  set|update <field> to <value> where <field> is <value>");
    println!("  set|update <field> to <value> for all pokemon of type <type>");
    println!("  delete [rows] where <field> is <value>");
    println!("  show [n]      print the first n rows (default 20)");
    println!("  columns       list dynamic columns");
    println!("  count         number of rows");
    println!("  exit | quit");
    println!();
    println!(
        "{} hp, attack, defense, sp. atk, sp. def, speed, gen, name, type, ability, image, id,",
        "Fields:".bold()
    );
    println!("        or any declared column label");
}
