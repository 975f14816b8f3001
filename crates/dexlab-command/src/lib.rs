//! # Dexlab Command
//!
//! Short sentences in, bulk edits out.
//!
//! ```text
//! "set hp to 100 where types is fire"
//!        │
//!        ▼  parse()            ordered grammar rules + field synonyms
//! ParsedCommand::Update { hp, 100, categories, "fire" }
//!        │
//!        ▼  execute()          match + mutate under one write lock
//! CommandOutcome { success: true, "Updated 2 rows.", affected: 2 }
//! ```

pub mod executor;
pub mod parser;

pub use executor::{execute, matching_ids, run, CommandOutcome, UNRECOGNIZED_MESSAGE};
pub use parser::{map_field, parse, parse_value, ParsedCommand};
