//! # Dexlab Ingest
//!
//! Pulls the remote catalog into canonical rows.
//!
//! ```text
//! ┌──────────────┐  index   ┌──────────────┐  batch of N  ┌──────────────┐
//! │ CatalogSource│ ───────► │   Ingestor   │ ───────────► │  on_batch()  │
//! │ (HTTP / mock)│ ◄─────── │  join_all    │              │ (WorkingSet) │
//! └──────────────┘  detail  └──────┬───────┘              └──────────────┘
//!        ▲                         │ species url
//!        │ fetch_classification    ▼
//!        └──────────────────  LookupCache  ──► normalize() ──► CanonicalRow
//! ```
//!
//! Batches run sequentially; items within a batch run concurrently. Index
//! failure is fatal, item failure only drops the item.

pub mod cache;
pub mod config;
pub mod ingest;
pub mod normalize;
pub mod source;

pub use cache::{LookupCache, DEFAULT_CLASSIFICATION};
pub use config::{ConfigError, IngestConfig};
pub use ingest::{IngestError, IngestProgress, IngestSummary, Ingestor};
pub use normalize::{normalize, row_id, ID_PREFIX};
pub use source::{
    parse_classification_label, CatalogSource, HttpCatalogSource, IndexEntry, IndexPage,
    MockCatalogSource, RawSourceRecord, SourceError,
};
