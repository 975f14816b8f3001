//! Remote catalog source.
//!
//! [`CatalogSource`] is the seam the orchestrator talks to. The HTTP
//! implementation speaks the PokeAPI shapes; [`MockCatalogSource`] serves
//! canned records in-process with call counters and injectable failures.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::IngestConfig;

// ============================================================================
// Wire shapes
// ============================================================================

/// Index endpoint payload. `count` is informational only; callers iterate
/// `results`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexPage {
    #[serde(default)]
    pub count: u64,
    pub results: Vec<IndexEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamedRef {
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sprites {
    pub front_default: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeSlot {
    #[serde(rename = "type")]
    pub kind: NamedRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatEntry {
    pub base_stat: u32,
    pub stat: NamedRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilitySlot {
    pub ability: NamedRef,
}

/// One record from the detail endpoint. Fields not listed here are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSourceRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub sprites: Sprites,
    #[serde(default)]
    pub types: Vec<TypeSlot>,
    #[serde(default)]
    pub stats: Vec<StatEntry>,
    #[serde(default)]
    pub abilities: Vec<AbilitySlot>,
    pub species: NamedRef,
}

/// The part of the species payload we read.
#[derive(Debug, Clone, Deserialize)]
struct SpeciesPayload {
    generation: Option<NamedRef>,
}

/// Map a `"<category>-<roman>"` label to its index. I–IX map to 1–9;
/// anything else maps to 1.
pub fn parse_classification_label(label: &str) -> u32 {
    let roman = label
        .split('-')
        .nth(1)
        .map(str::to_ascii_uppercase)
        .unwrap_or_default();
    match roman.as_str() {
        "I" => 1,
        "II" => 2,
        "III" => 3,
        "IV" => 4,
        "V" => 5,
        "VI" => 6,
        "VII" => 7,
        "VIII" => 8,
        "IX" => 9,
        _ => 1,
    }
}

// ============================================================================
// Source trait
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("could not decode {url}: {message}")]
    Decode { url: String, message: String },
    #[error("{url} has no {what}")]
    Shape { url: String, what: &'static str },
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Full listing of available items.
    async fn fetch_index(&self) -> Result<IndexPage, SourceError>;

    /// One detail record.
    async fn fetch_record(&self, url: &str) -> Result<RawSourceRecord, SourceError>;

    /// Classification index from the secondary (species) resource.
    async fn fetch_classification(&self, url: &str) -> Result<u32, SourceError>;
}

// ============================================================================
// HTTP source
// ============================================================================

pub struct HttpCatalogSource {
    client: Client,
    index_url: String,
}

impl HttpCatalogSource {
    pub fn new(config: &IngestConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("dexlab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SourceError::Transport {
                url: config.base_url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            index_url: config.index_url(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<T>().await.map_err(|e| SourceError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch_index(&self) -> Result<IndexPage, SourceError> {
        self.get_json(&self.index_url).await
    }

    async fn fetch_record(&self, url: &str) -> Result<RawSourceRecord, SourceError> {
        self.get_json(url).await
    }

    async fn fetch_classification(&self, url: &str) -> Result<u32, SourceError> {
        let species: SpeciesPayload = self.get_json(url).await?;
        let generation = species.generation.ok_or_else(|| SourceError::Shape {
            url: url.to_string(),
            what: "generation",
        })?;
        Ok(parse_classification_label(&generation.name))
    }
}

// ============================================================================
// Mock source
// ============================================================================

/// In-process source for tests and offline demos.
#[derive(Default)]
pub struct MockCatalogSource {
    entries: Vec<IndexEntry>,
    records: HashMap<String, RawSourceRecord>,
    labels: HashMap<String, String>,
    failing_records: Mutex<HashSet<String>>,
    failing_labels: Mutex<HashSet<String>>,
    index_fails: bool,
    reported_count: Option<u64>,
    latency: Option<Duration>,
    record_calls: AtomicUsize,
    classification_calls: AtomicUsize,
}

impl MockCatalogSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record reachable at `url`, whose species resolves to `label`.
    pub fn with_record(mut self, url: &str, record: RawSourceRecord, label: &str) -> Self {
        self.entries.push(IndexEntry {
            name: record.name.clone(),
            url: url.to_string(),
        });
        self.labels
            .insert(record.species.url.clone(), label.to_string());
        self.records.insert(url.to_string(), record);
        self
    }

    /// Detail requests for `url` fail with a 500.
    pub fn failing_record(self, url: &str) -> Self {
        self.failing_records.lock().insert(url.to_string());
        self
    }

    /// Species requests for `url` fail with a 500.
    pub fn failing_classification(self, url: &str) -> Self {
        self.failing_labels.lock().insert(url.to_string());
        self
    }

    /// Let a failing species endpoint recover.
    pub fn heal_classification(&self, url: &str) {
        self.failing_labels.lock().remove(url);
    }

    pub fn failing_index(mut self) -> Self {
        self.index_fails = true;
        self
    }

    /// Report a `count` different from the number of entries.
    pub fn with_reported_count(mut self, count: u64) -> Self {
        self.reported_count = Some(count);
        self
    }

    /// Delay every request, so concurrent callers overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn record_calls(&self) -> usize {
        self.record_calls.load(Ordering::SeqCst)
    }

    pub fn classification_calls(&self) -> usize {
        self.classification_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl CatalogSource for MockCatalogSource {
    async fn fetch_index(&self) -> Result<IndexPage, SourceError> {
        self.pause().await;
        if self.index_fails {
            return Err(SourceError::Status {
                url: "mock://index".to_string(),
                status: 503,
            });
        }
        Ok(IndexPage {
            count: self
                .reported_count
                .unwrap_or(self.entries.len() as u64),
            results: self.entries.clone(),
        })
    }

    async fn fetch_record(&self, url: &str) -> Result<RawSourceRecord, SourceError> {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.failing_records.lock().contains(url) {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: 500,
            });
        }
        self.records.get(url).cloned().ok_or_else(|| SourceError::Status {
            url: url.to_string(),
            status: 404,
        })
    }

    async fn fetch_classification(&self, url: &str) -> Result<u32, SourceError> {
        self.classification_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.failing_labels.lock().contains(url) {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: 500,
            });
        }
        let label = self.labels.get(url).ok_or_else(|| SourceError::Shape {
            url: url.to_string(),
            what: "generation",
        })?;
        Ok(parse_classification_label(label))
    }
}
