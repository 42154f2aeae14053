use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Free-form record metadata, stored alongside each vector.
pub type Metadata = Map<String, Value>;

/// Topic assigned when no candidate topics were supplied.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// One text window of a document page, before it is embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageChunk {
    pub sequence_index: usize,
    pub page_id: u32,
    pub char_start: usize,
    pub char_end: usize,
    pub text: String,
}

/// Result of parsing a PDF: the page texts joined by newline plus all chunks.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub full_text: String,
    pub chunks: Vec<PageChunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileMetadata {
    pub path: String,
    pub filename: String,
    pub hash: String,
    pub topic: String,
    pub indexed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub file_hash: String,
    pub page_id: u32,
    pub char_start: usize,
    pub char_end: usize,
    pub path: String,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageMetadata {
    pub path: String,
    pub filename: String,
}

/// Converts a typed metadata struct into the map stored with a record.
pub fn to_metadata<T: Serialize>(value: &T) -> Result<Metadata, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            Ok(map)
        }
    }
}

/// A single entry written into a collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: Metadata,
    pub document: Option<String>,
}

/// A nearest-neighbour match. Smaller distance means more similar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryHit {
    pub id: String,
    pub metadata: Metadata,
    pub distance: f32,
    pub document: Option<String>,
}

impl QueryHit {
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn metadata_u64(&self, key: &str) -> Option<u64> {
        self.metadata.get(key).and_then(Value::as_u64)
    }
}

/// Document search output; a field is `None` when that collection was not requested.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentSearch {
    pub files: Option<Vec<QueryHit>>,
    pub snippets: Option<Vec<QueryHit>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedDocument {
    pub path: PathBuf,
    pub hash: Option<String>,
    pub topic: String,
    pub chunk_count: usize,
    pub indexed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// Extraction produced no text; nothing was written.
    EmptyText { path: PathBuf },
    Processed(ProcessedDocument),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub path: PathBuf,
    pub reason: String,
}

/// Tally of a best-effort batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub skipped: Vec<SkippedItem>,
}

impl BatchReport {
    pub fn skip(&mut self, path: PathBuf, reason: impl Into<String>) {
        self.skipped.push(SkippedItem {
            path,
            reason: reason.into(),
        });
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.skipped.len()
    }
}
