//! Embedded on-disk collections backed by sled.
//!
//! Each collection is a sled tree keyed by record id; values are JSON-encoded
//! [`Record`]s. A shared `__collections` tree remembers each collection's
//! vector dimensionality. Batches are applied with [`sled::Batch`], so a
//! concurrent query sees either none or all of an upsert.

use crate::models::{QueryHit, Record};
use crate::traits::VectorCollection;
use crate::StoreError;
use async_trait::async_trait;
use sled::{Batch, Db, Tree};
use std::path::Path;
use std::sync::Mutex;

const DIMENSIONS_TREE: &str = "__collections";

pub fn open_database(path: &Path) -> Result<Db, StoreError> {
    Ok(sled::open(path)?)
}

pub fn temporary_database() -> Result<Db, StoreError> {
    Ok(sled::Config::new().temporary(true).open()?)
}

pub struct LocalCollection {
    name: String,
    tree: Tree,
    dimensions: Tree,
    write_lock: Mutex<()>,
}

impl LocalCollection {
    pub fn open(db: &Db, name: impl Into<String>) -> Result<Self, StoreError> {
        let name = name.into();
        Ok(Self {
            tree: db.open_tree(name.as_bytes())?,
            dimensions: db.open_tree(DIMENSIONS_TREE)?,
            name,
            write_lock: Mutex::new(()),
        })
    }

    pub fn recorded_dimensions(&self) -> Result<Option<usize>, StoreError> {
        let Some(raw) = self.dimensions.get(self.name.as_bytes())? else {
            return Ok(None);
        };
        let bytes = <[u8; 8]>::try_from(&raw[..]).map_err(|_| StoreError::Read {
            collection: self.name.clone(),
            details: "corrupt dimension entry".to_string(),
        })?;
        Ok(Some(u64::from_le_bytes(bytes) as usize))
    }

    fn check_dimensions(&self, expected: usize, actual: usize) -> Result<(), StoreError> {
        if expected != actual {
            return Err(StoreError::DimensionMismatch {
                collection: self.name.clone(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    fn decode(&self, raw: &[u8]) -> Result<Record, StoreError> {
        serde_json::from_slice(raw).map_err(|error| StoreError::Read {
            collection: self.name.clone(),
            details: error.to_string(),
        })
    }
}

/// Cosine distance `1 - cos`; zero-magnitude vectors are maximally distant.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        1.0
    } else {
        1.0 - dot / (mag_a * mag_b)
    }
}

#[async_trait]
impl VectorCollection for LocalCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, records: Vec<Record>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let _guard = self
            .write_lock
            .lock()
            .map_err(|error| StoreError::Poisoned(error.to_string()))?;

        let expected = match self.recorded_dimensions()? {
            Some(dimensions) => dimensions,
            None => records[0].vector.len(),
        };

        let mut batch = Batch::default();
        for record in &records {
            self.check_dimensions(expected, record.vector.len())?;
            let value = serde_json::to_vec(record)?;
            batch.insert(record.id.as_bytes(), value);
        }

        self.tree.apply_batch(batch).map_err(|error| StoreError::Write {
            collection: self.name.clone(),
            details: error.to_string(),
        })?;
        self.dimensions
            .insert(self.name.as_bytes(), (expected as u64).to_le_bytes().to_vec())?;
        self.tree.flush()?;

        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryHit>, StoreError> {
        if k == 0 || self.tree.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(expected) = self.recorded_dimensions()? {
            self.check_dimensions(expected, vector.len())?;
        }

        let mut hits = Vec::new();
        for item in self.tree.iter() {
            let (_, raw) = item?;
            let record = self.decode(&raw)?;
            hits.push(QueryHit {
                distance: cosine_distance(vector, &record.vector),
                id: record.id,
                metadata: record.metadata,
                document: record.document,
            });
        }

        hits.sort_by(|left, right| {
            left.distance
                .total_cmp(&right.distance)
                .then_with(|| left.id.cmp(&right.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|error| StoreError::Poisoned(error.to_string()))?;

        let mut removed = 0;
        for id in ids {
            if self.tree.remove(id.as_bytes())?.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.tree.len())
    }
}
