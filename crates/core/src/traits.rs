use crate::models::{QueryHit, Record};
use crate::StoreError;
use async_trait::async_trait;

/// One keyed collection of vectors with metadata and optional raw text.
///
/// `upsert` replaces existing ids wholesale and is a no-op for an empty batch.
/// `query` returns at most `k` hits ordered by ascending distance; an empty
/// collection yields an empty list.
#[async_trait]
pub trait VectorCollection: Send + Sync {
    fn name(&self) -> &str;

    async fn upsert(&self, records: Vec<Record>) -> Result<(), StoreError>;

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryHit>, StoreError>;

    /// Removes the given ids, returning how many existed.
    async fn delete(&self, ids: &[String]) -> Result<usize, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}
