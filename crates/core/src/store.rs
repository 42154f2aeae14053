use crate::config::CollectionNames;
use crate::stores::local::{open_database, temporary_database};
use crate::stores::{LocalCollection, QdrantCollection};
use crate::traits::VectorCollection;
use crate::StoreError;
use std::path::Path;
use std::sync::Arc;

/// The three independent collections every pipeline reads or writes.
///
/// No referential integrity is kept between them; the ingestion pipeline
/// writes a file record before the chunks that point at it.
#[derive(Clone)]
pub struct VectorStore {
    pub files: Arc<dyn VectorCollection>,
    pub chunks: Arc<dyn VectorCollection>,
    pub images: Arc<dyn VectorCollection>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionCounts {
    pub files: usize,
    pub chunks: usize,
    pub images: usize,
}

impl VectorStore {
    pub fn new(
        files: Arc<dyn VectorCollection>,
        chunks: Arc<dyn VectorCollection>,
        images: Arc<dyn VectorCollection>,
    ) -> Self {
        Self {
            files,
            chunks,
            images,
        }
    }

    /// Opens (or creates) the embedded store under `index_dir`.
    pub fn open_local(index_dir: &Path, names: &CollectionNames) -> Result<Self, StoreError> {
        let db = open_database(index_dir)?;
        Self::from_sled(&db, names)
    }

    /// An embedded store that is discarded when dropped.
    pub fn temporary(names: &CollectionNames) -> Result<Self, StoreError> {
        let db = temporary_database()?;
        Self::from_sled(&db, names)
    }

    fn from_sled(db: &sled::Db, names: &CollectionNames) -> Result<Self, StoreError> {
        Ok(Self::new(
            Arc::new(LocalCollection::open(db, &names.files)?),
            Arc::new(LocalCollection::open(db, &names.chunks)?),
            Arc::new(LocalCollection::open(db, &names.images)?),
        ))
    }

    /// Connects to Qdrant, creating any missing collection.
    pub async fn open_qdrant(
        url: &str,
        names: &CollectionNames,
        text_dimensions: usize,
        image_dimensions: usize,
    ) -> Result<Self, StoreError> {
        let files = QdrantCollection::new(url, &names.files, text_dimensions)?;
        let chunks = QdrantCollection::new(url, &names.chunks, text_dimensions)?;
        let images = QdrantCollection::new(url, &names.images, image_dimensions)?;

        for collection in [&files, &chunks, &images] {
            collection.ensure_collection().await?;
        }

        Ok(Self::new(Arc::new(files), Arc::new(chunks), Arc::new(images)))
    }

    pub async fn counts(&self) -> Result<CollectionCounts, StoreError> {
        Ok(CollectionCounts {
            files: self.files.count().await?,
            chunks: self.chunks.count().await?,
            images: self.images.count().await?,
        })
    }
}
