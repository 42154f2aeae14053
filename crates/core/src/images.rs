use crate::config::ImageIdentity;
use crate::embeddings::CrossModalEncoder;
use crate::ingest::{discover_files_with_extensions, sha256_hex};
use crate::models::{to_metadata, BatchReport, ImageMetadata, Record};
use crate::store::VectorStore;
use crate::{IngestError, StoreError};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "gif"];

pub const DEFAULT_IMAGE_BATCH_SIZE: usize = 32;

pub fn discover_image_files(folder: &Path) -> Vec<PathBuf> {
    discover_files_with_extensions(folder, &IMAGE_EXTENSIONS)
}

/// Opens an image file and converts it to 8-bit RGB.
pub fn decode_image(path: &Path) -> Result<RgbImage, IngestError> {
    image::open(path)
        .map(|decoded| decoded.to_rgb8())
        .map_err(|error| IngestError::ImageDecode {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })
}

/// Record id for an image under the chosen identity scheme.
pub fn image_id(path: &Path, identity: ImageIdentity) -> Result<String, IngestError> {
    match identity {
        ImageIdentity::Path => Ok(sha256_hex(path.to_string_lossy().as_bytes())),
        ImageIdentity::Content => Ok(sha256_hex(&std::fs::read(path)?)),
    }
}

struct DecodedImage {
    path: PathBuf,
    id: String,
    image: RgbImage,
}

pub struct ImageIndexer {
    encoder: Arc<dyn CrossModalEncoder>,
    store: VectorStore,
    batch_size: usize,
    identity: ImageIdentity,
}

impl ImageIndexer {
    pub fn new(encoder: Arc<dyn CrossModalEncoder>, store: VectorStore) -> Self {
        Self {
            encoder,
            store,
            batch_size: DEFAULT_IMAGE_BATCH_SIZE,
            identity: ImageIdentity::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_identity(mut self, identity: ImageIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Indexes every image under `directory`, one upsert per batch.
    /// Undecodable files are logged and skipped; a failed batch is skipped
    /// as a whole and the run continues.
    pub async fn index_images(&self, directory: &Path) -> BatchReport {
        let mut report = BatchReport::default();
        let paths = discover_image_files(directory);
        info!(directory = %directory.display(), images = paths.len(), "found images");

        for (batch_number, batch) in paths.chunks(self.batch_size).enumerate() {
            let decoded = self.decode_batch(batch, &mut report);
            if decoded.is_empty() {
                continue;
            }

            let batch_paths: Vec<PathBuf> = decoded.iter().map(|item| item.path.clone()).collect();
            match self.index_batch(decoded).await {
                Ok(count) => {
                    report.succeeded += count;
                    info!(batch = batch_number + 1, images = count, "indexed image batch");
                }
                Err(error) => {
                    warn!(batch = batch_number + 1, error = %error, "image batch failed");
                    for path in batch_paths {
                        report.skip(path, error.to_string());
                    }
                }
            }
        }

        report
    }

    fn decode_batch(&self, batch: &[PathBuf], report: &mut BatchReport) -> Vec<DecodedImage> {
        let mut decoded = Vec::with_capacity(batch.len());

        for path in batch {
            let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
            let result = decode_image(&absolute).and_then(|image| {
                Ok(DecodedImage {
                    id: image_id(&absolute, self.identity)?,
                    path: absolute.clone(),
                    image,
                })
            });

            match result {
                Ok(item) => decoded.push(item),
                Err(error) => {
                    warn!(path = %absolute.display(), error = %error, "failed to open image");
                    report.skip(absolute, error.to_string());
                }
            }
        }

        decoded
    }

    async fn index_batch(&self, decoded: Vec<DecodedImage>) -> Result<usize, IngestError> {
        let (entries, images): (Vec<(PathBuf, String)>, Vec<RgbImage>) = decoded
            .into_iter()
            .map(|item| ((item.path, item.id), item.image))
            .unzip();
        let vectors = self.encoder.embed_images(&images).await?;
        drop(images);

        let records = entries
            .into_iter()
            .zip(vectors)
            .map(|((path, id), vector)| {
                let metadata = ImageMetadata {
                    path: path.to_string_lossy().to_string(),
                    filename: path
                        .file_name()
                        .map(|name| name.to_string_lossy().to_string())
                        .unwrap_or_default(),
                };
                Ok(Record {
                    id,
                    vector,
                    metadata: to_metadata(&metadata).map_err(StoreError::from)?,
                    document: None,
                })
            })
            .collect::<Result<Vec<_>, IngestError>>()?;

        let count = records.len();
        self.store.images.upsert(records).await?;
        Ok(count)
    }

    /// Drops image records by id, e.g. stale entries left by moved files.
    pub async fn remove_images(&self, ids: &[String]) -> Result<usize, StoreError> {
        self.store.images.delete(ids).await
    }
}
