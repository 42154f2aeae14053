use crate::chunking::ChunkingConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Collection names are part of the persisted compatibility contract: a new
/// encoder dimensionality needs a new name or a rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionNames {
    pub files: String,
    pub chunks: String,
    pub images: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            files: "papers_files".to_string(),
            chunks: "papers_chunks".to_string(),
            images: "images_palette".to_string(),
        }
    }
}

/// How an image record's id is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageIdentity {
    /// Hash of the absolute path. Moving a file leaves the old record behind.
    #[default]
    Path,
    /// Hash of the file bytes. Identical images at different paths share one record.
    Content,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub papers_dir: PathBuf,
    pub images_dir: PathBuf,
    pub index_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub chunking: ChunkingConfig,
    pub collections: CollectionNames,
    pub image_batch_size: usize,
    pub image_identity: ImageIdentity,
}

impl PipelineConfig {
    pub fn from_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            papers_dir: data_dir.join("papers"),
            images_dir: data_dir.join("images"),
            index_dir: data_dir.join("index"),
            cache_dir: data_dir.join("cache"),
            data_dir,
            chunking: ChunkingConfig::default(),
            collections: CollectionNames::default(),
            image_batch_size: 32,
            image_identity: ImageIdentity::default(),
        }
    }

    pub fn ensure_directories(&self) -> io::Result<()> {
        for dir in [
            &self.papers_dir,
            &self.images_dir,
            &self.index_dir,
            &self.cache_dir,
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn papers_root(&self) -> &Path {
        &self.papers_dir
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_data_dir("data")
    }
}
