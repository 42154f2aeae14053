use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("failed to decode image {}: {reason}", path.display())]
    ImageDecode { path: PathBuf, reason: String },

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid response from encoder: {details}")]
    Response { details: String },

    #[error("image encode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("encoder unavailable: {0}")]
    Unsupported(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("write to collection {collection} failed: {details}")]
    Write { collection: String, details: String },

    #[error("read from collection {collection} failed: {details}")]
    Read { collection: String, details: String },

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("collection {collection} holds {expected}-dim vectors, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    #[error("collection lock poisoned: {0}")]
    Poisoned(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Request(String),

    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
