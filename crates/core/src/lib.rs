pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod encoders;
pub mod error;
pub mod extractor;
pub mod images;
pub mod ingest;
pub mod models;
pub mod retrieval;
pub mod store;
pub mod stores;
pub mod traits;

pub use chunking::{build_chunks, chunk_page, sliding_windows, ChunkingConfig, Window};
pub use config::{CollectionNames, ImageIdentity, PipelineConfig};
pub use embeddings::{
    build_cross_modal_encoder, build_text_encoder, CrossModalEncoder, CrossModalEncoderKind,
    EncoderConfig, TextEncoder, TextEncoderKind, DEFAULT_EMBEDDING_DIMENSIONS,
};
#[cfg(feature = "local-models")]
pub use encoders::{ClipEncoder, LocalTextEncoder};
pub use encoders::{CharacterNgramEmbedder, PaletteEncoder, RemoteEncoder};
pub use error::{EmbedError, IngestError, SearchError, StoreError};
pub use extractor::{extract_page_texts, LopdfExtractor, PageText, PdfExtractor};
pub use images::{decode_image, discover_image_files, image_id, ImageIndexer};
pub use ingest::{chunk_id, discover_pdf_files, document_hash, AddOptions, PaperIngestor};
pub use models::{
    BatchReport, DocumentOutcome, DocumentSearch, Metadata, ProcessedDocument, QueryHit, Record,
    SkippedItem, UNCATEGORIZED,
};
pub use retrieval::{DocumentQuery, RetrievalService};
pub use store::{CollectionCounts, VectorStore};
pub use stores::{LocalCollection, QdrantCollection};
pub use traits::VectorCollection;
