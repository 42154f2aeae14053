use crate::embeddings::{embed_one, is_zero, CrossModalEncoder, TextEncoder};
use crate::models::{DocumentSearch, QueryHit};
use crate::store::VectorStore;
use crate::{EmbedError, SearchError};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentQuery {
    pub text: String,
    pub top_k: usize,
    pub want_files: bool,
    pub want_snippets: bool,
}

impl DocumentQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            top_k: 5,
            want_files: true,
            want_snippets: false,
        }
    }
}

/// Read-only search over the paper and image collections.
pub struct RetrievalService {
    text_encoder: Arc<dyn TextEncoder>,
    image_encoder: Arc<dyn CrossModalEncoder>,
    store: VectorStore,
}

impl RetrievalService {
    pub fn new(
        text_encoder: Arc<dyn TextEncoder>,
        image_encoder: Arc<dyn CrossModalEncoder>,
        store: VectorStore,
    ) -> Self {
        Self {
            text_encoder,
            image_encoder,
            store,
        }
    }

    pub async fn search_documents(&self, query: &DocumentQuery) -> Result<DocumentSearch, SearchError> {
        if query.text.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }

        let mut result = DocumentSearch::default();
        if !query.want_files && !query.want_snippets {
            return Ok(result);
        }

        info!(query = %query.text, top_k = query.top_k, "searching papers");
        let vector = embed_one(self.text_encoder.as_ref(), &query.text).await?;
        if is_zero(&vector) {
            info!(query = %query.text, "query has no text signal");
            if query.want_files {
                result.files = Some(Vec::new());
            }
            if query.want_snippets {
                result.snippets = Some(Vec::new());
            }
            return Ok(result);
        }

        if query.want_files {
            result.files = Some(self.store.files.query(&vector, query.top_k).await?);
        }
        if query.want_snippets {
            result.snippets = Some(self.store.chunks.query(&vector, query.top_k).await?);
        }

        Ok(result)
    }

    pub async fn search_images(&self, query: &str, top_k: usize) -> Result<Vec<QueryHit>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }

        info!(query = %query, top_k, "searching images");
        let vector = self
            .image_encoder
            .embed_text_for_image_space(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Response {
                details: "encoder returned no vector".to_string(),
            })?;

        // every image would tie at distance 1.0, which is no ranking at all
        if is_zero(&vector) {
            info!(query = %query, "query has no image-space signal");
            return Ok(Vec::new());
        }

        Ok(self.store.images.query(&vector, top_k).await?)
    }
}
