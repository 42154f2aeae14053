//! On-device encoders running ONNX models through fastembed.
//!
//! Weights are fetched from Hugging Face on first use and cached under the
//! configured model directory; after that no network access is needed.
//! Inference is blocking, so every call runs on tokio's blocking pool.

use crate::embeddings::{normalize, CrossModalEncoder, TextEncoder};
use crate::encoders::encode_png;
use crate::error::EmbedError;
use async_trait::async_trait;
use fastembed::{
    EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, TextEmbedding,
    TextInitOptions,
};
use image::RgbImage;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// paraphrase-multilingual-mpnet-base-v2
pub const SENTENCE_DIMENSIONS: usize = 768;

/// CLIP ViT-B/32, shared by its text and vision towers.
pub const CLIP_DIMENSIONS: usize = 512;

fn model_error(error: impl std::fmt::Display) -> EmbedError {
    EmbedError::Request(format!("local model: {error}"))
}

fn load_text_model(model: EmbeddingModel, cache_dir: &Path) -> Result<TextEmbedding, EmbedError> {
    let options = TextInitOptions::new(model)
        .with_cache_dir(cache_dir.to_path_buf())
        .with_show_download_progress(true);
    TextEmbedding::try_new(options).map_err(model_error)
}

async fn run_blocking<T, F>(job: F) -> Result<T, EmbedError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, EmbedError> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|error| EmbedError::Request(format!("embedding task failed: {error}")))?
}

async fn embed_with_text_model(
    model: &Arc<Mutex<TextEmbedding>>,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, EmbedError> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let model = Arc::clone(model);
    let texts = texts.to_vec();
    let mut vectors = run_blocking(move || {
        let mut guard = model
            .lock()
            .map_err(|error| EmbedError::Request(error.to_string()))?;
        guard.embed(texts, None).map_err(model_error)
    })
    .await?;

    for vector in &mut vectors {
        normalize(vector);
    }
    Ok(vectors)
}

/// Sentence-transformer text encoder for paper classification and search.
pub struct LocalTextEncoder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl LocalTextEncoder {
    pub fn new(cache_dir: &Path) -> Result<Self, EmbedError> {
        let model = load_text_model(EmbeddingModel::ParaphraseMLMpnetBaseV2, cache_dir)?;
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

#[async_trait]
impl TextEncoder for LocalTextEncoder {
    fn dimensions(&self) -> usize {
        SENTENCE_DIMENSIONS
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        embed_with_text_model(&self.model, texts).await
    }
}

/// CLIP image tower paired with its text tower, so text queries land in
/// the same space as indexed images.
pub struct ClipEncoder {
    vision: Arc<Mutex<ImageEmbedding>>,
    text: Arc<Mutex<TextEmbedding>>,
}

impl ClipEncoder {
    pub fn new(cache_dir: &Path) -> Result<Self, EmbedError> {
        let vision_options = ImageInitOptions::new(ImageEmbeddingModel::ClipVitB32)
            .with_cache_dir(cache_dir.to_path_buf())
            .with_show_download_progress(true);
        let vision = ImageEmbedding::try_new(vision_options).map_err(model_error)?;
        let text = load_text_model(EmbeddingModel::ClipVitB32, cache_dir)?;

        Ok(Self {
            vision: Arc::new(Mutex::new(vision)),
            text: Arc::new(Mutex::new(text)),
        })
    }
}

#[async_trait]
impl CrossModalEncoder for ClipEncoder {
    fn dimensions(&self) -> usize {
        CLIP_DIMENSIONS
    }

    async fn embed_images(&self, images: &[RgbImage]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if images.is_empty() {
            return Ok(Vec::new());
        }

        let encoded = images.iter().map(encode_png).collect::<Result<Vec<_>, _>>()?;
        let vision = Arc::clone(&self.vision);
        let mut vectors = run_blocking(move || {
            let slices: Vec<&[u8]> = encoded.iter().map(Vec::as_slice).collect();
            let mut guard = vision
                .lock()
                .map_err(|error| EmbedError::Request(error.to_string()))?;
            guard.embed_bytes(&slices, None).map_err(model_error)
        })
        .await?;

        if vectors.len() != images.len() {
            return Err(EmbedError::Response {
                details: format!("expected {} vectors, got {}", images.len(), vectors.len()),
            });
        }
        for vector in &mut vectors {
            normalize(vector);
        }
        Ok(vectors)
    }

    async fn embed_text_for_image_space(
        &self,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        embed_with_text_model(&self.text, texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::dot;
    use image::Rgb;

    #[tokio::test]
    #[ignore = "downloads CLIP weights"]
    async fn clip_ranks_matching_description_higher() -> Result<(), Box<dyn std::error::Error>> {
        let cache = tempfile::tempdir()?;
        let encoder = ClipEncoder::new(cache.path())?;

        let images = vec![
            RgbImage::from_pixel(64, 64, Rgb([220, 20, 20])),
            RgbImage::from_pixel(64, 64, Rgb([20, 20, 220])),
        ];
        let image_vectors = encoder.embed_images(&images).await?;
        let query = encoder
            .embed_text_for_image_space(&["a solid red square".to_string()])
            .await?;

        assert_eq!(image_vectors[0].len(), CLIP_DIMENSIONS);
        assert!(dot(&query[0], &image_vectors[0]) > dot(&query[0], &image_vectors[1]));
        Ok(())
    }

    #[tokio::test]
    #[ignore = "downloads sentence-transformer weights"]
    async fn sentence_model_separates_topics() -> Result<(), Box<dyn std::error::Error>> {
        let cache = tempfile::tempdir()?;
        let encoder = LocalTextEncoder::new(cache.path())?;

        let vectors = encoder
            .embed_texts(&[
                "policy gradients and reward shaping".to_string(),
                "reinforcement learning".to_string(),
                "image segmentation".to_string(),
            ])
            .await?;

        assert_eq!(vectors[0].len(), SENTENCE_DIMENSIONS);
        assert!(dot(&vectors[0], &vectors[1]) > dot(&vectors[0], &vectors[2]));
        Ok(())
    }
}
