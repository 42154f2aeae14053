//! Encoder contracts and the factory that builds them from configuration.
//!
//! Both encoders are batched: one output vector per input, in input order,
//! L2-normalized. An empty batch returns an empty result without doing any work.

use crate::encoders::{CharacterNgramEmbedder, PaletteEncoder, RemoteEncoder};
use crate::error::EmbedError;
use async_trait::async_trait;
use image::RgbImage;
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 128;

#[async_trait]
pub trait TextEncoder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// Encodes images and text into one shared space.
#[async_trait]
pub trait CrossModalEncoder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed_images(&self, images: &[RgbImage]) -> Result<Vec<Vec<f32>>, EmbedError>;

    async fn embed_text_for_image_space(
        &self,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// Scales `vector` to unit length in place. Zero vectors are left as they are.
pub fn normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in vector.iter_mut() {
            *value /= magnitude;
        }
    }
}

/// True when `vector` carries no direction, e.g. text with nothing the encoder recognises.
pub fn is_zero(vector: &[f32]) -> bool {
    vector.iter().all(|value| value.abs() <= f32::EPSILON)
}

pub fn dot(left: &[f32], right: &[f32]) -> f32 {
    left.iter().zip(right).map(|(a, b)| a * b).sum()
}

/// Embeds a single text and returns its vector.
pub async fn embed_one(encoder: &dyn TextEncoder, text: &str) -> Result<Vec<f32>, EmbedError> {
    encoder
        .embed_texts(&[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| EmbedError::Response {
            details: "encoder returned no vector".to_string(),
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextEncoderKind {
    Ngram { dimensions: usize },
    Remote { endpoint: String },
    /// On-device sentence transformer; needs the `local-models` feature.
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrossModalEncoderKind {
    Palette,
    Remote { endpoint: String },
    /// On-device CLIP; needs the `local-models` feature.
    Clip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub text: TextEncoderKind,
    pub cross_modal: CrossModalEncoderKind,
    pub api_key: Option<String>,
    /// Dimensionality reported by remote encoders; they cannot be probed offline.
    pub remote_text_dimensions: usize,
    pub remote_image_dimensions: usize,
    /// Where on-device model weights are cached.
    pub model_cache_dir: PathBuf,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            text: TextEncoderKind::Ngram {
                dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            },
            cross_modal: CrossModalEncoderKind::Palette,
            api_key: std::env::var("PAPERSIFT_ENCODER_API_KEY")
                .ok()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            remote_text_dimensions: 768,
            remote_image_dimensions: 1024,
            model_cache_dir: PathBuf::from("data").join("cache"),
        }
    }
}

pub fn build_text_encoder(config: &EncoderConfig) -> Result<Arc<dyn TextEncoder>, EmbedError> {
    match &config.text {
        TextEncoderKind::Ngram { dimensions } => Ok(Arc::new(CharacterNgramEmbedder {
            dimensions: *dimensions,
        })),
        TextEncoderKind::Remote { endpoint } => Ok(Arc::new(RemoteEncoder::new(
            endpoint,
            config.api_key.clone(),
            config.remote_text_dimensions,
        )?)),
        #[cfg(feature = "local-models")]
        TextEncoderKind::Local => Ok(Arc::new(crate::encoders::LocalTextEncoder::new(
            &config.model_cache_dir,
        )?)),
        #[cfg(not(feature = "local-models"))]
        TextEncoderKind::Local => Err(EmbedError::Unsupported(
            "local text encoder requires the `local-models` feature".to_string(),
        )),
    }
}

pub fn build_cross_modal_encoder(
    config: &EncoderConfig,
) -> Result<Arc<dyn CrossModalEncoder>, EmbedError> {
    match &config.cross_modal {
        CrossModalEncoderKind::Palette => Ok(Arc::new(PaletteEncoder::default())),
        CrossModalEncoderKind::Remote { endpoint } => Ok(Arc::new(RemoteEncoder::new(
            endpoint,
            config.api_key.clone(),
            config.remote_image_dimensions,
        )?)),
        #[cfg(feature = "local-models")]
        CrossModalEncoderKind::Clip => Ok(Arc::new(crate::encoders::ClipEncoder::new(
            &config.model_cache_dir,
        )?)),
        #[cfg(not(feature = "local-models"))]
        CrossModalEncoderKind::Clip => Err(EmbedError::Unsupported(
            "CLIP encoder requires the `local-models` feature".to_string(),
        )),
    }
}
