use crate::embeddings::{normalize, TextEncoder, DEFAULT_EMBEDDING_DIMENSIONS};
use crate::error::EmbedError;
use async_trait::async_trait;

/// Hashed character-trigram bag, L2-normalized. Deterministic and model-free.
///
/// Text is padded with boundary spaces before windowing, so short labels such
/// as `CV` still produce a unit vector. Only blank input maps to zero.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        if lowered.trim().is_empty() {
            return vector;
        }
        let padded = format!("  {lowered} ");
        let chars: Vec<char> = padded.chars().collect();

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl TextEncoder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }
}
