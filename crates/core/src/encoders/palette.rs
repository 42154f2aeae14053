//! A small cross-modal encoder over named colors.
//!
//! Images map to a histogram of nearest palette colors; text maps to the
//! color words it mentions. Both land in the same space, so "a red car"
//! ranks predominantly red images first.

use crate::embeddings::{normalize, CrossModalEncoder};
use crate::error::EmbedError;
use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::RgbImage;

pub struct PaletteColor {
    pub name: &'static str,
    pub rgb: [u8; 3],
    pub words: &'static [&'static str],
}

pub const PALETTE: [PaletteColor; 12] = [
    PaletteColor { name: "black", rgb: [0, 0, 0], words: &["black", "dark", "night"] },
    PaletteColor { name: "white", rgb: [255, 255, 255], words: &["white", "snow", "ivory"] },
    PaletteColor { name: "gray", rgb: [128, 128, 128], words: &["gray", "grey", "silver"] },
    PaletteColor { name: "red", rgb: [255, 0, 0], words: &["red", "crimson", "scarlet"] },
    PaletteColor { name: "orange", rgb: [255, 165, 0], words: &["orange", "amber"] },
    PaletteColor { name: "yellow", rgb: [255, 255, 0], words: &["yellow", "gold", "golden"] },
    PaletteColor { name: "green", rgb: [0, 128, 0], words: &["green", "lime", "forest", "grass"] },
    PaletteColor { name: "blue", rgb: [0, 0, 255], words: &["blue", "navy", "azure", "sky"] },
    PaletteColor { name: "purple", rgb: [128, 0, 128], words: &["purple", "violet", "magenta"] },
    PaletteColor { name: "pink", rgb: [255, 192, 203], words: &["pink", "rose"] },
    PaletteColor { name: "brown", rgb: [139, 69, 19], words: &["brown", "wood", "chocolate"] },
    PaletteColor { name: "cyan", rgb: [0, 255, 255], words: &["cyan", "teal", "turquoise"] },
];

const THUMBNAIL_SIDE: u32 = 32;

#[derive(Debug, Default, Clone, Copy)]
pub struct PaletteEncoder;

impl PaletteEncoder {
    pub fn embed_image(&self, image: &RgbImage) -> Vec<f32> {
        let mut histogram = vec![0f32; PALETTE.len()];
        if image.width() == 0 || image.height() == 0 {
            return histogram;
        }

        let small = if image.width() > THUMBNAIL_SIDE || image.height() > THUMBNAIL_SIDE {
            imageops::resize(image, THUMBNAIL_SIDE, THUMBNAIL_SIDE, FilterType::Triangle)
        } else {
            image.clone()
        };

        for pixel in small.pixels() {
            histogram[nearest_color(pixel.0)] += 1.0;
        }

        normalize(&mut histogram);
        histogram
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut counts = vec![0f32; PALETTE.len()];
        let lowered = text.to_lowercase();

        for token in lowered.split(|c: char| !c.is_alphanumeric()) {
            if let Some(index) = PALETTE
                .iter()
                .position(|color| color.words.contains(&token))
            {
                counts[index] += 1.0;
            }
        }

        normalize(&mut counts);
        counts
    }
}

fn nearest_color(rgb: [u8; 3]) -> usize {
    let mut best = 0;
    let mut best_distance = u32::MAX;

    for (index, color) in PALETTE.iter().enumerate() {
        let distance = rgb
            .iter()
            .zip(color.rgb.iter())
            .map(|(a, b)| {
                let delta = *a as i32 - *b as i32;
                (delta * delta) as u32
            })
            .sum::<u32>();
        if distance < best_distance {
            best = index;
            best_distance = distance;
        }
    }

    best
}

#[async_trait]
impl CrossModalEncoder for PaletteEncoder {
    fn dimensions(&self) -> usize {
        PALETTE.len()
    }

    async fn embed_images(&self, images: &[RgbImage]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(images.iter().map(|image| self.embed_image(image)).collect())
    }

    async fn embed_text_for_image_space(
        &self,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}
