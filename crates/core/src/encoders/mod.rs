#[cfg(feature = "local-models")]
pub mod local;
pub mod ngram;
pub mod palette;
pub mod remote;

#[cfg(feature = "local-models")]
pub use local::{ClipEncoder, LocalTextEncoder};
pub use ngram::CharacterNgramEmbedder;
pub use palette::PaletteEncoder;
pub use remote::RemoteEncoder;

use crate::error::EmbedError;
use image::{ImageFormat, RgbImage};
use std::io::Cursor;

/// Re-encodes a decoded image as PNG bytes for encoders that take files.
pub(crate) fn encode_png(image: &RgbImage) -> Result<Vec<u8>, EmbedError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}
