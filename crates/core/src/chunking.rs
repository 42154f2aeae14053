use crate::error::IngestError;
use crate::models::{PageChunk, ParsedDocument};
use serde::{Deserialize, Serialize};

/// Windows whose stripped text is this short or shorter are dropped.
pub const MIN_CHUNK_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    pub min_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            overlap: 150,
            min_chars: MIN_CHUNK_CHARS,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be positive".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than chunk size {}",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// A half-open `[start, end)` character range of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

/// Every sliding window over a text of `text_len` characters, substantive or not.
pub fn sliding_windows(text_len: usize, config: &ChunkingConfig) -> Result<Vec<Window>, IngestError> {
    config.validate()?;

    let mut windows = Vec::new();
    if text_len == 0 {
        return Ok(windows);
    }

    let mut start = 0;
    loop {
        let end = (start + config.chunk_size).min(text_len);
        windows.push(Window { start, end });
        if end == text_len {
            break;
        }
        start += config.stride();
    }

    Ok(windows)
}

/// Windows of one page that pass the substantiveness threshold, with their text.
pub fn chunk_page(text: &str, config: &ChunkingConfig) -> Result<Vec<(Window, String)>, IngestError> {
    let chars: Vec<char> = text.chars().collect();
    let windows = sliding_windows(chars.len(), config)?;

    Ok(windows
        .into_iter()
        .filter_map(|window| {
            let piece: String = chars[window.start..window.end].iter().collect();
            if piece.trim().chars().count() > config.min_chars {
                Some((window, piece))
            } else {
                None
            }
        })
        .collect())
}

/// Chunks every page in order. Sequence indices run across the whole document
/// and page numbers are 1-based. Whitespace-only pages yield no chunks but
/// still take part in the newline-joined full text.
pub fn build_chunks<S: AsRef<str>>(
    pages: &[S],
    config: &ChunkingConfig,
) -> Result<ParsedDocument, IngestError> {
    let mut chunks = Vec::new();

    for (page_index, page) in pages.iter().enumerate() {
        let text = page.as_ref();
        if text.trim().is_empty() {
            continue;
        }

        for (window, piece) in chunk_page(text, config)? {
            chunks.push(PageChunk {
                sequence_index: chunks.len(),
                page_id: (page_index + 1) as u32,
                char_start: window.start,
                char_end: window.end,
                text: piece,
            });
        }
    }

    let full_text = pages
        .iter()
        .map(|page| page.as_ref())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(ParsedDocument { full_text, chunks })
}
