use crate::error::{RagError, Result};
use serde::Serialize;

/// A window of words taken from the document, identified by its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
}

/// Splits text into overlapping windows of `chunk_size` whitespace-delimited words.
///
/// Each window starts `chunk_size - overlap` words after the previous one, so
/// consecutive chunks share `overlap` words. The final chunk may be shorter.
pub fn chunk_words(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(RagError::InvalidConfig("chunk_size must be positive".into()));
    }
    if overlap >= chunk_size {
        return Err(RagError::InvalidConfig(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    let step = chunk_size - overlap;

    let chunks = (0..words.len())
        .step_by(step)
        .enumerate()
        .map(|(index, start)| {
            let end = start.saturating_add(chunk_size).min(words.len());
            Chunk {
                index,
                text: words[start..end].join(" "),
            }
        })
        .collect();

    Ok(chunks)
}
