use anyhow::{bail, Context, Result};
use lopdf::Document;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Pulls the plain text out of an uploaded file.
///
/// PDFs contribute the text of every page in page order; anything else is
/// read as UTF-8 text.
pub fn extract_text(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let is_pdf = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        extract_pdf_text(path)
    } else {
        load_document(path)
    }
}

/// Concatenates the text of all pages of a PDF, one page per line block.
pub fn extract_pdf_text(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let document =
        Document::load(path).with_context(|| format!("Failed to open PDF {:?}", path))?;
    pdf_document_text(&document).with_context(|| format!("Failed to extract text from {:?}", path))
}

fn pdf_document_text(document: &Document) -> Result<String> {
    let pages: Vec<u32> = document.get_pages().keys().copied().collect();
    let mut text = String::new();
    for page in &pages {
        let page_text = document
            .extract_text(&[*page])
            .with_context(|| format!("page {}", page))?;
        text.push_str(&page_text);
        if !text.ends_with(char::is_whitespace) {
            text.push('\n');
        }
    }
    debug!(pages = pages.len(), chars = text.len(), "extracted PDF text");
    Ok(text)
}

/// Reads an already extracted document as UTF-8 text.
pub fn load_document(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    if !path.is_file() {
        bail!("{:?} is not a file", path);
    }
    let bytes = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    String::from_utf8(bytes).with_context(|| format!("{:?} is not valid UTF-8 text", path))
}

/// Shortens `text` to at most `max_chars` characters for display.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
