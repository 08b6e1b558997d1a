//! Plain text from uploaded documents.

use crate::error::GenerationError;
use anyhow::{Context, Result};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Format from the upload's file name; extension match is case-insensitive.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())?;
        match ext.as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            _ => None,
        }
    }
}

/// Extracts the text of an uploaded document.
///
/// Unknown extensions, unreadable documents and documents without any text
/// are all reported as [`GenerationError::UnsupportedInput`].
pub async fn extract_text(bytes: Vec<u8>, file_name: &str) -> Result<String, GenerationError> {
    let format = DocumentFormat::from_file_name(file_name).ok_or_else(|| {
        GenerationError::UnsupportedInput(format!("unsupported file format: {file_name}"))
    })?;

    let text = tokio::task::spawn_blocking(move || match format {
        DocumentFormat::Pdf => pdf_text(&bytes),
        DocumentFormat::Docx => docx_text(&bytes),
    })
    .await
    .map_err(|e| GenerationError::UnsupportedInput(format!("document reader failed: {e}")))?
    .map_err(|e| GenerationError::UnsupportedInput(format!("{e:#}")))?;

    if text.trim().is_empty() {
        return Err(GenerationError::UnsupportedInput(format!(
            "no text found in {file_name}"
        )));
    }
    Ok(text)
}

fn pdf_text(bytes: &[u8]) -> Result<String> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes).context("Failed to read PDF")?;
    Ok(join_pages(&pages))
}

fn docx_text(bytes: &[u8]) -> Result<String> {
    let text = docx_lite::extract_text_from_bytes(bytes).context("Failed to read DOCX")?;
    Ok(text)
}

// Pages without text are skipped and the rest joined by a single newline.
// Lines inside a page are kept as is.
fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    pages
        .iter()
        .map(|page| page.as_ref().trim_matches(|c: char| c == '\n' || c == '\r'))
        .filter(|page| !page.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
