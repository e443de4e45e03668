//! Text extraction from downloaded documents.

mod ooxml;
mod pdf;

use async_trait::async_trait;

use shiryo_core::ports::{ExtractError, Extraction, ExtractorPort};

/// Extractor dispatching on file extension.
///
/// PDF goes through `lopdf`, DOCX and XLSX through their zip containers.
/// The legacy binary formats (`doc`, `xls`) have no parser here and are
/// reported unsupported. Parsing runs on the blocking pool; output is
/// truncated to `max_text_bytes`.
pub struct DocumentExtractor {
    /// PDF page cap.
    max_pages: usize,
    /// DOCX paragraph / XLSX string cap.
    max_paragraphs: usize,
    /// Output ceiling in bytes.
    max_text_bytes: usize,
}

impl DocumentExtractor {
    pub fn new(max_pages: usize, max_text_bytes: usize) -> Self {
        Self {
            max_pages: max_pages.max(1),
            // Roughly 25 paragraphs per page keeps DOCX output in line
            // with the PDF page cap
            max_paragraphs: max_pages.max(1) * 25,
            max_text_bytes,
        }
    }
}

impl Default for DocumentExtractor {
    fn default() -> Self {
        Self::new(2, 512 * 1024)
    }
}

#[async_trait]
impl ExtractorPort for DocumentExtractor {
    async fn extract(&self, bytes: &[u8], extension: &str) -> Result<Extraction, ExtractError> {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        let bytes = bytes.to_vec();
        let max_pages = self.max_pages;
        let max_paragraphs = self.max_paragraphs;

        // Parsing is CPU-bound; keep it off the async workers.
        let result = tokio::task::spawn_blocking(move || match extension.as_str() {
            "pdf" => pdf::extract_pdf(&bytes, max_pages),
            "docx" => ooxml::extract_docx(&bytes, max_paragraphs).map(|text| (text, None)),
            "xlsx" => ooxml::extract_xlsx(&bytes, max_paragraphs).map(|text| (text, None)),
            other => Err(ExtractError::Unsupported(other.to_string())),
        })
        .await
        .map_err(|e| ExtractError::Malformed {
            format: "document".to_string(),
            message: format!("extraction task panicked: {e}"),
        })?;

        let (text, pages) = result?;
        if text.trim().is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(Extraction {
            text: truncate_at_char_boundary(text, self.max_text_bytes),
            pages,
        })
    }
}

/// Truncate to at most `max_bytes`, never splitting a UTF-8 sequence.
fn truncate_at_char_boundary(mut text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }
    let mut cut = max_bytes;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text
}
