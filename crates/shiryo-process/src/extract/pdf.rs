//! PDF text extraction via `lopdf`.

use shiryo_core::ports::ExtractError;

/// Extract text from the first `max_pages` pages.
///
/// Returns the text and the total page count. Pages that fail to decode
/// contribute nothing rather than failing the document.
pub fn extract_pdf(
    bytes: &[u8],
    max_pages: usize,
) -> Result<(String, Option<usize>), ExtractError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractError::Malformed {
        format: "pdf".to_string(),
        message: e.to_string(),
    })?;

    let mut pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    pages.sort_unstable();
    let page_count = pages.len();

    let mut text = String::new();
    for page in pages.into_iter().take(max_pages) {
        let page_text = doc.extract_text(&[page]).unwrap_or_default();
        text.push_str(&page_text);
        if !page_text.is_empty() && !page_text.ends_with('\n') {
            text.push('\n');
        }
    }

    Ok((text, Some(page_count)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Stream};

    /// Build a minimal one-page PDF containing `text`.
    fn pdf_with_text(text: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.4");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let content = format!(
            "BT /F1 12 Tf 100 700 Td ({}) Tj ET",
            text.replace('\\', "\\\\")
                .replace('(', "\\(")
                .replace(')', "\\)")
        );
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });

        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        });

        if let Ok(page) = doc.get_object_mut(page_id) {
            if let Ok(dict) = page.as_dict_mut() {
                dict.set("Parent", pages_id);
            }
        }

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn extracts_text_and_page_count() {
        let bytes = pdf_with_text("Admissions Guide 2025");
        let (text, pages) = extract_pdf(&bytes, 2).unwrap();
        assert!(text.contains("Admissions Guide 2025"));
        assert_eq!(pages, Some(1));
    }

    #[test]
    fn rejects_non_pdf_bytes() {
        let result = extract_pdf(b"<html>not a pdf</html>", 2);
        assert!(matches!(result, Err(ExtractError::Malformed { .. })));
    }
}
