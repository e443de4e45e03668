//! OOXML (DOCX/XLSX) text extraction via the zip container.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use shiryo_core::ports::ExtractError;

/// Extract paragraph text from `word/document.xml`, up to
/// `max_paragraphs` paragraphs.
pub fn extract_docx(bytes: &[u8], max_paragraphs: usize) -> Result<String, ExtractError> {
    let xml = read_zip_entry(bytes, "word/document.xml", "docx")?;
    collect_text(&xml, b"w:t", Some(b"w:p"), max_paragraphs, "docx")
}

/// Extract the shared-string table from `xl/sharedStrings.xml`, up to
/// `max_strings` entries.
pub fn extract_xlsx(bytes: &[u8], max_strings: usize) -> Result<String, ExtractError> {
    let xml = read_zip_entry(bytes, "xl/sharedStrings.xml", "xlsx")?;
    collect_text(&xml, b"t", Some(b"si"), max_strings, "xlsx")
}

fn read_zip_entry(bytes: &[u8], entry: &str, format: &str) -> Result<String, ExtractError> {
    let malformed = |message: String| ExtractError::Malformed {
        format: format.to_string(),
        message,
    };

    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| malformed(e.to_string()))?;
    let mut file = archive
        .by_name(entry)
        .map_err(|e| malformed(format!("{entry}: {e}")))?;
    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|e| malformed(e.to_string()))?;
    Ok(xml)
}

/// Collect the text content of every `text_element`, inserting a newline
/// at each closing `break_element`, stopping after `max_blocks` blocks.
fn collect_text(
    xml: &str,
    text_element: &[u8],
    break_element: Option<&[u8]>,
    max_blocks: usize,
    format: &str,
) -> Result<String, ExtractError> {
    let mut reader = Reader::from_str(xml);

    let mut out = String::new();
    let mut capturing = false;
    let mut blocks = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == text_element => capturing = true,
            Ok(Event::End(e)) => {
                if e.name().as_ref() == text_element {
                    capturing = false;
                } else if break_element.is_some_and(|b| e.name().as_ref() == b) {
                    if !out.ends_with('\n') && !out.is_empty() {
                        out.push('\n');
                    }
                    blocks += 1;
                    if blocks >= max_blocks {
                        break;
                    }
                }
            }
            Ok(Event::Text(t)) if capturing => {
                let fragment = t.unescape().map_err(|e| ExtractError::Malformed {
                    format: format.to_string(),
                    message: e.to_string(),
                })?;
                out.push_str(&fragment);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ExtractError::Malformed {
                    format: format.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    Ok(out)
}
