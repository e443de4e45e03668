//! The canonical eight-field file-name schema.
//!
//! Renamed files follow a fixed positional layout, `_`-delimited:
//!
//! ```text
//! {university}_{department}_{major}_{course}_{year}_{semester}_{doc_type}_{detail}.{ext}
//!        0           1        2       3       4        5          6          7
//! ```
//!
//! Every position is always present; absent values are the literal
//! `Unknown`. Underscores are the delimiter and are therefore forbidden
//! inside values.

use serde::{Deserialize, Serialize};

/// Placeholder written into positions the renamer could not determine.
pub const UNKNOWN_FIELD: &str = "Unknown";

/// Number of `_`-delimited positions in a canonical name.
pub const FIELD_COUNT: usize = 8;

/// The eight naming fields in positional order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredName {
    pub university: String,
    pub department: String,
    pub major: String,
    pub course: String,
    pub year: String,
    pub semester: String,
    pub doc_type: String,
    pub detail: String,
}

impl StructuredName {
    /// Compose the canonical file name for the given extension (no dot).
    ///
    /// Empty fields become `Unknown`; underscores inside values are turned
    /// into hyphens so positions stay parseable.
    #[must_use]
    pub fn compose(&self, extension: &str) -> String {
        let fields = [
            &self.university,
            &self.department,
            &self.major,
            &self.course,
            &self.year,
            &self.semester,
            &self.doc_type,
            &self.detail,
        ];
        let joined = fields
            .iter()
            .map(|f| field_value(f))
            .collect::<Vec<_>>()
            .join("_");
        format!("{joined}.{extension}")
    }

    /// Parse a canonical name back into fields.
    ///
    /// Returns `None` when the name does not carry exactly eight
    /// positions.
    #[must_use]
    pub fn parse(name: &str) -> Option<(Self, String)> {
        let (stem, ext) = name.rsplit_once('.')?;
        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() != FIELD_COUNT {
            return None;
        }
        Some((
            Self {
                university: parts[0].to_string(),
                department: parts[1].to_string(),
                major: parts[2].to_string(),
                course: parts[3].to_string(),
                year: parts[4].to_string(),
                semester: parts[5].to_string(),
                doc_type: parts[6].to_string(),
                detail: parts[7].to_string(),
            },
            ext.to_string(),
        ))
    }
}

fn field_value(raw: &str) -> String {
    let cleaned = raw.trim().replace('_', "-");
    if cleaned.is_empty() {
        UNKNOWN_FIELD.to_string()
    } else {
        cleaned
    }
}

/// Strip characters that are illegal in file names, collapse runs of `_`,
/// and trim leading/trailing underscores.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_underscore = false;
    for ch in name.chars() {
        let mapped = match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        };
        if mapped == '_' {
            if last_was_underscore {
                continue;
            }
            last_was_underscore = true;
        } else {
            last_was_underscore = false;
        }
        out.push(mapped);
    }
    out.trim_matches('_').to_string()
}
