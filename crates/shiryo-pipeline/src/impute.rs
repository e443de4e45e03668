//! The end-of-task imputation pass.
//!
//! Files of one task come from one school's pages, so fields the model
//! could not read from one document can be borrowed from its siblings.
//! Only the first three name positions (university, department, major)
//! are imputed; the most common non-`Unknown` value wins.

use std::collections::HashMap;

use shiryo_core::domain::{FileRecord, UNKNOWN_FIELD};
use shiryo_llm::extract_json_object;

/// A name rewrite produced by the pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImputedName {
    pub file_id: i64,
    pub new_name: String,
}

/// Positions 0..=2 of the canonical name, in order.
const IMPUTABLE_KEYS: [&str; 3] = ["university", "department", "major"];

/// Compute the name rewrites for a task's named files.
///
/// Reads each file's raw LLM response, tallies the known values per
/// field, and fills `Unknown` occurrences in positions 0-2 of the stored
/// names. Files without a usable raw response contribute nothing.
#[must_use]
pub fn impute_unknown_fields(files: &[FileRecord]) -> Vec<ImputedName> {
    let fill: Vec<Option<String>> = IMPUTABLE_KEYS
        .iter()
        .enumerate()
        .map(|(position, key)| most_common_value(files, key, position))
        .collect();

    if fill.iter().all(Option::is_none) {
        return Vec::new();
    }

    let mut rewrites = Vec::new();
    for file in files {
        let Some(renamed) = file.renamed_name.as_deref() else {
            continue;
        };
        if !renamed.contains(UNKNOWN_FIELD) {
            continue;
        }

        let (stem, extension) = match renamed.rsplit_once('.') {
            Some((stem, ext)) => (stem, Some(ext)),
            None => (renamed, None),
        };
        let mut parts: Vec<&str> = stem.split('_').collect();
        let mut changed = false;
        for (position, value) in fill.iter().enumerate() {
            let Some(value) = value else { continue };
            if parts.get(position).copied() == Some(UNKNOWN_FIELD) {
                parts[position] = value;
                changed = true;
            }
        }
        if !changed {
            continue;
        }

        let new_name = match extension {
            Some(ext) => format!("{}.{ext}", parts.join("_")),
            None => parts.join("_"),
        };
        if new_name != renamed {
            rewrites.push(ImputedName {
                file_id: file.id,
                new_name,
            });
        }
    }
    rewrites
}

/// Most common usable value of `key` across the task's raw responses.
///
/// `Unknown` and empty values never count; for majors the catch-all
/// `全専攻` is ignored too. Ties break toward the value seen first.
fn most_common_value(files: &[FileRecord], key: &str, position: usize) -> Option<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut order = 0usize;

    for file in files {
        let Some(raw) = file.llm_raw_response.as_deref() else {
            continue;
        };
        let Some(value) = extract_json_object(raw) else {
            continue;
        };
        let Some(field) = value.get(key).and_then(serde_json::Value::as_str) else {
            continue;
        };
        let field = field.trim();
        if field.is_empty() || field == UNKNOWN_FIELD {
            continue;
        }
        if position == 2 && field == "全専攻" {
            continue;
        }
        let entry = counts.entry(field.to_string()).or_insert((0, order));
        entry.0 += 1;
        order += 1;
    }

    counts
        .into_iter()
        .max_by(|a, b| {
            a.1 .0
                .cmp(&b.1 .0)
                .then_with(|| b.1 .1.cmp(&a.1 .1))
        })
        .map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shiryo_core::domain::{DownloadStatus, ProcessStatus};

    fn file(id: i64, renamed: Option<&str>, raw: Option<&str>) -> FileRecord {
        FileRecord {
            id,
            task_id: 1,
            node_id: id,
            original_url: format!("http://u.example/{id}.pdf"),
            original_name: format!("{id}.pdf"),
            renamed_name: renamed.map(str::to_string),
            file_extension: "pdf".to_string(),
            file_size: Some(1024),
            storage_key: None,
            download_status: DownloadStatus::Downloaded,
            process_status: ProcessStatus::Completed,
            llm_model: Some("m".to_string()),
            llm_confidence: Some(0.8),
            llm_raw_response: raw.map(str::to_string),
            error_message: None,
            created_at: Utc::now(),
        }
    }

    const TOKYO: &str = r#"{"university":"東京大学","department":"理学系研究科","major":"物理学専攻"}"#;

    #[test]
    fn fills_unknown_positions_from_siblings() {
        let files = vec![
            file(
                1,
                Some("東京大学_理学系研究科_物理学専攻_修士_2025_4月_要項_A.pdf"),
                Some(TOKYO),
            ),
            file(
                2,
                Some("東京大学_理学系研究科_物理学専攻_修士_2025_4月_要項_B.pdf"),
                Some(TOKYO),
            ),
            file(
                3,
                Some("Unknown_Unknown_Unknown_修士_2025_4月_要項_C.pdf"),
                Some(r#"{"university":"Unknown","department":"Unknown","major":"Unknown"}"#),
            ),
        ];
        let rewrites = impute_unknown_fields(&files);
        assert_eq!(rewrites.len(), 1);
        assert_eq!(rewrites[0].file_id, 3);
        assert_eq!(
            rewrites[0].new_name,
            "東京大学_理学系研究科_物理学専攻_修士_2025_4月_要項_C.pdf"
        );
    }

    #[test]
    fn majority_value_wins() {
        let kyoto = r#"{"university":"京都大学"}"#;
        let files = vec![
            file(1, Some("京都大学_a_b_c_d_e_f_g.pdf"), Some(kyoto)),
            file(2, Some("京都大学_a_b_c_d_e_f_g.pdf"), Some(kyoto)),
            file(3, Some("東京大学_a_b_c_d_e_f_g.pdf"), Some(TOKYO)),
            file(4, Some("Unknown_a_b_c_d_e_f_g.pdf"), Some(r#"{}"#)),
        ];
        let rewrites = impute_unknown_fields(&files);
        assert_eq!(rewrites.len(), 1);
        assert!(rewrites[0].new_name.starts_with("京都大学_"));
    }

    #[test]
    fn all_unknown_task_changes_nothing() {
        let raw = r#"{"university":"Unknown","department":"","major":"Unknown"}"#;
        let files = vec![
            file(1, Some("Unknown_Unknown_Unknown_c_d_e_f_g.pdf"), Some(raw)),
            file(2, Some("Unknown_Unknown_Unknown_c_d_e_f_g.pdf"), Some(raw)),
        ];
        assert!(impute_unknown_fields(&files).is_empty());
    }

    #[test]
    fn catch_all_major_is_not_borrowed() {
        let raw = r#"{"university":"東京大学","major":"全専攻"}"#;
        let files = vec![
            file(1, Some("東京大学_a_全専攻_c_d_e_f_g.pdf"), Some(raw)),
            file(2, Some("Unknown_a_Unknown_c_d_e_f_g.pdf"), Some(raw)),
        ];
        let rewrites = impute_unknown_fields(&files);
        assert_eq!(rewrites.len(), 1);
        // University fills, major does not
        assert_eq!(rewrites[0].new_name, "東京大学_a_Unknown_c_d_e_f_g.pdf");
    }

    #[test]
    fn names_without_unknown_are_untouched() {
        let files = vec![
            file(1, Some("東京大学_a_b_c_d_e_f_g.pdf"), Some(TOKYO)),
            file(2, None, Some(TOKYO)),
        ];
        assert!(impute_unknown_fields(&files).is_empty());
    }

    #[test]
    fn prose_wrapped_raw_responses_still_count() {
        let raw = "結果:\n```json\n{\"university\":\"東北大学\"}\n```";
        let files = vec![
            file(1, Some("東北大学_a_b_c_d_e_f_g.pdf"), Some(raw)),
            file(2, Some("Unknown_a_b_c_d_e_f_g.pdf"), Some(raw)),
        ];
        let rewrites = impute_unknown_fields(&files);
        assert_eq!(rewrites.len(), 1);
        assert!(rewrites[0].new_name.starts_with("東北大学_"));
    }
}
