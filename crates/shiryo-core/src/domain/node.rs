//! Nodes: URLs discovered during a crawl, forming a tree per task.

/// Extensions (without the dot) the pipeline recognizes as downloadable
/// documents.
pub const DOCUMENT_EXTENSIONS: [&str; 5] = ["pdf", "doc", "docx", "xls", "xlsx"];

/// The document extension of a URL, if it ends in one.
///
/// Matching ignores case and any query string or fragment.
#[must_use]
pub fn document_extension(url: &str) -> Option<&'static str> {
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .to_ascii_lowercase();
    DOCUMENT_EXTENSIONS
        .iter()
        .find(|ext| {
            path.rsplit_once('.')
                .is_some_and(|(_, tail)| tail == **ext)
        })
        .copied()
}

/// Whether a URL points at a downloadable document.
#[must_use]
pub fn is_document_url(url: &str) -> bool {
    document_extension(url).is_some()
}

/// A node as produced by the crawler, before it is persisted.
///
/// `index` is a total order starting at 0 for the root; the root carries
/// `parent_index = -1`. The catalog rejects nodes violating
/// `parent_index < index ∨ parent_index = -1` so malformed crawler output
/// can never form a cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewNode {
    pub index: i64,
    pub parent_index: i64,
    pub depth: i64,
    pub title: String,
    pub breadcrumb: String,
    pub url: String,
    pub parent_title: String,
}

impl NewNode {
    /// Validate the parent-ordering invariant.
    #[must_use]
    pub const fn has_valid_parent(&self) -> bool {
        self.parent_index == -1 || self.parent_index < self.index
    }
}

/// A persisted node row.
#[derive(Clone, Debug)]
pub struct NodeRecord {
    pub id: i64,
    pub task_id: i64,
    pub node_index: i64,
    pub parent_index: i64,
    pub depth: i64,
    pub title: String,
    pub breadcrumb: String,
    pub url: String,
    pub parent_title: String,
    /// Set only by the pruning pass; batch inserts never touch it.
    pub is_pruned: bool,
    pub is_file: bool,
    pub file_extension: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_document_extensions() {
        assert_eq!(document_extension("http://u.example/a/yoko.pdf"), Some("pdf"));
        assert_eq!(document_extension("http://u.example/a/YOKO.PDF"), Some("pdf"));
        assert_eq!(document_extension("http://u.example/guide.docx"), Some("docx"));
        assert_eq!(document_extension("http://u.example/list.xlsx"), Some("xlsx"));
        assert_eq!(document_extension("http://u.example/old.doc"), Some("doc"));
        assert_eq!(document_extension("http://u.example/old.xls"), Some("xls"));
    }

    #[test]
    fn ignores_query_and_fragment() {
        assert_eq!(
            document_extension("http://u.example/yoko.pdf?ver=2#page=3"),
            Some("pdf")
        );
    }

    #[test]
    fn rejects_non_documents() {
        assert!(!is_document_url("http://u.example/admissions"));
        assert!(!is_document_url("http://u.example/index.html"));
        assert!(!is_document_url("http://u.example/archive.pdf.zip"));
        // Extension must terminate the path, not merely appear in it
        assert!(!is_document_url("http://u.example/pdf/list"));
    }

    #[test]
    fn parent_ordering_invariant() {
        let root = NewNode {
            index: 0,
            parent_index: -1,
            depth: 0,
            title: String::new(),
            breadcrumb: String::new(),
            url: String::new(),
            parent_title: String::new(),
        };
        assert!(root.has_valid_parent());

        let child = NewNode { index: 3, parent_index: 0, ..root.clone() };
        assert!(child.has_valid_parent());

        let bad = NewNode { index: 2, parent_index: 5, ..root };
        assert!(!bad.has_valid_parent());
    }
}
