//! LLM pruning pass: which discovered nodes are admissions-relevant.

use std::collections::HashSet;
use std::sync::Arc;

use shiryo_core::domain::{is_document_url, NewNode};
use shiryo_llm::{extract_int_array, ChatBackend};

const PRUNE_PROMPT_HEADER: &str = "あなたは日本の大学サイトを調査しています。\
以下は入試情報ページから辿れたリンクの一覧です。\
入学試験に関係するページ（募集要項、出願、過去問、合格発表、説明会など）の\
番号だけをJSON配列で出力してください。関係のないページ（アクセス、教員紹介、\
ニュース、English等）は含めないでください。\n\n";

/// Selects the admissions-relevant subset of a crawl.
pub struct LlmPruner {
    backend: Arc<dyn ChatBackend>,
}

impl LlmPruner {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    /// Ask the model which node indices to retain.
    ///
    /// The root and every document node are always retained on top of the
    /// model's answer; out-of-range indices in the answer are dropped.
    pub async fn prune(&self, nodes: &[NewNode]) -> Result<Vec<i64>, String> {
        let mut retained: HashSet<i64> = nodes
            .iter()
            .filter(|node| node.index == 0 || is_document_url(&node.url))
            .map(|node| node.index)
            .collect();

        // Only HTML pages need a judgement call
        let candidates: Vec<&NewNode> = nodes
            .iter()
            .filter(|node| node.index != 0 && !is_document_url(&node.url))
            .collect();

        if !candidates.is_empty() {
            let prompt = build_prompt(&candidates);
            let answer = self
                .backend
                .complete(&prompt)
                .await
                .map_err(|e| e.to_string())?;
            let picked = extract_int_array(&answer)
                .ok_or_else(|| format!("no index array in pruning answer: {answer:.120}"))?;

            let valid: HashSet<i64> = candidates.iter().map(|node| node.index).collect();
            retained.extend(picked.into_iter().filter(|index| valid.contains(index)));
        }

        let mut result: Vec<i64> = retained.into_iter().collect();
        result.sort_unstable();
        Ok(result)
    }
}

fn build_prompt(candidates: &[&NewNode]) -> String {
    let mut prompt = String::from(PRUNE_PROMPT_HEADER);
    for node in candidates {
        let title = if node.title.is_empty() { "(無題)" } else { &node.title };
        prompt.push_str(&format!("{}: {} — {}\n", node.index, title, node.url));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiryo_llm::CannedBackend;

    fn node(index: i64, url: &str, title: &str) -> NewNode {
        NewNode {
            index,
            parent_index: if index == 0 { -1 } else { 0 },
            depth: i64::from(index != 0),
            title: title.to_string(),
            breadcrumb: String::new(),
            url: url.to_string(),
            parent_title: String::new(),
        }
    }

    fn sample_nodes() -> Vec<NewNode> {
        vec![
            node(0, "http://u.example/admission", "入試情報"),
            node(1, "http://u.example/admission/guide", "受験案内"),
            node(2, "http://u.example/access", "アクセス"),
            node(3, "http://u.example/admission/yoko.pdf", "募集要項"),
        ]
    }

    #[tokio::test]
    async fn retains_model_picks_plus_root_and_documents() {
        let pruner = LlmPruner::new(Arc::new(CannedBackend::new(vec!["残すべきは [1] です"])));
        let retained = pruner.prune(&sample_nodes()).await.unwrap();
        // Root (0) and the PDF (3) are always in; the model added 1
        assert_eq!(retained, vec![0, 1, 3]);
    }

    #[tokio::test]
    async fn out_of_range_indices_are_dropped() {
        let pruner = LlmPruner::new(Arc::new(CannedBackend::new(vec!["[1, 7, -2]"])));
        let retained = pruner.prune(&sample_nodes()).await.unwrap();
        assert_eq!(retained, vec![0, 1, 3]);
    }

    #[tokio::test]
    async fn empty_pick_keeps_only_root_and_documents() {
        let pruner = LlmPruner::new(Arc::new(CannedBackend::new(vec!["[]"])));
        let retained = pruner.prune(&sample_nodes()).await.unwrap();
        assert_eq!(retained, vec![0, 3]);
    }

    #[tokio::test]
    async fn root_only_crawl_skips_the_model() {
        // No HTML candidates: the backend would fail if called
        let pruner = LlmPruner::new(Arc::new(CannedBackend::failing()));
        let nodes = vec![node(0, "http://u.example/admission", "入試情報")];
        let retained = pruner.prune(&nodes).await.unwrap();
        assert_eq!(retained, vec![0]);
    }

    #[tokio::test]
    async fn unusable_answer_is_an_error() {
        let pruner = LlmPruner::new(Arc::new(CannedBackend::new(vec!["わかりません"])));
        assert!(pruner.prune(&sample_nodes()).await.is_err());
    }
}
