//! Bounded-depth BFS crawler over plain HTTP.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use shiryo_core::domain::{is_document_url, NewNode};
use shiryo_core::ports::{CrawlError, CrawlOutcome, CrawlerPort};

use crate::page::{parse_page, PageContent};
use crate::prune::LlmPruner;
use crate::viz::render_tree;

/// Crawl bounds.
#[derive(Clone, Debug)]
pub struct CrawlSettings {
    /// Budget for one page fetch.
    pub page_timeout: Duration,
    /// Ceiling on discovered nodes per crawl.
    pub max_nodes: usize,
    /// Ceiling on links taken from one page.
    pub max_links_per_page: usize,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(30),
            max_nodes: 200,
            max_links_per_page: 60,
        }
    }
}

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Plain-HTTP crawler with an LLM pruning pass.
pub struct HttpCrawler {
    client: reqwest::Client,
    pruner: LlmPruner,
    settings: CrawlSettings,
}

/// A link waiting to be materialized as a node.
struct Frontier {
    parent_index: i64,
    parent_title: String,
    breadcrumb: String,
    url: String,
    anchor_text: String,
    depth: i64,
}

impl HttpCrawler {
    /// Build a crawler.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be constructed.
    pub fn new(pruner: LlmPruner, settings: CrawlSettings) -> Result<Self, CrawlError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(settings.page_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CrawlError::Navigation(e.to_string()))?;
        Ok(Self { client, pruner, settings })
    }

    async fn fetch_page(&self, url: &Url) -> Result<PageContent, CrawlError> {
        let response = self
            .client
            .get(url.as_str())
            .header("Accept-Language", "ja,en;q=0.9")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CrawlError::RenderTimeout(url.to_string())
                } else {
                    CrawlError::Navigation(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Navigation(format!("{url}: HTTP {status}")));
        }

        let html = response
            .text()
            .await
            .map_err(|e| CrawlError::Extraction(e.to_string()))?;
        Ok(parse_page(&html, url, self.settings.max_links_per_page))
    }
}

#[async_trait]
impl CrawlerPort for HttpCrawler {
    async fn crawl(
        &self,
        seed_url: &str,
        depth: u32,
        tag: &str,
    ) -> Result<CrawlOutcome, CrawlError> {
        let seed =
            Url::parse(seed_url).map_err(|e| CrawlError::Navigation(format!("{seed_url}: {e}")))?;

        let root_page = self.fetch_page(&seed).await?;
        if root_page.title.is_empty() && !root_page.has_text && root_page.links.is_empty() {
            return Err(CrawlError::NoContent);
        }

        let mut nodes = vec![NewNode {
            index: 0,
            parent_index: -1,
            depth: 0,
            title: root_page.title.clone(),
            breadcrumb: String::new(),
            url: seed.to_string(),
            parent_title: String::new(),
        }];
        let mut visited: HashSet<String> = HashSet::from([seed.to_string()]);

        let mut frontier: VecDeque<Frontier> = VecDeque::new();
        if depth >= 1 {
            for link in &root_page.links {
                frontier.push_back(Frontier {
                    parent_index: 0,
                    parent_title: root_page.title.clone(),
                    breadcrumb: String::new(),
                    url: link.url.clone(),
                    anchor_text: link.text.clone(),
                    depth: 1,
                });
            }
        }

        while let Some(item) = frontier.pop_front() {
            if nodes.len() >= self.settings.max_nodes {
                tracing::warn!(tag, max = self.settings.max_nodes, "node ceiling hit");
                break;
            }
            if !visited.insert(item.url.clone()) {
                continue;
            }

            let index = nodes.len() as i64;
            let breadcrumb = child_breadcrumb(&item.breadcrumb, &item.parent_title);
            let mut title = item.anchor_text.clone();

            let is_document = is_document_url(&item.url);
            let expandable = !is_document && (item.depth as u32) < depth;
            let mut child_links = Vec::new();

            if expandable {
                match Url::parse(&item.url) {
                    Ok(url) => match self.fetch_page(&url).await {
                        Ok(page) => {
                            if title.is_empty() {
                                title = page.title;
                            }
                            child_links = page.links;
                        }
                        // Inner pages that fail or time out are dropped;
                        // the crawl continues.
                        Err(e) => {
                            tracing::debug!(tag, url = %item.url, error = %e, "page skipped");
                        }
                    },
                    Err(e) => {
                        tracing::debug!(tag, url = %item.url, error = %e, "bad url skipped");
                    }
                }
            }

            nodes.push(NewNode {
                index,
                parent_index: item.parent_index,
                depth: item.depth,
                title: title.clone(),
                breadcrumb: breadcrumb.clone(),
                url: item.url.clone(),
                parent_title: item.parent_title.clone(),
            });

            for link in child_links {
                frontier.push_back(Frontier {
                    parent_index: index,
                    parent_title: title.clone(),
                    breadcrumb: breadcrumb.clone(),
                    url: link.url,
                    anchor_text: link.text,
                    depth: item.depth + 1,
                });
            }
        }

        let retained = self
            .pruner
            .prune(&nodes)
            .await
            .map_err(CrawlError::Pruning)?;

        let retained_set: HashSet<i64> = retained.iter().copied().collect();
        let raw_html = render_tree(&format!("{tag} topology"), &nodes, None);
        let pruned_html = render_tree(
            &format!("{tag} topology (pruned)"),
            &nodes,
            Some(&retained_set),
        );

        tracing::info!(
            tag,
            nodes = nodes.len(),
            retained = retained.len(),
            "crawl finished"
        );
        Ok(CrawlOutcome { nodes, retained, raw_html, pruned_html })
    }
}

/// Breadcrumb of a child: the parent's breadcrumb extended by the parent's
/// title.
fn child_breadcrumb(parent_breadcrumb: &str, parent_title: &str) -> String {
    match (parent_breadcrumb.is_empty(), parent_title.is_empty()) {
        (_, true) => parent_breadcrumb.to_string(),
        (true, false) => parent_title.to_string(),
        (false, false) => format!("{parent_breadcrumb} > {parent_title}"),
    }
}
