//! HTML page parsing: title and outgoing links.

use scraper::{Html, Selector};
use url::Url;

/// One outgoing link, absolutized against the page URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageLink {
    pub url: String,
    /// Anchor text, whitespace-collapsed; may be empty.
    pub text: String,
}

/// What the crawler keeps from a fetched page.
#[derive(Clone, Debug, Default)]
pub struct PageContent {
    pub title: String,
    pub links: Vec<PageLink>,
    /// Whether the body carried any visible text at all.
    pub has_text: bool,
}

/// Parse a page and resolve its links against `base`.
///
/// Only http(s) links on the seed's own site survive: a link is kept when
/// its host contains the base host, so campus subdomains stay while
/// off-site links (portals, social media, other universities) are
/// dropped. Fragments are stripped; duplicates (after stripping) are
/// collapsed to the first occurrence. `max_links` bounds runaway
/// navigation pages.
#[must_use]
pub fn parse_page(html: &str, base: &Url, max_links: usize) -> PageContent {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let has_text = document
        .root_element()
        .text()
        .any(|t| !t.trim().is_empty());

    let base_host = base.host_str().unwrap_or_default();
    let anchor = Selector::parse("a[href]").expect("static selector");
    let mut links = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for element in document.select(&anchor) {
        if links.len() >= max_links {
            break;
        }
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with("javascript:")
        {
            continue;
        }
        let Ok(mut resolved) = base.join(href) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        if base_host.is_empty()
            || !resolved
                .host_str()
                .is_some_and(|host| host.contains(base_host))
        {
            continue;
        }
        resolved.set_fragment(None);
        let url = resolved.to_string();
        if !seen.insert(url.clone()) {
            continue;
        }
        let text = collapse_whitespace(&element.text().collect::<String>());
        links.push(PageLink { url, text });
    }

    PageContent { title, links, has_text }
}

fn extract_title(document: &Html) -> String {
    let title_selector = Selector::parse("title").expect("static selector");
    let h1_selector = Selector::parse("h1").expect("static selector");

    for selector in [&title_selector, &h1_selector] {
        if let Some(element) = document.select(selector).next() {
            let text = collapse_whitespace(&element.text().collect::<String>());
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<!DOCTYPE html>
<html><head><title>  入試情報 | 東京大学  </title></head>
<body>
  <h1>入試情報</h1>
  <a href="/admission/guide.html">受験案内</a>
  <a href="yoko.pdf">募集要項 (PDF)</a>
  <a href="https://other.example/page">外部リンク</a>
  <a href="https://grad.u.example/nyushi">大学院入試</a>
  <a href="#section">ページ内</a>
  <a href="mailto:nyushi@u.example">お問い合わせ</a>
  <a href="javascript:void(0)">メニュー</a>
  <a href="/admission/guide.html#faq">受験案内(再掲)</a>
</body></html>"##;

    fn base() -> Url {
        Url::parse("http://u.example/admission/").unwrap()
    }

    #[test]
    fn extracts_title_and_links() {
        let page = parse_page(PAGE, &base(), 50);
        assert_eq!(page.title, "入試情報 | 東京大学");
        assert!(page.has_text);

        let urls: Vec<&str> = page.links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "http://u.example/admission/guide.html",
                "http://u.example/admission/yoko.pdf",
                "https://grad.u.example/nyushi",
            ]
        );
        assert_eq!(page.links[1].text, "募集要項 (PDF)");
    }

    #[test]
    fn off_site_links_are_dropped() {
        let page = parse_page(PAGE, &base(), 50);
        assert!(page.links.iter().all(|l| !l.url.contains("other.example")));
    }

    #[test]
    fn subdomains_of_the_seed_host_survive() {
        let page = parse_page(PAGE, &base(), 50);
        assert!(page
            .links
            .iter()
            .any(|l| l.url == "https://grad.u.example/nyushi"));
    }

    #[test]
    fn fragments_are_stripped_and_deduped() {
        let page = parse_page(PAGE, &base(), 50);
        // guide.html#faq collapses into the earlier guide.html
        assert_eq!(
            page.links
                .iter()
                .filter(|l| l.url.contains("guide.html"))
                .count(),
            1
        );
    }

    #[test]
    fn link_cap_applies() {
        let page = parse_page(PAGE, &base(), 1);
        assert_eq!(page.links.len(), 1);
    }

    #[test]
    fn falls_back_to_h1_when_title_missing() {
        let html = "<html><body><h1>募集要項</h1><p>text</p></body></html>";
        let page = parse_page(html, &base(), 50);
        assert_eq!(page.title, "募集要項");
    }

    #[test]
    fn empty_page_has_no_text() {
        let page = parse_page("<html><body></body></html>", &base(), 50);
        assert!(!page.has_text);
        assert!(page.links.is_empty());
        assert!(page.title.is_empty());
    }
}
