//! Topology visualization: the crawl tree as a standalone HTML page.

use std::collections::{HashMap, HashSet};

use shiryo_core::domain::NewNode;

/// Render the node tree as nested lists. With `retained` set, nodes
/// outside it are omitted (children of omitted nodes stay visible when
/// themselves retained, re-rooted under their nearest kept ancestor).
#[must_use]
pub fn render_tree(title: &str, nodes: &[NewNode], retained: Option<&HashSet<i64>>) -> String {
    let mut children: HashMap<i64, Vec<&NewNode>> = HashMap::new();
    for node in nodes {
        children.entry(node.parent_index).or_default().push(node);
    }
    for siblings in children.values_mut() {
        siblings.sort_by_key(|node| node.index);
    }

    let mut body = String::new();
    render_level(&children, -1, retained, &mut body);

    format!(
        "<!DOCTYPE html>\n<html lang=\"ja\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n\
         <style>body{{font-family:sans-serif}}li.file{{font-weight:bold}}</style>\n\
         </head>\n<body>\n<h1>{}</h1>\n{}</body>\n</html>\n",
        escape(title),
        escape(title),
        body
    )
}

fn render_level(
    children: &HashMap<i64, Vec<&NewNode>>,
    parent: i64,
    retained: Option<&HashSet<i64>>,
    out: &mut String,
) {
    let Some(siblings) = children.get(&parent) else {
        return;
    };

    let mut opened = false;
    for node in siblings {
        let keep = retained.is_none_or(|set| set.contains(&node.index));
        if keep {
            if !opened {
                out.push_str("<ul>\n");
                opened = true;
            }
            let class = if shiryo_core::domain::is_document_url(&node.url) {
                " class=\"file\""
            } else {
                ""
            };
            let label = if node.title.is_empty() { &node.url } else { &node.title };
            out.push_str(&format!(
                "<li{}><a href=\"{}\">{}</a>",
                class,
                escape(&node.url),
                escape(label)
            ));
            render_level(children, node.index, retained, out);
            out.push_str("</li>\n");
        } else {
            // Excluded node: splice retained descendants into this level
            render_descendants_inline(children, node.index, retained, out, &mut opened);
        }
    }
    if opened {
        out.push_str("</ul>\n");
    }
}

fn render_descendants_inline(
    children: &HashMap<i64, Vec<&NewNode>>,
    parent: i64,
    retained: Option<&HashSet<i64>>,
    out: &mut String,
    opened: &mut bool,
) {
    let Some(siblings) = children.get(&parent) else {
        return;
    };
    for node in siblings {
        let keep = retained.is_none_or(|set| set.contains(&node.index));
        if keep {
            if !*opened {
                out.push_str("<ul>\n");
                *opened = true;
            }
            let label = if node.title.is_empty() { &node.url } else { &node.title };
            out.push_str(&format!(
                "<li><a href=\"{}\">{}</a>",
                escape(&node.url),
                escape(label)
            ));
            render_level(children, node.index, retained, out);
            out.push_str("</li>\n");
        } else {
            render_descendants_inline(children, node.index, retained, out, opened);
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
