use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{Html, Selector};

/// Elements whose contents are never visible page text.
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Visible text of a rendered page.
///
/// Text nodes are concatenated as they appear, with `script`/`style` (and
/// other non-rendered) subtrees removed. Whitespace is left untouched, so
/// `Hello <script>x</script> World` becomes `Hello  World`.
pub fn extract_visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();
    let body = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next());
    match body {
        Some(body) => collect_text(*body, &mut out),
        None => collect_text(*document.root_element(), &mut out),
    }
    out
}

fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => out.push_str(text),
        Node::Element(element) if is_hidden(element.name()) => {}
        _ => {
            for child in node.children() {
                collect_text(child, out);
            }
        }
    }
}

fn is_hidden(name: &str) -> bool {
    HIDDEN_ELEMENTS
        .iter()
        .any(|hidden| hidden.eq_ignore_ascii_case(name))
}

/// Splits page text into pieces of at most `max_len` characters, breaking on
/// line boundaries. A single line longer than `max_len` is split as well.
pub fn split_text(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut line = line;
        loop {
            let line_len = line.chars().count();
            let sep = usize::from(current_len > 0);
            if current_len + sep + line_len <= max_len {
                if sep == 1 {
                    current.push('\n');
                }
                current.push_str(line);
                current_len += sep + line_len;
                break;
            }
            if current_len > 0 {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
                continue;
            }
            let cut = line
                .char_indices()
                .nth(max_len)
                .map_or(line.len(), |(idx, _)| idx);
            chunks.push(line[..cut].to_string());
            line = &line[cut..];
            if line.is_empty() {
                break;
            }
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_respects_line_boundaries() {
        let chunks = split_text("aaa\nbbb\n\n  ccc  \n", 7);
        assert_eq!(chunks, vec!["aaa\nbbb", "ccc"]);
    }

    #[test]
    fn overlong_line_is_cut() {
        assert_eq!(split_text("abcdefg", 3), vec!["abc", "def", "g"]);
        assert!(split_text(" \n \n", 10).is_empty());
    }
}
