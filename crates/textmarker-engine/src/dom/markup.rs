//! Lenient markup parsing.
//!
//! Turns an HTML-like document string into a [`DomTree`]. The scanner is
//! deliberately forgiving: unknown constructs are skipped, mismatched end
//! tags are ignored, and a stray `<` counts as text. The one guarantee that
//! matters to anchoring is determinism: parsing the same input twice yields
//! structurally identical trees, whitespace text nodes included.

use super::{DomTree, NodeId, is_void_tag};

/// Parse markup into a tree under a synthetic document root.
pub fn parse(input: &str) -> DomTree {
    let mut tree = DomTree::new();
    let bytes = input.as_bytes();
    let mut open: Vec<NodeId> = vec![tree.root()];
    let mut pending = String::new();
    let mut idx = 0_usize;

    while idx < bytes.len() {
        if bytes[idx] != b'<' {
            let next = find_byte(bytes, idx, b'<').unwrap_or(bytes.len());
            pending.push_str(&html_escape::decode_html_entities(&input[idx..next]));
            idx = next;
            continue;
        }

        if starts_with(bytes, idx, b"<!--") {
            flush_text(&mut tree, &open, &mut pending);
            idx = skip_comment(bytes, idx);
            continue;
        }

        if starts_with(bytes, idx, b"<!") || starts_with(bytes, idx, b"<?") {
            flush_text(&mut tree, &open, &mut pending);
            idx = skip_to_gt(bytes, idx + 2);
            continue;
        }

        let Some((tag, next_idx)) = parse_tag(input, idx) else {
            // Not a tag after all; keep the `<` as document text.
            pending.push('<');
            idx += 1;
            continue;
        };

        flush_text(&mut tree, &open, &mut pending);
        idx = next_idx;

        if tag.is_end {
            close_tag(&tree, &mut open, &tag.name);
            continue;
        }

        let element = tree.create_element(&tag.name);
        for (name, value) in &tag.attrs {
            tree.set_attr(element, name, value);
        }
        let parent = current_parent(&open);
        tree.append_child(parent, element);

        if tag.self_closing || is_void_tag(&tag.name) {
            continue;
        }

        if tag.name == "script" || tag.name == "style" {
            // Raw text content, no entity decoding and no nested tags.
            let (raw, after_raw) = read_raw_text_until_end_tag(input, idx, &tag.name);
            if !raw.is_empty() {
                let text = tree.create_text(raw);
                tree.append_child(element, text);
            }
            idx = after_raw;
            continue;
        }

        open.push(element);
    }

    flush_text(&mut tree, &open, &mut pending);
    tree
}

fn current_parent(open: &[NodeId]) -> NodeId {
    *open.last().unwrap_or(&NodeId(0))
}

fn flush_text(tree: &mut DomTree, open: &[NodeId], pending: &mut String) {
    if pending.is_empty() {
        return;
    }
    let text = tree.create_text(std::mem::take(pending));
    tree.append_child(current_parent(open), text);
}

// The root at index 0 is never closable; an end tag with no matching open
// element is dropped.
fn close_tag(tree: &DomTree, open: &mut Vec<NodeId>, name: &str) {
    if let Some(found) = open
        .iter()
        .enumerate()
        .skip(1)
        .rev()
        .find(|(_, node)| tree.tag(**node) == Some(name))
        .map(|(index, _)| index)
    {
        open.truncate(found);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedTag {
    name: String,
    attrs: Vec<(String, String)>,
    is_end: bool,
    self_closing: bool,
}

fn parse_tag(input: &str, start: usize) -> Option<(ParsedTag, usize)> {
    let bytes = input.as_bytes();
    if bytes.get(start).copied() != Some(b'<') {
        return None;
    }

    let mut idx = start + 1;
    let mut is_end = false;
    if bytes.get(idx).copied() == Some(b'/') {
        is_end = true;
        idx += 1;
    }

    let name_start = idx;
    while idx < bytes.len() && is_tag_name_char(bytes[idx]) {
        idx += 1;
    }
    if idx == name_start {
        return None;
    }
    let name = input[name_start..idx].to_ascii_lowercase();

    let mut attrs = Vec::new();
    loop {
        idx = skip_spaces(bytes, idx);
        match bytes.get(idx).copied() {
            None => return None,
            Some(b'>') => {
                return Some((
                    ParsedTag {
                        name,
                        attrs,
                        is_end,
                        self_closing: false,
                    },
                    idx + 1,
                ));
            }
            Some(b'/') if bytes.get(idx + 1).copied() == Some(b'>') => {
                return Some((
                    ParsedTag {
                        name,
                        attrs,
                        is_end,
                        self_closing: true,
                    },
                    idx + 2,
                ));
            }
            Some(_) => {
                let (attr, after) = parse_attribute(input, idx)?;
                attrs.push(attr);
                idx = after;
            }
        }
    }
}

fn parse_attribute(input: &str, start: usize) -> Option<((String, String), usize)> {
    let bytes = input.as_bytes();
    let name_start = start;
    let mut idx = start;
    while idx < bytes.len() && !matches!(bytes[idx], b'=' | b'>' | b'/') && !bytes[idx].is_ascii_whitespace()
    {
        idx += 1;
    }
    if idx == name_start {
        return None;
    }
    let name = input[name_start..idx].to_ascii_lowercase();

    idx = skip_spaces(bytes, idx);
    if bytes.get(idx).copied() != Some(b'=') {
        return Some(((name, String::new()), idx));
    }
    idx = skip_spaces(bytes, idx + 1);

    match bytes.get(idx).copied() {
        Some(quote @ (b'"' | b'\'')) => {
            let value_start = idx + 1;
            let mut end = value_start;
            while end < bytes.len() && bytes[end] != quote {
                end += 1;
            }
            let value = html_escape::decode_html_entities(&input[value_start..end]).into_owned();
            Some(((name, value), (end + 1).min(bytes.len())))
        }
        _ => {
            let value_start = idx;
            while idx < bytes.len()
                && !bytes[idx].is_ascii_whitespace()
                && bytes[idx] != b'>'
                && !(bytes[idx] == b'/' && bytes.get(idx + 1).copied() == Some(b'>'))
            {
                idx += 1;
            }
            let value = html_escape::decode_html_entities(&input[value_start..idx]).into_owned();
            Some(((name, value), idx))
        }
    }
}

fn read_raw_text_until_end_tag(input: &str, start: usize, tag_name: &str) -> (String, usize) {
    let bytes = input.as_bytes();
    let tag_bytes = tag_name.as_bytes();
    let mut idx = start;

    while idx < bytes.len() {
        if bytes[idx] == b'<'
            && bytes.get(idx + 1).copied() == Some(b'/')
            && starts_with_ignore_ascii_case(bytes, idx + 2, tag_bytes)
        {
            let after = skip_to_gt(bytes, idx + 2 + tag_bytes.len());
            return (input[start..idx].to_string(), after);
        }
        idx += 1;
    }

    (input[start..].to_string(), bytes.len())
}

fn skip_comment(bytes: &[u8], start: usize) -> usize {
    find_subslice(bytes, start + 4, b"-->")
        .map(|end| end + 3)
        .unwrap_or(bytes.len())
}

fn skip_to_gt(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() {
        if bytes[idx] == b'>' {
            return idx + 1;
        }
        idx += 1;
    }
    bytes.len()
}

fn skip_spaces(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
        idx += 1;
    }
    idx
}

fn is_tag_name_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b':')
}

fn starts_with(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx + pattern.len();
    end <= bytes.len() && bytes[idx..end] == *pattern
}

fn starts_with_ignore_ascii_case(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx + pattern.len();
    if end > bytes.len() {
        return false;
    }
    bytes[idx..end]
        .iter()
        .zip(pattern.iter())
        .all(|(left, right)| left.eq_ignore_ascii_case(right))
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

fn find_byte(bytes: &[u8], from: usize, byte: u8) -> Option<usize> {
    bytes[from..]
        .iter()
        .position(|candidate| *candidate == byte)
        .map(|offset| from + offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_elements_and_text() {
        let tree = parse("<div><p>Hello <b>world</b></p></div>");
        let root = tree.root();
        let div = tree.children(root)[0];
        assert_eq!(tree.tag(div), Some("div"));
        let p = tree.children(div)[0];
        assert_eq!(tree.tag(p), Some("p"));
        assert_eq!(tree.text_content(p), "Hello world");
        assert_eq!(tree.children(p).len(), 2);
    }

    #[test]
    fn test_parse_attributes_quoted_and_bare() {
        let tree = parse("<a href=\"https://example.com\" id=link data-n=1>x</a>");
        let a = tree.children(tree.root())[0];
        assert_eq!(tree.attr(a, "href"), Some("https://example.com"));
        assert_eq!(tree.attr(a, "id"), Some("link"));
        assert_eq!(tree.attr(a, "data-n"), Some("1"));
    }

    #[test]
    fn test_parse_decodes_entities_in_text() {
        let tree = parse("<p>1 &lt; 2 &amp; 3</p>");
        let p = tree.children(tree.root())[0];
        assert_eq!(tree.text_content(p), "1 < 2 & 3");
    }

    #[test]
    fn test_whitespace_text_nodes_are_preserved() {
        let tree = parse("<div>\n  <p>a</p>\n</div>");
        let div = tree.children(tree.root())[0];
        // [text "\n  ", p, text "\n"]
        assert_eq!(tree.children(div).len(), 3);
        assert!(tree.is_text(tree.children(div)[0]));
        assert!(tree.is_text(tree.children(div)[2]));
    }

    #[test]
    fn test_void_and_self_closing_elements_take_no_children() {
        let tree = parse("<p>a<br>b<img src=\"x\"/>c</p>");
        let p = tree.children(tree.root())[0];
        assert_eq!(tree.text_content(p), "abc");
        assert_eq!(tree.children(p).len(), 5);
    }

    #[test]
    fn test_comments_and_doctype_are_skipped() {
        let tree = parse("<!DOCTYPE html><!-- note --><p>a</p>");
        let root = tree.root();
        assert_eq!(tree.children(root).len(), 1);
        assert_eq!(tree.tag(tree.children(root)[0]), Some("p"));
    }

    #[test]
    fn test_mismatched_end_tag_is_ignored() {
        let tree = parse("<div><p>a</span></p></div>");
        let div = tree.children(tree.root())[0];
        let p = tree.children(div)[0];
        assert_eq!(tree.text_content(p), "a");
    }

    #[test]
    fn test_stray_angle_bracket_is_text() {
        let tree = parse("<p>1 < 2</p>");
        let p = tree.children(tree.root())[0];
        assert_eq!(tree.text_content(p), "1 < 2");
    }

    #[test]
    fn test_script_content_is_raw_text() {
        let tree = parse("<script>if (a < b) { go(); }</script><p>x</p>");
        let script = tree.children(tree.root())[0];
        assert_eq!(tree.tag(script), Some("script"));
        assert_eq!(tree.text_content(script), "if (a < b) { go(); }");
    }

    #[test]
    fn test_reparse_is_structurally_deterministic() {
        let input = "<div id=a>\n  <p>one <em>two</em> three</p>\n</div>";
        let first = parse(input);
        let second = parse(input);
        assert_eq!(
            first.serialize_children(first.root()),
            second.serialize_children(second.root())
        );
        assert_eq!(
            first.descendants(first.root()).len(),
            second.descendants(second.root()).len()
        );
    }
}
