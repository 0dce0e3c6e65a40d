//! Ranges over the document tree.
//!
//! A [`DomRange`] is a span between two boundary positions. Inside a text
//! node the offset counts characters; on an element it counts child slots.
//! Construction validates offsets against the *current* tree, which is what
//! turns a stale persisted offset into a reconstruction failure instead of a
//! panic later on.

use super::{DomTree, NodeId};
use thiserror::Error;

/// One end of a range: a node plus an offset within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub node: NodeId,
    pub offset: usize,
}

/// A validated span between two boundaries, start not after end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomRange {
    pub start: Boundary,
    pub end: Boundary,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("offset {offset} exceeds the boundary node length {len}")]
    OffsetOutOfRange { offset: usize, len: usize },
    #[error("boundary node is not attached to the document")]
    Detached,
    #[error("range start does not precede its end")]
    Inverted,
}

impl DomRange {
    /// Build a range from raw boundary data, validating offsets and order.
    pub fn new(
        tree: &DomTree,
        start_node: NodeId,
        start_offset: usize,
        end_node: NodeId,
        end_offset: usize,
    ) -> Result<Self, RangeError> {
        let start = Boundary {
            node: start_node,
            offset: start_offset,
        };
        let end = Boundary {
            node: end_node,
            offset: end_offset,
        };
        check_offset(tree, start)?;
        check_offset(tree, end)?;

        let start_global = global_offset(tree, start).ok_or(RangeError::Detached)?;
        let end_global = global_offset(tree, end).ok_or(RangeError::Detached)?;
        if start_global > end_global {
            return Err(RangeError::Inverted);
        }
        Ok(Self { start, end })
    }

    /// The character content the range covers, what a user selection reads
    /// as.
    pub fn text(&self, tree: &DomTree) -> String {
        let Some(start) = global_offset(tree, self.start) else {
            return String::new();
        };
        let Some(end) = global_offset(tree, self.end) else {
            return String::new();
        };
        tree.text_content(tree.root())
            .chars()
            .skip(start)
            .take(end.saturating_sub(start))
            .collect()
    }
}

fn check_offset(tree: &DomTree, boundary: Boundary) -> Result<(), RangeError> {
    let len = tree.node_len(boundary.node);
    if boundary.offset > len {
        return Err(RangeError::OffsetOutOfRange {
            offset: boundary.offset,
            len,
        });
    }
    Ok(())
}

/// Number of characters in document order before the boundary, or `None`
/// when the boundary node is unreachable from the root.
fn global_offset(tree: &DomTree, boundary: Boundary) -> Option<usize> {
    let mut count = 0_usize;
    if walk(tree, tree.root(), boundary, &mut count) {
        Some(count)
    } else {
        None
    }
}

fn walk(tree: &DomTree, current: NodeId, boundary: Boundary, count: &mut usize) -> bool {
    if current == boundary.node {
        if let Some(text) = tree.text(current) {
            *count += text.chars().take(boundary.offset).count();
        } else {
            for child in tree.children(current).iter().take(boundary.offset) {
                *count += tree.text_content(*child).chars().count();
            }
        }
        return true;
    }

    match tree.text(current) {
        Some(text) => {
            *count += text.chars().count();
            false
        }
        None => {
            for child in tree.children(current) {
                if walk(tree, *child, boundary, count) {
                    return true;
                }
            }
            false
        }
    }
}

/// Locate the first occurrence of `needle` in the tree's character content
/// and return the corresponding range. This is how a non-interactive caller
/// produces a "selection".
pub fn find_text(tree: &DomTree, needle: &str) -> Option<DomRange> {
    if needle.is_empty() {
        return None;
    }

    // Text runs in document order, with cumulative character offsets.
    let mut runs: Vec<(NodeId, usize, usize)> = Vec::new(); // (node, start, len)
    let mut full = String::new();
    let mut cursor = 0_usize;
    for node in tree.descendants(tree.root()) {
        if let Some(text) = tree.text(node) {
            let len = text.chars().count();
            runs.push((node, cursor, len));
            full.push_str(text);
            cursor += len;
        }
    }

    let byte_pos = full.find(needle)?;
    let char_start = full[..byte_pos].chars().count();
    let char_end = char_start + needle.chars().count();

    let start = boundary_at(&runs, char_start, true)?;
    let end = boundary_at(&runs, char_end, false)?;
    DomRange::new(tree, start.node, start.offset, end.node, end.offset).ok()
}

/// Map a global character offset back onto a text node boundary. A start
/// boundary snaps forward onto the node containing the character; an end
/// boundary snaps backward so it stays inside the node holding the last
/// covered character.
fn boundary_at(runs: &[(NodeId, usize, usize)], offset: usize, is_start: bool) -> Option<Boundary> {
    for (node, start, len) in runs {
        let contains = if is_start {
            offset >= *start && offset < start + len
        } else {
            offset > *start && offset <= start + len
        };
        if contains {
            return Some(Boundary {
                node: *node,
                offset: offset - start,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::markup;

    #[test]
    fn test_range_text_within_one_text_node() {
        let tree = markup::parse("<p>The quick fox jumps</p>");
        let p = tree.children(tree.root())[0];
        let text = tree.children(p)[0];

        let range = DomRange::new(&tree, text, 4, text, 13).unwrap();
        assert_eq!(range.text(&tree), "quick fox");
    }

    #[test]
    fn test_range_text_across_element_boundary() {
        let tree = markup::parse("<p>quick <b>brown</b> fox</p>");
        let p = tree.children(tree.root())[0];
        let first = tree.children(p)[0];
        let last = tree.children(p)[2];

        let range = DomRange::new(&tree, first, 0, last, 4).unwrap();
        assert_eq!(range.text(&tree), "quick brown fox");
    }

    #[test]
    fn test_offset_beyond_node_length_is_rejected() {
        let tree = markup::parse("<p>abc</p>");
        let p = tree.children(tree.root())[0];
        let text = tree.children(p)[0];

        let result = DomRange::new(&tree, text, 0, text, 4);
        assert_eq!(
            result,
            Err(RangeError::OffsetOutOfRange { offset: 4, len: 3 })
        );
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let tree = markup::parse("<p>abc def</p>");
        let p = tree.children(tree.root())[0];
        let text = tree.children(p)[0];

        let result = DomRange::new(&tree, text, 5, text, 1);
        assert_eq!(result, Err(RangeError::Inverted));
    }

    #[test]
    fn test_detached_boundary_is_rejected() {
        let mut tree = markup::parse("<p>abc</p>");
        let stray = tree.create_text("loose");
        let p = tree.children(tree.root())[0];
        let text = tree.children(p)[0];

        let result = DomRange::new(&tree, stray, 0, text, 1);
        assert_eq!(result, Err(RangeError::Detached));
    }

    #[test]
    fn test_element_slot_offsets_count_children() {
        let tree = markup::parse("<p>a<b>b</b>c</p>");
        let p = tree.children(tree.root())[0];

        let range = DomRange::new(&tree, p, 0, p, 3).unwrap();
        assert_eq!(range.text(&tree), "abc");

        let middle = DomRange::new(&tree, p, 1, p, 2).unwrap();
        assert_eq!(middle.text(&tree), "b");
    }

    #[test]
    fn test_find_text_in_single_node() {
        let tree = markup::parse("<p>The quick fox jumps</p>");
        let range = find_text(&tree, "quick fox").unwrap();
        assert_eq!(range.text(&tree), "quick fox");
        assert_eq!(range.start.offset, 4);
        assert_eq!(range.end.offset, 13);
    }

    #[test]
    fn test_find_text_across_nodes() {
        let tree = markup::parse("<p>quick <b>brown</b> fox</p>");
        let range = find_text(&tree, "ck brow").unwrap();
        assert_eq!(range.text(&tree), "ck brow");
        assert!(tree.is_text(range.start.node));
        assert!(tree.is_text(range.end.node));
        assert_ne!(range.start.node, range.end.node);
    }

    #[test]
    fn test_find_text_missing_returns_none() {
        let tree = markup::parse("<p>abc</p>");
        assert!(find_text(&tree, "zzz").is_none());
        assert!(find_text(&tree, "").is_none());
    }
}
