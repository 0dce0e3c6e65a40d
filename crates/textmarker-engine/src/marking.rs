/*!
 * Visual marking of highlight ranges.
 *
 * A marker container is a runtime-only wrapper element inserted around a
 * range's content. It carries the highlight id and color as attributes and
 * nothing else — every container can be stripped and rebuilt from the
 * persisted records at any time.
 *
 * Two invariants hold for every strategy in here:
 * - the rendered character content of the document is identical before and
 *   after wrapping or unwrapping, and
 * - replay happens in creation order, so the nesting of overlapping
 *   highlights is a function of that order alone.
 */

use crate::anchors::{self, AnchorLost};
use crate::dom::{Boundary, DomRange, DomTree, NodeId};
use crate::highlight::{Highlight, HighlightId};

pub const MARK_TAG: &str = "span";
pub const MARK_CLASS: &str = "textmarker-mark";
pub const MARK_ID_ATTR: &str = "data-highlight-id";
pub const MARK_COLOR_ATTR: &str = "data-highlight-color";

/// Outcome of a full replay pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestoreReport {
    pub applied: usize,
    pub lost: usize,
}

/// Wrap the range's content in one marker container and return it.
///
/// The surround strategy handles the aligned cases atomically: a span within
/// a single text node, or a whole child slice of one element. When the range
/// crosses element borders the fallback splits the partially covered nodes
/// along each side and wraps the then-contiguous slice under the common
/// ancestor — the moved content is exactly the range's content either way.
pub fn apply(tree: &mut DomTree, range: &DomRange, color: &str, id: HighlightId) -> NodeId {
    let mark = new_mark(tree, color, id);
    let start = range.start;
    let end = range.end;

    if start.node == end.node && tree.is_text(start.node) {
        surround_in_text(tree, mark, start.node, start.offset, end.offset);
        return mark;
    }

    // Align both boundaries on child slots. Start first: the end boundary
    // names its own node and offset, which a split on the start side never
    // touches.
    let start_slot = text_boundary_to_slot(tree, start);
    let end_slot = text_boundary_to_slot(tree, end);

    if start_slot.node == end_slot.node {
        wrap_slice(tree, mark, start_slot.node, start_slot.offset, end_slot.offset);
        return mark;
    }

    let ancestor = common_ancestor(tree, start_slot.node, end_slot.node);

    // Lift the end side first and remember the node just past the range;
    // the start side's splits insert clones strictly before it, so the final
    // slot is recomputed afterwards from that marker node.
    let end_index = lift_to_ancestor(tree, end_slot, ancestor);
    let end_marker = tree.children(ancestor).get(end_index).copied();
    let start_index = lift_to_ancestor(tree, start_slot, ancestor);
    let end_index = match end_marker {
        Some(node) => tree.child_index(node).unwrap_or(start_index),
        None => tree.children(ancestor).len(),
    };

    wrap_slice(tree, mark, ancestor, start_index, end_index);
    mark
}

/// Remove the container tagged `id`, moving its current children back to its
/// position in order. Adjacent text siblings are merged afterwards so a later
/// replay sees the same child layout a fresh parse would produce.
pub fn remove(tree: &mut DomTree, root: NodeId, id: HighlightId) -> bool {
    let wanted = id.to_string();
    let found = tree
        .descendants(root)
        .into_iter()
        .find(|node| tree.attr(*node, MARK_ID_ATTR) == Some(wanted.as_str()));
    match found {
        Some(mark) => {
            unwrap_mark(tree, mark);
            true
        }
        None => false,
    }
}

/// Strip every marker container under `root`, matched generically by class
/// and independent of id. Returns how many containers were removed.
pub fn strip_all(tree: &mut DomTree, root: NodeId) -> usize {
    let mut stripped = 0;
    loop {
        let found = tree
            .descendants(root)
            .into_iter()
            .find(|node| is_mark(tree, *node));
        match found {
            Some(mark) => {
                unwrap_mark(tree, mark);
                stripped += 1;
            }
            None => break,
        }
    }
    stripped
}

/// Replay a full highlight set: strip whatever containers are present, then
/// reconstruct and apply each highlight in creation order, skipping the ones
/// whose anchors no longer resolve.
pub fn restore_all(tree: &mut DomTree, root: NodeId, highlights: &[Highlight]) -> RestoreReport {
    strip_all(tree, root);
    let mut report = RestoreReport::default();
    for highlight in highlights {
        match anchors::reconstruct(tree, root, highlight) {
            Ok(range) => {
                apply(tree, &range, &highlight.color, highlight.id);
                report.applied += 1;
            }
            Err(AnchorLost) => report.lost += 1,
        }
    }
    report
}

pub fn is_mark(tree: &DomTree, node: NodeId) -> bool {
    tree.attr(node, "class")
        .is_some_and(|class| class.split_whitespace().any(|part| part == MARK_CLASS))
}

fn new_mark(tree: &mut DomTree, color: &str, id: HighlightId) -> NodeId {
    let mark = tree.create_element(MARK_TAG);
    tree.set_attr(mark, "class", MARK_CLASS);
    tree.set_attr(mark, MARK_ID_ATTR, &id.to_string());
    tree.set_attr(mark, MARK_COLOR_ATTR, color);
    tree.set_attr(mark, "style", &format!("background-color: {color}"));
    mark
}

/// Wrap characters `[from..to)` of a single text node, splitting the node
/// around the covered span.
fn surround_in_text(tree: &mut DomTree, mark: NodeId, node: NodeId, from: usize, to: usize) {
    let Some(parent) = tree.parent(node) else {
        return;
    };
    let Some(index) = tree.child_index(node) else {
        return;
    };
    let chars: Vec<char> = tree.text(node).unwrap_or_default().chars().collect();
    let before: String = chars[..from.min(chars.len())].iter().collect();
    let covered: String = chars[from.min(chars.len())..to.min(chars.len())].iter().collect();
    let after: String = chars[to.min(chars.len())..].iter().collect();

    let covered_node = tree.create_text(covered);
    tree.append_child(mark, covered_node);

    if before.is_empty() && after.is_empty() {
        tree.detach(node);
        tree.insert_child(parent, index, mark);
    } else if before.is_empty() {
        tree.set_text(node, after);
        tree.insert_child(parent, index, mark);
    } else {
        tree.set_text(node, before);
        tree.insert_child(parent, index + 1, mark);
        if !after.is_empty() {
            let tail = tree.create_text(after);
            tree.insert_child(parent, index + 2, tail);
        }
    }
}

/// Move children `[from..to)` of `parent` into `mark` and insert the mark at
/// the vacated position.
fn wrap_slice(tree: &mut DomTree, mark: NodeId, parent: NodeId, from: usize, to: usize) {
    let slice: Vec<NodeId> = tree
        .children(parent)
        .get(from..to)
        .map(<[NodeId]>::to_vec)
        .unwrap_or_default();
    for child in &slice {
        tree.append_child(mark, *child);
    }
    tree.insert_child(parent, from, mark);
}

/// Turn a text-node boundary into a child-slot boundary on its parent,
/// splitting the text node when the boundary falls strictly inside it.
fn text_boundary_to_slot(tree: &mut DomTree, boundary: Boundary) -> Boundary {
    if !tree.is_text(boundary.node) {
        return boundary;
    }
    let Some(parent) = tree.parent(boundary.node) else {
        return boundary;
    };
    let Some(index) = tree.child_index(boundary.node) else {
        return boundary;
    };
    let len = tree.node_len(boundary.node);

    let offset = if boundary.offset == 0 {
        index
    } else if boundary.offset == len {
        index + 1
    } else {
        split_text(tree, boundary.node, boundary.offset);
        index + 1
    };
    Boundary {
        node: parent,
        offset,
    }
}

/// Split a text node at a character offset; the node keeps the head, a new
/// sibling inserted right after it takes the tail.
fn split_text(tree: &mut DomTree, node: NodeId, at: usize) {
    let Some(parent) = tree.parent(node) else {
        return;
    };
    let Some(index) = tree.child_index(node) else {
        return;
    };
    let chars: Vec<char> = tree.text(node).unwrap_or_default().chars().collect();
    let at = at.min(chars.len());
    let head: String = chars[..at].iter().collect();
    let tail: String = chars[at..].iter().collect();
    tree.set_text(node, head);
    let tail_node = tree.create_text(tail);
    tree.insert_child(parent, index + 1, tail_node);
}

/// Split an element at a child slot; the element keeps the leading children,
/// a clone with the same tag and attributes inserted right after it takes
/// the rest.
fn split_element(tree: &mut DomTree, element: NodeId, at: usize) {
    let Some(parent) = tree.parent(element) else {
        return;
    };
    let Some(index) = tree.child_index(element) else {
        return;
    };
    let tag = tree.tag(element).unwrap_or_default().to_string();
    let attrs: Vec<(String, String)> = tree
        .attrs(element)
        .map(|attrs| {
            attrs
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default();

    let clone = tree.create_element(&tag);
    for (name, value) in attrs {
        tree.set_attr(clone, &name, &value);
    }

    let tail: Vec<NodeId> = tree
        .children(element)
        .get(at..)
        .map(<[NodeId]>::to_vec)
        .unwrap_or_default();
    for child in tail {
        tree.append_child(clone, child);
    }
    tree.insert_child(parent, index + 1, clone);
}

fn common_ancestor(tree: &DomTree, a: NodeId, b: NodeId) -> NodeId {
    let mut ancestors = Vec::new();
    let mut current = Some(a);
    while let Some(node) = current {
        ancestors.push(node);
        current = tree.parent(node);
    }

    let mut candidate = Some(b);
    while let Some(node) = candidate {
        if ancestors.contains(&node) {
            return node;
        }
        candidate = tree.parent(node);
    }
    tree.root()
}

/// Bubble a slot boundary up to `ancestor`, splitting every element the
/// range only partially covers, and return the final slot index in the
/// ancestor.
///
/// The same arithmetic serves both sides: a boundary at slot 0 moves before
/// the node, a boundary at the last slot moves after it, and a boundary
/// strictly inside splits the node — after which the boundary sits exactly
/// between the two halves, i.e. at `index + 1` either way.
fn lift_to_ancestor(tree: &mut DomTree, slot: Boundary, ancestor: NodeId) -> usize {
    let mut node = slot.node;
    let mut offset = slot.offset;
    while node != ancestor {
        let Some(parent) = tree.parent(node) else {
            break;
        };
        let index = tree.child_index(node).unwrap_or_default();
        let len = tree.children(node).len();
        offset = if offset == 0 {
            index
        } else if offset == len {
            index + 1
        } else {
            split_element(tree, node, offset);
            index + 1
        };
        node = parent;
    }
    offset
}

fn unwrap_mark(tree: &mut DomTree, mark: NodeId) {
    let Some(parent) = tree.parent(mark) else {
        return;
    };
    let Some(index) = tree.child_index(mark) else {
        return;
    };
    let children: Vec<NodeId> = tree.children(mark).to_vec();
    tree.detach(mark);
    for (position, child) in children.into_iter().enumerate() {
        tree.insert_child(parent, index + position, child);
    }
    tree.normalize_children(parent);
}
