/*!
 * Structural anchors.
 *
 * An anchor names a position in the document tree without referring to node
 * identity, so it survives the document being rebuilt from markup (where
 * every [`NodeId`] changes but the structure does not). It is a root-relative
 * path of [`PathStep`]s plus a character offset in the terminal node.
 *
 * The two step variants deliberately index *different* sibling domains:
 * element steps count only element siblings, text steps count every child
 * node. An anchor therefore shrugs off stray text inserted between elements,
 * but any insertion before the indexed sibling in its own domain shifts the
 * index and the anchor resolves somewhere else — or to [`AnchorLost`]. That
 * fragility is intentional: anchors make no promise across structural edits.
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dom::{DomRange, DomTree, NodeId};
use crate::highlight::Highlight;

/// One hop of an anchor path, outermost hop first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PathStep {
    /// Index among the parent's element-only children.
    Element { tag: String, index: usize },
    /// Index among the parent's full child-node list.
    Text { index: usize },
}

/// The current tree no longer matches the anchor's assumed structure.
///
/// This is a definitive skip for the affected highlight, never a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("anchor does not resolve against the current tree")]
pub struct AnchorLost;

/// Encode `node` as a structural path relative to `root`, walking ancestors
/// from the node up to (and excluding) the root.
pub fn encode_path(tree: &DomTree, node: NodeId, root: NodeId) -> Vec<PathStep> {
    let mut steps = Vec::new();
    let mut current = node;

    while current != root {
        let Some(parent) = tree.parent(current) else {
            break;
        };
        if tree.is_text(current) {
            let index = tree.child_index(current).unwrap_or_default();
            steps.push(PathStep::Text { index });
        } else {
            let index = tree.element_index(current).unwrap_or_default();
            let tag = tree.tag(current).unwrap_or_default().to_ascii_uppercase();
            steps.push(PathStep::Element { tag, index });
        }
        current = parent;
    }

    steps.reverse();
    steps
}

/// Resolve a path against `root`, indexing into the matching child domain at
/// every hop. Any out-of-range index means the structure moved underneath
/// the anchor: the result is [`AnchorLost`], not a panic.
pub fn decode_path(tree: &DomTree, path: &[PathStep], root: NodeId) -> Result<NodeId, AnchorLost> {
    let mut current = root;
    for step in path {
        current = match step {
            PathStep::Element { index, .. } => tree
                .element_children(current)
                .get(*index)
                .copied()
                .ok_or(AnchorLost)?,
            PathStep::Text { index } => tree
                .children(current)
                .get(*index)
                .copied()
                .ok_or(AnchorLost)?,
        };
    }
    Ok(current)
}

/// Rebuild a live range from a persisted highlight.
///
/// Both endpoint paths are decoded independently; offsets are not
/// pre-validated, so a stale offset surfaces as a range-construction failure
/// and is folded into [`AnchorLost`] here.
pub fn reconstruct(
    tree: &DomTree,
    root: NodeId,
    highlight: &Highlight,
) -> Result<DomRange, AnchorLost> {
    let start = decode_path(tree, &highlight.start_path, root)?;
    let end = decode_path(tree, &highlight.end_path, root)?;
    DomRange::new(
        tree,
        start,
        highlight.start_offset,
        end,
        highlight.end_offset,
    )
    .map_err(|_| AnchorLost)
}
