/*!
 * Arena-backed document tree.
 *
 * The highlight engine never owns the "real" document (a browser DOM, an
 * XML model, ...); it only needs a tree with element and text nodes, ordered
 * children, and cheap structural mutation. This module provides that
 * collaborator: nodes live in a single `Vec` arena and are addressed by
 * [`NodeId`] indices, so rebuilding the tree from markup yields fresh
 * identities while anchors stay purely structural.
 */

use std::collections::BTreeMap;

pub mod markup;
pub mod range;

pub use range::{Boundary, DomRange, RangeError};

/// Index of a node in the tree arena. Only valid for the tree that issued it.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct NodeId(pub(crate) usize);

/// Payload of a single node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Element {
        tag: String,
        attrs: BTreeMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A mutable document tree.
///
/// Detached nodes stay in the arena (their ids remain valid) but are no
/// longer reachable from the root and never serialize.
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<Node>,
    root: NodeId,
}

/// Elements that never take children when serialized back to markup.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub(crate) fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

impl DomTree {
    /// Create an empty tree holding only the synthetic document root.
    pub fn new() -> Self {
        let root_node = Node {
            data: NodeData::Element {
                tag: "#document".to_string(),
                attrs: BTreeMap::new(),
            },
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root_node],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeData::Element {
            tag: tag.to_string(),
            attrs: BTreeMap::new(),
        })
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push_node(NodeData::Text(text.into()))
    }

    fn push_node(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Append `child` as the last child of `parent`, detaching it first if
    /// it is attached elsewhere.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let index = self.nodes[parent.0].children.len();
        self.insert_child(parent, index, child);
    }

    /// Insert `child` into `parent`'s child list at `index` (clamped to the
    /// current child count).
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Remove `node` from its parent's child list. No-op when detached.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent {
            self.nodes[parent.0].children.retain(|child| *child != node);
            self.nodes[node.0].parent = None;
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    /// Full child-node list, text nodes included.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Element-only children, the second indexing domain used by anchors.
    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes[node.0]
            .children
            .iter()
            .copied()
            .filter(|child| self.is_element(*child))
            .collect()
    }

    /// Position of `node` within its parent's full child-node list.
    pub fn child_index(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|child| *child == node)
    }

    /// Position of `node` within its parent's element-only children.
    pub fn element_index(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.element_children(parent)
            .iter()
            .position(|child| *child == node)
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.nodes[node.0].data, NodeData::Element { .. })
    }

    pub fn is_text(&self, node: NodeId) -> bool {
        matches!(self.nodes[node.0].data, NodeData::Text(_))
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            NodeData::Text(_) => None,
        }
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[node.0].data {
            attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn attrs(&self, node: NodeId) -> Option<&BTreeMap<String, String>> {
        match &self.nodes[node.0].data {
            NodeData::Element { attrs, .. } => Some(attrs),
            NodeData::Text(_) => None,
        }
    }

    /// Content of a text node; `None` for elements.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Text(text) => Some(text),
            NodeData::Element { .. } => None,
        }
    }

    pub fn set_text(&mut self, node: NodeId, value: impl Into<String>) {
        if let NodeData::Text(text) = &mut self.nodes[node.0].data {
            *text = value.into();
        }
    }

    /// Node length in the sense boundary offsets use: characters for a text
    /// node, child slots for an element.
    pub fn node_len(&self, node: NodeId) -> usize {
        match &self.nodes[node.0].data {
            NodeData::Text(text) => text.chars().count(),
            NodeData::Element { .. } => self.nodes[node.0].children.len(),
        }
    }

    /// Preorder (document-order) walk of the subtree below `node`, the node
    /// itself excluded.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            for child in self.children(current).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Concatenated character content of the subtree, in document order.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element { .. } => {
                for child in self.children(node) {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Merge adjacent text-node children of `parent` and drop empty ones,
    /// converging the child layout back to what a fresh parse produces.
    pub fn normalize_children(&mut self, parent: NodeId) {
        let child_ids = self.nodes[parent.0].children.clone();
        let mut merged: Vec<NodeId> = Vec::with_capacity(child_ids.len());
        for child in child_ids {
            let text = match &self.nodes[child.0].data {
                NodeData::Text(text) => Some(text.clone()),
                NodeData::Element { .. } => None,
            };
            match text {
                Some(text) if text.is_empty() => {
                    self.nodes[child.0].parent = None;
                }
                Some(text) => {
                    let absorbed = match merged.last() {
                        Some(prev) if self.is_text(*prev) => {
                            let prev = *prev;
                            if let NodeData::Text(existing) = &mut self.nodes[prev.0].data {
                                existing.push_str(&text);
                            }
                            true
                        }
                        _ => false,
                    };
                    if absorbed {
                        self.nodes[child.0].parent = None;
                    } else {
                        merged.push(child);
                    }
                }
                None => merged.push(child),
            }
        }
        self.nodes[parent.0].children = merged;
    }

    /// Serialize the subtree rooted at `node` back to markup.
    pub fn serialize_node(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    /// Serialize only the children of `node`, used for the synthetic root.
    pub fn serialize_children(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_node(*child, &mut out);
        }
        out
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].data {
            NodeData::Text(text) => {
                out.push_str(&html_escape::encode_text(text));
            }
            NodeData::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if is_void_tag(tag) && self.children(node).is_empty() {
                    return;
                }
                for child in self.children(node) {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}
