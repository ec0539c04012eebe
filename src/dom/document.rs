//! Document - arena-based tree of parsed nodes
//!
//! The arena owns every node; NodeId indices express both the downward
//! (children) and upward (parent) relations. Attachment is the only way to
//! link nodes and enforces the no-cycle invariant by walking the parent
//! chain before committing.

use std::collections::HashSet;
use std::fmt::Write;

use super::node::{DocumentNode, NodeId};
use crate::error::ParseError;

/// A parsed document: node arena plus the root element id.
#[derive(Debug, Default)]
pub struct Document {
    nodes: Vec<DocumentNode>,
    root: Option<NodeId>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the arena, returning its id
    pub fn push_node(&mut self, node: DocumentNode) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        id
    }

    /// Root element id, if the document contained one
    #[inline]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub(crate) fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// Get a node by id
    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&DocumentNode> {
        self.nodes.get(id as usize)
    }

    /// Get a node by id, mutably
    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut DocumentNode> {
        self.nodes.get_mut(id as usize)
    }

    /// Total number of nodes in the arena
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Attach `child` under `parent`: set the back-reference, verify the
    /// parent chain stays acyclic, then commit the child link.
    ///
    /// The cycle walk revisits no node twice; re-encountering any node is
    /// a fatal structural error and the child link is not committed.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), ParseError> {
        if self.get(parent).is_none() || self.get(child).is_none() {
            return Err(ParseError::InvalidSyntax("unknown node id".into()));
        }

        self.nodes[child as usize].parent = Some(parent);

        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut current = Some(child);
        while let Some(id) = current {
            if !visited.insert(id) {
                return Err(ParseError::circular());
            }
            current = self.nodes[id as usize].parent;
        }

        self.nodes[parent as usize].children.push(child);
        Ok(())
    }

    /// Render the tree rooted at `id` as markup, childless-and-textless
    /// nodes self-closing. Stored text and attribute values are already
    /// sanitized, so the output never contains an unescaped reserved
    /// character.
    pub fn render(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.render_node(id, &mut out);
        out
    }

    /// Render the whole document (empty string when there is no root).
    pub fn render_root(&self) -> String {
        match self.root {
            Some(id) => self.render(id),
            None => String::new(),
        }
    }

    fn render_node(&self, id: NodeId, out: &mut String) {
        let node = match self.get(id) {
            Some(n) => n,
            None => return,
        };

        let _ = write!(out, "<{}", node.name);
        for (name, value) in node.attributes() {
            let _ = write!(out, " {}=\"{}\"", name, value);
        }

        if node.is_empty() {
            out.push_str("/>");
            return;
        }

        out.push('>');
        out.push_str(&node.text);
        for &child in &node.children {
            self.render_node(child, out);
        }
        let _ = write!(out, "</{}>", node.name);
    }
}
