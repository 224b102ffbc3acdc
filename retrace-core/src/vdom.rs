//! Virtual document: a flat node map keyed by [`SyntheticId`].
//!
//! ```text
//!  VTree { root_id: "1", nodes }
//!
//!  "1" Document ── children ["2"]
//!   └─ "2" Element <div> ── children ["3"]
//!        └─ "3" Text "hello"
//! ```
//!
//! Parent links (`parent_id`) and child lists are kept consistent by every
//! mutation in this crate. Ids reachable from `root_id` always resolve; ids
//! not reachable from the root only appear while a tree is being composed
//! node by node with [`create_or_update_vtree`].

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::TreeIntegrityError;
use crate::id::SyntheticId;

/// Live form-control state that is not reflected in attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementProperties {
    pub checked: Option<bool>,
    pub value: Option<String>,
    pub selected_index: Option<i32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub tag_name: String,
    /// `None` values are preserved from the host; patches treat a `None`
    /// value as removal.
    pub attributes: BTreeMap<String, Option<String>>,
    pub properties: ElementProperties,
    pub children: Vec<SyntheticId>,
    pub shadow_root: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VNodeKind {
    Document {
        children: Vec<SyntheticId>,
    },
    #[serde(rename_all = "camelCase")]
    DocType {
        name: String,
        public_id: String,
        system_id: String,
    },
    Element(ElementNode),
    Text {
        value: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VNode {
    pub id: SyntheticId,
    pub parent_id: Option<SyntheticId>,
    #[serde(flatten)]
    pub kind: VNodeKind,
}

impl VNode {
    pub fn document(id: impl Into<SyntheticId>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            kind: VNodeKind::Document {
                children: Vec::new(),
            },
        }
    }

    pub fn element(
        id: impl Into<SyntheticId>,
        parent_id: Option<SyntheticId>,
        tag_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id,
            kind: VNodeKind::Element(ElementNode {
                tag_name: tag_name.into(),
                ..ElementNode::default()
            }),
        }
    }

    pub fn text(
        id: impl Into<SyntheticId>,
        parent_id: Option<SyntheticId>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id,
            kind: VNodeKind::Text {
                value: value.into(),
            },
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let VNodeKind::Element(el) = &mut self.kind {
            el.attributes.insert(name.into(), Some(value.into()));
        }
        self
    }

    /// Builder-style child list.
    pub fn with_children<I, T>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<SyntheticId>,
    {
        if let Some(list) = self.children_mut() {
            *list = children.into_iter().map(Into::into).collect();
        }
        self
    }

    pub fn children(&self) -> &[SyntheticId] {
        match &self.kind {
            VNodeKind::Document { children } => children,
            VNodeKind::Element(el) => &el.children,
            _ => &[],
        }
    }

    /// `None` for node kinds that cannot hold children.
    pub fn children_mut(&mut self) -> Option<&mut Vec<SyntheticId>> {
        match &mut self.kind {
            VNodeKind::Document { children } => Some(children),
            VNodeKind::Element(el) => Some(&mut el.children),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match &self.kind {
            VNodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut ElementNode> {
        match &mut self.kind {
            VNodeKind::Element(el) => Some(el),
            _ => None,
        }
    }
}

// ───────────────────────────────────────────────────────────────────
// VTree
// ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VTree {
    pub root_id: SyntheticId,
    pub nodes: FxHashMap<SyntheticId, VNode>,
}

impl VTree {
    /// Single-node tree.
    pub fn new(root: VNode) -> Self {
        let root_id = root.id.clone();
        let mut nodes = FxHashMap::default();
        nodes.insert(root_id.clone(), root);
        Self { root_id, nodes }
    }

    /// Build from a node list; the first node is the root. Nodes are
    /// composed in order, so parents must precede their children.
    pub fn from_nodes<I: IntoIterator<Item = VNode>>(nodes: I) -> Result<Self, TreeIntegrityError> {
        let mut tree = None;
        for node in nodes {
            create_or_update_vtree(&mut tree, node)?;
        }
        tree.ok_or_else(|| TreeIntegrityError::MissingRoot(SyntheticId::new("")))
    }

    pub fn root(&self) -> Option<&VNode> {
        self.nodes.get(&self.root_id)
    }

    pub fn get(&self, id: &SyntheticId) -> Option<&VNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &SyntheticId) -> Option<&mut VNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &SyntheticId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pre-order ids of `id` and everything below it that resolves in the
    /// node map. Missing children and repeated ids are skipped.
    pub fn descendants(&self, id: &SyntheticId) -> Vec<SyntheticId> {
        let mut out = Vec::new();
        let mut seen = FxHashSet::default();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            if !seen.insert(current.clone()) {
                continue;
            }
            stack.extend(node.children().iter().rev().cloned());
            out.push(current);
        }
        out
    }

    /// Self-contained copy of the subtree rooted at `id`.
    pub fn subtree(&self, id: &SyntheticId) -> Option<VTree> {
        if !self.contains(id) {
            return None;
        }
        let nodes = self
            .descendants(id)
            .into_iter()
            .filter_map(|d| self.nodes.get(&d).map(|n| (d, n.clone())))
            .collect();
        Some(VTree {
            root_id: id.clone(),
            nodes,
        })
    }

    /// Check the rooted-tree invariants: the root resolves and has no
    /// parent, every child id resolves, parent links agree with child lists,
    /// no node is reached twice and no node is unreachable.
    pub fn validate(&self) -> Result<(), TreeIntegrityError> {
        let root = self
            .nodes
            .get(&self.root_id)
            .ok_or_else(|| TreeIntegrityError::MissingRoot(self.root_id.clone()))?;
        if root.parent_id.is_some() {
            return Err(TreeIntegrityError::ParentMismatch {
                id: self.root_id.clone(),
                expected: None,
                found: root.parent_id.clone(),
            });
        }

        let mut seen = FxHashSet::default();
        let mut stack = vec![&self.root_id];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                return Err(TreeIntegrityError::Cycle(id.clone()));
            }
            let node = &self.nodes[id];
            for child in node.children() {
                let child_node =
                    self.nodes
                        .get(child)
                        .ok_or_else(|| TreeIntegrityError::DanglingChild {
                            parent: id.clone(),
                            child: child.clone(),
                        })?;
                if child_node.parent_id.as_ref() != Some(id) {
                    return Err(TreeIntegrityError::ParentMismatch {
                        id: child.clone(),
                        expected: Some(id.clone()),
                        found: child_node.parent_id.clone(),
                    });
                }
                stack.push(child);
            }
        }

        if let Some(orphan) = self.nodes.keys().find(|id| !seen.contains(id)) {
            return Err(TreeIntegrityError::Unreachable(orphan.clone()));
        }
        Ok(())
    }

    /// Nodes sorted by id, for deterministic output.
    pub fn sorted_nodes(&self) -> Vec<&VNode> {
        let mut nodes: Vec<&VNode> = self.nodes.values().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }
}

/// Compose node records into a tree.
///
/// The first record becomes the root. Later records either replace an
/// existing node with the same id or attach under their declared parent,
/// which must already be present. A child id the parent already lists is
/// not appended twice. On error `tree` is left as it was.
///
/// Replacing a node updates its content only: the parent must stay the same
/// (`ParentMismatch` otherwise) and the existing child list is kept, so a
/// node that still has children cannot become a text node.
pub fn create_or_update_vtree(
    tree: &mut Option<VTree>,
    node: VNode,
) -> Result<(), TreeIntegrityError> {
    let Some(t) = tree.as_mut() else {
        if let Some(parent) = node.parent_id.clone() {
            return Err(TreeIntegrityError::MissingParent {
                id: node.id,
                parent,
            });
        }
        *tree = Some(VTree::new(node));
        return Ok(());
    };

    if let Some(existing) = t.nodes.get_mut(&node.id) {
        if existing.parent_id != node.parent_id {
            return Err(TreeIntegrityError::ParentMismatch {
                id: node.id,
                expected: existing.parent_id.clone(),
                found: node.parent_id,
            });
        }
        let kept = existing.children().to_vec();
        let mut node = node;
        match node.children_mut() {
            Some(children) => *children = kept,
            None if !kept.is_empty() => return Err(TreeIntegrityError::NotAContainer(node.id)),
            None => {}
        }
        *existing = node;
        return Ok(());
    }

    let Some(parent_id) = node.parent_id.clone() else {
        return Err(TreeIntegrityError::Detached(node.id));
    };
    let parent = t
        .nodes
        .get_mut(&parent_id)
        .ok_or_else(|| TreeIntegrityError::MissingParent {
            id: node.id.clone(),
            parent: parent_id.clone(),
        })?;
    let children = parent
        .children_mut()
        .ok_or_else(|| TreeIntegrityError::NotAContainer(parent_id.clone()))?;
    if !children.contains(&node.id) {
        children.push(node.id.clone());
    }
    t.nodes.insert(node.id.clone(), node);
    Ok(())
}
