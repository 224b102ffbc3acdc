//! Reversible document patches.
//!
//! Every patch carries enough information to be undone: value patches keep
//! the previous value, and `AddNodes`/`RemoveNodes` are mirror images of one
//! another. `apply_patch(tree, p, true)` undoes `apply_patch(tree, p, false)`.
//!
//! Invariants maintained by [`apply_patch`]:
//! - Value patches on a missing node are no-ops.
//! - Re-adding a subtree whose root is already present is a no-op.
//! - Removing an absent subtree is a no-op.
//! - No child list ever names an id missing from the node map.

use serde::{Deserialize, Serialize};

use crate::error::TreeIntegrityError;
use crate::id::SyntheticId;
use crate::vdom::{VNodeKind, VTree};

/// Property names understood by the `*Property` patches.
pub const PROP_CHECKED: &str = "checked";
pub const PROP_VALUE: &str = "value";
pub const PROP_SELECTED_INDEX: &str = "selectedIndex";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSplice {
    pub parent_id: SyntheticId,
    pub previous_sibling_id: Option<SyntheticId>,
    pub next_sibling_id: Option<SyntheticId>,
    pub nodes: Vec<VTree>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Patch {
    Attribute {
        target_id: SyntheticId,
        name: String,
        value: Option<String>,
        old_value: Option<String>,
    },
    Text {
        target_id: SyntheticId,
        value: String,
        old_value: String,
    },
    BooleanProperty {
        target_id: SyntheticId,
        name: String,
        value: bool,
        old_value: bool,
    },
    NumberProperty {
        target_id: SyntheticId,
        name: String,
        value: i32,
        old_value: i32,
    },
    TextProperty {
        target_id: SyntheticId,
        name: String,
        value: String,
        old_value: String,
    },
    AddNodes(NodeSplice),
    RemoveNodes(NodeSplice),
}

impl Patch {
    /// Node the patch acts on: the target for value patches, the parent for
    /// structural ones.
    pub fn target(&self) -> &SyntheticId {
        match self {
            Patch::Attribute { target_id, .. }
            | Patch::Text { target_id, .. }
            | Patch::BooleanProperty { target_id, .. }
            | Patch::NumberProperty { target_id, .. }
            | Patch::TextProperty { target_id, .. } => target_id,
            Patch::AddNodes(s) | Patch::RemoveNodes(s) => &s.parent_id,
        }
    }

    /// Patch that undoes this one when applied forward.
    pub fn inverse(&self) -> Patch {
        match self.clone() {
            Patch::Attribute {
                target_id,
                name,
                value,
                old_value,
            } => Patch::Attribute {
                target_id,
                name,
                value: old_value,
                old_value: value,
            },
            Patch::Text {
                target_id,
                value,
                old_value,
            } => Patch::Text {
                target_id,
                value: old_value,
                old_value: value,
            },
            Patch::BooleanProperty {
                target_id,
                name,
                value,
                old_value,
            } => Patch::BooleanProperty {
                target_id,
                name,
                value: old_value,
                old_value: value,
            },
            Patch::NumberProperty {
                target_id,
                name,
                value,
                old_value,
            } => Patch::NumberProperty {
                target_id,
                name,
                value: old_value,
                old_value: value,
            },
            Patch::TextProperty {
                target_id,
                name,
                value,
                old_value,
            } => Patch::TextProperty {
                target_id,
                name,
                value: old_value,
                old_value: value,
            },
            Patch::AddNodes(s) => Patch::RemoveNodes(s),
            Patch::RemoveNodes(s) => Patch::AddNodes(s),
        }
    }
}

/// Apply `patch` to `tree`, or undo it when `revert` is set.
pub fn apply_patch(tree: &mut VTree, patch: &Patch, revert: bool) -> Result<(), TreeIntegrityError> {
    match patch {
        Patch::Attribute {
            target_id,
            name,
            value,
            old_value,
        } => {
            let v = if revert { old_value } else { value };
            if let Some(el) = tree.get_mut(target_id).and_then(|n| n.as_element_mut()) {
                match v {
                    Some(v) => {
                        el.attributes.insert(name.clone(), Some(v.clone()));
                    }
                    None => {
                        el.attributes.remove(name);
                    }
                }
            }
        }
        Patch::Text {
            target_id,
            value,
            old_value,
        } => {
            let v = if revert { old_value } else { value };
            if let Some(node) = tree.get_mut(target_id) {
                if let VNodeKind::Text { value } = &mut node.kind {
                    value.clone_from(v);
                }
            }
        }
        Patch::BooleanProperty {
            target_id,
            name,
            value,
            old_value,
        } => {
            let v = if revert { *old_value } else { *value };
            set_property(tree, target_id, name, |props| match name.as_str() {
                PROP_CHECKED => {
                    props.checked = Some(v);
                    true
                }
                _ => false,
            });
        }
        Patch::NumberProperty {
            target_id,
            name,
            value,
            old_value,
        } => {
            let v = if revert { *old_value } else { *value };
            set_property(tree, target_id, name, |props| match name.as_str() {
                PROP_SELECTED_INDEX => {
                    props.selected_index = Some(v);
                    true
                }
                _ => false,
            });
        }
        Patch::TextProperty {
            target_id,
            name,
            value,
            old_value,
        } => {
            let v = if revert { old_value } else { value };
            set_property(tree, target_id, name, |props| match name.as_str() {
                PROP_VALUE => {
                    props.value = Some(v.clone());
                    true
                }
                _ => false,
            });
        }
        Patch::AddNodes(splice) => {
            if revert {
                remove_nodes(tree, splice);
            } else {
                add_nodes(tree, splice)?;
            }
        }
        Patch::RemoveNodes(splice) => {
            if revert {
                add_nodes(tree, splice)?;
            } else {
                remove_nodes(tree, splice);
            }
        }
    }
    Ok(())
}

fn set_property<F>(tree: &mut VTree, target: &SyntheticId, name: &str, assign: F)
where
    F: FnOnce(&mut crate::vdom::ElementProperties) -> bool,
{
    let Some(el) = tree.get_mut(target).and_then(|n| n.as_element_mut()) else {
        return;
    };
    if !assign(&mut el.properties) {
        log::warn!("ignoring unknown property '{name}' on node {target}");
    }
}

// ───────────────────────────────────────────────────────────────────
// Structural patches
// ───────────────────────────────────────────────────────────────────

fn add_nodes(tree: &mut VTree, splice: &NodeSplice) -> Result<(), TreeIntegrityError> {
    let parent_id = &splice.parent_id;
    let parent = tree
        .get(parent_id)
        .ok_or_else(|| TreeIntegrityError::MissingNode(parent_id.clone()))?;
    let siblings = parent.children();
    if matches!(parent.kind, VNodeKind::Text { .. } | VNodeKind::DocType { .. }) {
        return Err(TreeIntegrityError::NotAContainer(parent_id.clone()));
    }
    let mut at = insertion_index(
        siblings,
        splice.previous_sibling_id.as_ref(),
        splice.next_sibling_id.as_ref(),
    );

    for sub in &splice.nodes {
        if tree.contains(&sub.root_id) {
            log::warn!(
                "AddNodes: node {} already present under {}, skipping",
                sub.root_id,
                parent_id
            );
            continue;
        }
        if !sub.nodes.contains_key(&sub.root_id) {
            log::warn!("AddNodes: subtree root {} missing from its node map", sub.root_id);
            continue;
        }
        // Only what is reachable from the subtree root is spliced in.
        for id in sub.descendants(&sub.root_id) {
            if let Some(node) = sub.nodes.get(&id) {
                let mut node = node.clone();
                if id == sub.root_id {
                    node.parent_id = Some(parent_id.clone());
                }
                tree.nodes.insert(id, node);
            }
        }
        if let Some(children) = tree.get_mut(parent_id).and_then(|p| p.children_mut()) {
            children.insert(at.min(children.len()), sub.root_id.clone());
            at += 1;
        }
    }
    Ok(())
}

fn remove_nodes(tree: &mut VTree, splice: &NodeSplice) {
    for sub in &splice.nodes {
        let root = &sub.root_id;
        if root == &tree.root_id {
            log::warn!("RemoveNodes: refusing to remove tree root {root}");
            continue;
        }
        let Some(node) = tree.get(root) else {
            continue;
        };
        let actual_parent = node.parent_id.clone();

        // The live subtree decides what goes. Nodes the patch lists but that
        // have since moved elsewhere stay where they are.
        let doomed = tree.descendants(root);
        for id in &doomed {
            if id != &tree.root_id {
                tree.nodes.remove(id);
            }
        }

        for parent in [Some(&splice.parent_id), actual_parent.as_ref()].into_iter().flatten() {
            if let Some(children) = tree.get_mut(parent).and_then(|p| p.children_mut()) {
                children.retain(|c| c != root);
            }
        }
    }
}

/// Position for new children: after a found previous sibling, else before a
/// found next sibling, else at the start when only a next sibling was
/// declared, else at the end.
fn insertion_index(
    siblings: &[SyntheticId],
    previous: Option<&SyntheticId>,
    next: Option<&SyntheticId>,
) -> usize {
    if let Some(i) = previous.and_then(|p| siblings.iter().position(|s| s == p)) {
        return i + 1;
    }
    if let Some(i) = next.and_then(|n| siblings.iter().position(|s| s == n)) {
        return i;
    }
    if previous.is_none() && next.is_some() {
        return 0;
    }
    siblings.len()
}
