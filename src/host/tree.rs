//! Retained-mode UI tree.
//!
//! The host renders plugin output into a tree of typed nodes and ships
//! changes to the supervisor as ordered deltas. The supervisor keeps its
//! own copy of the tree and applies each delta in send order, so both
//! sides converge without ever serializing the whole tree after the first
//! render.

use serde::{Deserialize, Serialize};

/// One node in the UI tree.
///
/// `kind` is the component name ("list", "list-item", "detail", ...);
/// `props` carries whatever that component needs. Node ids are unique
/// within a tree and stable across re-renders of the same logical node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiNode {
    pub id: u64,
    pub kind: String,
    #[serde(default)]
    pub props: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub children: Vec<UiNode>,
}

impl UiNode {
    pub fn new(id: u64, kind: impl Into<String>) -> Self {
        Self { id, kind: kind.into(), props: serde_json::Map::new(), children: Vec::new() }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.props.insert(key.into(), value);
        self
    }

    pub fn with_child(mut self, child: UiNode) -> Self {
        self.children.push(child);
        self
    }

    fn find_mut(&mut self, id: u64) -> Option<&mut UiNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    fn remove_child_by_id(&mut self, id: u64) -> bool {
        if let Some(pos) = self.children.iter().position(|c| c.id == id) {
            self.children.remove(pos);
            return true;
        }
        self.children.iter_mut().any(|c| c.remove_child_by_id(id))
    }
}

/// A single mutation of the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum UiPatch {
    /// Replace the whole tree (first render, or structural change too
    /// large to express incrementally).
    Replace { node: UiNode },
    /// Overwrite the props of an existing node.
    SetProps { id: u64, props: serde_json::Map<String, serde_json::Value> },
    /// Insert a child under `parent` at `index`.
    InsertChild { parent: u64, index: usize, node: UiNode },
    /// Remove a node (and its subtree) wherever it is.
    RemoveChild { id: u64 },
    /// Clear the tree entirely.
    Clear,
}

/// An ordered batch of patches. `seq` increases by one per delta so the
/// receiving side can assert ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiDelta {
    pub seq: u64,
    pub patches: Vec<UiPatch>,
}

/// The retained tree plus the delta sequence counter.
#[derive(Debug, Default)]
pub struct UiTree {
    root: Option<UiNode>,
    seq: u64,
}

impl UiTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<&UiNode> {
        self.root.as_ref()
    }

    pub fn last_seq(&self) -> u64 {
        self.seq
    }

    /// Replace the rendered tree, producing the delta that transforms the
    /// previous state into `next`.
    pub fn render(&mut self, next: UiNode) -> UiDelta {
        let patches = match self.root.take() {
            None => vec![UiPatch::Replace { node: next.clone() }],
            Some(prev) => diff(&prev, &next),
        };
        self.root = Some(next);
        self.seq += 1;
        UiDelta { seq: self.seq, patches }
    }

    /// Apply a delta received from the other side.
    ///
    /// Out-of-order deltas indicate a protocol violation and are rejected;
    /// the caller decides whether that tears the session down.
    pub fn apply(&mut self, delta: &UiDelta) -> Result<(), String> {
        if delta.seq != self.seq + 1 {
            return Err(format!(
                "out-of-order delta: expected seq {}, got {}",
                self.seq + 1,
                delta.seq
            ));
        }
        for patch in &delta.patches {
            self.apply_patch(patch)?;
        }
        self.seq = delta.seq;
        Ok(())
    }

    fn apply_patch(&mut self, patch: &UiPatch) -> Result<(), String> {
        match patch {
            UiPatch::Replace { node } => {
                self.root = Some(node.clone());
                Ok(())
            }
            UiPatch::Clear => {
                self.root = None;
                Ok(())
            }
            UiPatch::SetProps { id, props } => {
                let root = self.root.as_mut().ok_or("set-props on empty tree")?;
                let node = root.find_mut(*id).ok_or_else(|| format!("no node with id {id}"))?;
                node.props = props.clone();
                Ok(())
            }
            UiPatch::InsertChild { parent, index, node } => {
                let root = self.root.as_mut().ok_or("insert-child on empty tree")?;
                let target =
                    root.find_mut(*parent).ok_or_else(|| format!("no node with id {parent}"))?;
                let index = (*index).min(target.children.len());
                target.children.insert(index, node.clone());
                Ok(())
            }
            UiPatch::RemoveChild { id } => {
                let root = self.root.as_mut().ok_or("remove-child on empty tree")?;
                if root.id == *id {
                    self.root = None;
                    return Ok(());
                }
                if root.remove_child_by_id(*id) {
                    Ok(())
                } else {
                    Err(format!("no node with id {id}"))
                }
            }
        }
    }
}

/// Diff two trees into a patch list.
///
/// Children are matched by id. A node whose kind changed is replaced
/// wholesale; matched nodes get prop patches and recurse.
fn diff(prev: &UiNode, next: &UiNode) -> Vec<UiPatch> {
    if prev.id != next.id || prev.kind != next.kind {
        return vec![UiPatch::Replace { node: next.clone() }];
    }

    let mut patches = Vec::new();
    if prev.props != next.props {
        patches.push(UiPatch::SetProps { id: next.id, props: next.props.clone() });
    }

    for prev_child in &prev.children {
        if !next.children.iter().any(|c| c.id == prev_child.id) {
            patches.push(UiPatch::RemoveChild { id: prev_child.id });
        }
    }
    for (index, next_child) in next.children.iter().enumerate() {
        match prev.children.iter().find(|c| c.id == next_child.id) {
            Some(prev_child) => patches.extend(diff(prev_child, next_child)),
            None => patches.push(UiPatch::InsertChild {
                parent: next.id,
                index,
                node: next_child.clone(),
            }),
        }
    }
    patches
}
