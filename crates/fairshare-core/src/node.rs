//! Arena-backed account-node hierarchy.
//!
//! Nodes are stored in a flat `Vec` and referenced by index
//! (see design note in `SPEC_FULL.md` §A / the teacher's
//! `aura-core::tree::types::NodeIndex`). This avoids back-reference cycles:
//! a node's parent is an index into the same arena rather than a shared
//! owning pointer, and the walk operates purely on indices.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{CoreError, CoreResult};

/// Index of a node within a [`Tree`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node#{}", self.0)
    }
}

/// A bank (internal node) or association (leaf) in the fairshare hierarchy.
///
/// See spec.md §3 for the full invariant list; this type only carries the
/// data, the invariants are maintained by [`Tree`]'s mutation methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountNode {
    /// Unique within `parent`; an association's name is its username.
    pub name: String,
    /// `true` for associations (leaves), `false` for banks.
    pub is_user: bool,
    /// Non-negative share allocation, relative to siblings.
    pub shares: u64,
    /// Accumulated usage. For banks this is the sum of descendant usage.
    pub usage: u64,
    /// Fairshare in `(0, 1]` once the walk has run; `0.0` until then.
    pub fairshare: f64,
    /// Parent node, or `None` for the root.
    pub parent: Option<NodeId>,
    /// Children, in the order the walk leaves them (insertion order until
    /// the walk sorts them).
    pub children: Vec<NodeId>,
    /// Sibling-relative weight, valid only during/after a walk.
    pub weight: f64,
    /// Post-order rank assigned by the walk; meaningless for internal nodes.
    pub rank: u64,
    /// `1 + sum(children.subtree_size)`.
    pub subtree_size: u64,
    /// Count of `is_user` descendants (or `1` if this node itself is a leaf).
    pub subtree_leaf_size: u64,
    /// Transient flag set by the walk when this leaf ties with the next.
    pub tie_with_next: bool,
}

impl AccountNode {
    fn new(parent: Option<NodeId>, name: String, is_user: bool, shares: u64, usage: u64) -> Self {
        Self {
            name,
            is_user,
            shares,
            usage,
            fairshare: 0.0,
            parent,
            children: Vec::new(),
            weight: 0.0,
            rank: 0,
            subtree_size: 1,
            subtree_leaf_size: u64::from(is_user),
            tie_with_next: false,
        }
    }

    /// `true` if this node has no children (an association, by construction).
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// An account-node hierarchy, rooted at a single bank.
///
/// Construction invariant: exactly one node (index 0) has `parent == None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<AccountNode>,
    root: NodeId,
}

impl Tree {
    /// Create a tree containing only its root bank.
    #[must_use]
    pub fn new_root(name: impl Into<String>, shares: u64) -> Self {
        let root = AccountNode::new(None, name.into(), false, shares, 0);
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    /// The root node's id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Borrow a node by id.
    pub fn node(&self, id: NodeId) -> CoreResult<&AccountNode> {
        self.nodes
            .get(id.0 as usize)
            .ok_or(CoreError::InvalidNode(id))
    }

    /// Mutably borrow a node by id.
    pub fn node_mut(&mut self, id: NodeId) -> CoreResult<&mut AccountNode> {
        self.nodes
            .get_mut(id.0 as usize)
            .ok_or(CoreError::InvalidNode(id))
    }

    /// Number of nodes in the arena (banks and associations).
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` if the tree is empty (never the case once `new_root` ran).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a child node under `parent`, maintaining `subtree_size` and
    /// `subtree_leaf_size` on `parent` and every ancestor above it.
    ///
    /// Mirrors the teacher hierarchy's `add_child` + `propagate_subtree_size`
    /// pair: the parent itself is updated directly, then the increment
    /// is walked up the remaining ancestor chain.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        is_user: bool,
        shares: u64,
        usage: u64,
    ) -> CoreResult<NodeId> {
        self.node(parent)?; // bounds check
        let child_id = NodeId(u32::try_from(self.nodes.len()).expect("arena overflow"));
        let child = AccountNode::new(Some(parent), name.into(), is_user, shares, usage);
        self.nodes.push(child);

        self.node_mut(parent)?.children.push(child_id);

        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            let node = self.node_mut(id)?;
            node.subtree_size += 1;
            if is_user {
                node.subtree_leaf_size += 1;
            }
            cursor = node.parent;
        }
        Ok(child_id)
    }

    /// Add `amount` to `start`'s usage and to every ancestor above it,
    /// inclusive. Used by the loader to fold an association-carrying
    /// bank's summed usage up to the root (spec.md §4.1 step 5).
    pub fn add_usage_to_ancestors(&mut self, start: NodeId, amount: u64) -> CoreResult<()> {
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            let node = self.node_mut(id)?;
            node.usage += amount;
            cursor = node.parent;
        }
        Ok(())
    }

    /// Iterate all node ids in arena order (parents are always inserted
    /// before their children, so this is a valid topological order).
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(|i| NodeId(u32::try_from(i).expect("arena overflow")))
    }
}
