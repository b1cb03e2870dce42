//! The `HierarchyWriter` trait and the shared fairshare-persisting walk
//! (spec.md §4.3), grounded on
//! `original_source/src/fairness/writer/data_writer_db.cpp::update_fairshare_values`.

use std::path::Path;

use fairshare_core::node::{NodeId, Tree};

use crate::error::StoreResult;

/// Write access for persisting fairshare values, independent of backend.
pub trait RowSink {
    /// Persist `fairshare` for the `(username, bank)` pair. Other columns on
    /// that row are left untouched.
    fn update_fairshare(&mut self, username: &str, bank: &str, fairshare: f64) -> StoreResult<()>;
}

/// Persists the fairshare values computed by [`fairshare_core::run_weighted_walk`]
/// back to the accounting store, per spec.md §4.3.
pub trait HierarchyWriter {
    /// Update `fairshare` for every leaf in `tree`, keyed by `(username, bank)`.
    fn write(&mut self, path: &Path, tree: &Tree) -> StoreResult<()>;
}

/// Recurses the tree, writing every leaf's fairshare through `sink`. Shared
/// by every `HierarchyWriter` impl so the walk order (and therefore which
/// statement executes first) doesn't drift between backends.
pub fn write_tree(sink: &mut dyn RowSink, tree: &Tree) -> StoreResult<()> {
    write_subtree(sink, tree, tree.root())
}

fn write_subtree(sink: &mut dyn RowSink, tree: &Tree, node_id: NodeId) -> StoreResult<()> {
    let node = tree.node(node_id)?;
    if node.is_user {
        let bank = tree.node(node.parent.expect("association always has a parent bank"))?;
        sink.update_fairshare(&node.name, &bank.name, node.fairshare)?;
        return Ok(());
    }
    for &child in &node.children.clone() {
        write_subtree(sink, tree, child)?;
    }
    Ok(())
}
