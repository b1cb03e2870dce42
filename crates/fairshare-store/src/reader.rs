//! The `HierarchyReader` trait and the backend-agnostic loader algorithm
//! (spec.md §4.1), grounded on `original_source/src/fairness/reader/data_reader_db.cpp`'s
//! `get_sub_banks`.
//!
//! Concrete backends ([`crate::sqlite::SqliteStore`], [`crate::memory::MemoryStore`])
//! only need to implement [`RowSource`]; the depth-first build and the
//! usage-aggregation pass are shared here so both backends stay consistent
//! with §4.1 step 5 by construction.

use std::path::Path;

use fairshare_core::node::{NodeId, Tree};

use crate::error::{StoreError, StoreResult};

/// One row of `association_table`, already filtered to `active = 1`.
#[derive(Debug, Clone)]
pub struct AssociationRow {
    pub username: String,
    pub shares: u64,
    pub usage: u64,
    pub fairshare: f64,
}

/// Read access to the three record shapes of spec.md §6, independent of the
/// backing storage engine.
pub trait RowSource {
    /// The unique bank whose `parent_bank` is empty.
    fn root_bank(&self) -> StoreResult<String>;
    /// `bank_table.shares` for `bank`.
    fn bank_shares(&self, bank: &str) -> StoreResult<u64>;
    /// Active child banks of `bank`, lexically ordered.
    fn active_child_banks(&self, bank: &str) -> StoreResult<Vec<String>>;
    /// Active associations under `bank`, ordered by username.
    fn active_associations(&self, bank: &str) -> StoreResult<Vec<AssociationRow>>;
}

/// Loads an account-node [`Tree`] from any [`RowSource`], per spec.md §4.1.
pub trait HierarchyReader {
    /// Build the tree rooted at the unique bank whose parent is empty.
    fn load(&self, path: &Path) -> StoreResult<Tree>;
}

/// The depth-first build shared by every `HierarchyReader` impl: locate the
/// root, then recurse bank-first, falling back to associations at a leaf
/// bank and folding their summed usage up every ancestor exactly once.
pub fn build_tree(source: &dyn RowSource) -> StoreResult<Tree> {
    let root_name = source.root_bank()?;
    let root_shares = source.bank_shares(&root_name)?;
    let mut tree = Tree::new_root(root_name.clone(), root_shares);
    let root_id = tree.root();

    descend(source, &mut tree, root_id, &root_name)?;
    Ok(tree)
}

fn descend(
    source: &dyn RowSource,
    tree: &mut Tree,
    node_id: NodeId,
    bank_name: &str,
) -> StoreResult<()> {
    let child_banks = source.active_child_banks(bank_name)?;

    if !child_banks.is_empty() {
        for child_bank in child_banks {
            let shares = source.bank_shares(&child_bank)?;
            let child_id = tree.add_child(node_id, child_bank.clone(), false, shares, 0)?;
            descend(source, tree, child_id, &child_bank)?;
        }
        return Ok(());
    }

    let mut bank_usage = 0u64;
    for assoc in source.active_associations(bank_name)? {
        tree.add_child(node_id, assoc.username, true, assoc.shares, assoc.usage)?;
        bank_usage += assoc.usage;
    }
    tree.add_usage_to_ancestors(node_id, bank_usage)?;
    Ok(())
}

/// Parses a `shares`/`usage` column, producing a typed [`StoreError`] on
/// failure rather than propagating the raw parse error.
pub fn parse_count(table: &'static str, column: &'static str, row: &str, raw: &str) -> StoreResult<u64> {
    raw.parse::<u64>().map_err(|source| StoreError::InvalidInteger {
        table,
        column,
        row: row.to_string(),
        source,
    })
}

/// Parses a `fairshare` column as `f64`. Per spec.md §9, an empty string is
/// never silently coerced to `0.0`.
pub fn parse_fairshare(table: &'static str, row: &str, raw: &str) -> StoreResult<f64> {
    if raw.trim().is_empty() {
        return Err(StoreError::InvalidFairshare {
            table,
            row: row.to_string(),
            detail: "empty string".to_string(),
        });
    }
    raw.parse::<f64>().map_err(|e| StoreError::InvalidFairshare {
        table,
        row: row.to_string(),
        detail: e.to_string(),
    })
}
