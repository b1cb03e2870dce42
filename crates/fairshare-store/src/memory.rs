//! An in-memory `HierarchyReader`/`HierarchyWriter`, for tests that want to
//! exercise the loader/walk/writer pipeline without a SQLite file (spec.md
//! §9's "an in-memory implementation is recommended for tests").

use std::path::Path;

use fairshare_core::node::Tree;

use crate::error::{StoreError, StoreResult};
use crate::reader::{build_tree, AssociationRow, HierarchyReader, RowSource};
use crate::writer::{write_tree, HierarchyWriter, RowSink};

/// One row of `bank_table`.
#[derive(Debug, Clone)]
pub struct BankRow {
    pub bank: String,
    pub parent_bank: String,
    pub shares: u64,
    pub active: bool,
}

/// One row of `association_table`.
#[derive(Debug, Clone)]
pub struct AssocRow {
    pub username: String,
    pub bank: String,
    pub shares: u64,
    pub job_usage: u64,
    pub fairshare: f64,
    pub active: bool,
}

/// A full accounting-store snapshot held in memory. The `path` argument of
/// [`HierarchyReader::load`]/[`HierarchyWriter::write`] is ignored; this
/// store always reads/writes its own tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub banks: Vec<BankRow>,
    pub associations: Vec<AssocRow>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bank(&mut self, bank: impl Into<String>, parent: impl Into<String>, shares: u64) -> &mut Self {
        self.banks.push(BankRow {
            bank: bank.into(),
            parent_bank: parent.into(),
            shares,
            active: true,
        });
        self
    }

    pub fn add_association(
        &mut self,
        username: impl Into<String>,
        bank: impl Into<String>,
        shares: u64,
        usage: u64,
    ) -> &mut Self {
        self.associations.push(AssocRow {
            username: username.into(),
            bank: bank.into(),
            shares,
            job_usage: usage,
            fairshare: 0.0,
            active: true,
        });
        self
    }

    #[must_use]
    pub fn fairshare_of(&self, username: &str, bank: &str) -> Option<f64> {
        self.associations
            .iter()
            .find(|a| a.username == username && a.bank == bank)
            .map(|a| a.fairshare)
    }
}

impl RowSource for MemoryStore {
    fn root_bank(&self) -> StoreResult<String> {
        let roots: Vec<&str> = self
            .banks
            .iter()
            .filter(|b| b.active && b.parent_bank.is_empty())
            .map(|b| b.bank.as_str())
            .collect();
        match roots.len() {
            0 => Err(StoreError::RootMissing),
            1 => Ok(roots[0].to_string()),
            _ => Err(StoreError::MultipleRoots(roots.iter().map(|s| s.to_string()).collect())),
        }
    }

    fn bank_shares(&self, bank: &str) -> StoreResult<u64> {
        self.banks
            .iter()
            .find(|b| b.bank == bank)
            .map(|b| b.shares)
            .ok_or_else(|| StoreError::BankNotFound(bank.to_string()))
    }

    fn active_child_banks(&self, bank: &str) -> StoreResult<Vec<String>> {
        let mut children: Vec<String> = self
            .banks
            .iter()
            .filter(|b| b.active && b.parent_bank == bank)
            .map(|b| b.bank.clone())
            .collect();
        children.sort();
        Ok(children)
    }

    fn active_associations(&self, bank: &str) -> StoreResult<Vec<AssociationRow>> {
        let mut rows: Vec<AssociationRow> = self
            .associations
            .iter()
            .filter(|a| a.active && a.bank == bank)
            .map(|a| AssociationRow {
                username: a.username.clone(),
                shares: a.shares,
                usage: a.job_usage,
                fairshare: a.fairshare,
            })
            .collect();
        rows.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(rows)
    }
}

impl RowSink for MemoryStore {
    fn update_fairshare(&mut self, username: &str, bank: &str, fairshare: f64) -> StoreResult<()> {
        if let Some(row) = self
            .associations
            .iter_mut()
            .find(|a| a.username == username && a.bank == bank)
        {
            row.fairshare = fairshare;
        }
        Ok(())
    }
}

impl HierarchyReader for MemoryStore {
    fn load(&self, _path: &Path) -> StoreResult<Tree> {
        build_tree(self)
    }
}

impl HierarchyWriter for MemoryStore {
    fn write(&mut self, _path: &Path, tree: &Tree) -> StoreResult<()> {
        write_tree(self, tree)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn sample_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.add_bank("root", "", 1);
        store.add_bank("A", "root", 10);
        store.add_bank("B", "root", 5);
        store.add_association("alice", "A", 1, 100);
        store.add_association("bob", "A", 1, 50);
        store.add_association("carol", "B", 1, 10);
        store
    }

    #[test]
    fn root_missing_when_no_root_bank() {
        let store = MemoryStore::new();
        assert_matches!(store.root_bank(), Err(StoreError::RootMissing));
    }

    #[test]
    fn multiple_roots_rejected() {
        let mut store = MemoryStore::new();
        store.add_bank("root1", "", 1);
        store.add_bank("root2", "", 1);
        assert_matches!(store.root_bank(), Err(StoreError::MultipleRoots(_)));
    }

    #[test]
    fn load_then_write_round_trips_non_fairshare_columns() {
        let store = sample_store();
        let mut tree = store.load(Path::new("ignored")).unwrap();
        fairshare_core::run_weighted_walk(&mut tree).unwrap();

        let mut store2 = store.clone();
        store2.write(Path::new("ignored"), &tree).unwrap();

        for (orig, updated) in store.associations.iter().zip(store2.associations.iter()) {
            assert_eq!(orig.username, updated.username);
            assert_eq!(orig.bank, updated.bank);
            assert_eq!(orig.shares, updated.shares);
            assert_eq!(orig.job_usage, updated.job_usage);
        }
        assert!(store2.fairshare_of("alice", "A").unwrap() > 0.0);
    }
}
