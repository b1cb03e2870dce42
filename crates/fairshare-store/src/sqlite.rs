//! SQLite-backed `HierarchyReader`/`HierarchyWriter`, grounded on
//! `original_source/src/fairness/reader/data_reader_db.cpp` and
//! `.../writer/data_writer_db.cpp`.
//!
//! Schema (spec.md §6):
//!
//! ```text
//! bank_table(bank, parent_bank, shares, active)
//! association_table(username, bank, shares, job_usage, fairshare, active)
//! ```

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use fairshare_core::node::Tree;

use crate::error::StoreResult;
use crate::reader::{build_tree, parse_count, AssociationRow, HierarchyReader, RowSource};
use crate::writer::{write_tree, HierarchyWriter, RowSink};

/// Durability pragmas from spec.md §4.3: WAL journaling, `synchronous=NORMAL`,
/// in-memory temp, and a 30s busy timeout. These are performance hints, not
/// correctness requirements, and are applied identically for reads and writes.
fn open(path: &Path) -> StoreResult<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(30))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    Ok(conn)
}

/// SQLite-backed reader/writer pair for the flux-accounting-shaped schema.
///
/// A single type implements both traits: the teacher's reader/writer split
/// is a trait-level distinction, not a reason to open two connections.
pub struct SqliteStore;

impl SqliteStore {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for SqliteStore {
    fn default() -> Self {
        Self::new()
    }
}

struct ConnSource<'a>(&'a Connection);

impl RowSource for ConnSource<'_> {
    fn root_bank(&self) -> StoreResult<String> {
        let mut stmt = self
            .0
            .prepare("SELECT bank FROM bank_table WHERE parent_bank = '' AND active = 1")?;
        let roots = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        match roots.len() {
            0 => Err(crate::error::StoreError::RootMissing),
            1 => Ok(roots.into_iter().next().expect("len checked")),
            _ => Err(crate::error::StoreError::MultipleRoots(roots)),
        }
    }

    fn bank_shares(&self, bank: &str) -> StoreResult<u64> {
        let raw: String = self.0.query_row(
            "SELECT shares FROM bank_table WHERE bank = ?1",
            [bank],
            |row| row.get(0),
        )?;
        parse_count("bank_table", "shares", bank, &raw)
    }

    fn active_child_banks(&self, bank: &str) -> StoreResult<Vec<String>> {
        let mut stmt = self.0.prepare(
            "SELECT bank FROM bank_table WHERE parent_bank = ?1 AND active = 1 ORDER BY bank",
        )?;
        let rows = stmt
            .query_map([bank], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn active_associations(&self, bank: &str) -> StoreResult<Vec<AssociationRow>> {
        let mut stmt = self.0.prepare(
            "SELECT username, shares, job_usage, fairshare FROM association_table \
             WHERE bank = ?1 AND active = 1 ORDER BY username",
        )?;
        let rows = stmt
            .query_map([bank], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(username, shares, usage, fairshare)| {
                let shares = parse_count("association_table", "shares", &username, &shares)?;
                let usage = parse_count("association_table", "job_usage", &username, &usage)?;
                // fairshare is a REAL column here, already typed; per spec.md §9
                // the typed reader wins over any string-coercion path.
                Ok(AssociationRow { username, shares, usage, fairshare })
            })
            .collect()
    }
}

struct ConnSink<'a>(&'a Connection);

impl RowSink for ConnSink<'_> {
    fn update_fairshare(&mut self, username: &str, bank: &str, fairshare: f64) -> StoreResult<()> {
        self.0.execute(
            "UPDATE association_table SET fairshare = ?1 WHERE username = ?2 AND bank = ?3",
            rusqlite::params![fairshare, username, bank],
        )?;
        Ok(())
    }
}

impl HierarchyReader for SqliteStore {
    fn load(&self, path: &Path) -> StoreResult<Tree> {
        let conn = open(path)?;
        build_tree(&ConnSource(&conn))
    }
}

impl HierarchyWriter for SqliteStore {
    fn write(&mut self, path: &Path, tree: &Tree) -> StoreResult<()> {
        let conn = open(path)?;
        let mut sink = ConnSink(&conn);
        write_tree(&mut sink, tree)
    }
}
