//! Configuration for the `update-fshare`/`shares` binaries: the accounting
//! database path and the priority-formula weights, loadable from TOML with
//! environment-variable overrides.
//!
//! Priority merging follows the teacher's source-priority order (Defaults <
//! File < Environment < CommandLine, see `aura-core/src/config/loader.rs`),
//! simplified here to direct field overrides since this crate's surface is
//! a handful of scalar settings rather than a general merge tree.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variables consulted, in the order flux-accounting itself
/// checks them (most specific first).
const ENV_TEST_DB_DIR: &str = "ACCOUNTING_TEST_DB_DIR";
const ENV_DB_DATA_DIR: &str = "ACCOUNTING_DB_DATA_DIR";
const ENV_ACCOUNTS_DATA_DIR: &str = "ACCOUNTS_DATA_DIR";

/// On-disk/CLI-visible configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub weight_fairshare: f64,
    pub weight_queue: f64,
    pub weight_bank: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("FluxAccounting.db"),
            weight_fairshare: 100_000.0,
            weight_queue: 1.0,
            weight_bank: 1.0,
        }
    }
}

impl Config {
    /// Defaults, then an optional TOML file, then environment overrides.
    /// CLI flags are applied by the caller afterward (the highest-priority
    /// layer), via direct field assignment on the returned `Config`.
    ///
    /// # Errors
    /// Returns an error if `file` is given but unreadable, or contains
    /// invalid TOML.
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(path) = file {
            if path.exists() {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.display()))?;
                config = toml::from_str(&text)
                    .map_err(|e| anyhow::anyhow!("parsing config {}: {e}", path.display()))?;
            }
        }

        for var in [ENV_TEST_DB_DIR, ENV_DB_DATA_DIR, ENV_ACCOUNTS_DATA_DIR] {
            if let Ok(dir) = std::env::var(var) {
                config.db_path = PathBuf::from(dir).join("FluxAccounting.db");
                break;
            }
        }

        Ok(config)
    }
}
