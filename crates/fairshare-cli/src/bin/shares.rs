//! `shares`: print the account-node hierarchy, either as a human-readable
//! table or as delimiter-separated parsable rows (spec.md §6), grounded on
//! `original_source/src/fairness/print_hierarchy/print_hierarchy.cpp` and
//! `flux_shares.cpp`.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use fairshare_cli::{print, Config};
use fairshare_store::{HierarchyReader, SqliteStore};

/// Print the bank/association hierarchy.
#[derive(Debug, Parser)]
#[command(name = "shares", about = "Print the account-node hierarchy")]
struct Args {
    /// Path to the flux-accounting SQLite database.
    #[arg(short = 'p', long = "path", value_name = "DB_PATH")]
    db_path: Option<PathBuf>,

    /// Emit delimiter-separated parsable rows instead of a pretty table.
    #[arg(short = 'P', long = "parsable", value_name = "DELIM")]
    parsable: Option<char>,

    /// Path to a TOML config file overriding the default db path.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(path) = args.db_path {
        config.db_path = path;
    }

    let store = SqliteStore;
    let tree = store
        .load(&config.db_path)
        .with_context(|| format!("loading hierarchy from {}", config.db_path.display()))?;

    let output = match args.parsable {
        Some(delim) => print::parsable(&tree, delim),
        None => print::pretty(&tree),
    };
    print!("{output}");
    Ok(())
}
