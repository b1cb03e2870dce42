//! `update-fshare`: load the hierarchy from an accounting database, run the
//! weighted walk, and write the resulting fairshare values back.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use fairshare_cli::Config;
use fairshare_core::run_weighted_walk;
use fairshare_store::{HierarchyReader, HierarchyWriter, SqliteStore};

/// Recompute and persist fairshare values for the account-node hierarchy.
#[derive(Debug, Parser)]
#[command(name = "update-fshare", about = "Recompute and write fairshare values")]
struct Args {
    /// Path to the flux-accounting SQLite database.
    #[arg(short = 'p', long = "path", value_name = "DB_PATH")]
    db_path: Option<PathBuf>,

    /// Path to a TOML config file overriding the default weights/db path.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt::init();

    if let Err(err) = run() {
        // spec.md §6: error message on standard output, exit code -1.
        println!("{err:#}");
        std::process::exit(-1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(path) = args.db_path {
        config.db_path = path;
    }

    tracing::info!(db_path = %config.db_path.display(), "loading account hierarchy");

    let store = SqliteStore;
    let mut tree = store
        .load(&config.db_path)
        .with_context(|| format!("loading hierarchy from {}", config.db_path.display()))?;

    let ranked = run_weighted_walk(&mut tree).context("running weighted walk")?;
    tracing::info!(associations = ranked.len(), "fairshare computed");

    let mut store = store;
    store
        .write(&config.db_path, &tree)
        .with_context(|| format!("writing fairshare values to {}", config.db_path.display()))?;

    println!("updated fairshare for {} associations", ranked.len());
    Ok(())
}
