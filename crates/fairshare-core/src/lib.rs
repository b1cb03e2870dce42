//! Account-node hierarchy and weighted-walk fairshare engine.
//!
//! This crate holds the pure, storage-agnostic core: the arena-backed
//! [`node::Tree`] of banks and associations, and the [`walk::run`] algorithm
//! that assigns every association a fairshare value in `(0, 1]`. It has no
//! knowledge of SQLite, JSON-RPC, or the CLI; those live in
//! `fairshare-store`, `fairshare-priority`, and `fairshare-cli`.

pub mod errors;
pub mod float;
pub mod node;
pub mod walk;

pub use errors::{CoreError, CoreResult};
pub use float::nearly_equal;
pub use node::{AccountNode, NodeId, Tree};
pub use walk::run as run_weighted_walk;
