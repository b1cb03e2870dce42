//! Pretty and parsable hierarchy printing for the `shares` subcommand
//! (spec.md §6), grounded on
//! `original_source/src/fairness/print_hierarchy/print_hierarchy.cpp` and
//! `flux_shares.cpp`.

use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Table};
use fairshare_core::node::{NodeId, Tree};

/// Right-justified four-column table: `Account | Username | RawShares |
/// RawUsage`, one row per node in depth-first order, indented by one space
/// per level the way `print_hierarchy` nests its parsable output -- except
/// here the indentation is baked into the `Account` cell text.
#[must_use]
pub fn pretty(tree: &Tree) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Account", "Username", "RawShares", "RawUsage"]);

    for (depth, node_id) in walk_depth_first(tree, tree.root(), 0) {
        let (acct_name, username) = account_and_username(tree, node_id);
        let node = tree.node(node_id).expect("node produced by our own walk");
        let account = format!("{}{}", " ".repeat(depth), acct_name);
        table.add_row(vec![
            Cell::new(account),
            Cell::new(username),
            Cell::new(node.shares).set_alignment(CellAlignment::Right),
            Cell::new(node.usage).set_alignment(CellAlignment::Right),
        ]);
    }

    table.to_string()
}

/// Delimiter-separated parsable rows with the original's literal header
/// `Account|Username|RawShares|RawUsage`, one space of indentation per
/// depth level, bank rows leaving `Username` empty.
#[must_use]
pub fn parsable(tree: &Tree, delimiter: char) -> String {
    let mut out = format!("Account{delimiter}Username{delimiter}RawShares{delimiter}RawUsage\n");

    for (depth, node_id) in walk_depth_first(tree, tree.root(), 0) {
        let (acct_name, username) = account_and_username(tree, node_id);
        let node = tree.node(node_id).expect("node produced by our own walk");
        out.push_str(&" ".repeat(depth));
        out.push_str(&acct_name);
        out.push(delimiter);
        out.push_str(&username);
        out.push(delimiter);
        out.push_str(&node.shares.to_string());
        out.push(delimiter);
        out.push_str(&node.usage.to_string());
        out.push('\n');
    }

    out
}

/// The `(Account, Username)` pair for one row, per
/// `weighted_tree_node_t::dprint_csv`: a user row's Account column holds its
/// *bank's* name (the parent), not its own; a bank row's Account column is
/// its own name and Username is empty.
fn account_and_username(tree: &Tree, node_id: NodeId) -> (String, String) {
    let node = tree.node(node_id).expect("node produced by our own walk");
    if node.is_user {
        let bank_name = node
            .parent
            .and_then(|p| tree.node(p).ok())
            .map(|p| p.name.clone())
            .unwrap_or_default();
        (bank_name, node.name.clone())
    } else {
        (node.name.clone(), String::new())
    }
}

fn walk_depth_first(tree: &Tree, start: NodeId, depth: usize) -> Vec<(usize, NodeId)> {
    let mut out = vec![(depth, start)];
    if let Ok(node) = tree.node(start) {
        for &child in &node.children {
            out.extend(walk_depth_first(tree, child, depth + 1));
        }
    }
    out
}
