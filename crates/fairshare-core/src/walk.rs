//! The tie-aware weighted depth-first walk (spec.md §4.2).
//!
//! Converts an account-node [`Tree`] into a ranked list of associations and
//! assigns each a fairshare value in `(0, 1]`. Sibling subtrees that tie in
//! weight are flattened into a synthetic "virtual bank" so their
//! grandchildren compete fairly, rather than losing to an arbitrary
//! tie-break at the higher level.

use std::cmp::Ordering;

use crate::errors::{CoreError, CoreResult};
use crate::float::nearly_equal;
use crate::node::{NodeId, Tree};

/// One step of the tie-aware children sequence built at an internal node:
/// either a real child, or a virtual bank standing in for a maximal run of
/// weight-tied sibling banks (holding the concatenation of their children).
#[derive(Debug, Clone)]
enum WalkNode {
    Real(NodeId),
    Virtual(Vec<NodeId>),
}

impl WalkNode {
    fn is_user(&self, tree: &Tree) -> CoreResult<bool> {
        Ok(match self {
            WalkNode::Real(id) => tree.node(*id)?.is_user,
            WalkNode::Virtual(_) => false,
        })
    }

    fn children(&self, tree: &Tree) -> CoreResult<Vec<NodeId>> {
        Ok(match self {
            WalkNode::Real(id) => tree.node(*id)?.children.clone(),
            WalkNode::Virtual(children) => children.clone(),
        })
    }

    fn real_id(&self) -> Option<NodeId> {
        match self {
            WalkNode::Real(id) => Some(*id),
            WalkNode::Virtual(_) => None,
        }
    }
}

/// Per-node weight against sibling totals `S = sum(shares)`, `U = sum(usage)`.
fn calc_weight(shares: u64, usage: u64, sibling_shares: u64, sibling_usage: u64) -> f64 {
    if shares == 0 {
        0.0
    } else if usage == 0 {
        // Saturating "infinite" priority: one increment above the largest
        // possible ratio, so it only ties with other zero-usage siblings.
        u64::MAX as f64 + 1.0
    } else {
        let s_weight = shares as f64 / sibling_shares as f64;
        let u_weight = usage as f64 / sibling_usage as f64;
        s_weight / u_weight
    }
}

fn compare_children(tree: &Tree, a: NodeId, b: NodeId) -> CoreResult<Ordering> {
    let na = tree.node(a)?;
    let nb = tree.node(b)?;
    if nearly_equal(na.weight, nb.weight) {
        return Ok(if na.is_user && !nb.is_user {
            Ordering::Less
        } else if !na.is_user && nb.is_user {
            Ordering::Greater
        } else {
            Ordering::Equal
        });
    }
    Ok(nb.weight.partial_cmp(&na.weight).unwrap_or(Ordering::Equal))
}

/// Compute weight for every child of `node_id` against the sibling totals,
/// then sort them (stable) descending by weight, users before banks on ties.
fn calc_and_sort_children(tree: &mut Tree, node_id: NodeId) -> CoreResult<()> {
    let child_ids = tree.node(node_id)?.children.clone();
    if child_ids.is_empty() {
        return Ok(());
    }

    let mut sibling_shares = 0u64;
    let mut sibling_usage = 0u64;
    for &id in &child_ids {
        let n = tree.node(id)?;
        sibling_shares += n.shares;
        sibling_usage += n.usage;
    }

    for &id in &child_ids {
        let n = tree.node(id)?;
        let weight = calc_weight(n.shares, n.usage, sibling_shares, sibling_usage);
        tree.node_mut(id)?.weight = weight;
    }

    let mut sorted = child_ids;
    let mut err = None;
    sorted.sort_by(|&a, &b| match compare_children(tree, a, b) {
        Ok(ord) => ord,
        Err(e) => {
            err = Some(e);
            Ordering::Equal
        }
    });
    if let Some(e) = err {
        return Err(e);
    }
    tree.node_mut(node_id)?.children = sorted;
    Ok(())
}

fn is_child_weight_equal_to_next(tree: &Tree, children: &[NodeId], i: usize) -> CoreResult<bool> {
    if i + 1 >= children.len() {
        return Ok(false);
    }
    let a = tree.node(children[i])?;
    let b = tree.node(children[i + 1])?;
    if a.is_user != b.is_user {
        return Ok(false);
    }
    Ok(nearly_equal(a.weight, b.weight))
}

/// Build the tie-aware children sequence for an internal node whose
/// (already weighted and sorted) `children` list is given.
fn build_tie_aware_children(tree: &mut Tree, children: &[NodeId]) -> CoreResult<Vec<WalkNode>> {
    let mut result = Vec::with_capacity(children.len());
    let mut stride: Option<Vec<NodeId>> = None;

    for i in 0..children.len() {
        let child = children[i];
        let is_user = tree.node(child)?.is_user;
        let equal_next = is_child_weight_equal_to_next(tree, children, i)?;

        if is_user {
            if equal_next {
                tree.node_mut(child)?.tie_with_next = true;
            }
            result.push(WalkNode::Real(child));
            continue;
        }

        if equal_next {
            let acc = stride.get_or_insert_with(Vec::new);
            acc.extend(tree.node(child)?.children.iter().copied());
        } else if let Some(mut acc) = stride.take() {
            acc.extend(tree.node(child)?.children.iter().copied());
            let mut sort_err = None;
            acc.sort_by(|&a, &b| match compare_children(tree, a, b) {
                Ok(ord) => ord,
                Err(e) => {
                    sort_err = Some(e);
                    Ordering::Equal
                }
            });
            if let Some(e) = sort_err {
                return Err(e);
            }
            result.push(WalkNode::Virtual(acc));
        } else {
            result.push(WalkNode::Real(child));
        }
    }
    Ok(result)
}

/// Assign `u.fairshare` and push `u` to `users`, advancing the rank cursor.
fn handle_leaf(
    tree: &mut Tree,
    id: NodeId,
    leaf_total: u64,
    rank: &mut u64,
    stride_size: &mut u64,
    users: &mut Vec<(NodeId, f64)>,
) -> CoreResult<()> {
    let fshare = *rank as f64 / leaf_total as f64;
    tree.node_mut(id)?.fairshare = fshare;

    if *rank == 0 {
        return Err(CoreError::RankExhausted);
    }

    if tree.node(id)?.tie_with_next {
        tree.node_mut(id)?.tie_with_next = false;
        *stride_size += 1;
    } else {
        *rank = rank
            .checked_sub(1 + *stride_size)
            .ok_or(CoreError::RankExhausted)?;
        *stride_size = 0;
    }

    users.push((id, fshare));
    Ok(())
}

fn handle_internal(
    tree: &mut Tree,
    children: Vec<NodeId>,
    leaf_total: u64,
    rank: &mut u64,
    stride_size: &mut u64,
    users: &mut Vec<(NodeId, f64)>,
) -> CoreResult<()> {
    for &child in &children {
        calc_and_sort_children(tree, child)?;
    }
    let tie_aware = build_tie_aware_children(tree, &children)?;
    for wn in tie_aware {
        visit(tree, &wn, leaf_total, rank, stride_size, users)?;
    }
    Ok(())
}

fn visit(
    tree: &mut Tree,
    wn: &WalkNode,
    leaf_total: u64,
    rank: &mut u64,
    stride_size: &mut u64,
    users: &mut Vec<(NodeId, f64)>,
) -> CoreResult<()> {
    let children = wn.children(tree)?;
    if children.is_empty() {
        if wn.is_user(tree)? {
            let id = wn.real_id().expect("user leaf is always a real node");
            handle_leaf(tree, id, leaf_total, rank, stride_size, users)?;
        }
        return Ok(());
    }
    handle_internal(tree, children, leaf_total, rank, stride_size, users)
}

/// Run the weighted walk over `tree`, mutating every node's `weight`,
/// `children` order, and leaf `fairshare`, and returning the leaves in
/// fairshare-descending order (ties broken stably by traversal order).
pub fn run(tree: &mut Tree) -> CoreResult<Vec<(NodeId, f64)>> {
    let root = tree.root();
    let leaf_total = tree.node(root)?.subtree_leaf_size;

    if leaf_total == 0 {
        return Ok(Vec::new());
    }

    calc_and_sort_children(tree, root)?;

    let mut rank = leaf_total;
    let mut stride_size = 0u64;
    let mut users = Vec::new();
    visit(
        tree,
        &WalkNode::Real(root),
        leaf_total,
        &mut rank,
        &mut stride_size,
        &mut users,
    )?;

    users.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names<'a>(tree: &'a Tree, users: &[(NodeId, f64)]) -> Vec<&'a str> {
        users
            .iter()
            .map(|(id, _)| tree.node(*id).unwrap().name.as_str())
            .collect()
    }

    #[test]
    fn empty_tree_produces_no_users() {
        let mut tree = Tree::new_root("root", 1);
        let users = run(&mut tree).unwrap();
        assert!(users.is_empty());
    }

    #[test]
    fn zero_shares_siblings_tie_and_sort_deterministically() {
        let mut tree = Tree::new_root("root", 1);
        let bank = tree.add_child(tree.root(), "bank", false, 1, 0).unwrap();
        tree.add_child(bank, "alice", true, 0, 10).unwrap();
        tree.add_child(bank, "bob", true, 0, 20).unwrap();

        let users = run(&mut tree).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].1, users[1].1);
    }

    #[test]
    fn zero_usage_leaf_wins_max_weight() {
        let mut tree = Tree::new_root("root", 1);
        let bank = tree.add_child(tree.root(), "bank", false, 1, 0).unwrap();
        tree.add_child(bank, "heavy_user", true, 10, 1000).unwrap();
        tree.add_child(bank, "fresh_user", true, 10, 0).unwrap();

        let users = run(&mut tree).unwrap();
        assert_eq!(names(&tree, &users), vec!["fresh_user", "heavy_user"]);
        assert!(users[0].1 > users[1].1);
    }

    #[test]
    fn small_no_tie_scenario() {
        // Three banks, each with a handful of associations; shares and
        // usage chosen so no two siblings tie in weight, matching spec.md
        // §8 scenario A's literal leaf ordering.
        let mut tree = Tree::new_root("root", 1);
        let bank1 = tree.add_child(tree.root(), "1", false, 1, 0).unwrap();
        let bank2 = tree.add_child(tree.root(), "2", false, 5, 0).unwrap();
        let bank3 = tree.add_child(tree.root(), "3", false, 10, 0).unwrap();

        tree.add_child(bank1, "leaf.1.1", true, 1, 50).unwrap();
        tree.add_child(bank1, "leaf.1.2", true, 1, 100).unwrap();
        tree.add_child(bank1, "leaf.1.3", true, 1, 10).unwrap();

        tree.add_child(bank2, "leaf.2.1", true, 1, 50).unwrap();
        tree.add_child(bank2, "leaf.2.2", true, 1, 100).unwrap();

        tree.add_child(bank3, "leaf.3.1", true, 1, 5).unwrap();
        tree.add_child(bank3, "leaf.3.2", true, 1, 50).unwrap();

        tree.add_usage_to_ancestors(bank1, 160).unwrap();
        tree.add_usage_to_ancestors(bank2, 150).unwrap();
        tree.add_usage_to_ancestors(bank3, 55).unwrap();

        let users = run(&mut tree).unwrap();
        assert_eq!(
            names(&tree, &users),
            vec!["leaf.3.1", "leaf.3.2", "leaf.2.1", "leaf.2.2", "leaf.1.3", "leaf.1.1", "leaf.1.2"]
        );
        for (_, f) in &users {
            assert!(*f > 0.0 && *f <= 1.0);
        }
    }

    #[test]
    fn small_tie_scenario() {
        // Banks 1 and 2 carry identical shares and usage, so they tie in
        // weight and their children merge into one virtual bank; bank 3
        // outweighs both and is visited first, untied. Matches spec.md §8
        // scenario B's literal leaf ordering.
        let mut tree = Tree::new_root("root", 1);
        let bank1 = tree.add_child(tree.root(), "1", false, 5, 0).unwrap();
        let bank2 = tree.add_child(tree.root(), "2", false, 5, 0).unwrap();
        let bank3 = tree.add_child(tree.root(), "3", false, 10, 0).unwrap();

        tree.add_child(bank1, "leaf.1.1", true, 1, 100).unwrap();
        tree.add_child(bank1, "leaf.1.2", true, 1, 50).unwrap();
        tree.add_child(bank1, "leaf.1.3", true, 1, 10).unwrap();

        tree.add_child(bank2, "leaf.2.1", true, 1, 100).unwrap();
        tree.add_child(bank2, "leaf.2.2", true, 1, 50).unwrap();
        tree.add_child(bank2, "leaf.2.3", true, 1, 10).unwrap();

        tree.add_child(bank3, "leaf.3.1", true, 1, 5).unwrap();
        tree.add_child(bank3, "leaf.3.2", true, 1, 50).unwrap();

        tree.add_usage_to_ancestors(bank1, 160).unwrap();
        tree.add_usage_to_ancestors(bank2, 160).unwrap();
        tree.add_usage_to_ancestors(bank3, 55).unwrap();

        let users = run(&mut tree).unwrap();
        assert_eq!(
            names(&tree, &users),
            vec![
                "leaf.3.1", "leaf.3.2", "leaf.1.3", "leaf.2.3", "leaf.1.2", "leaf.2.2", "leaf.1.1",
                "leaf.2.1",
            ]
        );
    }

    #[test]
    fn small_tie_all_scenario() {
        // Every sibling bank carries identical shares and usage, so all
        // three tie and the virtual-bank merge folds every child into one
        // ranked group. Matches spec.md §8 scenario C's literal leaf
        // ordering.
        let mut tree = Tree::new_root("root", 1);
        let bank1 = tree.add_child(tree.root(), "1", false, 5, 0).unwrap();
        let bank2 = tree.add_child(tree.root(), "2", false, 5, 0).unwrap();
        let bank3 = tree.add_child(tree.root(), "3", false, 5, 0).unwrap();

        for (bank, prefix) in [(bank1, "1"), (bank2, "2"), (bank3, "3")] {
            tree.add_child(bank, format!("leaf.{prefix}.1"), true, 1, 100).unwrap();
            tree.add_child(bank, format!("leaf.{prefix}.2"), true, 1, 50).unwrap();
            tree.add_child(bank, format!("leaf.{prefix}.3"), true, 1, 10).unwrap();
            tree.add_usage_to_ancestors(bank, 160).unwrap();
        }

        let users = run(&mut tree).unwrap();
        assert_eq!(
            names(&tree, &users),
            vec![
                "leaf.1.3", "leaf.2.3", "leaf.3.3", "leaf.1.2", "leaf.2.2", "leaf.3.2", "leaf.1.1",
                "leaf.2.1", "leaf.3.1",
            ]
        );
    }

    #[test]
    fn rank_exhausted_cannot_occur_on_consistent_trees() {
        // Sanity check: a well-formed tree never exhausts rank.
        let mut tree = Tree::new_root("root", 1);
        let bank = tree.add_child(tree.root(), "bank", false, 1, 0).unwrap();
        for i in 0..5 {
            tree.add_child(bank, format!("user{i}"), true, 1, i as u64 + 1)
                .unwrap();
        }
        assert!(run(&mut tree).is_ok());
    }
}
