//! Tree recomputation engine
//!
//! Given every row of one tree-indexed table, recompute each row's ancestors,
//! children, descendants, siblings, depth, level, index and global order, and
//! diff them against the stored values.
//!
//! # Algorithm
//!
//! 1. Index rows by id and resolve parent links (dangling parent → error).
//! 2. Reject cycles with a bounded upward walk per row.
//! 3. Resolve each row's ancestor chain, root first.
//! 4. Build own and global ordering keys.
//! 5. Sort by global key; the position is `order`, the single source of truth
//!    for every other list order.
//! 6. Group rows by parent in that order (children, siblings).
//! 7. Assign dense `index` per sibling group.
//! 8. Compute `depth` leaves-to-root.
//! 9. Aggregate descendants leaves-to-root, re-sorted by `order`.
//! 10. Emit only the fields that differ from the stored ones.
//!
//! The computation is a pure function of the set of
//! `(id, parent_id, priority, display_text)` tuples: the enumeration order of
//! the input never changes the result.

use crate::config::OrderingConfig;
use crate::models::{TreeDiff, TreeFields, TreeKey, TreeNode, TreePatch};
use crate::operations::error::RecomputeError;
use crate::operations::ordering::OrderingKeyBuilder;
use crate::utils::join_pks;
use std::collections::HashMap;

/// Result of a successful recomputation
#[derive(Debug, Clone, PartialEq)]
pub struct RecomputeOutcome<K> {
    /// Changed fields per row; rows without changes are absent
    pub diff: TreeDiff<K>,

    /// Every id of the snapshot in global order
    pub ordered_ids: Vec<K>,
}

impl<K> RecomputeOutcome<K> {
    /// Number of rows that need a write
    pub fn changed_rows(&self) -> usize {
        self.diff.len()
    }

    pub fn is_unchanged(&self) -> bool {
        self.diff.is_empty()
    }
}

/// Recompute every tree field of `nodes` and diff against their stored values.
///
/// # Errors
///
/// - [`RecomputeError::CircularReference`] when a parent chain loops
/// - [`RecomputeError::ReferentialIntegrity`] when a parent is missing
/// - [`RecomputeError::DuplicateNode`] when two rows share an id
///
/// # Examples
///
/// ```rust
/// use treeindex_core::config::OrderingConfig;
/// use treeindex_core::models::TreeNode;
/// use treeindex_core::operations::recompute;
///
/// let nodes: Vec<TreeNode<u64>> = vec![
///     TreeNode::new("category", 1, "a"),
///     TreeNode::new("category", 2, "aa").with_parent(1),
/// ];
/// let outcome = recompute(&nodes, &OrderingConfig::default()).unwrap();
///
/// assert_eq!(outcome.ordered_ids, vec![1, 2]);
/// assert_eq!(outcome.diff[&1].children_pks.as_deref(), Some("2"));
/// assert_eq!(outcome.diff[&2].level, Some(2));
/// ```
pub fn recompute<K: TreeKey>(
    nodes: &[TreeNode<K>],
    config: &OrderingConfig,
) -> Result<RecomputeOutcome<K>, RecomputeError> {
    let fields = compute_fields(nodes, config)?;

    let mut ordered: Vec<usize> = (0..nodes.len()).collect();
    ordered.sort_by_key(|&i| fields[i].order);

    let mut diff = TreeDiff::new();
    for (node, recomputed) in nodes.iter().zip(&fields) {
        let patch = TreePatch::between(&node.fields, recomputed);
        if !patch.is_empty() {
            diff.insert(node.id.clone(), patch);
        }
    }

    Ok(RecomputeOutcome {
        diff,
        ordered_ids: ordered.into_iter().map(|i| nodes[i].id.clone()).collect(),
    })
}

/// Recompute the full tree fields of every row, positionally matching `nodes`.
pub fn compute_fields<K: TreeKey>(
    nodes: &[TreeNode<K>],
    config: &OrderingConfig,
) -> Result<Vec<TreeFields>, RecomputeError> {
    let count = nodes.len();

    // Load & index
    let mut positions: HashMap<&K, usize> = HashMap::with_capacity(count);
    for (i, node) in nodes.iter().enumerate() {
        if positions.insert(&node.id, i).is_some() {
            return Err(RecomputeError::duplicate_node(node.id.to_string()));
        }
    }

    // Validation walks rows in key order so the reported row is stable
    let mut by_key: Vec<usize> = (0..count).collect();
    by_key.sort_by(|&a, &b| nodes[a].id.cmp(&nodes[b].id));

    let mut parents: Vec<Option<usize>> = vec![None; count];
    for &i in &by_key {
        if let Some(parent_id) = &nodes[i].parent_id {
            let parent = positions.get(parent_id).copied().ok_or_else(|| {
                RecomputeError::referential_integrity(nodes[i].id.to_string(), parent_id.to_string())
            })?;
            parents[i] = Some(parent);
        }
    }

    // Cycle detection
    if let Some(offender) = find_cycle(&parents, &by_key) {
        return Err(RecomputeError::circular_reference(
            nodes[offender].id.to_string(),
        ));
    }

    // Ancestor resolution
    let ancestors: Vec<Vec<usize>> = (0..count).map(|i| ancestor_chain(&parents, i)).collect();

    // Ordering keys
    let builder = OrderingKeyBuilder::for_keys(config, nodes.iter().map(|node| &node.id));
    let own_keys: Vec<String> = nodes.iter().map(|node| builder.node_key(node)).collect();
    let global_keys: Vec<String> = (0..count)
        .map(|i| {
            let chain = ancestors[i]
                .iter()
                .chain(std::iter::once(&i))
                .map(|&j| own_keys[j].as_str());
            builder.global_key(chain)
        })
        .collect();

    // Global sort
    let mut sorted: Vec<usize> = (0..count).collect();
    sorted.sort_by(|&a, &b| {
        global_keys[a]
            .cmp(&global_keys[b])
            .then_with(|| nodes[a].id.cmp(&nodes[b].id))
    });
    let mut order = vec![0usize; count];
    for (position, &i) in sorted.iter().enumerate() {
        order[i] = position;
    }

    // Grouping by parent, in global order
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut roots: Vec<usize> = Vec::new();
    for &i in &sorted {
        match parents[i] {
            Some(parent) => children[parent].push(i),
            None => roots.push(i),
        }
    }

    // Index assignment
    let mut index = vec![0usize; count];
    for group in children.iter().chain(std::iter::once(&roots)) {
        for (position, &i) in group.iter().enumerate() {
            index[i] = position;
        }
    }

    // Depth and descendants, deepest rows first
    let mut deepest_first = sorted.clone();
    deepest_first.sort_by(|&a, &b| ancestors[b].len().cmp(&ancestors[a].len()));

    let mut depth = vec![0usize; count];
    let mut descendants: Vec<Vec<usize>> = vec![Vec::new(); count];
    for &i in &deepest_first {
        depth[i] = children[i]
            .iter()
            .map(|&child| depth[child] + 1)
            .max()
            .unwrap_or(0);

        let mut aggregated = children[i].clone();
        for &child in &children[i] {
            aggregated.extend_from_slice(&descendants[child]);
        }
        aggregated.sort_by_key(|&j| order[j]);
        descendants[i] = aggregated;
    }

    let ids = |members: &[usize]| join_pks(members.iter().map(|&j| &nodes[j].id));

    Ok((0..count)
        .map(|i| {
            let group = match parents[i] {
                Some(parent) => &children[parent],
                None => &roots,
            };
            let siblings: Vec<usize> = group.iter().copied().filter(|&j| j != i).collect();

            TreeFields {
                ancestors_pks: ids(&ancestors[i][..]),
                ancestors_count: ancestors[i].len(),
                children_pks: ids(&children[i][..]),
                children_count: children[i].len(),
                descendants_pks: ids(&descendants[i][..]),
                descendants_count: descendants[i].len(),
                siblings_pks: ids(&siblings[..]),
                siblings_count: siblings.len(),
                depth: depth[i],
                level: ancestors[i].len() + 1,
                index: index[i],
                order: order[i],
            }
        })
        .collect())
}

/// First row (in `walk_order`) whose parent chain does not reach a root.
///
/// Each walk is bounded by the row count; rows proven to reach a root are
/// remembered so every row is walked at most once after the first proof.
fn find_cycle(parents: &[Option<usize>], walk_order: &[usize]) -> Option<usize> {
    let bound = parents.len() + 1;
    let mut reaches_root = vec![false; parents.len()];

    for &start in walk_order {
        let mut path = vec![start];
        let mut current = start;
        let mut steps = 0;
        loop {
            if reaches_root[current] {
                break;
            }
            match parents[current] {
                None => break,
                Some(parent) => {
                    steps += 1;
                    if parent == start || steps > bound {
                        return Some(start);
                    }
                    path.push(parent);
                    current = parent;
                }
            }
        }
        for i in path {
            reaches_root[i] = true;
        }
    }
    None
}

/// Ancestor positions of `i`, root first. Parent links must be acyclic.
fn ancestor_chain(parents: &[Option<usize>], i: usize) -> Vec<usize> {
    let mut chain = Vec::new();
    let mut current = parents[i];
    while let Some(parent) = current {
        chain.push(parent);
        current = parents[parent];
    }
    chain.reverse();
    chain
}
