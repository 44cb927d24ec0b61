//! Tree Utilities
//!
//! Rebuilds the nested view from flat rows and linearizes it for range
//! selection. The flat rows stay the source of truth; everything here is a
//! cache rebuilt after each refresh.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::domain::{Item, ItemId};

/// An item with its ordered children
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub item: Item,
    pub children: Vec<TreeNode>,
}

/// One entry of the pre-order linearization
#[derive(Debug, Clone, PartialEq)]
pub struct FlatItem {
    pub item: Item,
    pub depth: usize,
}

impl FlatItem {
    pub fn id(&self) -> &ItemId {
        &self.item.id
    }
}

/// Build the ordered forest from flat rows
///
/// Children are sorted by position, ties by id. Rows whose parent is missing
/// are unreachable and left out.
pub fn build_tree(items: &[Item]) -> Vec<TreeNode> {
    // Build parent -> children map
    let mut children_map: HashMap<Option<&ItemId>, Vec<&Item>> = HashMap::new();
    for item in items {
        children_map
            .entry(item.parent_id.as_ref())
            .or_default()
            .push(item);
    }

    for children in children_map.values_mut() {
        children.sort_by(|a, b| a.sibling_cmp(b));
    }

    fn collect<'a>(
        parent_id: Option<&'a ItemId>,
        children_map: &HashMap<Option<&'a ItemId>, Vec<&'a Item>>,
    ) -> Vec<TreeNode> {
        children_map
            .get(&parent_id)
            .map(|children| {
                children
                    .iter()
                    .map(|item| TreeNode {
                        item: (*item).clone(),
                        children: collect(Some(&item.id), children_map),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    collect(None, &children_map)
}

/// Pre-order linearization: parent before children, children in sibling order
pub fn flatten_tree(roots: &[TreeNode]) -> Vec<FlatItem> {
    fn walk(nodes: &[TreeNode], depth: usize, result: &mut Vec<FlatItem>) {
        for node in nodes {
            result.push(FlatItem {
                item: node.item.clone(),
                depth,
            });
            walk(&node.children, depth + 1, result);
        }
    }

    let mut result = Vec::new();
    walk(roots, 0, &mut result);
    result
}

/// Forest plus flat index, rebuilt together
#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    roots: Vec<TreeNode>,
    flat: Vec<FlatItem>,
    positions: HashMap<ItemId, usize>,
    orphans: usize,
}

impl TreeIndex {
    pub fn from_items(items: &[Item]) -> Self {
        let roots = build_tree(items);
        let flat = flatten_tree(&roots);
        let positions = flat
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.item.id.clone(), i))
            .collect();
        let orphans = items.len() - flat.len();
        if orphans > 0 {
            log::debug!("{} unreachable rows left out of the tree", orphans);
        }

        Self {
            roots,
            flat,
            positions,
            orphans,
        }
    }

    pub fn roots(&self) -> &[TreeNode] {
        &self.roots
    }

    pub fn flat(&self) -> &[FlatItem] {
        &self.flat
    }

    pub fn len(&self) -> usize {
        self.flat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flat.is_empty()
    }

    /// Rows that were fetched but are not reachable from a root
    pub fn orphan_count(&self) -> usize {
        self.orphans
    }

    pub fn index_of(&self, id: &ItemId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.index_of(id).map(|i| &self.flat[i].item)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.positions.contains_key(id)
    }

    /// Inclusive flat range between two ids, in either order
    pub fn range(&self, a: &ItemId, b: &ItemId) -> Option<&[FlatItem]> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        Some(&self.flat[ia.min(ib)..=ia.max(ib)])
    }

    /// Ancestor ids from the direct parent up to the root
    pub fn ancestors(&self, id: &ItemId) -> Vec<ItemId> {
        let mut result = Vec::new();
        let mut current = self.get(id).and_then(|item| item.parent_id.clone());
        while let Some(parent) = current {
            // Reachable rows always end at a root; the bound only guards bad input
            if result.len() > self.flat.len() {
                break;
            }
            current = self.get(&parent).and_then(|item| item.parent_id.clone());
            result.push(parent);
        }
        result
    }

    /// True if `id` sits somewhere below `ancestor`
    pub fn is_descendant_of(&self, id: &ItemId, ancestor: &ItemId) -> bool {
        self.ancestors(id).iter().any(|a| a == ancestor)
    }
}

/// Aggregate counts shown in the dashboard header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub total: usize,
    pub starred: usize,
    pub recently_updated: usize,
}

impl TreeStats {
    /// One recursive fold over the forest
    pub fn collect(roots: &[TreeNode], now: DateTime<Utc>, window: Duration) -> Self {
        // A window reaching past the calendar range counts everything
        let cutoff = now
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        fn fold(nodes: &[TreeNode], cutoff: DateTime<Utc>, acc: TreeStats) -> TreeStats {
            nodes.iter().fold(acc, |acc, node| {
                let recent = node.item.updated_at.is_some_and(|t| t >= cutoff);
                let acc = TreeStats {
                    total: acc.total + 1,
                    starred: acc.starred + usize::from(node.item.starred),
                    recently_updated: acc.recently_updated + usize::from(recent),
                };
                fold(&node.children, cutoff, acc)
            })
        }
        fold(roots, cutoff, TreeStats::default())
    }
}
