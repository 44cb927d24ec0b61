//! Selection Model
//!
//! Set of selected ids plus the anchor used for shift-range extension.
//! Keyed by stable ids so it survives tree refreshes.

use std::collections::BTreeSet;

use crate::domain::ItemId;
use crate::tree::{FlatItem, TreeIndex};

/// Modifier keys held during a click
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClickModifiers {
    /// Shift: extend from the anchor
    pub range: bool,
    /// Ctrl/Cmd: toggle one item
    pub toggle: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    selected: BTreeSet<ItemId>,
    last_selected: Option<ItemId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or remove one id; it becomes the anchor either way
    pub fn toggle(&mut self, id: &ItemId) {
        if !self.selected.remove(id) {
            self.selected.insert(id.clone());
        }
        self.last_selected = Some(id.clone());
    }

    /// Union in every id between `from` and `to` in flat order
    ///
    /// No-op when either id is absent from `flat`. Returns whether anything
    /// was applied.
    pub fn range_select(&mut self, from: &ItemId, to: &ItemId, flat: &[FlatItem]) -> bool {
        let from_idx = flat.iter().position(|f| f.id() == from);
        let to_idx = flat.iter().position(|f| f.id() == to);
        let (Some(a), Some(b)) = (from_idx, to_idx) else {
            return false;
        };

        self.selected
            .extend(flat[a.min(b)..=a.max(b)].iter().map(|f| f.id().clone()));
        self.last_selected = Some(to.clone());
        true
    }

    pub fn select_only(&mut self, id: &ItemId) {
        self.selected.clear();
        self.selected.insert(id.clone());
        self.last_selected = Some(id.clone());
    }

    /// Replace the selection with every id in the flattened tree
    pub fn select_all(&mut self, flat: &[FlatItem]) {
        self.selected = flat.iter().map(|f| f.id().clone()).collect();
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.last_selected = None;
    }

    /// Plain click selects one, toggle modifier toggles, range modifier
    /// extends from the anchor
    pub fn click(&mut self, id: &ItemId, modifiers: ClickModifiers, flat: &[FlatItem]) {
        if modifiers.range {
            if let Some(anchor) = self.last_selected.clone() {
                if self.range_select(&anchor, id, flat) {
                    return;
                }
            }
            self.select_only(id);
        } else if modifiers.toggle {
            self.toggle(id);
        } else {
            self.select_only(id);
        }
    }

    /// Checkbox affordances are shown whenever anything is selected
    pub fn is_multi_select_mode(&self) -> bool {
        !self.selected.is_empty()
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.selected.contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selected ids in sorted order
    pub fn ids(&self) -> Vec<ItemId> {
        self.selected.iter().cloned().collect()
    }

    pub fn anchor(&self) -> Option<&ItemId> {
        self.last_selected.as_ref()
    }

    /// Keep only the given ids (those also currently selected)
    pub fn retain_only(&mut self, keep: &[ItemId]) {
        self.selected.retain(|id| keep.contains(id));
        if self
            .last_selected
            .as_ref()
            .is_some_and(|anchor| !self.selected.contains(anchor))
        {
            self.last_selected = None;
        }
    }

    /// Drop ids that no longer exist after a refresh
    pub fn prune(&mut self, index: &TreeIndex) {
        self.selected.retain(|id| index.contains(id));
        if self
            .last_selected
            .as_ref()
            .is_some_and(|anchor| !index.contains(anchor))
        {
            self.last_selected = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Item;

    fn flat(ids: &[&str]) -> Vec<FlatItem> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| FlatItem {
                item: Item::new(*id, *id, i as f64),
                depth: 0,
            })
            .collect()
    }

    fn id(s: &str) -> ItemId {
        ItemId::from(s)
    }

    fn set(selection: &Selection) -> Vec<String> {
        selection.ids().iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_range_select_from_empty() {
        let mut selection = Selection::new();
        assert!(selection.range_select(&id("a"), &id("c"), &flat(&["a", "b", "c", "d"])));
        assert_eq!(set(&selection), vec!["a", "b", "c"]);
        assert_eq!(selection.anchor(), Some(&id("c")));
    }

    #[test]
    fn test_range_select_is_symmetric() {
        let items = flat(&["a", "b", "c", "d", "e"]);
        let mut forward = Selection::new();
        let mut backward = Selection::new();
        forward.range_select(&id("b"), &id("d"), &items);
        backward.range_select(&id("d"), &id("b"), &items);
        assert_eq!(set(&forward), set(&backward));
        assert_eq!(backward.anchor(), Some(&id("b")));
    }

    #[test]
    fn test_range_select_unions() {
        let items = flat(&["a", "b", "c", "d", "e"]);
        let mut selection = Selection::new();
        selection.toggle(&id("e"));
        selection.range_select(&id("a"), &id("b"), &items);
        assert_eq!(set(&selection), vec!["a", "b", "e"]);
    }

    #[test]
    fn test_range_select_missing_id_is_noop() {
        let mut selection = Selection::new();
        selection.toggle(&id("a"));
        let before = selection.clone();
        assert!(!selection.range_select(&id("a"), &id("zz"), &flat(&["a", "b"])));
        assert_eq!(selection, before);
    }

    #[test]
    fn test_toggle_is_its_own_inverse() {
        let mut selection = Selection::new();
        selection.toggle(&id("x"));
        let original = set(&selection);

        selection.toggle(&id("y"));
        selection.toggle(&id("y"));
        assert_eq!(set(&selection), original);
        assert_eq!(selection.anchor(), Some(&id("y")));
    }

    #[test]
    fn test_select_only_select_all_and_clear() {
        let items = flat(&["a", "b", "c"]);
        let mut selection = Selection::new();
        assert!(!selection.is_multi_select_mode());

        selection.select_all(&items);
        assert_eq!(selection.len(), 3);
        assert!(selection.is_multi_select_mode());

        selection.select_only(&id("b"));
        assert_eq!(set(&selection), vec!["b"]);
        assert_eq!(selection.anchor(), Some(&id("b")));

        selection.clear();
        assert!(selection.is_empty());
        assert_eq!(selection.anchor(), None);
        assert!(!selection.is_multi_select_mode());
    }

    #[test]
    fn test_click_modifiers() {
        let items = flat(&["a", "b", "c", "d"]);
        let mut selection = Selection::new();

        // Shift without anchor behaves like a plain click
        selection.click(&id("b"), ClickModifiers { range: true, toggle: false }, &items);
        assert_eq!(set(&selection), vec!["b"]);

        selection.click(&id("d"), ClickModifiers { range: true, toggle: false }, &items);
        assert_eq!(set(&selection), vec!["b", "c", "d"]);

        selection.click(&id("c"), ClickModifiers { range: false, toggle: true }, &items);
        assert_eq!(set(&selection), vec!["b", "d"]);

        selection.click(&id("a"), ClickModifiers::default(), &items);
        assert_eq!(set(&selection), vec!["a"]);
    }

    #[test]
    fn test_retain_only_and_prune() {
        let mut items: Vec<Item> = ["a", "b", "c"]
            .iter()
            .map(|s| Item::new(*s, *s, 0.0))
            .collect();
        let mut selection = Selection::new();
        selection.select_all(&crate::tree::flatten_tree(&crate::tree::build_tree(&items)));
        selection.toggle(&id("c"));
        selection.toggle(&id("c"));

        selection.retain_only(&[id("a"), id("c")]);
        assert_eq!(set(&selection), vec!["a", "c"]);
        assert_eq!(selection.anchor(), Some(&id("c")));

        items.retain(|i| i.id != id("c"));
        selection.prune(&TreeIndex::from_items(&items));
        assert_eq!(set(&selection), vec!["a"]);
        assert_eq!(selection.anchor(), None);
    }
}
