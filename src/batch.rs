//! Batch Mutation Dispatcher
//!
//! Applies one operation to every selected item and reports per-id results.
//! Afterwards the selection is cleared, or narrowed to the ids that failed.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{DeleteStrategy, DomainError, Item, ItemFlag, ItemId};
use crate::reorder::{ancestors_of, Placement, ReorderResolver};
use crate::repository::ItemStore;
use crate::selection::Selection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOperation {
    Delete,
    Duplicate,
    SetStarred(bool),
    SetExcludeFromCascade(bool),
    SetExcludeFromExport(bool),
}

impl BatchOperation {
    /// Flag and value for the flag-setting operations
    pub fn flag(&self) -> Option<(ItemFlag, bool)> {
        match *self {
            BatchOperation::SetStarred(v) => Some((ItemFlag::Starred, v)),
            BatchOperation::SetExcludeFromCascade(v) => Some((ItemFlag::ExcludedFromCascade, v)),
            BatchOperation::SetExcludeFromExport(v) => Some((ItemFlag::ExcludedFromExport, v)),
            BatchOperation::Delete | BatchOperation::Duplicate => None,
        }
    }
}

impl fmt::Display for BatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchOperation::Delete => write!(f, "delete"),
            BatchOperation::Duplicate => write!(f, "duplicate"),
            BatchOperation::SetStarred(true) => write!(f, "star"),
            BatchOperation::SetStarred(false) => write!(f, "unstar"),
            BatchOperation::SetExcludeFromCascade(v) => {
                write!(f, "{} cascade", if *v { "exclude from" } else { "include in" })
            }
            BatchOperation::SetExcludeFromExport(v) => {
                write!(f, "{} export", if *v { "exclude from" } else { "include in" })
            }
        }
    }
}

/// What stays selected after a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Clear everything, whatever the outcome
    #[default]
    ClearAll,
    /// Keep only the ids that failed (opt-in)
    RetainFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub operation: BatchOperation,
    pub succeeded: Vec<ItemId>,
    pub failed: Vec<(ItemId, DomainError)>,
    /// Rows created by the batch (duplicates)
    pub created: Vec<Item>,
}

impl BatchReport {
    fn new(operation: BatchOperation) -> Self {
        Self {
            operation,
            succeeded: Vec::new(),
            failed: Vec::new(),
            created: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn failed_ids(&self) -> Vec<ItemId> {
        self.failed.iter().map(|(id, _)| id.clone()).collect()
    }

    /// One-line description for notices
    pub fn summary(&self) -> String {
        if self.is_complete() {
            format!("{}: {} item(s)", self.operation, self.succeeded.len())
        } else {
            format!(
                "{}: {} of {} item(s) failed ({})",
                self.operation,
                self.failed.len(),
                self.total(),
                self.failed[0].1
            )
        }
    }
}

pub struct BatchDispatcher<S: ItemStore> {
    resolver: ReorderResolver<S>,
    delete_strategy: DeleteStrategy,
    policy: SelectionPolicy,
}

impl<S: ItemStore> BatchDispatcher<S> {
    pub fn new(resolver: ReorderResolver<S>) -> Self {
        Self {
            resolver,
            delete_strategy: DeleteStrategy::default(),
            policy: SelectionPolicy::default(),
        }
    }

    pub fn with_delete_strategy(mut self, strategy: DeleteStrategy) -> Self {
        self.delete_strategy = strategy;
        self
    }

    pub fn with_selection_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn selection_policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Run `operation` over the selection, then apply the selection policy
    pub async fn dispatch(&self, selection: &mut Selection, operation: BatchOperation) -> BatchReport {
        let report = self.execute(&selection.ids(), operation).await;

        match self.policy {
            SelectionPolicy::RetainFailed if !report.is_complete() => {
                selection.retain_only(&report.failed_ids());
            }
            _ => selection.clear(),
        }
        report
    }

    /// Run `operation` over `ids` without touching any selection
    pub async fn execute(&self, ids: &[ItemId], operation: BatchOperation) -> BatchReport {
        let mut report = BatchReport::new(operation);
        if ids.is_empty() {
            return report;
        }

        match operation {
            BatchOperation::Delete => self.delete_all(ids, &mut report).await,
            BatchOperation::Duplicate => self.duplicate_all(ids, &mut report).await,
            _ => {
                if let Some((flag, value)) = operation.flag() {
                    self.set_flag_all(ids, flag, value, &mut report).await;
                }
            }
        }

        if report.is_complete() {
            log::info!("batch {} applied to {} item(s)", operation, report.succeeded.len());
        } else {
            log::warn!(
                "batch {} failed for {} of {} item(s)",
                operation,
                report.failed.len(),
                report.total()
            );
        }
        report
    }

    async fn set_flag_all(&self, ids: &[ItemId], flag: ItemFlag, value: bool, report: &mut BatchReport) {
        match self.resolver.store().set_flag(ids, flag, value).await {
            Ok(updated) => {
                let updated: HashSet<&ItemId> = updated.iter().collect();
                for id in ids {
                    if updated.contains(id) {
                        report.succeeded.push(id.clone());
                    } else {
                        report
                            .failed
                            .push((id.clone(), DomainError::NotFound(format!("Item {} not updated", id))));
                    }
                }
            }
            Err(e) => {
                log::error!("set {} failed: {}", flag.column(), e);
                report
                    .failed
                    .extend(ids.iter().map(|id| (id.clone(), e.clone())));
            }
        }
    }

    async fn delete_all(&self, ids: &[ItemId], report: &mut BatchReport) {
        // Cascading deletes cover selected descendants of selected items
        let mut covered_by: HashMap<ItemId, ItemId> = HashMap::new();
        if self.delete_strategy == DeleteStrategy::Cascade {
            let selected: HashSet<&ItemId> = ids.iter().collect();
            for id in ids {
                match ancestors_of(self.resolver.store().as_ref(), id, self.resolver.max_depth()).await {
                    Ok(ancestors) => {
                        if let Some(top) = ancestors.iter().rev().find(|a| selected.contains(a)) {
                            covered_by.insert(id.clone(), top.clone());
                        }
                    }
                    Err(e) => {
                        report.failed.push((id.clone(), e));
                        covered_by.insert(id.clone(), id.clone());
                    }
                }
            }
        }

        let mut results: HashMap<ItemId, Result<(), DomainError>> = HashMap::new();
        for id in ids.iter().filter(|id| !covered_by.contains_key(*id)) {
            let result = self.resolver.delete_item(id, self.delete_strategy).await;
            if let Err(e) = &result {
                log::error!("delete {} failed: {}", id, e);
            }
            results.insert(id.clone(), result);
        }

        for id in ids {
            let outcome = match covered_by.get(id) {
                // Already reported while resolving ancestors
                Some(top) if top == id => continue,
                Some(top) => results.get(top),
                None => results.get(id),
            };
            match outcome {
                Some(Ok(())) => report.succeeded.push(id.clone()),
                Some(Err(e)) => report.failed.push((id.clone(), e.clone())),
                None => report.failed.push((
                    id.clone(),
                    DomainError::Internal(format!("no delete result for {}", id)),
                )),
            }
        }
    }

    async fn duplicate_all(&self, ids: &[ItemId], report: &mut BatchReport) {
        for id in ids {
            match self.duplicate_one(id).await {
                Ok(copy) => {
                    report.succeeded.push(id.clone());
                    report.created.push(copy);
                }
                Err(e) => {
                    log::error!("duplicate {} failed: {}", id, e);
                    report.failed.push((id.clone(), e));
                }
            }
        }
    }

    async fn duplicate_one(&self, id: &ItemId) -> Result<Item, DomainError> {
        let store = self.resolver.store();
        let original = store
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Item {} not found", id)))?;
        let position = self
            .resolver
            .create_position(original.parent_id.as_ref(), &Placement::After(id.clone()))
            .await?;
        store.duplicate(id, position).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::repository::{InMemoryItemStore, ItemHierarchyOperations, Repository};
    use crate::tree::TreeIndex;

    fn item(id: &str, parent: Option<&str>, position: f64) -> Item {
        let mut item = Item::new(id, id.to_uppercase(), position);
        item.parent_id = parent.map(ItemId::from);
        item
    }

    fn id(s: &str) -> ItemId {
        ItemId::from(s)
    }

    /// root: a [c [e]], b
    async fn fixture() -> (Arc<InMemoryItemStore>, BatchDispatcher<InMemoryItemStore>) {
        let store = Arc::new(
            InMemoryItemStore::with_items(vec![
                item("a", None, 1_000_000.0),
                item("b", None, 2_000_000.0),
                item("c", Some("a"), 1_000_000.0),
                item("e", Some("c"), 1_000_000.0),
            ])
            .await,
        );
        let dispatcher = BatchDispatcher::new(ReorderResolver::new(store.clone()));
        (store, dispatcher)
    }

    fn select(ids: &[&str]) -> Selection {
        let mut selection = Selection::new();
        for s in ids {
            selection.toggle(&id(s));
        }
        selection
    }

    async fn get(store: &InMemoryItemStore, s: &str) -> Option<Item> {
        store.find_by_id(&id(s)).await.unwrap()
    }

    #[tokio::test]
    async fn test_batch_star_flags_all_and_clears_selection() {
        let (store, dispatcher) = fixture().await;
        let mut selection = select(&["a", "b"]);

        let report = dispatcher
            .dispatch(&mut selection, BatchOperation::SetStarred(true))
            .await;

        assert!(report.is_complete());
        assert_eq!(report.succeeded, vec![id("a"), id("b")]);
        assert!(get(&store, "a").await.unwrap().starred);
        assert!(get(&store, "b").await.unwrap().starred);
        assert!(!get(&store, "c").await.unwrap().starred);
        assert!(selection.is_empty());
        assert_eq!(store.write_count().await, 1);
    }

    #[tokio::test]
    async fn test_retain_failed_policy_keeps_failed_ids_selected() {
        let (store, dispatcher) = fixture().await;
        let dispatcher = dispatcher.with_selection_policy(SelectionPolicy::RetainFailed);
        store.reject_writes_for(&id("b")).await;
        let mut selection = select(&["a", "b", "ghost"]);

        let report = dispatcher
            .dispatch(&mut selection, BatchOperation::SetExcludeFromExport(true))
            .await;

        assert_eq!(report.succeeded, vec![id("a")]);
        assert_eq!(report.failed_ids(), vec![id("b"), id("ghost")]);
        assert!(matches!(report.failed[0].1, DomainError::NotFound(_)));
        assert!(get(&store, "a").await.unwrap().excluded_from_export);
        assert_eq!(selection.ids(), vec![id("b"), id("ghost")]);
        assert!(report.summary().contains("2 of 3"));
    }

    #[tokio::test]
    async fn test_default_policy_clears_on_failure() {
        let (store, dispatcher) = fixture().await;
        assert_eq!(dispatcher.selection_policy(), SelectionPolicy::ClearAll);
        store.reject_writes_for(&id("b")).await;
        let mut selection = select(&["a", "b"]);

        let report = dispatcher
            .dispatch(&mut selection, BatchOperation::SetExcludeFromCascade(true))
            .await;

        assert!(!report.is_complete());
        assert!(selection.is_empty());
        assert_eq!(selection.anchor(), None);
    }

    #[tokio::test]
    async fn test_cascade_delete_covers_selected_descendants() {
        let (store, dispatcher) = fixture().await;
        let mut selection = select(&["a", "e"]);

        let report = dispatcher
            .dispatch(&mut selection, BatchOperation::Delete)
            .await;

        assert_eq!(report.succeeded, vec![id("a"), id("e")]);
        assert!(report.is_complete());
        assert_eq!(store.write_count().await, 1);
        let remaining: Vec<ItemId> = store.list().await.unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(remaining, vec![id("b")]);
        assert!(selection.is_empty());
    }

    #[tokio::test]
    async fn test_cascade_delete_failure_propagates_to_covered_ids() {
        let (store, dispatcher) = fixture().await;
        let dispatcher = dispatcher.with_selection_policy(SelectionPolicy::RetainFailed);
        store.reject_writes_for(&id("a")).await;
        let mut selection = select(&["a", "c", "b"]);

        let report = dispatcher
            .dispatch(&mut selection, BatchOperation::Delete)
            .await;

        assert_eq!(report.succeeded, vec![id("b")]);
        assert_eq!(report.failed_ids(), vec![id("a"), id("c")]);
        assert!(get(&store, "c").await.is_some());
        assert_eq!(selection.ids(), vec![id("a"), id("c")]);
    }

    #[tokio::test]
    async fn test_promote_delete_keeps_children() {
        let (store, dispatcher) = fixture().await;
        let dispatcher = dispatcher.with_delete_strategy(DeleteStrategy::PromoteChildren);
        let mut selection = select(&["a"]);

        let report = dispatcher
            .dispatch(&mut selection, BatchOperation::Delete)
            .await;

        assert!(report.is_complete());
        let roots: Vec<ItemId> = store
            .get_children(None)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(roots, vec![id("c"), id("b")]);
        assert_eq!(get(&store, "e").await.unwrap().parent_id, Some(id("c")));
    }

    #[tokio::test]
    async fn test_duplicate_lands_after_original() {
        let (store, dispatcher) = fixture().await;
        let mut selection = select(&["a", "c"]);

        let report = dispatcher
            .dispatch(&mut selection, BatchOperation::Duplicate)
            .await;

        assert!(report.is_complete());
        assert_eq!(report.created.len(), 2);

        let items = store.list().await.unwrap();
        let index = TreeIndex::from_items(&items);
        let labels: Vec<&str> = index.flat().iter().map(|f| f.item.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["A", "C", "E", "C (copy)", "A (copy)", "B"]
        );
    }

    #[tokio::test]
    async fn test_empty_selection_does_nothing() {
        let (store, dispatcher) = fixture().await;
        let mut selection = Selection::new();

        let report = dispatcher
            .dispatch(&mut selection, BatchOperation::Delete)
            .await;

        assert_eq!(report.total(), 0);
        assert!(report.is_complete());
        assert_eq!(store.write_count().await, 0);
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(BatchOperation::SetStarred(false).to_string(), "unstar");
        assert_eq!(
            BatchOperation::SetExcludeFromExport(true).to_string(),
            "exclude from export"
        );
        assert_eq!(BatchOperation::Delete.flag(), None);
    }
}
