//! Prompt Tree Workbench
//!
//! Owns the last fetched tree, the selection and the mutation services.
//! Every successful mutation is followed by a full refresh from the store, so
//! the index only ever shows state the store has confirmed. Listeners get
//! `TreeEvent`s over a broadcast channel.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::batch::{BatchDispatcher, BatchOperation, BatchReport};
use crate::config::TreeConfig;
use crate::domain::{DomainError, DomainResult, Item, ItemId, ItemRow};
use crate::reorder::{DropTarget, MoveOutcome, Placement, ReorderResolver};
use crate::repository::ItemStore;
use crate::selection::{ClickModifiers, Selection};
use crate::tree::{TreeIndex, TreeStats};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// Transient, dismissible message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeEvent {
    Refreshed { total: usize },
    Notice(Notice),
}

pub struct PromptTree<S: ItemStore> {
    store: Arc<S>,
    config: TreeConfig,
    resolver: ReorderResolver<S>,
    batch: BatchDispatcher<S>,
    index: TreeIndex,
    selection: Selection,
    events: broadcast::Sender<TreeEvent>,
}

impl<S: ItemStore> PromptTree<S> {
    pub fn new(store: Arc<S>, config: TreeConfig) -> Self {
        let resolver = ReorderResolver::new(store.clone())
            .with_allocator(config.allocator())
            .with_max_depth(config.tree.max_depth);
        let batch = BatchDispatcher::new(resolver.clone())
            .with_delete_strategy(config.batch.delete_strategy)
            .with_selection_policy(config.batch.selection_policy);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            store,
            config,
            resolver,
            batch,
            index: TreeIndex::default(),
            selection: Selection::new(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn index(&self) -> &TreeIndex {
        &self.index
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Rebuild the index from the store and drop vanished ids from the selection
    pub async fn refresh(&mut self) -> DomainResult<usize> {
        let items = match self.store.list().await {
            Ok(items) => items,
            Err(e) => {
                self.report_failure("Refresh", &e);
                return Err(e);
            }
        };

        self.index = TreeIndex::from_items(&items);
        self.selection.prune(&self.index);
        log::debug!(
            "tree refreshed: {} items, {} unreachable",
            self.index.len(),
            self.index.orphan_count()
        );

        let total = self.index.len();
        self.emit(TreeEvent::Refreshed { total });
        Ok(total)
    }

    // Selection, against the current flat order

    pub fn toggle(&mut self, id: &ItemId) {
        self.selection.toggle(id);
    }

    pub fn range_select(&mut self, from: &ItemId, to: &ItemId) -> bool {
        self.selection.range_select(from, to, self.index.flat())
    }

    pub fn select_only(&mut self, id: &ItemId) {
        self.selection.select_only(id);
    }

    pub fn select_all(&mut self) {
        self.selection.select_all(self.index.flat());
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn click(&mut self, id: &ItemId, modifiers: ClickModifiers) {
        self.selection.click(id, modifiers, self.index.flat());
    }

    // Mutations

    pub async fn drop_item(&mut self, dragged: &ItemId, target: &DropTarget) -> DomainResult<MoveOutcome> {
        let result = self.resolver.drop_on(dragged, target).await;
        self.finish_move(result).await
    }

    pub async fn move_between(
        &mut self,
        dragged: &ItemId,
        target_index: usize,
        sibling_ids: &[ItemId],
    ) -> DomainResult<MoveOutcome> {
        let result = self
            .resolver
            .move_between(dragged, target_index, sibling_ids)
            .await;
        self.finish_move(result).await
    }

    /// Apply `operation` to the current selection
    pub async fn run_batch(&mut self, operation: BatchOperation) -> DomainResult<BatchReport> {
        let report = self.batch.dispatch(&mut self.selection, operation).await;
        if report.total() == 0 {
            return Ok(report);
        }

        if !report.succeeded.is_empty() {
            self.refresh().await?;
        }

        let level = if report.is_complete() {
            NoticeLevel::Success
        } else if report.succeeded.is_empty() {
            NoticeLevel::Error
        } else {
            NoticeLevel::Warning
        };
        self.notify(level, report.summary());
        Ok(report)
    }

    pub async fn create_item(
        &mut self,
        label: &str,
        parent_id: Option<&ItemId>,
        placement: &Placement,
    ) -> DomainResult<Item> {
        let created = async {
            let position = self.resolver.create_position(parent_id, placement).await?;
            let mut item = Item::new(ItemId::generate(), label, position);
            item.parent_id = parent_id.cloned();
            self.store.create(&item).await
        }
        .await;

        match created {
            Ok(item) => {
                log::info!("created {} ({})", item.id, item.label);
                self.refresh().await?;
                self.notify(NoticeLevel::Success, format!("Created \"{}\"", item.label));
                Ok(item)
            }
            Err(e) => {
                self.report_failure("Create", &e);
                Err(e)
            }
        }
    }

    /// Insert rows exported by another backend (JSON array of rows)
    ///
    /// Rows are normalized before anything is written; one malformed row
    /// rejects the whole import.
    pub async fn import_rows_json(&mut self, json: &str) -> DomainResult<usize> {
        let parsed = serde_json::from_str::<Vec<ItemRow>>(json)
            .map_err(|e| DomainError::InvalidInput(format!("malformed rows: {}", e)))
            .and_then(|rows| {
                rows.into_iter()
                    .map(Item::try_from)
                    .collect::<DomainResult<Vec<_>>>()
            });
        let items = match parsed {
            Ok(items) => items,
            Err(e) => {
                self.report_failure("Import", &e);
                return Err(e);
            }
        };

        let mut imported = 0;
        for item in &items {
            if let Err(e) = self.store.create(item).await {
                self.report_failure("Import", &e);
                // Rows written so far stay; show them
                if imported > 0 {
                    self.refresh().await?;
                }
                return Err(e);
            }
            imported += 1;
        }

        self.refresh().await?;
        self.notify(NoticeLevel::Success, format!("Imported {} item(s)", imported));
        Ok(imported)
    }

    pub fn stats(&self, now: DateTime<Utc>) -> TreeStats {
        TreeStats::collect(self.index.roots(), now, self.config.recent_window())
    }

    async fn finish_move(&mut self, result: DomainResult<MoveOutcome>) -> DomainResult<MoveOutcome> {
        match result {
            Ok(MoveOutcome::Rejected(reason)) => {
                log::debug!("drop ignored: {}", reason);
                Ok(MoveOutcome::Rejected(reason))
            }
            Ok(moved) => {
                self.refresh().await?;
                self.notify(NoticeLevel::Success, "Moved".to_string());
                Ok(moved)
            }
            Err(e) => {
                self.report_failure("Move", &e);
                Err(e)
            }
        }
    }

    fn report_failure(&self, action: &str, error: &DomainError) {
        log::error!("{} failed: {}", action, error);
        self.notify(NoticeLevel::Error, format!("{} failed: {}", action, error));
    }

    fn notify(&self, level: NoticeLevel, message: String) {
        self.emit(TreeEvent::Notice(Notice { level, message }));
    }

    fn emit(&self, event: TreeEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
