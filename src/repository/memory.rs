//! In-Memory Item Store
//!
//! HashMap-backed implementation of every item repository trait. Used for
//! tests and for running the tree logic without a database. Writes can be made
//! to fail per item to exercise persistence-failure paths.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::item::{
    copy_of, ItemBatchOperations, ItemHierarchyOperations, ItemPositioningOperations,
};
use super::traits::Repository;
use crate::domain::{DomainError, DomainResult, Item, ItemFlag, ItemId, PositionAllocator};

#[derive(Default)]
struct State {
    items: HashMap<ItemId, Item>,
    rejected: HashSet<ItemId>,
    writes: usize,
}

impl State {
    fn check_writable(&self, id: &ItemId) -> DomainResult<()> {
        if self.rejected.contains(id) {
            return Err(DomainError::Storage(format!("write rejected for {}", id)));
        }
        Ok(())
    }

    fn sorted_children(&self, parent_id: Option<&ItemId>) -> Vec<Item> {
        let mut children: Vec<Item> = self
            .items
            .values()
            .filter(|i| i.parent_id.as_ref() == parent_id)
            .cloned()
            .collect();
        children.sort_by(|a, b| a.sibling_cmp(b));
        children
    }

    fn descendant_ids(&self, id: &ItemId) -> Vec<ItemId> {
        let mut result: Vec<ItemId> = Vec::new();
        let mut to_visit = vec![id.clone()];
        while let Some(current) = to_visit.pop() {
            for child in self.sorted_children(Some(&current)) {
                if child.id == *id || result.contains(&child.id) {
                    continue;
                }
                to_visit.push(child.id.clone());
                result.push(child.id);
            }
        }
        result
    }

    fn get(&self, id: &ItemId) -> DomainResult<&Item> {
        self.items
            .get(id)
            .ok_or_else(|| DomainError::NotFound(format!("Item {} not found", id)))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryItemStore {
    state: Arc<Mutex<State>>,
    allocator: PositionAllocator,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `items` as given (no timestamps touched)
    pub async fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.lock().await;
            for item in items {
                state.items.insert(item.id.clone(), item);
            }
        }
        store
    }

    pub fn with_allocator(mut self, allocator: PositionAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    /// Make every later write touching `id` fail with a storage error
    pub async fn reject_writes_for(&self, id: &ItemId) {
        self.state.lock().await.rejected.insert(id.clone());
    }

    pub async fn accept_writes_for(&self, id: &ItemId) {
        self.state.lock().await.rejected.remove(id);
    }

    /// Number of successful write calls so far
    pub async fn write_count(&self) -> usize {
        self.state.lock().await.writes
    }
}

#[async_trait]
impl Repository<Item> for InMemoryItemStore {
    async fn create(&self, entity: &Item) -> DomainResult<Item> {
        let mut state = self.state.lock().await;
        let mut item = entity.clone();
        if item.id.as_str().is_empty() {
            item.id = ItemId::generate();
        }
        state.check_writable(&item.id)?;
        if state.items.contains_key(&item.id) {
            return Err(DomainError::Conflict(format!("Item {} already exists", item.id)));
        }
        let now = Utc::now();
        item.created_at = Some(item.created_at.unwrap_or(now));
        item.updated_at = Some(now);
        state.items.insert(item.id.clone(), item.clone());
        state.writes += 1;
        Ok(item)
    }

    async fn find_by_id(&self, id: &ItemId) -> DomainResult<Option<Item>> {
        Ok(self.state.lock().await.items.get(id).cloned())
    }

    async fn list(&self) -> DomainResult<Vec<Item>> {
        let state = self.state.lock().await;
        let mut items: Vec<Item> = state.items.values().cloned().collect();
        items.sort_by(|a, b| {
            a.parent_id
                .cmp(&b.parent_id)
                .then_with(|| a.sibling_cmp(b))
        });
        Ok(items)
    }

    async fn update(&self, entity: &Item) -> DomainResult<Item> {
        let mut state = self.state.lock().await;
        state.check_writable(&entity.id)?;
        state.get(&entity.id)?;
        let mut item = entity.clone();
        item.updated_at = Some(Utc::now());
        state.items.insert(item.id.clone(), item.clone());
        state.writes += 1;
        Ok(item)
    }

    async fn delete(&self, id: &ItemId) -> DomainResult<()> {
        let mut state = self.state.lock().await;
        state.check_writable(id)?;
        state.get(id)?;
        for descendant in state.descendant_ids(id) {
            state.items.remove(&descendant);
        }
        state.items.remove(id);
        state.writes += 1;
        Ok(())
    }
}

#[async_trait]
impl ItemHierarchyOperations for InMemoryItemStore {
    async fn get_children(&self, parent_id: Option<&ItemId>) -> DomainResult<Vec<Item>> {
        Ok(self.state.lock().await.sorted_children(parent_id))
    }

    async fn move_to(
        &self,
        id: &ItemId,
        new_parent_id: Option<&ItemId>,
        position: f64,
    ) -> DomainResult<()> {
        let mut state = self.state.lock().await;
        state.check_writable(id)?;
        let item = state
            .items
            .get_mut(id)
            .ok_or_else(|| DomainError::NotFound(format!("Item {} not found", id)))?;
        item.parent_id = new_parent_id.cloned();
        item.position = position;
        item.updated_at = Some(Utc::now());
        state.writes += 1;
        Ok(())
    }

    async fn set_positions(
        &self,
        parent_id: Option<&ItemId>,
        positions: &[(ItemId, f64)],
    ) -> DomainResult<()> {
        let mut state = self.state.lock().await;
        for (id, _) in positions {
            state.check_writable(id)?;
            state.get(id)?;
        }
        let now = Utc::now();
        for (id, position) in positions {
            if let Some(item) = state.items.get_mut(id) {
                item.parent_id = parent_id.cloned();
                item.position = *position;
                item.updated_at = Some(now);
            }
        }
        state.writes += 1;
        Ok(())
    }

    async fn get_descendants(&self, id: &ItemId) -> DomainResult<Vec<Item>> {
        let state = self.state.lock().await;
        Ok(state
            .descendant_ids(id)
            .iter()
            .filter_map(|d| state.items.get(d).cloned())
            .collect())
    }

    async fn delete_promoting(
        &self,
        id: &ItemId,
        child_positions: &[(ItemId, f64)],
        sibling_positions: &[(ItemId, f64)],
    ) -> DomainResult<()> {
        let mut state = self.state.lock().await;
        state.check_writable(id)?;
        for (sibling, _) in sibling_positions {
            state.check_writable(sibling)?;
        }
        let new_parent = state.get(id)?.parent_id.clone();
        let now = Utc::now();

        for child in state.items.values_mut() {
            if child.parent_id.as_ref() == Some(id) {
                child.parent_id = new_parent.clone();
                child.updated_at = Some(now);
                if let Some((_, position)) = child_positions.iter().find(|(c, _)| *c == child.id) {
                    child.position = *position;
                }
            } else if child.parent_id == new_parent {
                if let Some((_, position)) = sibling_positions.iter().find(|(s, _)| *s == child.id) {
                    child.position = *position;
                    child.updated_at = Some(now);
                }
            }
        }
        state.items.remove(id);
        state.writes += 1;
        Ok(())
    }
}

#[async_trait]
impl ItemPositioningOperations for InMemoryItemStore {
    async fn get_next_position(&self, parent_id: Option<&ItemId>) -> DomainResult<f64> {
        let state = self.state.lock().await;
        let gap = self.allocator.gap();
        Ok(state
            .sorted_children(parent_id)
            .last()
            .map_or(gap, |last| last.position + gap))
    }

    async fn renumber_children(&self, parent_id: Option<&ItemId>) -> DomainResult<usize> {
        let mut state = self.state.lock().await;
        let children = state.sorted_children(parent_id);
        for child in &children {
            state.check_writable(&child.id)?;
        }
        let positions = self.allocator.evenly_spaced(children.len());
        let now = Utc::now();
        for (child, position) in children.iter().zip(positions) {
            if let Some(item) = state.items.get_mut(&child.id) {
                item.position = position;
                item.updated_at = Some(now);
            }
        }
        state.writes += 1;
        Ok(children.len())
    }
}

#[async_trait]
impl ItemBatchOperations for InMemoryItemStore {
    async fn set_flag(&self, ids: &[ItemId], flag: ItemFlag, value: bool) -> DomainResult<Vec<ItemId>> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let mut updated = Vec::new();
        for id in ids {
            // Rejected ids are skipped, the rest of the call still applies
            if state.check_writable(id).is_err() {
                continue;
            }
            if let Some(item) = state.items.get_mut(id) {
                item.set_flag(flag, value);
                item.updated_at = Some(now);
                updated.push(id.clone());
            }
        }
        state.writes += 1;
        Ok(updated)
    }

    async fn duplicate(&self, id: &ItemId, position: f64) -> DomainResult<Item> {
        let mut state = self.state.lock().await;
        state.check_writable(id)?;
        let copy = copy_of(state.get(id)?, position);
        state.items.insert(copy.id.clone(), copy.clone());
        state.writes += 1;
        Ok(copy)
    }
}
