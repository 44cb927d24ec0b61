//! Drag Reparent Resolution
//!
//! Turns drop gestures into parent/position writes:
//! - drop onto an item: become its last child
//! - drop into a gap between siblings: take that slot in the sibling group
//!
//! Self drops and drops below one's own subtree are rejected before any write.
//! Only one structural mutation per item may be in flight at a time.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::{
    Allocation, DeleteStrategy, DomainError, DomainResult, Item, ItemId, PositionAllocator,
};
use crate::repository::ItemStore;

/// Default bound on ancestor walks
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Where a dragged item was released
#[derive(Debug, Clone, PartialEq)]
pub enum DropTarget {
    /// Drop on an item (become child)
    Item(ItemId),
    /// Drop on a zone between items: slot `index` among the children of
    /// `parent_id`, counted without the dragged item
    Zone {
        parent_id: Option<ItemId>,
        index: usize,
    },
}

/// Why a gesture had no effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    SelfDrop,
    DescendantDrop,
    EmptySiblingGroup,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::SelfDrop => write!(f, "item dropped onto itself"),
            RejectReason::DescendantDrop => write!(f, "item dropped into its own subtree"),
            RejectReason::EmptySiblingGroup => write!(f, "no siblings to drop between"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    Moved {
        id: ItemId,
        parent_id: Option<ItemId>,
        position: f64,
        /// Siblings whose position changed to make room
        renumbered: usize,
    },
    Rejected(RejectReason),
}

/// Where a newly created item goes among its siblings
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    End,
    After(ItemId),
}

/// Ids with a structural mutation currently in flight
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<Mutex<HashSet<ItemId>>>);

impl InFlight {
    /// Mark `id` busy until the returned guard drops
    pub fn claim(&self, id: &ItemId) -> DomainResult<InFlightGuard> {
        if !self.0.lock().insert(id.clone()) {
            return Err(DomainError::Conflict(format!(
                "Item {} already has a change in flight",
                id
            )));
        }
        Ok(InFlightGuard {
            set: self.0.clone(),
            id: id.clone(),
        })
    }

    pub fn is_busy(&self, id: &ItemId) -> bool {
        self.0.lock().contains(id)
    }
}

pub struct InFlightGuard {
    set: Arc<Mutex<HashSet<ItemId>>>,
    id: ItemId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.id);
    }
}

/// Ancestors of `id`, nearest first
///
/// Fails with `NotFound` if `id` is missing and with `Conflict` if the chain
/// is longer than `max_depth` (which only happens with cyclic rows).
pub async fn ancestors_of<S: ItemStore + ?Sized>(
    store: &S,
    id: &ItemId,
    max_depth: usize,
) -> DomainResult<Vec<ItemId>> {
    let item = store
        .find_by_id(id)
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("Item {} not found", id)))?;

    let mut chain = Vec::new();
    let mut current = item.parent_id;
    while let Some(parent) = current {
        if chain.len() >= max_depth {
            return Err(DomainError::Conflict(format!(
                "ancestor chain of {} exceeds {} levels",
                id, max_depth
            )));
        }
        current = store
            .find_by_id(&parent)
            .await?
            .and_then(|item| item.parent_id);
        chain.push(parent);
    }
    Ok(chain)
}

/// Sibling rows whose position changes under `allocation`
fn rebalance_writes(sorted_siblings: &[Item], allocation: &Allocation) -> Vec<(ItemId, f64)> {
    let Allocation::Rebalanced { siblings: positions, .. } = allocation else {
        return Vec::new();
    };
    sorted_siblings
        .iter()
        .zip(positions)
        .filter(|(sibling, position)| sibling.position != **position)
        .map(|(sibling, position)| (sibling.id.clone(), *position))
        .collect()
}

pub struct ReorderResolver<S: ItemStore> {
    store: Arc<S>,
    allocator: PositionAllocator,
    max_depth: usize,
    in_flight: InFlight,
}

impl<S: ItemStore> Clone for ReorderResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            allocator: self.allocator,
            max_depth: self.max_depth,
            in_flight: self.in_flight.clone(),
        }
    }
}

impl<S: ItemStore> ReorderResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            allocator: PositionAllocator::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            in_flight: InFlight::default(),
        }
    }

    pub fn with_allocator(mut self, allocator: PositionAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    pub fn allocator(&self) -> &PositionAllocator {
        &self.allocator
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Dispatch a drop gesture
    pub async fn drop_on(&self, dragged: &ItemId, target: &DropTarget) -> DomainResult<MoveOutcome> {
        match target {
            DropTarget::Item(target_id) => self.move_into(dragged, target_id).await,
            DropTarget::Zone { parent_id, index } => {
                if parent_id.as_ref() == Some(dragged) {
                    return Ok(MoveOutcome::Rejected(RejectReason::DescendantDrop));
                }
                let dragged_item = self.require(dragged).await?;
                let siblings = self.store.get_children(parent_id.as_ref()).await?;
                self.place(&dragged_item, parent_id.clone(), *index, siblings)
                    .await
            }
        }
    }

    /// Make `dragged` the last child of `target`
    pub async fn move_into(&self, dragged: &ItemId, target: &ItemId) -> DomainResult<MoveOutcome> {
        if dragged == target {
            return Ok(MoveOutcome::Rejected(RejectReason::SelfDrop));
        }
        let dragged_item = self.require(dragged).await?;
        let siblings = self.store.get_children(Some(target)).await?;
        self.place(&dragged_item, Some(target.clone()), usize::MAX, siblings)
            .await
    }

    /// Put `dragged` at `target_index` within the group `sibling_ids`
    ///
    /// The group's common parent becomes the dragged item's parent. The index
    /// counts the group without the dragged item.
    pub async fn move_between(
        &self,
        dragged: &ItemId,
        target_index: usize,
        sibling_ids: &[ItemId],
    ) -> DomainResult<MoveOutcome> {
        if sibling_ids.is_empty() {
            return Ok(MoveOutcome::Rejected(RejectReason::EmptySiblingGroup));
        }

        let dragged_item = self.require(dragged).await?;
        let mut siblings = Vec::with_capacity(sibling_ids.len());
        for id in sibling_ids.iter().filter(|id| *id != dragged) {
            siblings.push(self.require(id).await?);
        }

        let parent_id = match siblings.first() {
            None => dragged_item.parent_id.clone(),
            Some(first) => {
                if siblings.iter().any(|s| s.parent_id != first.parent_id) {
                    return Err(DomainError::InvalidInput(
                        "sibling group spans more than one parent".to_string(),
                    ));
                }
                first.parent_id.clone()
            }
        };

        self.place(&dragged_item, parent_id, target_index, siblings)
            .await
    }

    /// Position for a new item under `parent_id`
    ///
    /// Renumbers the siblings first (in one write) when the slot after the
    /// anchor is too narrow.
    pub async fn create_position(
        &self,
        parent_id: Option<&ItemId>,
        placement: &Placement,
    ) -> DomainResult<f64> {
        match placement {
            Placement::End => self.store.get_next_position(parent_id).await,
            Placement::After(anchor) => {
                let siblings = self.store.get_children(parent_id).await?;
                let index = siblings
                    .iter()
                    .position(|s| s.id == *anchor)
                    .ok_or_else(|| {
                        DomainError::InvalidInput(format!(
                            "{} is not a child of {}",
                            anchor,
                            parent_id.map_or("the root".to_string(), |p| p.to_string())
                        ))
                    })?;
                let allocation = self.allocate(&siblings, index + 1);
                let writes = rebalance_writes(&siblings, &allocation);
                if !writes.is_empty() {
                    self.store.set_positions(parent_id, &writes).await?;
                    log::debug!("renumbered {} siblings", writes.len());
                }
                Ok(allocation.position())
            }
        }
    }

    /// Delete one item, handling its children per `strategy`
    pub async fn delete_item(&self, id: &ItemId, strategy: DeleteStrategy) -> DomainResult<()> {
        let _guard = self.in_flight.claim(id)?;
        match strategy {
            DeleteStrategy::Cascade => self.store.delete(id).await,
            DeleteStrategy::PromoteChildren => {
                let item = self.require(id).await?;
                let children = self.store.get_children(Some(id)).await?;
                let siblings = self.store.get_children(item.parent_id.as_ref()).await?;
                let index = siblings
                    .iter()
                    .position(|s| s.id == *id)
                    .unwrap_or(siblings.len());
                let before = index
                    .checked_sub(1)
                    .and_then(|i| siblings.get(i))
                    .map(|s| s.position);
                let after = siblings.get(index + 1).map(|s| s.position);

                let mut sibling_positions: Vec<(ItemId, f64)> = Vec::new();
                let positions = match self.allocator.spread(before, after, children.len()) {
                    Some(positions) => positions,
                    None => {
                        // Renumber the whole group around the promoted children
                        let count = siblings.len().saturating_sub(1) + children.len();
                        let slots = self.allocator.evenly_spaced(count);
                        let (head, tail) = siblings.split_at(index);
                        let tail = tail.get(1..).unwrap_or_default();
                        let after_children = &slots[head.len() + children.len()..];
                        sibling_positions.extend(
                            head.iter()
                                .zip(&slots)
                                .chain(tail.iter().zip(after_children))
                                .map(|(sibling, slot)| (sibling.id.clone(), *slot)),
                        );
                        slots[head.len()..head.len() + children.len()].to_vec()
                    }
                };

                let child_positions: Vec<(ItemId, f64)> = children
                    .iter()
                    .map(|c| c.id.clone())
                    .zip(positions)
                    .collect();
                self.store
                    .delete_promoting(id, &child_positions, &sibling_positions)
                    .await
            }
        }
    }

    async fn place(
        &self,
        dragged: &Item,
        parent_id: Option<ItemId>,
        index: usize,
        siblings: Vec<Item>,
    ) -> DomainResult<MoveOutcome> {
        let _guard = self.in_flight.claim(&dragged.id)?;

        if let Some(parent) = &parent_id {
            if *parent == dragged.id {
                return Ok(MoveOutcome::Rejected(RejectReason::SelfDrop));
            }
            let ancestors = ancestors_of(self.store.as_ref(), parent, self.max_depth).await?;
            if ancestors.contains(&dragged.id) {
                log::warn!(
                    "rejected moving {} under its descendant {}",
                    dragged.id,
                    parent
                );
                return Ok(MoveOutcome::Rejected(RejectReason::DescendantDrop));
            }
        }

        let mut siblings: Vec<Item> = siblings
            .into_iter()
            .filter(|s| s.id != dragged.id)
            .collect();
        siblings.sort_by(|a, b| a.sibling_cmp(b));

        let allocation = self.allocate(&siblings, index);
        let position = allocation.position();

        // Renumbered siblings and the dragged row land in one write
        let mut writes = rebalance_writes(&siblings, &allocation);
        let renumbered = writes.len();
        writes.push((dragged.id.clone(), position));
        self.store
            .set_positions(parent_id.as_ref(), &writes)
            .await?;

        log::info!(
            "moved {} under {} at {}",
            dragged.id,
            parent_id.as_ref().map_or("root".to_string(), |p| p.to_string()),
            position
        );
        Ok(MoveOutcome::Moved {
            id: dragged.id.clone(),
            parent_id,
            position,
            renumbered,
        })
    }

    fn allocate(&self, sorted_siblings: &[Item], index: usize) -> Allocation {
        let positions: Vec<f64> = sorted_siblings.iter().map(|s| s.position).collect();
        self.allocator.allocate(&positions, index)
    }

    async fn require(&self, id: &ItemId) -> DomainResult<Item> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Item {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::POSITION_GAP;
    use crate::repository::{InMemoryItemStore, ItemHierarchyOperations, Repository};

    fn item(id: &str, parent: Option<&str>, position: f64) -> Item {
        let mut item = Item::new(id, id.to_uppercase(), position);
        item.parent_id = parent.map(ItemId::from);
        item
    }

    fn id(s: &str) -> ItemId {
        ItemId::from(s)
    }

    /// root: a(1e6) [c(1e6) [e(1e6)], d(2e6)], b(2e6)
    async fn fixture() -> (Arc<InMemoryItemStore>, ReorderResolver<InMemoryItemStore>) {
        let store = Arc::new(
            InMemoryItemStore::with_items(vec![
                item("a", None, 1_000_000.0),
                item("b", None, 2_000_000.0),
                item("c", Some("a"), 1_000_000.0),
                item("d", Some("a"), 2_000_000.0),
                item("e", Some("c"), 1_000_000.0),
            ])
            .await,
        );
        let resolver = ReorderResolver::new(store.clone());
        (store, resolver)
    }

    async fn child_ids(store: &InMemoryItemStore, parent: Option<&str>) -> Vec<String> {
        let parent = parent.map(ItemId::from);
        store
            .get_children(parent.as_ref())
            .await
            .unwrap()
            .iter()
            .map(|i| i.id.to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_drop_onto_self_is_noop() {
        let (store, resolver) = fixture().await;
        let outcome = resolver.move_into(&id("a"), &id("a")).await.unwrap();
        assert_eq!(outcome, MoveOutcome::Rejected(RejectReason::SelfDrop));
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_drop_onto_item_appends_as_last_child() {
        let (store, resolver) = fixture().await;
        let outcome = resolver.move_into(&id("b"), &id("a")).await.unwrap();
        assert_eq!(
            outcome,
            MoveOutcome::Moved {
                id: id("b"),
                parent_id: Some(id("a")),
                position: 3_000_000.0,
                renumbered: 0,
            }
        );
        assert_eq!(child_ids(&store, Some("a")).await, vec!["c", "d", "b"]);
        assert_eq!(child_ids(&store, None).await, vec!["a"]);
    }

    #[tokio::test]
    async fn test_drop_onto_empty_item_gets_gap() {
        let (store, resolver) = fixture().await;
        resolver.move_into(&id("d"), &id("b")).await.unwrap();
        let d = store.find_by_id(&id("d")).await.unwrap().unwrap();
        assert_eq!(d.parent_id, Some(id("b")));
        assert_eq!(d.position, POSITION_GAP);
    }

    #[tokio::test]
    async fn test_drop_into_own_subtree_is_rejected() {
        let (store, resolver) = fixture().await;
        for target in ["c", "e"] {
            let outcome = resolver.move_into(&id("a"), &id(target)).await.unwrap();
            assert_eq!(outcome, MoveOutcome::Rejected(RejectReason::DescendantDrop));
        }
        let outcome = resolver
            .move_between(&id("a"), 0, &[id("e")])
            .await
            .unwrap();
        assert_eq!(outcome, MoveOutcome::Rejected(RejectReason::DescendantDrop));
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_move_between_takes_midpoint_and_common_parent() {
        let (store, resolver) = fixture().await;
        let mut b = store.find_by_id(&id("b")).await.unwrap().unwrap();
        b.position = 3_000_000.0;
        store.update(&b).await.unwrap();

        let outcome = resolver
            .move_between(&id("e"), 1, &[id("b"), id("a")])
            .await
            .unwrap();
        assert_eq!(
            outcome,
            MoveOutcome::Moved {
                id: id("e"),
                parent_id: None,
                position: 2_000_000.0,
                renumbered: 0,
            }
        );
        assert_eq!(child_ids(&store, None).await, vec!["a", "e", "b"]);
        assert!(child_ids(&store, Some("c")).await.is_empty());
    }

    #[tokio::test]
    async fn test_move_between_within_own_group() {
        let (store, resolver) = fixture().await;
        resolver
            .move_between(&id("c"), 1, &[id("c"), id("d")])
            .await
            .unwrap();
        assert_eq!(child_ids(&store, Some("a")).await, vec!["d", "c"]);

        resolver
            .move_between(&id("c"), 0, &[id("d"), id("c")])
            .await
            .unwrap();
        assert_eq!(child_ids(&store, Some("a")).await, vec!["c", "d"]);
    }

    #[tokio::test]
    async fn test_move_between_validation() {
        let (_store, resolver) = fixture().await;
        assert_eq!(
            resolver.move_between(&id("a"), 0, &[]).await.unwrap(),
            MoveOutcome::Rejected(RejectReason::EmptySiblingGroup)
        );
        assert!(matches!(
            resolver.move_between(&id("b"), 0, &[id("a"), id("c")]).await,
            Err(DomainError::InvalidInput(_))
        ));
        assert!(matches!(
            resolver.move_between(&id("b"), 0, &[id("zz")]).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_zone_drop_uses_parent_children() {
        let (store, resolver) = fixture().await;
        let outcome = resolver
            .drop_on(
                &id("b"),
                &DropTarget::Zone {
                    parent_id: Some(id("a")),
                    index: 0,
                },
            )
            .await
            .unwrap();
        assert!(matches!(outcome, MoveOutcome::Moved { position, .. } if position == 0.0));
        assert_eq!(child_ids(&store, Some("a")).await, vec!["b", "c", "d"]);

        let outcome = resolver
            .drop_on(
                &id("a"),
                &DropTarget::Zone {
                    parent_id: Some(id("a")),
                    index: 0,
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, MoveOutcome::Rejected(RejectReason::DescendantDrop));
    }

    #[tokio::test]
    async fn test_narrow_gap_renumbers_siblings() {
        let store = Arc::new(
            InMemoryItemStore::with_items(vec![
                item("x", None, 1.0),
                item("y", None, 1.0005),
                item("z", None, 5.0),
            ])
            .await,
        );
        let resolver = ReorderResolver::new(store.clone());
        let outcome = resolver
            .move_between(&id("z"), 1, &[id("x"), id("y"), id("z")])
            .await
            .unwrap();
        assert_eq!(
            outcome,
            MoveOutcome::Moved {
                id: id("z"),
                parent_id: None,
                position: 2_000_000.0,
                renumbered: 2,
            }
        );
        assert_eq!(child_ids(&store, None).await, vec!["x", "z", "y"]);
    }

    #[tokio::test]
    async fn test_rejected_move_keeps_renumbered_group_intact() {
        let store = Arc::new(
            InMemoryItemStore::with_items(vec![
                item("x", None, 1.0),
                item("y", None, 1.0005),
                item("z", None, 5.0),
            ])
            .await,
        );
        let resolver = ReorderResolver::new(store.clone());
        let group = [id("x"), id("y"), id("z")];

        store.reject_writes_for(&id("z")).await;
        assert!(matches!(
            resolver.move_between(&id("z"), 1, &group).await,
            Err(DomainError::Storage(_))
        ));
        assert_eq!(child_ids(&store, None).await, vec!["x", "y", "z"]);
        let y = store.find_by_id(&id("y")).await.unwrap().unwrap();
        assert_eq!(y.position, 1.0005);
        assert_eq!(store.write_count().await, 0);

        store.accept_writes_for(&id("z")).await;
        let outcome = resolver.move_between(&id("z"), 1, &group).await.unwrap();
        assert!(matches!(outcome, MoveOutcome::Moved { renumbered: 2, .. }));
        assert_eq!(child_ids(&store, None).await, vec!["x", "z", "y"]);
        assert_eq!(store.write_count().await, 1);
    }

    #[tokio::test]
    async fn test_in_flight_item_conflicts() {
        let (store, resolver) = fixture().await;
        let guard = resolver.in_flight().claim(&id("b")).unwrap();
        assert!(matches!(
            resolver.move_into(&id("b"), &id("a")).await,
            Err(DomainError::Conflict(_))
        ));
        drop(guard);
        assert!(!resolver.in_flight().is_busy(&id("b")));
        assert!(resolver.move_into(&id("b"), &id("a")).await.is_ok());
        assert_eq!(child_ids(&store, Some("a")).await, vec!["c", "d", "b"]);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_tree_unchanged() {
        let (store, resolver) = fixture().await;
        store.reject_writes_for(&id("b")).await;
        assert!(matches!(
            resolver.move_into(&id("b"), &id("a")).await,
            Err(DomainError::Storage(_))
        ));
        assert_eq!(child_ids(&store, None).await, vec!["a", "b"]);
        assert!(!resolver.in_flight().is_busy(&id("b")));
    }

    #[tokio::test]
    async fn test_cyclic_rows_hit_depth_bound() {
        let store = Arc::new(
            InMemoryItemStore::with_items(vec![
                item("p", Some("q"), 1.0),
                item("q", Some("p"), 1.0),
                item("r", None, 1.0),
            ])
            .await,
        );
        let resolver = ReorderResolver::new(store).with_max_depth(8);
        assert!(matches!(
            resolver.move_into(&id("r"), &id("p")).await,
            Err(DomainError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_create_position_after_anchor() {
        let (store, resolver) = fixture().await;
        let position = resolver
            .create_position(Some(&id("a")), &Placement::After(id("c")))
            .await
            .unwrap();
        assert_eq!(position, 1_500_000.0);

        let end = resolver
            .create_position(None, &Placement::End)
            .await
            .unwrap();
        assert_eq!(end, 3_000_000.0);

        assert!(matches!(
            resolver
                .create_position(None, &Placement::After(id("c")))
                .await,
            Err(DomainError::InvalidInput(_))
        ));
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_create_position_in_narrow_slot_renumbers_in_one_write() {
        let store = Arc::new(
            InMemoryItemStore::with_items(vec![
                item("x", None, 1.0),
                item("y", None, 1.0005),
            ])
            .await,
        );
        let resolver = ReorderResolver::new(store.clone());
        let position = resolver
            .create_position(None, &Placement::After(id("x")))
            .await
            .unwrap();

        assert_eq!(store.write_count().await, 1);
        let x = store.find_by_id(&id("x")).await.unwrap().unwrap();
        let y = store.find_by_id(&id("y")).await.unwrap().unwrap();
        assert!(x.position < position && position < y.position);
    }

    #[tokio::test]
    async fn test_delete_promoting_children() {
        let (store, resolver) = fixture().await;
        resolver
            .delete_item(&id("a"), DeleteStrategy::PromoteChildren)
            .await
            .unwrap();
        assert_eq!(child_ids(&store, None).await, vec!["c", "d", "b"]);
        assert_eq!(child_ids(&store, Some("c")).await, vec!["e"]);
        assert!(store.find_by_id(&id("a")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_promoting_into_narrow_gap_renumbers() {
        let store = Arc::new(
            InMemoryItemStore::with_items(vec![
                item("a", None, 1.0),
                item("m", None, 1.0005),
                item("b", None, 1.001),
                item("m1", Some("m"), 1.0),
                item("m2", Some("m"), 2.0),
            ])
            .await,
        );
        let resolver = ReorderResolver::new(store.clone());
        resolver
            .delete_item(&id("m"), DeleteStrategy::PromoteChildren)
            .await
            .unwrap();
        assert_eq!(child_ids(&store, None).await, vec!["a", "m1", "m2", "b"]);
    }

    #[tokio::test]
    async fn test_rejected_promote_delete_keeps_group_order() {
        let store = Arc::new(
            InMemoryItemStore::with_items(vec![
                item("a", None, 1.0),
                item("m", None, 1.0005),
                item("b", None, 1.001),
                item("m1", Some("m"), 1.0),
            ])
            .await,
        );
        let resolver = ReorderResolver::new(store.clone());
        store.reject_writes_for(&id("m")).await;
        assert!(matches!(
            resolver
                .delete_item(&id("m"), DeleteStrategy::PromoteChildren)
                .await,
            Err(DomainError::Storage(_))
        ));
        assert_eq!(child_ids(&store, None).await, vec!["a", "m", "b"]);
        assert_eq!(child_ids(&store, Some("m")).await, vec!["m1"]);
        let a = store.find_by_id(&id("a")).await.unwrap().unwrap();
        assert_eq!(a.position, 1.0);
    }

    #[tokio::test]
    async fn test_delete_cascade() {
        let (store, resolver) = fixture().await;
        resolver
            .delete_item(&id("a"), DeleteStrategy::Cascade)
            .await
            .unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ancestors_of() {
        let (store, _resolver) = fixture().await;
        assert_eq!(
            ancestors_of(store.as_ref(), &id("e"), 10).await.unwrap(),
            vec![id("c"), id("a")]
        );
        assert!(matches!(
            ancestors_of(store.as_ref(), &id("nope"), 10).await,
            Err(DomainError::NotFound(_))
        ));
    }
}
