//! Item Repository Module
//!
//! This module provides item repository functionality split into specialized sub-modules:
//! - item_repo: Core CRUD operations
//! - item_hierarchy: Hierarchy operations (children, descendants, move, promote)
//! - item_positioning: Position management
//! - item_batch: Flag updates and duplication across many items

mod item_batch;
mod item_hierarchy;
mod item_positioning;
mod item_repo;

pub use item_repo::ItemRepository;

// Re-export all operation traits so they can be used by importing ItemRepository
pub use item_batch::ItemBatchOperations;
pub(crate) use item_batch::copy_of;
pub use item_hierarchy::ItemHierarchyOperations;
pub use item_positioning::ItemPositioningOperations;
