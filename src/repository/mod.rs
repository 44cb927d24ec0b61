//! Repository Layer
//!
//! Data access abstractions and implementations.

mod db;
mod item;
mod memory;
mod traits;


pub use db::{init_db, DbState};
pub use item::{
    ItemBatchOperations, ItemHierarchyOperations, ItemPositioningOperations, ItemRepository,
};
pub use memory::InMemoryItemStore;
pub use traits::{ItemStore, Repository};
