//! Domain Layer
//!
//! Contains the item entity, its position arithmetic and the core abstractions.
//! Nothing here touches storage.

mod entity;
mod item;
pub mod position;

pub use entity::{DomainError, DomainResult, Entity};
pub use item::{DeleteStrategy, Item, ItemFlag, ItemId, ItemRow};
pub use position::{Allocation, PositionAllocator, MIN_POSITION_GAP, POSITION_GAP};
