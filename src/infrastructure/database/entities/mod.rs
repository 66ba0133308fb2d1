//! Sea-ORM entity definitions

pub mod sync_item;

pub use sync_item::Entity as SyncItemEntity;
pub use sync_item::ActiveModel as SyncItemActive;
