//! Local object cache for coffer repositories.
//!
//! The cache is a durability layer in front of the storage backend: an
//! ordered `(category, key) -> bytes` store with no eviction, one SQLite
//! database per (repository, scheme, origin) triple. Entries are only ever
//! overwritten, or dropped together with the whole store.
//!
//! ```text
//! <root>/vfs/<repository>/<scheme>/<origin>/cache.db
//! ```

mod category;
mod db;
pub mod error;
mod manager;
mod vfs;

pub use crate::category::Category;
pub use crate::manager::CacheManager;
pub use crate::vfs::VfsCache;
