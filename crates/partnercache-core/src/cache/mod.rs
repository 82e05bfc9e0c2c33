//! Local caching module for the partner dashboard.
//!
//! Remote collections are kept as timestamped JSON snapshots so that repeat
//! visits render without a round trip. Partner profiles go stale after 30
//! minutes, tutorials and marketing materials after 60.
//!
//! - `SnapshotCache`: typed snapshot reads/writes with quota recovery
//! - `CollectionLoader`: stale-while-revalidate plus "load more" pagination
//! - `load_partner_profile`: single-row profile cache

pub mod collection;
pub mod profile;
pub mod snapshot;
pub mod store;

pub use collection::{
    Collection, CollectionFilter, CollectionLoader, InitialLoad, PaginationCursor,
    DEFAULT_FETCH_TIMEOUT, DEFAULT_PAGE_SIZE,
};
pub use profile::load_partner_profile;
pub use snapshot::{CacheAges, CacheKey, Persisted, Snapshot, SnapshotCache};
pub use store::{FileStore, MemoryStore, SnapshotStore, StoreError};
