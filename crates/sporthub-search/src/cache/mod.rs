//! Cache tiers: an in-process LRU and a shared store.

mod local;
mod shared;

pub use local::LocalCache;
pub use shared::{
    CacheError, DEFAULT_SHARED_CAPACITY, InMemorySharedCache, RedisSharedCache, SharedCache,
};
