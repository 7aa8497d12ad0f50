//! Client-side cache invalidation.
//!
//! The [`InvalidationRouter`] listens to the socket manager and marks the
//! affected [`CacheKey`]s stale in an [`InvalidationTarget`], usually the
//! in-memory [`QueryCache`]. Invalidation never carries data; observed views
//! refetch through their normal, authorized query path.

pub mod keys;
pub mod query_cache;
pub mod router;

pub use keys::CacheKey;
pub use query_cache::{CachedQuery, Invalidation, InvalidationTarget, QueryCache, QueryObserver};
pub use router::{apply, invalidations, InvalidationRouter, RouterHandle};
