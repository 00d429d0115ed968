//! Bounded in-memory caches.
//!
//! [`TtlCache`] backs both process-wide stores: the layer catalog and the
//! aggregated view cache. Entries expire after a time-to-live and the least
//! recently used entry goes when capacity is reached.

mod key;
mod stats;
mod ttl;

pub use key::{fingerprint, ViewCacheKey, DEFAULT_BBOX_PRECISION};
pub use stats::CacheStats;
pub use ttl::TtlCache;
