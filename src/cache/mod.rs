//! Redis-backed caching layer.
//!
//! Three pieces, leaf-first:
//!
//! - [`strategy`]: pure category policies, key composition, and the
//!   invalidation-event → pattern mapping
//! - [`store`]: the key-value backends (Redis, in-process fallback)
//! - [`service`]: the typed façade every other layer talks to
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! redis_url = "redis://127.0.0.1:6379/0"
//! warmup_on_startup = true
//! ```

mod config;
pub(crate) mod lock;
pub mod service;
pub mod store;
pub mod strategy;

pub use config::CacheSettings;
pub use service::{CacheHealth, CacheHealthStatus, CacheMetricsReport, CacheService};
pub use store::{CacheError, KvStore, MemoryStore, RedisStore};
pub use strategy::{CacheCategory, CategoryPolicy, InvalidationEvent, cache_key};
