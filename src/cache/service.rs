//! Typed cache service.
//!
//! Façade over the key-value store and the strategy table. Every operation
//! is independently fallible and never lets a store error escape to its
//! caller: failures are logged, counted, and converted to a neutral value
//! (`false` / `None` / `0`). The cache is an optimization, never a
//! correctness dependency.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use metrics::{counter, histogram};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::entities::{PlatformConfigRecord, SessionRecord, UserRecord};

use super::store::KvStore;
use super::strategy::{CacheCategory, InvalidationEvent, cache_key};

pub const METRIC_CACHE_HIT_TOTAL: &str = "nimbus_cache_hit_total";
pub const METRIC_CACHE_MISS_TOTAL: &str = "nimbus_cache_miss_total";
pub const METRIC_CACHE_SET_TOTAL: &str = "nimbus_cache_set_total";
pub const METRIC_CACHE_DELETE_TOTAL: &str = "nimbus_cache_delete_total";
pub const METRIC_CACHE_ERROR_TOTAL: &str = "nimbus_cache_error_total";
pub const METRIC_CACHE_INVALIDATION_TOTAL: &str = "nimbus_cache_invalidation_total";
pub const METRIC_CACHE_WARMUP_MS: &str = "nimbus_cache_warmup_ms";

/// Fixed warmup seed list, highest priority first. Placeholder values only;
/// real entries arrive through `fetch_or_compute` on first use.
const WARMUP_SEEDS: &[(CacheCategory, &[&str])] = &[
    (CacheCategory::Config, &["platform"]),
    (CacheCategory::Stats, &["dashboard"]),
    (CacheCategory::Realtime, &["announcement"]),
];

/// Process-local counter set. Monotonically increasing for the lifetime of
/// the service instance; multiple instances do not share counters.
#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

/// Aggregated cache metrics, served as JSON by the system endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct CacheMetricsReport {
    pub backend: &'static str,
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses) * 100`, two decimals, `0` before any lookup.
    pub hit_rate_percent: f64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
    pub uptime_seconds: u64,
    pub store_info: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheHealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheHealth {
    pub status: CacheHealthStatus,
    pub backend: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Typed cache operations over the configured backend.
///
/// Constructed once at startup and passed by `Arc` to whatever needs it;
/// there is no global instance.
pub struct CacheService {
    store: KvStore,
    counters: Counters,
    started_at: Instant,
}

impl CacheService {
    pub fn new(store: KvStore) -> Self {
        Self {
            store,
            counters: Counters::default(),
            started_at: Instant::now(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Serialize and write a value under the category's key.
    ///
    /// TTL is re-derived from the category's adaptive rule on every write
    /// unless `ttl_override` is given. Returns whether the write landed.
    pub async fn set<T: Serialize>(
        &self,
        category: CacheCategory,
        key: &str,
        value: &T,
        ttl_override: Option<u64>,
    ) -> bool {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                self.record_error("set", &err.to_string());
                return false;
            }
        };

        let ttl = ttl_override.unwrap_or_else(|| category.adaptive_ttl(payload.len()));
        let full_key = cache_key(category, &[key]);

        match self
            .store
            .set_ex(&full_key, &payload, std::time::Duration::from_secs(ttl))
            .await
        {
            Ok(()) => {
                self.counters.sets.fetch_add(1, Ordering::Relaxed);
                counter!(METRIC_CACHE_SET_TOTAL).increment(1);
                debug!(key = %full_key, ttl, "cache set");
                true
            }
            Err(err) => {
                self.record_error("set", &err.to_string());
                false
            }
        }
    }

    /// Read and deserialize a value.
    ///
    /// Miss-or-error ⇒ `None`: callers cannot distinguish an absent key from
    /// a store or deserialization failure, by design.
    pub async fn get<T: DeserializeOwned>(&self, category: CacheCategory, key: &str) -> Option<T> {
        let full_key = cache_key(category, &[key]);
        match self.store.get(&full_key).await {
            Ok(Some(payload)) => match serde_json::from_str(&payload) {
                Ok(value) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    counter!(METRIC_CACHE_HIT_TOTAL).increment(1);
                    Some(value)
                }
                Err(err) => {
                    self.record_error("get", &err.to_string());
                    None
                }
            },
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
                None
            }
            Err(err) => {
                self.record_error("get", &err.to_string());
                None
            }
        }
    }

    /// Remove one entry; returns the number of keys removed (0 or 1).
    pub async fn delete(&self, category: CacheCategory, key: &str) -> u64 {
        let full_key = cache_key(category, &[key]);
        match self.store.delete(&full_key).await {
            Ok(count) => {
                if count > 0 {
                    self.counters.deletes.fetch_add(count, Ordering::Relaxed);
                    counter!(METRIC_CACHE_DELETE_TOTAL).increment(count);
                }
                count
            }
            Err(err) => {
                self.record_error("delete", &err.to_string());
                0
            }
        }
    }

    /// Purge every key pattern mapped to the event.
    ///
    /// Wildcard patterns go through a scan-and-bulk-delete; exact keys are
    /// deleted directly. Returns the total number of keys removed; a failing
    /// pattern contributes 0 and never fails the caller.
    pub async fn invalidate(&self, event: &InvalidationEvent) -> u64 {
        let mut total: u64 = 0;
        for pattern in event.patterns() {
            let result = if pattern.contains('*') {
                self.store.delete_pattern(&pattern).await
            } else {
                self.store.delete(&pattern).await
            };
            match result {
                Ok(count) => total += count,
                Err(err) => self.record_error("invalidate", &err.to_string()),
            }
        }

        if total > 0 {
            self.counters.deletes.fetch_add(total, Ordering::Relaxed);
            counter!(METRIC_CACHE_DELETE_TOTAL).increment(total);
        }
        counter!(METRIC_CACHE_INVALIDATION_TOTAL, "event" => event.name()).increment(1);
        info!(event = event.name(), removed = total, "cache invalidation");
        total
    }

    /// Return the cached value or run the producer and cache its output.
    ///
    /// Producer errors propagate untouched; cache failures on either side
    /// degrade to a plain producer call.
    pub async fn fetch_or_compute<T, E, F, Fut>(
        &self,
        category: CacheCategory,
        key: &str,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get(category, key).await {
            return Ok(cached);
        }
        let value = producer().await?;
        self.set(category, key, &value, None).await;
        Ok(value)
    }

    // ========================================================================
    // Domain wrappers
    // ========================================================================

    pub async fn cache_user(&self, user: &UserRecord) -> bool {
        self.set(CacheCategory::User, &user.id.to_string(), user, None)
            .await
    }

    pub async fn get_user(&self, user_id: Uuid) -> Option<UserRecord> {
        self.get(CacheCategory::User, &user_id.to_string()).await
    }

    pub async fn invalidate_user(&self, user_id: Uuid) -> u64 {
        self.invalidate(&InvalidationEvent::UserUpdated { user_id })
            .await
    }

    pub async fn cache_user_session(&self, session: &SessionRecord) -> bool {
        self.set(
            CacheCategory::Session,
            &session.user_id.to_string(),
            session,
            None,
        )
        .await
    }

    pub async fn get_user_session(&self, user_id: Uuid) -> Option<SessionRecord> {
        self.get(CacheCategory::Session, &user_id.to_string()).await
    }

    pub async fn invalidate_user_session(&self, user_id: Uuid) -> u64 {
        self.delete(CacheCategory::Session, &user_id.to_string())
            .await
    }

    pub async fn cache_cloudpc_list<Q: Serialize, T: Serialize>(
        &self,
        query: &Q,
        page: &T,
    ) -> bool {
        self.set(CacheCategory::CloudPc, &Self::list_key(query), page, None)
            .await
    }

    pub async fn get_cloudpc_list<Q: Serialize, T: DeserializeOwned>(
        &self,
        query: &Q,
    ) -> Option<T> {
        self.get(CacheCategory::CloudPc, &Self::list_key(query))
            .await
    }

    /// List cache key suffix derived from the serialized query parameters.
    pub fn list_key<Q: Serialize>(query: &Q) -> String {
        use std::hash::{Hash, Hasher};
        let serialized = serde_json::to_string(query).unwrap_or_default();
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        serialized.hash(&mut hasher);
        format!("list:{:016x}", hasher.finish())
    }

    pub async fn cache_stats<T: Serialize>(&self, stats: &T) -> bool {
        self.set(CacheCategory::Stats, "dashboard", stats, None).await
    }

    pub async fn get_stats<T: DeserializeOwned>(&self) -> Option<T> {
        self.get(CacheCategory::Stats, "dashboard").await
    }

    pub async fn invalidate_stats(&self) -> u64 {
        self.delete(CacheCategory::Stats, "dashboard").await
    }

    pub async fn cache_config(&self, config: &PlatformConfigRecord) -> bool {
        self.set(CacheCategory::Config, "platform", config, None).await
    }

    pub async fn get_config(&self) -> Option<PlatformConfigRecord> {
        self.get(CacheCategory::Config, "platform").await
    }

    pub async fn invalidate_config(&self) -> u64 {
        self.invalidate(&InvalidationEvent::ConfigUpdated).await
    }

    // ========================================================================
    // Operations & observability
    // ========================================================================

    /// Aggregate the process-local counters into a report.
    pub async fn metrics(&self) -> CacheMetricsReport {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let hit_rate_percent = if lookups == 0 {
            0.0
        } else {
            (hits as f64 / lookups as f64 * 100.0 * 100.0).round() / 100.0
        };

        CacheMetricsReport {
            backend: self.store.backend_name(),
            hits,
            misses,
            hit_rate_percent,
            sets: self.counters.sets.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            store_info: self.store.info().await.ok(),
        }
    }

    /// Healthy iff the backend answers a liveness probe.
    pub async fn health_check(&self) -> CacheHealth {
        match self.store.ping().await {
            Ok(true) => CacheHealth {
                status: CacheHealthStatus::Healthy,
                backend: self.store.backend_name(),
                error: None,
            },
            Ok(false) => CacheHealth {
                status: CacheHealthStatus::Unhealthy,
                backend: self.store.backend_name(),
                error: Some("liveness probe returned an unexpected reply".to_string()),
            },
            Err(err) => CacheHealth {
                status: CacheHealthStatus::Unhealthy,
                backend: self.store.backend_name(),
                error: Some(err.to_string()),
            },
        }
    }

    /// Write the fixed warmup seed list, highest priority first.
    ///
    /// Per-item failures are logged and skipped. Returns the number of
    /// successful writes.
    pub async fn warmup(&self) -> u64 {
        let warmup_started_at = Instant::now();
        let mut written: u64 = 0;
        for (category, parts) in WARMUP_SEEDS {
            let key = parts.join(":");
            let placeholder = json!({
                "warmup": true,
                "seeded_at": OffsetDateTime::now_utc().unix_timestamp(),
            });
            if self.set(*category, &key, &placeholder, None).await {
                written += 1;
            } else {
                warn!(category = ?category, key = %key, "warmup seed skipped");
            }
        }
        histogram!(METRIC_CACHE_WARMUP_MS)
            .record(warmup_started_at.elapsed().as_secs_f64() * 1000.0);
        info!(written, "cache warmup complete");
        written
    }

    /// Zero the process-local counter set.
    pub fn reset_metrics(&self) {
        self.counters.hits.store(0, Ordering::Relaxed);
        self.counters.misses.store(0, Ordering::Relaxed);
        self.counters.sets.store(0, Ordering::Relaxed);
        self.counters.deletes.store(0, Ordering::Relaxed);
        self.counters.errors.store(0, Ordering::Relaxed);
    }

    fn record_error(&self, op: &'static str, message: &str) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_CACHE_ERROR_TOTAL).increment(1);
        warn!(op, error = message, "cache operation degraded");
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use crate::cache::store::MemoryStore;
    use crate::domain::types::UserRole;

    use super::*;

    fn memory_service() -> CacheService {
        CacheService::new(KvStore::Memory(MemoryStore::new()))
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        name: String,
        cores: u32,
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = memory_service();
        let value = Payload {
            name: "desk-01".to_string(),
            cores: 4,
        };

        assert!(cache.set(CacheCategory::CloudPc, "p1", &value, None).await);
        let cached: Payload = cache.get(CacheCategory::CloudPc, "p1").await.unwrap();
        assert_eq!(cached, value);
    }

    #[tokio::test]
    async fn miss_increments_misses_by_exactly_one() {
        let cache = memory_service();
        let before = cache.metrics().await.misses;

        let missing: Option<Payload> = cache.get(CacheCategory::User, "absent").await;
        assert!(missing.is_none());

        let report = cache.metrics().await;
        assert_eq!(report.misses, before + 1);
        assert_eq!(report.hits, 0);
    }

    #[tokio::test]
    async fn user_updated_invalidation_removes_user_and_session() {
        let cache = memory_service();
        let user_id = Uuid::new_v4();
        let id = user_id.to_string();

        assert!(cache.set(CacheCategory::User, &id, &"profile", None).await);
        assert!(cache.set(CacheCategory::Session, &id, &"session", None).await);

        let removed = cache
            .invalidate(&InvalidationEvent::UserUpdated { user_id })
            .await;
        assert_eq!(removed, 2);

        let user: Option<String> = cache.get(CacheCategory::User, &id).await;
        let session: Option<String> = cache.get(CacheCategory::Session, &id).await;
        assert!(user.is_none());
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn cloudpc_changed_invalidation_sweeps_list_pages() {
        let cache = memory_service();
        let cloudpc_id = Uuid::new_v4();

        cache
            .set(CacheCategory::CloudPc, &cloudpc_id.to_string(), &"pc", None)
            .await;
        cache
            .set(CacheCategory::CloudPc, "list:aaaa", &"page1", None)
            .await;
        cache
            .set(CacheCategory::CloudPc, "list:bbbb", &"page2", None)
            .await;
        cache.cache_stats(&"stats").await;

        let removed = cache
            .invalidate(&InvalidationEvent::CloudPcChanged { cloudpc_id })
            .await;
        assert_eq!(removed, 4);
    }

    #[tokio::test]
    async fn hit_rate_renders_two_decimals() {
        let cache = memory_service();
        assert_eq!(cache.metrics().await.hit_rate_percent, 0.0);

        cache.set(CacheCategory::User, "u", &"v", None).await;
        let _: Option<String> = cache.get(CacheCategory::User, "u").await;
        let _: Option<String> = cache.get(CacheCategory::User, "nope").await;
        let _: Option<String> = cache.get(CacheCategory::User, "also-nope").await;

        let report = cache.metrics().await;
        assert_eq!(report.hits, 1);
        assert_eq!(report.misses, 2);
        assert_eq!(report.hit_rate_percent, 33.33);
    }

    #[tokio::test]
    async fn ttl_override_beats_adaptive_rule() {
        let cache = memory_service();
        // A large api payload would normally get base/2 = 300s.
        let large = "x".repeat(12_000);
        cache
            .set(CacheCategory::Api, "big", &large, Some(42))
            .await;

        let ttl = cache.store.ttl("api:big").await.unwrap();
        assert!(ttl <= 42 && ttl >= 40, "ttl was {ttl}");
    }

    #[tokio::test]
    async fn adaptive_ttl_shrinks_large_api_payloads() {
        let cache = memory_service();
        let large = "x".repeat(12_000);
        cache.set(CacheCategory::Api, "big", &large, None).await;

        let ttl = cache.store.ttl("api:big").await.unwrap();
        assert!(ttl <= 300 && ttl >= 298, "ttl was {ttl}");
    }

    #[tokio::test]
    async fn fetch_or_compute_runs_producer_once() {
        let cache = memory_service();
        let mut calls = 0u32;

        let first: Result<Payload, &str> = cache
            .fetch_or_compute(CacheCategory::Api, "list", || {
                calls += 1;
                async {
                    Ok(Payload {
                        name: "fresh".to_string(),
                        cores: 2,
                    })
                }
            })
            .await;
        assert_eq!(first.unwrap().name, "fresh");
        assert_eq!(calls, 1);

        let second: Result<Payload, &str> = cache
            .fetch_or_compute(CacheCategory::Api, "list", || {
                calls += 1;
                async { Err("producer should not run") }
            })
            .await;
        assert_eq!(second.unwrap().name, "fresh");
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn warmup_writes_every_seed() {
        let cache = memory_service();
        let written = cache.warmup().await;
        assert_eq!(written, WARMUP_SEEDS.len() as u64);

        assert!(cache.store.exists("config:platform").await.unwrap());
        assert!(cache.store.exists("stats:dashboard").await.unwrap());
        assert!(cache.store.exists("realtime:announcement").await.unwrap());
    }

    #[tokio::test]
    async fn reset_metrics_zeroes_counters() {
        let cache = memory_service();
        cache.set(CacheCategory::User, "u", &"v", None).await;
        let _: Option<String> = cache.get(CacheCategory::User, "u").await;
        assert!(cache.metrics().await.sets > 0);

        cache.reset_metrics();
        let report = cache.metrics().await;
        assert_eq!(report.hits, 0);
        assert_eq!(report.sets, 0);
    }

    #[tokio::test]
    async fn delete_counts_only_removed_keys() {
        let cache = memory_service();
        assert_eq!(cache.delete(CacheCategory::User, "ghost").await, 0);
        assert_eq!(cache.metrics().await.deletes, 0);

        cache.set(CacheCategory::User, "real", &"v", None).await;
        assert_eq!(cache.delete(CacheCategory::User, "real").await, 1);
        assert_eq!(cache.metrics().await.deletes, 1);
    }

    #[tokio::test]
    async fn session_wrappers_use_session_category() {
        let cache = memory_service();
        let user_id = Uuid::new_v4();
        let session = SessionRecord {
            user_id,
            username: "ada".to_string(),
            role: UserRole::Member,
            issued_at: OffsetDateTime::now_utc(),
        };

        assert!(cache.cache_user_session(&session).await);
        assert!(
            cache
                .store
                .exists(&format!("session:{user_id}"))
                .await
                .unwrap()
        );

        let cached = cache.get_user_session(user_id).await.unwrap();
        assert_eq!(cached.username, "ada");

        assert_eq!(cache.invalidate_user_session(user_id).await, 1);
        assert!(cache.get_user_session(user_id).await.is_none());
    }

    #[tokio::test]
    async fn list_key_is_stable_per_query() {
        #[derive(Serialize)]
        struct Query {
            status: Option<String>,
            limit: u32,
        }

        let a = CacheService::list_key(&Query {
            status: Some("running".to_string()),
            limit: 20,
        });
        let b = CacheService::list_key(&Query {
            status: Some("running".to_string()),
            limit: 20,
        });
        let c = CacheService::list_key(&Query {
            status: None,
            limit: 20,
        });

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("list:"));
    }

    #[tokio::test]
    async fn health_check_reports_backend() {
        let cache = memory_service();
        let health = cache.health_check().await;
        assert_eq!(health.status, CacheHealthStatus::Healthy);
        assert_eq!(health.backend, "memory");
    }
}
