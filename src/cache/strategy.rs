//! Cache strategy table.
//!
//! Pure lookups: category policies (TTL + key prefix), key composition,
//! adaptive TTL, and the invalidation-event → key-pattern mapping. No I/O
//! and no side effects live here.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload size above which API responses get a shortened TTL.
const LARGE_PAYLOAD_BYTES: usize = 10_000;
/// Payload size below which API responses get an extended TTL.
const SMALL_PAYLOAD_BYTES: usize = 1_000;

/// A named class of cached data with its own TTL and key prefix.
///
/// The set is closed; adding a category forces every `match` below to be
/// revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCategory {
    CloudPc,
    Session,
    User,
    Api,
    Stats,
    Config,
    Realtime,
    Logs,
}

/// Per-category cache policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryPolicy {
    /// Base time-to-live in seconds.
    pub base_ttl: u64,
    /// Key prefix; full keys are `{prefix}` or `{prefix}:{suffix...}`.
    pub prefix: &'static str,
}

impl CacheCategory {
    /// The category's policy. Exhaustive over the closed set, never fails.
    pub fn policy(self) -> CategoryPolicy {
        match self {
            CacheCategory::CloudPc => CategoryPolicy {
                base_ttl: 300,
                prefix: "cloudpc",
            },
            CacheCategory::Session => CategoryPolicy {
                base_ttl: 1800,
                prefix: "session",
            },
            CacheCategory::User => CategoryPolicy {
                base_ttl: 900,
                prefix: "user",
            },
            CacheCategory::Api => CategoryPolicy {
                base_ttl: 600,
                prefix: "api",
            },
            CacheCategory::Stats => CategoryPolicy {
                base_ttl: 120,
                prefix: "stats",
            },
            CacheCategory::Config => CategoryPolicy {
                base_ttl: 3600,
                prefix: "config",
            },
            CacheCategory::Realtime => CategoryPolicy {
                base_ttl: 30,
                prefix: "realtime",
            },
            CacheCategory::Logs => CategoryPolicy {
                base_ttl: 600,
                prefix: "logs",
            },
        }
    }

    /// Map a free-form category name onto the closed set.
    ///
    /// Unknown names degrade to [`CacheCategory::Api`]'s policy. This is the
    /// only place that accepts stringly-typed categories; everything else in
    /// the crate takes the enum.
    pub fn parse(name: &str) -> CacheCategory {
        match name {
            "cloudpc" => CacheCategory::CloudPc,
            "session" => CacheCategory::Session,
            "user" => CacheCategory::User,
            "api" => CacheCategory::Api,
            "stats" => CacheCategory::Stats,
            "config" => CacheCategory::Config,
            "realtime" => CacheCategory::Realtime,
            "logs" => CacheCategory::Logs,
            _ => CacheCategory::Api,
        }
    }

    /// TTL adjusted for payload size.
    ///
    /// Only `Api` responses are adaptive: oversized payloads are cached for
    /// half the base TTL, small ones for one-and-a-half times it (integer
    /// floor in both directions). Every other category uses its base TTL.
    pub fn adaptive_ttl(self, payload_bytes: usize) -> u64 {
        let base = self.policy().base_ttl;
        if self != CacheCategory::Api {
            return base;
        }
        if payload_bytes > LARGE_PAYLOAD_BYTES {
            base / 2
        } else if payload_bytes < SMALL_PAYLOAD_BYTES {
            base * 3 / 2
        } else {
            base
        }
    }
}

/// Compose a cache key from a category prefix and suffix parts.
///
/// With no parts the key is the bare prefix; otherwise parts are joined with
/// `:` and appended.
pub fn cache_key(category: CacheCategory, parts: &[&str]) -> String {
    let prefix = category.policy().prefix;
    if parts.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}:{}", parts.join(":"))
    }
}

/// A domain action that purges one or more cache categories.
///
/// Closed set; `patterns` is exhaustive, so a new event cannot be added
/// without deciding what it invalidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationEvent {
    UserUpdated { user_id: Uuid },
    CloudPcChanged { cloudpc_id: Uuid },
    ConfigUpdated,
    UserLogin { user_id: Uuid },
    UserLogout { user_id: Uuid },
}

impl InvalidationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            InvalidationEvent::UserUpdated { .. } => "user_updated",
            InvalidationEvent::CloudPcChanged { .. } => "cloudpc_changed",
            InvalidationEvent::ConfigUpdated => "config_updated",
            InvalidationEvent::UserLogin { .. } => "user_login",
            InvalidationEvent::UserLogout { .. } => "user_logout",
        }
    }

    /// Ordered key patterns to purge for this event.
    ///
    /// Entries containing `*` must go through a pattern scan; the rest are
    /// exact keys.
    pub fn patterns(&self) -> Vec<String> {
        match self {
            InvalidationEvent::UserUpdated { user_id } => {
                let id = user_id.to_string();
                vec![
                    cache_key(CacheCategory::User, &[&id]),
                    cache_key(CacheCategory::Session, &[&id]),
                ]
            }
            InvalidationEvent::CloudPcChanged { cloudpc_id } => {
                let id = cloudpc_id.to_string();
                vec![
                    cache_key(CacheCategory::CloudPc, &[&id]),
                    cache_key(CacheCategory::CloudPc, &["list", "*"]),
                    cache_key(CacheCategory::Stats, &["*"]),
                ]
            }
            InvalidationEvent::ConfigUpdated => {
                vec![cache_key(CacheCategory::Config, &["*"])]
            }
            InvalidationEvent::UserLogin { user_id } | InvalidationEvent::UserLogout { user_id } => {
                let id = user_id.to_string();
                vec![
                    cache_key(CacheCategory::Session, &[&id]),
                    cache_key(CacheCategory::Stats, &["dashboard"]),
                ]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_one_policy() {
        let categories = [
            CacheCategory::CloudPc,
            CacheCategory::Session,
            CacheCategory::User,
            CacheCategory::Api,
            CacheCategory::Stats,
            CacheCategory::Config,
            CacheCategory::Realtime,
            CacheCategory::Logs,
        ];
        let mut prefixes: Vec<&str> = categories.iter().map(|c| c.policy().prefix).collect();
        prefixes.sort_unstable();
        prefixes.dedup();
        assert_eq!(prefixes.len(), categories.len());
        for category in categories {
            assert!(category.policy().base_ttl > 0);
        }
    }

    #[test]
    fn unknown_category_name_degrades_to_api() {
        assert_eq!(CacheCategory::parse("session"), CacheCategory::Session);
        assert_eq!(CacheCategory::parse("telemetry"), CacheCategory::Api);
        assert_eq!(CacheCategory::parse(""), CacheCategory::Api);
    }

    #[test]
    fn key_composition() {
        assert_eq!(cache_key(CacheCategory::User, &[]), "user");
        assert_eq!(cache_key(CacheCategory::User, &["u1"]), "user:u1");
        assert_eq!(
            cache_key(CacheCategory::CloudPc, &["list", "abc"]),
            "cloudpc:list:abc"
        );
    }

    #[test]
    fn adaptive_ttl_applies_to_api_only() {
        // Base TTL for api is 600s.
        assert_eq!(CacheCategory::Api.adaptive_ttl(12_000), 300);
        assert_eq!(CacheCategory::Api.adaptive_ttl(500), 900);
        assert_eq!(CacheCategory::Api.adaptive_ttl(5_000), 600);
        // Boundaries are exclusive.
        assert_eq!(CacheCategory::Api.adaptive_ttl(10_000), 600);
        assert_eq!(CacheCategory::Api.adaptive_ttl(1_000), 600);
        // Other categories ignore payload size.
        assert_eq!(CacheCategory::Session.adaptive_ttl(50_000), 1800);
        assert_eq!(CacheCategory::Stats.adaptive_ttl(10), 120);
    }

    #[test]
    fn user_updated_purges_user_and_session() {
        let user_id = Uuid::new_v4();
        let patterns = InvalidationEvent::UserUpdated { user_id }.patterns();
        assert_eq!(
            patterns,
            vec![format!("user:{user_id}"), format!("session:{user_id}")]
        );
    }

    #[test]
    fn cloudpc_changed_purges_record_lists_and_stats() {
        let cloudpc_id = Uuid::new_v4();
        let patterns = InvalidationEvent::CloudPcChanged { cloudpc_id }.patterns();
        assert_eq!(patterns[0], format!("cloudpc:{cloudpc_id}"));
        assert_eq!(patterns[1], "cloudpc:list:*");
        assert_eq!(patterns[2], "stats:*");
    }

    #[test]
    fn login_and_logout_purge_the_same_keys() {
        let user_id = Uuid::new_v4();
        assert_eq!(
            InvalidationEvent::UserLogin { user_id }.patterns(),
            InvalidationEvent::UserLogout { user_id }.patterns()
        );
    }
}
