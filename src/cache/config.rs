//! Cache configuration.

use serde::Deserialize;

/// Cache layer settings, resolved from the `[cache]` section of the
/// application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Enable the remote cache backend. When false (or when Redis is
    /// unreachable) the service degrades to a per-instance in-process map.
    pub enabled: bool,
    /// Redis connection URL, e.g. `redis://127.0.0.1:6379/0`.
    pub redis_url: Option<String>,
    /// Write the warmup seed entries at startup.
    pub warmup_on_startup: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            redis_url: None,
            warmup_on_startup: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let settings = CacheSettings::default();
        assert!(settings.enabled);
        assert!(settings.redis_url.is_none());
        assert!(settings.warmup_on_startup);
    }
}
