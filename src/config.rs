use std::env;
use std::path::PathBuf;

/// Default lower clamp for stored TTLs, in seconds.
pub const DEFAULT_TTL_MIN: u32 = 5;
/// Default upper clamp for stored TTLs: 6 days.
pub const DEFAULT_TTL_MAX: u32 = 6 * 86_400;

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Lower TTL clamp applied at stash time
    pub ttl_min: u32,
    /// Upper TTL clamp applied at stash time
    pub ttl_max: u32,
    /// On-disk path for the sled backend; None keeps the store ephemeral
    pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_min: DEFAULT_TTL_MIN,
            ttl_max: DEFAULT_TTL_MAX,
            path: None,
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            ttl_min: env::var("MIMIR_TTL_MIN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TTL_MIN),
            ttl_max: env::var("MIMIR_TTL_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TTL_MAX),
            path: env::var("MIMIR_CACHE_PATH").ok().map(PathBuf::from),
        }
    }

    /// Clamp a record TTL into the configured window.
    pub fn clamp_ttl(&self, ttl: u32) -> u32 {
        ttl.clamp(self.ttl_min, self.ttl_max)
    }
}
