use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Key/value store with per-entry expiry.
///
/// A value written with `set` is returned by `get` until `ttl` has elapsed and
/// never afterwards. Writes to the same key replace the whole value.
#[async_trait]
pub trait TokenCache: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()>;
}

/// Entry stored in the local DashMap with an expiry timestamp.
#[derive(Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-process cache. Entries are checked on read and evicted lazily; a
/// background sweep can be triggered with `evict_expired()`.
#[derive(Clone, Default)]
pub struct LocalCache {
    entries: Arc<DashMap<String, CacheEntry>>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(entry) = self.entries.get(key) {
            if Instant::now() < entry.expires_at {
                return Some(entry.value.clone());
            }
            // expired: drop the ref before removing
            drop(entry);
            self.entries
                .remove_if(key, |_, entry| Instant::now() >= entry.expires_at);
        }
        None
    }

    pub fn set(&self, key: &str, value: &str, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Remove all expired entries. Returns how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl TokenCache for LocalCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(LocalCache::get(self, key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
        LocalCache::set(self, key, value, ttl);
        Ok(())
    }
}

/// Shared tier behind a `TieredCache`.
#[async_trait]
pub trait SharedTier: Send + Sync {
    /// Value and its remaining lifetime. `None` lifetime means the key has no
    /// expiry, or it could not be read.
    async fn fetch(&self, key: &str) -> anyhow::Result<Option<(String, Option<Duration>)>>;

    async fn store(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()>;
}

/// Redis as the shared tier. Expiry is kept in milliseconds (`PSETEX`/`PTTL`)
/// so the local copy never outlives the shared key.
#[derive(Clone)]
pub struct RedisTier {
    conn: ConnectionManager,
}

impl RedisTier {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SharedTier for RedisTier {
    async fn fetch(&self, key: &str) -> anyhow::Result<Option<(String, Option<Duration>)>> {
        let mut conn = self.conn.clone();
        let Some(v) = conn.get::<_, Option<String>>(key).await? else {
            return Ok(None);
        };
        // -1: no expiry, -2: gone since the GET
        let ttl_ms: i64 = conn.pttl(key).await.unwrap_or(-1);
        let ttl = (ttl_ms > 0).then(|| Duration::from_millis(ttl_ms as u64));
        Ok(Some((v, ttl)))
    }

    async fn store(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
        // PSETEX rejects a zero expiry
        let ttl_ms = ttl.as_millis() as u64;
        if ttl_ms == 0 {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.pset_ex::<_, _, ()>(key, value, ttl_ms).await?;
        Ok(())
    }
}

/// Two-tier cache: in-memory `LocalCache` (tier 1) backed by a shared tier
/// (tier 2, Redis in production).
///
/// Redis is shared between adapter replicas so a token obtained by one
/// instance is reused by the others. Writes land in the local tier first, so
/// a shared-tier outage still leaves this instance with a cached token.
#[derive(Clone)]
pub struct TieredCache<S = RedisTier> {
    local: LocalCache,
    shared: S,
}

impl TieredCache<RedisTier> {
    pub fn new(redis: ConnectionManager) -> Self {
        Self::with_shared(RedisTier::new(redis))
    }

    pub fn redis(&self) -> ConnectionManager {
        self.shared.conn.clone()
    }
}

impl<S: SharedTier> TieredCache<S> {
    pub fn with_shared(shared: S) -> Self {
        Self {
            local: LocalCache::new(),
            shared,
        }
    }

    pub fn local(&self) -> &LocalCache {
        &self.local
    }
}

#[async_trait]
impl<S: SharedTier> TokenCache for TieredCache<S> {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        // tier 1: in-memory (with TTL check)
        if let Some(v) = self.local.get(key) {
            return Ok(Some(v));
        }

        // tier 2: shared. Only entries with a known expiry are mirrored locally.
        let Some((v, ttl)) = self.shared.fetch(key).await? else {
            return Ok(None);
        };
        if let Some(ttl) = ttl {
            self.local.set(key, &v, ttl);
        }
        Ok(Some(v))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
        // a zero TTL means "do not cache"
        if ttl.is_zero() {
            return Ok(());
        }

        self.local.set(key, value, ttl);
        self.shared.store(key, value, ttl).await
    }
}
