//! Background job: drop expired entries from the in-process token cache.
//!
//! Reads already ignore expired entries; the sweep only bounds memory.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;

use crate::cache::LocalCache;

/// Spawn the background sweep task. Call this once at startup.
pub fn spawn(cache: LocalCache, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        loop {
            interval.tick().await;
            let evicted = cache.evict_expired();
            if evicted > 0 {
                tracing::debug!(evicted, "evicted expired cache entries");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sweep_evicts_expired_entries() {
        let cache = LocalCache::new();
        cache.set("k", "v", Duration::from_secs(5));

        let handle = spawn(cache.clone(), Duration::from_secs(60));
        time::sleep(Duration::from_secs(61)).await;
        assert!(cache.is_empty());
        handle.abort();
    }
}
