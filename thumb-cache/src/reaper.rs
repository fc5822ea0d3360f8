use std::sync::Arc;
use std::time::Duration;

use thumb_core::CasResult;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{CacheConfig, ExpirableCache};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Background sweeper evicting expired cache entries
pub struct CacheReaper<C> {
    cache: Arc<C>,
    interval: Duration,
}

impl<C> CacheReaper<C>
where
    C: ExpirableCache + 'static,
{
    /// Create a reaper sweeping once a minute
    pub fn new(cache: Arc<C>) -> Self {
        Self::with_interval(cache, DEFAULT_INTERVAL)
    }

    pub fn with_interval(cache: Arc<C>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    /// Use `cleanup_interval` from the config, falling back to a minute
    pub fn from_config(cache: Arc<C>, config: &CacheConfig) -> Self {
        Self::with_interval(cache, config.cleanup_interval.unwrap_or(DEFAULT_INTERVAL))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sweep forever
    pub async fn run(self) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Starting cache reaper with interval: {:?}", self.interval);

        loop {
            ticker.tick().await;

            match self.sweep_once().await {
                Ok(evicted) if evicted > 0 => info!("Evicted {} expired cache entries", evicted),
                Ok(_) => debug!("No expired cache entries found"),
                Err(e) => warn!("Error during cache sweep: {}", e),
            }
        }
    }

    /// Run the reaper on the current runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run one sweep (for testing)
    pub async fn sweep_once(&self) -> CasResult<usize> {
        self.cache.clean_up().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryCache;
    use chrono::Utc;

    #[tokio::test]
    async fn sweep_once_evicts_expired_entries() {
        let cache = Arc::new(MemoryCache::new());
        cache
            .put("gone", 1, Some(Utc::now() - chrono::Duration::seconds(1)))
            .await
            .unwrap();
        cache.put("kept", 2, None).await.unwrap();

        let reaper = CacheReaper::new(cache.clone());
        assert_eq!(reaper.sweep_once().await.unwrap(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_reaper_sweeps_on_its_interval() {
        let cache = Arc::new(MemoryCache::new());
        let config = CacheConfig::new().with_cleanup_interval(Duration::from_secs(10));
        let handle = CacheReaper::from_config(cache.clone(), &config).spawn();

        cache
            .put("k", 1, Some(Utc::now() - chrono::Duration::seconds(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert!(cache.is_empty());
        handle.abort();
    }
}
