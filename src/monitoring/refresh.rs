use dashmap::DashMap;
use ethers::types::Address;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use crate::data::cache::SnapshotCache;
use crate::data::gateway::ContractGateway;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchKey {
    pub market_id: String,
    pub account: Option<Address>,
}

/// Keeps cached snapshots in step with the chain: explicit refreshes after
/// writes, plus interval polling for every key that has a live consumer.
pub struct RefreshCoordinator {
    gateway: Arc<ContractGateway>,
    cache: Arc<SnapshotCache>,
    consumers: Arc<DashMap<WatchKey, usize>>,
    wake: Arc<Notify>,
    interval: Duration,
}

impl RefreshCoordinator {
    pub fn new(gateway: Arc<ContractGateway>, cache: Arc<SnapshotCache>, interval: Duration) -> Self {
        Self {
            gateway,
            cache,
            consumers: Arc::new(DashMap::new()),
            wake: Arc::new(Notify::new()),
            interval,
        }
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    /// Re-read a market and, if given, one account's position, then replace
    /// both in the cache at once. Returns `false` and keeps the stale entry
    /// if either read fails.
    pub async fn refresh(&self, market_id: &str, account: Option<Address>) -> bool {
        let position_read = async {
            match account {
                Some(account) => Some(self.gateway.get_position(market_id, account).await),
                None => None,
            }
        };
        let (market, position) = tokio::join!(self.gateway.fetch_market_by_id(market_id), position_read);

        let Some(market) = market else {
            warn!("Refresh of {} failed, keeping cached snapshot", market_id);
            return false;
        };

        let position = match (account, position) {
            (Some(account), Some(Some(position))) => Some((account, position)),
            (Some(account), _) => {
                warn!(
                    "Position refresh for {} / {:?} failed, keeping cached snapshot",
                    market_id, account
                );
                return false;
            }
            (None, _) => None,
        };

        self.cache.replace(market, position);
        true
    }

    /// Register a consumer. Polling for the key stops once every guard for it
    /// is dropped.
    pub fn watch(&self, market_id: &str, account: Option<Address>) -> WatchGuard {
        let key = WatchKey {
            market_id: market_id.to_string(),
            account,
        };
        *self.consumers.entry(key.clone()).or_insert(0) += 1;
        self.wake.notify_one();

        WatchGuard {
            key,
            consumers: Arc::clone(&self.consumers),
        }
    }

    pub fn active_keys(&self) -> Vec<WatchKey> {
        self.consumers.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Run the polling loop in the background.
    pub fn spawn_polling(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.poll_loop().await })
    }

    async fn poll_loop(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if self.consumers.is_empty() {
                debug!("No active consumers, polling suspended");
                self.wake.notified().await;
                // A new consumer wants data now, not one interval from now
                ticker.reset_immediately();
            }

            ticker.tick().await;
            let keys = self.active_keys();
            if keys.is_empty() {
                continue;
            }

            debug!(keys = keys.len(), "Polling snapshots");
            join_all(keys.iter().map(|k| self.refresh(&k.market_id, k.account))).await;
        }
    }
}

/// Consumer registration returned by [`RefreshCoordinator::watch`].
pub struct WatchGuard {
    key: WatchKey,
    consumers: Arc<DashMap<WatchKey, usize>>,
}

impl WatchGuard {
    pub fn key(&self) -> &WatchKey {
        &self.key
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        if let Some(mut count) = self.consumers.get_mut(&self.key) {
            *count = count.saturating_sub(1);
        }
        self.consumers.remove_if(&self.key, |_, count| *count == 0);
    }
}
