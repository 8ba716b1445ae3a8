use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ethers::types::Address;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use crate::data::types::{MarketSnapshot, UserPosition};

/// Last known market snapshots and positions, keyed by market id.
///
/// A market and its positions live in one entry, so a refresh replaces them
/// under a single shard lock and readers never see half of an update.
pub struct SnapshotCache {
    markets: DashMap<String, CachedMarket>,
}

struct CachedMarket {
    snapshot: Arc<MarketSnapshot>,
    positions: HashMap<Address, UserPosition>,
    fetched_at: Instant,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self {
            markets: DashMap::new(),
        }
    }

    /// Replace a market snapshot and, optionally, one account's position.
    pub fn replace(&self, snapshot: MarketSnapshot, position: Option<(Address, UserPosition)>) {
        let snapshot = Arc::new(snapshot);

        match self.markets.entry(snapshot.id.clone()) {
            Entry::Occupied(mut entry) => {
                let cached = entry.get_mut();
                cached.snapshot = snapshot;
                if let Some((account, position)) = position {
                    cached.positions.insert(account, position);
                }
                cached.fetched_at = Instant::now();
            }
            Entry::Vacant(entry) => {
                entry.insert(CachedMarket {
                    snapshot,
                    positions: position.into_iter().collect(),
                    fetched_at: Instant::now(),
                });
            }
        }
    }

    pub fn market(&self, id: &str) -> Option<Arc<MarketSnapshot>> {
        self.markets.get(id).map(|entry| Arc::clone(&entry.snapshot))
    }

    pub fn position(&self, id: &str, account: Address) -> Option<UserPosition> {
        self.markets
            .get(id)
            .and_then(|entry| entry.positions.get(&account).cloned())
    }

    /// Market and position read together, from the same update.
    pub fn view(&self, id: &str, account: Option<Address>) -> Option<(Arc<MarketSnapshot>, Option<UserPosition>)> {
        self.markets.get(id).map(|entry| {
            let position = account.and_then(|a| entry.positions.get(&a).cloned());
            (Arc::clone(&entry.snapshot), position)
        })
    }

    /// Time since the market entry was last replaced.
    pub fn age(&self, id: &str) -> Option<Duration> {
        self.markets.get(id).map(|entry| entry.fetched_at.elapsed())
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.markets.clear();
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}
