//! Display helpers for market snapshots.

use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use ethers::utils::format_ether;
use crate::data::types::MarketSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketStatus {
    Open,
    /// Past lock time, waiting for resolution.
    Locked,
    Resolved,
    Cancelled,
}

impl MarketStatus {
    pub fn of(market: &MarketSnapshot, now: DateTime<Utc>) -> Self {
        if market.cancelled {
            MarketStatus::Cancelled
        } else if market.resolved {
            MarketStatus::Resolved
        } else if market.lock_time as i64 <= now.timestamp() {
            MarketStatus::Locked
        } else {
            MarketStatus::Open
        }
    }

    pub fn accepts_positions(self) -> bool {
        self == MarketStatus::Open
    }
}

impl std::fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MarketStatus::Open => "Active",
            MarketStatus::Locked => "Locked",
            MarketStatus::Resolved => "Resolved",
            MarketStatus::Cancelled => "Cancelled",
        };
        write!(f, "{}", label)
    }
}

fn ether_f64(wei: U256) -> f64 {
    format_ether(wei).parse().unwrap_or(0.0)
}

/// Share of the pool on the YES side, in percent. Empty pools read 50/50.
pub fn yes_percentage(market: &MarketSnapshot) -> f64 {
    let yes = ether_f64(market.yes_pool);
    let no = ether_f64(market.no_pool);
    let total = yes + no;
    if total == 0.0 {
        return 50.0;
    }
    yes / total * 100.0
}

pub fn no_percentage(market: &MarketSnapshot) -> f64 {
    100.0 - yes_percentage(market)
}

pub fn format_percentage(value: f64) -> String {
    format!("{:.1}%", value)
}

pub fn format_eth(wei: U256) -> String {
    format!("{:.4} ETH", ether_f64(wei))
}

/// "Locked" once the lock time passes, otherwise the largest two units left.
pub fn time_left(lock_time: u64, now: DateTime<Utc>) -> String {
    let remaining = lock_time as i64 - now.timestamp();
    if remaining <= 0 {
        return "Locked".to_string();
    }

    let days = remaining / 86_400;
    let hours = (remaining % 86_400) / 3_600;
    let minutes = (remaining % 3_600) / 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

pub fn shorten_address(address: Address) -> String {
    let full = format!("{:?}", address);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}
