//! Immutable per-venue top-N snapshot.

use serde::Serialize;

use crate::types::{Price, Size};

/// Top-N view of one venue's book, captured at a point in time.
///
/// Published by the venue feed behind an atomic swap and shared by
/// reference; never mutated after publish. Readers across threads hold
/// `Arc<TopSnapshot>` and need no locks.
#[derive(Debug, Clone, Serialize)]
pub struct TopSnapshot {
    /// Venue id, e.g. "coinbase"
    pub venue: String,
    /// Canonical symbol, e.g. "BTC-USD"
    pub symbol: String,
    /// Monotonic capture time, nanoseconds; 0 = never published
    pub ts_ns: i64,
    /// Wall-clock capture time, milliseconds since the Unix epoch
    pub ts_ms: i64,
    /// Best bids, highest price first
    pub bids: Vec<(Price, Size)>,
    /// Best asks, lowest price first
    pub asks: Vec<(Price, Size)>,
}

impl TopSnapshot {
    /// A never-published placeholder for the given venue and symbol.
    pub fn empty(venue: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            venue: venue.into(),
            symbol: symbol.into(),
            ts_ns: 0,
            ts_ms: 0,
            bids: Vec::new(),
            asks: Vec::new(),
        }
    }

    /// True when both sides carry no levels.
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Best bid, or `None` when there are no bids.
    pub fn best_bid(&self) -> Option<(Price, Size)> {
        self.bids.first().copied()
    }

    /// Best ask, or `None` when there are no asks.
    pub fn best_ask(&self) -> Option<(Price, Size)> {
        self.asks.first().copied()
    }
}
