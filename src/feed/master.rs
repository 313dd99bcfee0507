//! Per-pair consolidated view over venue feeds.
//!
//! The master feed never touches live books; it reads each venue's
//! published [`TopSnapshot`] atomically, filters out stale venues, and
//! flattens the rest into one ladder that keeps venue attribution. Equal
//! prices across venues stay separate rows on purpose: the UI (and anyone
//! auditing a routing decision) can see which venue holds which liquidity.

use std::sync::Arc;
use std::time::Duration;

use ordered_float::OrderedFloat;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::warn;

use crate::book::TopSnapshot;
use crate::clock;
use crate::feed::MarketFeed;
use crate::types::{Price, Size};

/// Wall-clock age beyond which a venue snapshot is treated as dead.
pub const STALENESS_CUTOFF: Duration = Duration::from_secs(5);

/// One row of the consolidated ladder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LadderLevel {
    /// Venue the liquidity rests on
    pub venue: String,
    /// Level price
    pub price: Price,
    /// Level size
    pub size: Size,
}

/// Consolidated cross-venue view of one pair.
#[derive(Debug, Clone, Serialize)]
pub struct Consolidated {
    /// Canonical symbol
    pub symbol: String,
    /// Newest wall-clock `ts_ms` among the live venue snapshots; 0 when
    /// cold
    pub last_updated_ms: i64,
    /// True when every contributing venue snapshot is stale or absent
    pub is_cold: bool,
    /// Bids, highest price first (ties: larger size first)
    pub bids: Vec<LadderLevel>,
    /// Asks, lowest price first (ties: larger size first)
    pub asks: Vec<LadderLevel>,
    /// The live per-venue snapshots that produced the ladders
    pub per_venue: FxHashMap<String, Arc<TopSnapshot>>,
}

/// Collects the venue feeds of one canonical pair and merges their
/// published snapshots into a [`Consolidated`] ladder.
pub struct MasterFeed {
    canonical: String,
    feeds: Mutex<Vec<Arc<dyn MarketFeed>>>,
}

impl MasterFeed {
    /// Create an empty master feed for a canonical pair.
    pub fn new(canonical: impl Into<String>) -> Self {
        Self {
            canonical: canonical.into(),
            feeds: Mutex::new(Vec::new()),
        }
    }

    /// Canonical symbol this feed consolidates
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Register a venue feed. A feed whose canonical does not match is
    /// logged and ignored.
    pub fn add_feed(&self, feed: Arc<dyn MarketFeed>) {
        if feed.canonical() != self.canonical {
            warn!(
                expected = %self.canonical,
                got = %feed.canonical(),
                venue = %feed.venue(),
                "rejecting feed with mismatched symbol"
            );
            return;
        }
        self.feeds.lock().push(feed);
    }

    /// Number of registered venue feeds
    pub fn feed_count(&self) -> usize {
        self.feeds.lock().len()
    }

    /// Build a consolidated ladder of up to `depth` rows per side.
    ///
    /// Venue snapshots older than [`STALENESS_CUTOFF`] (or never
    /// published) are excluded; when none survive the result is cold and
    /// both ladders are empty.
    pub fn snapshot_consolidated(&self, depth: usize) -> Consolidated {
        let snaps: Vec<Arc<TopSnapshot>> = {
            let feeds = self.feeds.lock();
            feeds.iter().map(|f| f.load_top()).collect()
        };

        let now_ns = clock::monotonic_ns();
        let cutoff_ns = STALENESS_CUTOFF.as_nanos() as i64;
        let live: Vec<Arc<TopSnapshot>> = snaps
            .into_iter()
            .filter(|s| s.ts_ns > 0 && now_ns.saturating_sub(s.ts_ns) <= cutoff_ns)
            .collect();

        let mut out = Consolidated {
            symbol: self.canonical.clone(),
            last_updated_ms: 0,
            is_cold: live.is_empty(),
            bids: Vec::new(),
            asks: Vec::new(),
            per_venue: FxHashMap::default(),
        };
        if out.is_cold {
            return out;
        }

        for snap in &live {
            out.last_updated_ms = out.last_updated_ms.max(snap.ts_ms);
            for &(price, size) in &snap.bids {
                out.bids.push(LadderLevel {
                    venue: snap.venue.clone(),
                    price,
                    size,
                });
            }
            for &(price, size) in &snap.asks {
                out.asks.push(LadderLevel {
                    venue: snap.venue.clone(),
                    price,
                    size,
                });
            }
            out.per_venue.insert(snap.venue.clone(), Arc::clone(snap));
        }

        // Bids: highest price first. Asks: lowest price first. Equal
        // prices put the larger size first.
        out.bids.sort_by(|a, b| {
            OrderedFloat(b.price)
                .cmp(&OrderedFloat(a.price))
                .then(OrderedFloat(b.size).cmp(&OrderedFloat(a.size)))
        });
        out.asks.sort_by(|a, b| {
            OrderedFloat(a.price)
                .cmp(&OrderedFloat(b.price))
                .then(OrderedFloat(b.size).cmp(&OrderedFloat(a.size)))
        });
        out.bids.truncate(depth);
        out.asks.truncate(depth);

        out
    }
}

impl std::fmt::Debug for MasterFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterFeed")
            .field("canonical", &self.canonical)
            .field("feeds", &self.feed_count())
            .finish()
    }
}
