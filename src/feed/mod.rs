//! Feed pipeline: per-venue ingestion, per-pair consolidation, lifecycle.
//!
//! # Components
//!
//! - [`VenueFeed`] - owns one venue's WS thread, ring, parser thread and
//!   [`Book`](crate::book::Book); publishes immutable top-N snapshots
//! - [`MasterFeed`] - per-pair collector of venue feeds; builds the
//!   consolidated cross-venue ladder
//! - [`FeedManager`] - pair lifecycle: hot set, on-demand subscribe, idle
//!   sweep
//!
//! The [`MarketFeed`] trait is the seam between them: the master feed,
//! manager and router treat any feed through it, which also keeps the
//! lifecycle logic testable without sockets.

mod manager;
mod master;
mod venue;

pub use manager::{FeedManager, RoutingInputs, VenueRuntime};
pub use master::{Consolidated, LadderLevel, MasterFeed, STALENESS_CUTOFF};
pub use venue::{Backpressure, FeedStats, FrameInjector, VenueFeed};

use std::sync::Arc;

use crate::book::{Book, TopSnapshot};

/// Uniform interface over a running (or startable) venue feed.
pub trait MarketFeed: Send + Sync {
    /// Start the feed's threads and connect its WebSocket.
    fn start(&self, port: u16);

    /// Stop threads and close the socket. Idempotent.
    fn stop(&self);

    /// Venue id, e.g. "coinbase"
    fn venue(&self) -> &str;

    /// Canonical symbol, e.g. "BTC-USD"
    fn canonical(&self) -> &str;

    /// The live book; shared-locked reads, used by the router's cursors.
    fn book(&self) -> &Book;

    /// Lock-free load of the current published top-N snapshot.
    fn load_top(&self) -> Arc<TopSnapshot>;
}
