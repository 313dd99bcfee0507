//! # crossbook
//!
//! A multi-venue crypto market-data consolidator and smart order router.
//!
//! For a configured set of trading pairs, crossbook maintains a live,
//! full-depth limit order book per venue from streaming WebSocket feeds,
//! publishes per-venue top-N snapshots, merges them into a consolidated
//! cross-venue ladder, and computes the best venue split for an incoming
//! order.
//!
//! ## Features
//!
//! - **Per-venue ingestion** - WebSocket reader -> SPSC ring -> parser thread
//! - **Full-depth books** - `BTreeMap` price levels, sequence-gated deltas
//! - **Lock-free reads** - immutable top-N snapshots behind an atomic swap
//! - **Consolidation** - cross-venue ladder with venue attribution
//! - **Smart routing** - heap-based greedy split with optional limit bound
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crossbook::feed::{FeedManager, VenueRuntime};
//! use crossbook::config::FeedOptions;
//! use crossbook::venues;
//!
//! let venues = vec![
//!     VenueRuntime::from_factory(venues::coinbase::factory()),
//!     VenueRuntime::from_factory(venues::kraken::factory()),
//! ];
//! let pairs = vec!["BTC-USD".to_string(), "ETH-USD".to_string()];
//! let manager = FeedManager::new(venues, pairs, FeedOptions::from_env());
//!
//! if let Some(ui) = manager.get_or_subscribe("BTC-USD") {
//!     let view = ui.snapshot_consolidated(10);
//!     println!("{} bid rows", view.bids.len());
//! }
//! manager.shutdown();
//! ```
//!
//! ## Architecture
//!
//! Data flows one way: `WS frame -> ring -> parser -> Book -> TopSnapshot ->
//! consolidated merge -> router/UI reads`.
//!
//! - [`ring`] - single-producer/single-consumer queue between WS and parser
//! - [`book`] - per-venue order book and immutable top-N snapshots
//! - [`client`] - TLS WebSocket connector
//! - [`venues`] - venue drivers (endpoint + parser + support checks)
//! - [`feed`] - venue feeds, per-pair consolidation, pair lifecycle
//! - [`router`] - venue-split order routing
//!
//! ## Performance
//!
//! The hot path is allocation-light and lock-honest:
//!
//! - `parking_lot` locks (faster than std); exclusive only for book writes
//! - `arc-swap` for the published snapshot: readers never take a lock
//! - `FxHashMap` for small string keys
//! - `BTreeMap` price levels: O(log n) updates, O(1) best bid/ask

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod book;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod feed;
pub mod ring;
pub mod router;
pub mod symbol;
pub mod types;
pub mod venues;

pub use config::FeedOptions;
pub use error::Error;

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Maximum depth a venue feed will publish in its top-N snapshots.
///
/// Feeds constructed with a larger `top_depth` are clamped to this bound;
/// consolidated views asking for more rows than any venue publishes simply
/// get what exists.
pub const MAX_TOP_DEPTH: usize = 50;
