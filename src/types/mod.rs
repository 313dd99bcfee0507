//! Normalized market-data event types.
//!
//! Every venue parser emits the same small vocabulary: a [`BookSnapshot`]
//! that replaces a book wholesale, or a stream of [`BookDelta`] level
//! updates. The venue-specific JSON shapes live in [`wire`]; nothing past
//! the parser ever sees them.

pub mod wire;

use serde::{Deserialize, Serialize};

/// Price of one level, in quote units
pub type Price = f64;

/// Resting size at one level, in base units
pub type Size = f64;

/// Side of the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Buy side (resting bids)
    Bid,
    /// Sell side (resting asks/offers)
    Ask,
}

/// What a delta does to its price level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookOp {
    /// Set the absolute size at the price (insert or overwrite)
    Upsert,
    /// Remove the price level entirely
    Delete,
}

/// One normalized level update.
///
/// `size == 0.0` is treated identically to [`BookOp::Delete`]. `seq` is the
/// venue's monotonic sequence number when it publishes one, 0 otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookDelta {
    /// Venue id, e.g. "coinbase"
    pub venue: String,
    /// Canonical symbol, e.g. "BTC-USD"
    pub symbol: String,
    /// Side of the book the level belongs to
    pub side: Side,
    /// Price of the level
    pub price: Price,
    /// Absolute size now resting at the price (not an increment)
    pub size: Size,
    /// Upsert or delete
    pub op: BookOp,
    /// Venue sequence number (0 when the venue publishes none)
    pub seq: u64,
    /// Monotonic receive timestamp, nanoseconds
    pub ts_ns: i64,
}

/// A full book image, encoded as upsert deltas applied in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    /// Venue id
    pub venue: String,
    /// Canonical symbol
    pub symbol: String,
    /// Monotonic receive timestamp, nanoseconds
    pub ts_ns: i64,
    /// All levels of both sides, op = Upsert
    pub levels: Vec<BookDelta>,
}

/// A parsed market-data event
#[derive(Debug, Clone, PartialEq)]
pub enum BookEvent {
    /// Full image; applying one replaces both sides
    Snapshot(BookSnapshot),
    /// Incremental level update
    Delta(BookDelta),
}
