//! Per-venue order book and published top-N snapshots.
//!
//! # Components
//!
//! - [`Book`] - two-sided, full-depth price ladder for one venue x symbol
//! - [`LevelCursor`] - best-to-worst walk over one side under a shared lock
//! - [`TopSnapshot`] - immutable top-N view captured at a point in time
//!
//! # Example
//!
//! ```rust
//! use crossbook::book::Book;
//! use crossbook::types::{BookDelta, BookOp, Side};
//!
//! let book = Book::new("coinbase", "BTC-USD");
//! book.apply_delta(&BookDelta {
//!     venue: "coinbase".into(),
//!     symbol: "BTC-USD".into(),
//!     side: Side::Bid,
//!     price: 50_000.0,
//!     size: 1.5,
//!     op: BookOp::Upsert,
//!     seq: 0,
//!     ts_ns: 1,
//! });
//! assert_eq!(book.best_bid(), Some((50_000.0, 1.5)));
//! ```

mod ladder;
mod top;

pub use ladder::{Book, LevelCursor};
pub use top::TopSnapshot;
