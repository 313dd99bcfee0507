//! Core order book data structure.
//!
//! `BTreeMap` price levels keyed by `OrderedFloat<f64>`:
//!
//! - O(log n) insertion, deletion, and lookup
//! - O(1) access to best bid/ask (via `last_key_value` / `first_key_value`)
//! - Ordered iteration for depth-of-book queries

use std::collections::BTreeMap;
use std::ops::Bound;

use ordered_float::OrderedFloat;
use parking_lot::{RwLock, RwLockReadGuard};

use crate::types::{BookDelta, BookEvent, BookOp, BookSnapshot, Price, Side, Size};

type Key = OrderedFloat<f64>;

/// A level is kept only when its price is a positive finite number.
fn valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// A size is storable only when it is a positive finite number; anything
/// else means "remove the level".
fn valid_size(size: f64) -> bool {
    size.is_finite() && size > 0.0
}

#[derive(Debug, Default)]
struct BookState {
    /// Ascending by price; best bid = last key
    bids: BTreeMap<Key, Size>,
    /// Ascending by price; best ask = first key
    asks: BTreeMap<Key, Size>,
    /// Last applied venue sequence; 0 = unknown
    last_seq: u64,
}

impl BookState {
    fn apply_snapshot(&mut self, snap: &BookSnapshot) {
        self.bids.clear();
        self.asks.clear();
        let mut max_seq = 0u64;
        for lvl in &snap.levels {
            if lvl.op == BookOp::Delete || !valid_size(lvl.size) || !valid_price(lvl.price) {
                continue;
            }
            let side = match lvl.side {
                Side::Bid => &mut self.bids,
                Side::Ask => &mut self.asks,
            };
            side.insert(OrderedFloat(lvl.price), lvl.size);
            max_seq = max_seq.max(lvl.seq);
        }
        if max_seq > 0 {
            self.last_seq = max_seq;
        }
    }

    fn apply_delta(&mut self, d: &BookDelta) {
        // Venues with monotonic sequences: drop replays and reorders.
        if d.seq > 0 && self.last_seq > 0 && d.seq <= self.last_seq {
            return;
        }
        if !valid_price(d.price) {
            return;
        }
        let side = match d.side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };
        if d.op == BookOp::Delete || !valid_size(d.size) {
            side.remove(&OrderedFloat(d.price));
        } else {
            side.insert(OrderedFloat(d.price), d.size);
        }
        if d.seq > 0 {
            self.last_seq = d.seq;
        }
    }

    fn apply_event(&mut self, ev: &BookEvent) {
        match ev {
            BookEvent::Snapshot(snap) => self.apply_snapshot(snap),
            BookEvent::Delta(d) => self.apply_delta(d),
        }
    }
}

/// Per-venue full-depth limit order book.
///
/// - A [`BookSnapshot`] replaces both sides with absolute sizes.
/// - A [`BookDelta`] sets the absolute size at a price (0 or `Delete`
///   erases the level).
/// - Readers request top-N on read; the book keeps all visible levels.
///
/// # Thread Safety
///
/// One-writer-many-readers: mutations take the exclusive lock, top-N reads
/// and [`LevelCursor`]s take the shared lock. Holding a cursor blocks
/// writers on this book, so cursors must stay short-lived (router scope).
///
/// A crossed book (best bid >= best ask) is not rejected here: transient
/// crosses are normal across venues, and a single venue crossing itself is
/// that venue's problem to resolve.
#[derive(Debug)]
pub struct Book {
    venue: String,
    symbol: String,
    state: RwLock<BookState>,
}

impl Book {
    /// Create an empty book for the given venue and canonical symbol.
    pub fn new(venue: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            venue: venue.into(),
            symbol: symbol.into(),
            state: RwLock::new(BookState::default()),
        }
    }

    /// Venue id this book belongs to
    pub fn venue(&self) -> &str {
        &self.venue
    }

    /// Canonical symbol this book tracks
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Apply one event under the exclusive lock.
    pub fn apply(&self, ev: &BookEvent) {
        self.state.write().apply_event(ev);
    }

    /// Apply a full snapshot under the exclusive lock.
    pub fn apply_snapshot(&self, snap: &BookSnapshot) {
        self.state.write().apply_snapshot(snap);
    }

    /// Apply one delta under the exclusive lock.
    pub fn apply_delta(&self, d: &BookDelta) {
        self.state.write().apply_delta(d);
    }

    /// Apply a batch of events under one acquire of the exclusive lock.
    ///
    /// Readers never observe a partially applied batch.
    pub fn apply_many(&self, events: &[BookEvent]) {
        if events.is_empty() {
            return;
        }
        let mut state = self.state.write();
        for ev in events {
            state.apply_event(ev);
        }
    }

    /// Up to `n` best bids, highest price first.
    pub fn top_bids(&self, n: usize) -> Vec<(Price, Size)> {
        let state = self.state.read();
        state.bids.iter().rev().take(n).map(|(k, &v)| (k.0, v)).collect()
    }

    /// Up to `n` best asks, lowest price first.
    pub fn top_asks(&self, n: usize) -> Vec<(Price, Size)> {
        let state = self.state.read();
        state.asks.iter().take(n).map(|(k, &v)| (k.0, v)).collect()
    }

    /// Best (highest) bid, or `None` when the side is empty.
    pub fn best_bid(&self) -> Option<(Price, Size)> {
        let state = self.state.read();
        state.bids.last_key_value().map(|(k, &v)| (k.0, v))
    }

    /// Best (lowest) ask, or `None` when the side is empty.
    pub fn best_ask(&self) -> Option<(Price, Size)> {
        let state = self.state.read();
        state.asks.first_key_value().map(|(k, &v)| (k.0, v))
    }

    /// Number of visible bid levels
    pub fn bid_levels(&self) -> usize {
        self.state.read().bids.len()
    }

    /// Number of visible ask levels
    pub fn ask_levels(&self) -> usize {
        self.state.read().asks.len()
    }

    /// Last applied venue sequence number (0 = unknown)
    pub fn last_seq(&self) -> u64 {
        self.state.read().last_seq
    }

    /// Reset both sides and the sequence watermark.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.bids.clear();
        state.asks.clear();
        state.last_seq = 0;
    }

    /// Cursor over the bid side, best (highest) price first.
    ///
    /// The cursor holds the shared lock for its whole lifetime.
    pub fn bid_cursor(&self) -> LevelCursor<'_> {
        LevelCursor::open(self.state.read(), Side::Bid)
    }

    /// Cursor over the ask side, best (lowest) price first.
    ///
    /// The cursor holds the shared lock for its whole lifetime.
    pub fn ask_cursor(&self) -> LevelCursor<'_> {
        LevelCursor::open(self.state.read(), Side::Ask)
    }
}

/// Lazy best-to-worst walk over one side of a [`Book`].
///
/// Move-only; carries the book's shared read guard inline, so the walk sees
/// one consistent image and writers wait until the cursor is dropped.
pub struct LevelCursor<'a> {
    guard: RwLockReadGuard<'a, BookState>,
    side: Side,
    current: Option<(Price, Size)>,
}

impl<'a> LevelCursor<'a> {
    fn open(guard: RwLockReadGuard<'a, BookState>, side: Side) -> Self {
        let current = match side {
            Side::Bid => guard.bids.last_key_value().map(|(k, &v)| (k.0, v)),
            Side::Ask => guard.asks.first_key_value().map(|(k, &v)| (k.0, v)),
        };
        Self { guard, side, current }
    }

    /// Current `(price, size)` level, or `None` once the side is exhausted.
    pub fn level(&self) -> Option<(Price, Size)> {
        self.current
    }

    /// True while [`level`](Self::level) would return a value.
    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    /// Step to the next-best level.
    pub fn advance(&mut self) {
        let Some((price, _)) = self.current else {
            return;
        };
        let key = OrderedFloat(price);
        self.current = match self.side {
            Side::Bid => self
                .guard
                .bids
                .range((Bound::Unbounded, Bound::Excluded(key)))
                .next_back()
                .map(|(k, &v)| (k.0, v)),
            Side::Ask => self
                .guard
                .asks
                .range((Bound::Excluded(key), Bound::Unbounded))
                .next()
                .map(|(k, &v)| (k.0, v)),
        };
    }
}

impl std::fmt::Debug for LevelCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelCursor")
            .field("side", &self.side)
            .field("current", &self.current)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(side: Side, price: f64, size: f64, seq: u64) -> BookDelta {
        BookDelta {
            venue: "test".to_string(),
            symbol: "BTC-USD".to_string(),
            side,
            price,
            size,
            op: if size == 0.0 { BookOp::Delete } else { BookOp::Upsert },
            seq,
            ts_ns: 1,
        }
    }

    fn snapshot(levels: Vec<BookDelta>) -> BookSnapshot {
        BookSnapshot {
            venue: "test".to_string(),
            symbol: "BTC-USD".to_string(),
            ts_ns: 1,
            levels,
        }
    }

    #[test]
    fn test_upsert_and_best() {
        let book = Book::new("test", "BTC-USD");
        book.apply_delta(&delta(Side::Bid, 100.0, 2.0, 0));
        book.apply_delta(&delta(Side::Bid, 99.0, 1.0, 0));
        book.apply_delta(&delta(Side::Ask, 101.0, 3.0, 0));
        book.apply_delta(&delta(Side::Ask, 102.0, 4.0, 0));

        assert_eq!(book.best_bid(), Some((100.0, 2.0)));
        assert_eq!(book.best_ask(), Some((101.0, 3.0)));
        assert_eq!(book.bid_levels(), 2);
        assert_eq!(book.ask_levels(), 2);
    }

    #[test]
    fn test_upsert_is_absolute_not_incremental() {
        let book = Book::new("test", "BTC-USD");
        book.apply_delta(&delta(Side::Bid, 100.0, 2.0, 0));
        book.apply_delta(&delta(Side::Bid, 100.0, 5.0, 0));
        assert_eq!(book.best_bid(), Some((100.0, 5.0)));
    }

    #[test]
    fn test_zero_size_deletes() {
        let book = Book::new("test", "BTC-USD");
        book.apply_delta(&delta(Side::Ask, 101.0, 3.0, 0));
        book.apply_delta(&delta(Side::Ask, 101.0, 0.0, 0));
        assert_eq!(book.best_ask(), None);
        assert_eq!(book.ask_levels(), 0);
    }

    #[test]
    fn test_invalid_levels_discarded() {
        let book = Book::new("test", "BTC-USD");
        book.apply_delta(&delta(Side::Bid, f64::NAN, 1.0, 0));
        book.apply_delta(&delta(Side::Bid, -5.0, 1.0, 0));
        book.apply_delta(&delta(Side::Bid, 0.0, 1.0, 0));
        book.apply_delta(&delta(Side::Bid, f64::INFINITY, 1.0, 0));
        book.apply_delta(&delta(Side::Bid, 100.0, f64::NAN, 0));
        assert_eq!(book.bid_levels(), 0);
    }

    #[test]
    fn test_stale_delta_dropped() {
        // Book at last_seq = 10: a delta with seq = 8 must not change state.
        let book = Book::new("test", "BTC-USD");
        book.apply_delta(&delta(Side::Bid, 100.0, 2.0, 10));
        assert_eq!(book.last_seq(), 10);

        book.apply_delta(&delta(Side::Bid, 100.0, 9.0, 8));
        assert_eq!(book.best_bid(), Some((100.0, 2.0)));
        assert_eq!(book.last_seq(), 10);

        // Equal seq is also stale.
        book.apply_delta(&delta(Side::Bid, 100.0, 9.0, 10));
        assert_eq!(book.best_bid(), Some((100.0, 2.0)));
    }

    #[test]
    fn test_out_of_order_equals_newest_only() {
        let d1 = delta(Side::Bid, 100.0, 1.0, 5);
        let d2 = delta(Side::Bid, 100.0, 7.0, 6);

        let forward = Book::new("test", "BTC-USD");
        forward.apply_delta(&d1);
        forward.apply_delta(&d2);

        let reversed = Book::new("test", "BTC-USD");
        reversed.apply_delta(&d2);
        reversed.apply_delta(&d1);

        let newest_only = Book::new("test", "BTC-USD");
        newest_only.apply_delta(&d2);

        for book in [&forward, &reversed, &newest_only] {
            assert_eq!(book.best_bid(), Some((100.0, 7.0)));
            assert_eq!(book.last_seq(), 6);
        }
    }

    #[test]
    fn test_snapshot_replaces_and_is_idempotent() {
        let book = Book::new("test", "BTC-USD");
        book.apply_delta(&delta(Side::Bid, 90.0, 1.0, 0));

        let snap = snapshot(vec![
            delta(Side::Bid, 100.0, 2.0, 3),
            delta(Side::Ask, 101.0, 3.0, 4),
        ]);
        book.apply_snapshot(&snap);
        assert_eq!(book.best_bid(), Some((100.0, 2.0)));
        assert_eq!(book.bid_levels(), 1);
        assert_eq!(book.last_seq(), 4);

        // Same snapshot again: identical state.
        book.apply_snapshot(&snap);
        assert_eq!(book.best_bid(), Some((100.0, 2.0)));
        assert_eq!(book.best_ask(), Some((101.0, 3.0)));
        assert_eq!(book.bid_levels(), 1);
        assert_eq!(book.ask_levels(), 1);
        assert_eq!(book.last_seq(), 4);
    }

    #[test]
    fn test_top_n_ordering() {
        let book = Book::new("test", "BTC-USD");
        for (px, sz) in [(98.0, 1.0), (100.0, 2.0), (99.0, 3.0)] {
            book.apply_delta(&delta(Side::Bid, px, sz, 0));
        }
        for (px, sz) in [(103.0, 1.0), (101.0, 2.0), (102.0, 3.0)] {
            book.apply_delta(&delta(Side::Ask, px, sz, 0));
        }

        let bids = book.top_bids(10);
        assert_eq!(bids, vec![(100.0, 2.0), (99.0, 3.0), (98.0, 1.0)]);
        let asks = book.top_asks(2);
        assert_eq!(asks, vec![(101.0, 2.0), (102.0, 3.0)]);
    }

    #[test]
    fn test_apply_many_batches_under_one_lock() {
        let book = Book::new("test", "BTC-USD");
        let events = vec![
            BookEvent::Delta(delta(Side::Bid, 100.0, 1.0, 1)),
            BookEvent::Delta(delta(Side::Bid, 99.0, 2.0, 2)),
            BookEvent::Delta(delta(Side::Bid, 100.0, 0.0, 3)),
        ];
        book.apply_many(&events);
        assert_eq!(book.best_bid(), Some((99.0, 2.0)));
        assert_eq!(book.last_seq(), 3);
    }

    #[test]
    fn test_clear_resets_seq() {
        let book = Book::new("test", "BTC-USD");
        book.apply_delta(&delta(Side::Bid, 100.0, 1.0, 7));
        book.clear();
        assert_eq!(book.bid_levels(), 0);
        assert_eq!(book.last_seq(), 0);
    }

    #[test]
    fn test_cursor_walks_best_to_worst() {
        let book = Book::new("test", "BTC-USD");
        for (px, sz) in [(101.0, 1.0), (102.0, 2.0), (103.0, 3.0)] {
            book.apply_delta(&delta(Side::Ask, px, sz, 0));
        }

        let mut cursor = book.ask_cursor();
        let mut seen = Vec::new();
        while let Some(level) = cursor.level() {
            seen.push(level);
            cursor.advance();
        }
        assert_eq!(seen, vec![(101.0, 1.0), (102.0, 2.0), (103.0, 3.0)]);

        let mut cursor = book.bid_cursor();
        assert!(!cursor.valid());
        cursor.advance(); // advancing an exhausted cursor is a no-op
        assert!(cursor.level().is_none());
    }

    #[test]
    fn test_crossed_book_is_representable() {
        let book = Book::new("test", "BTC-USD");
        book.apply_delta(&delta(Side::Bid, 105.0, 1.0, 0));
        book.apply_delta(&delta(Side::Ask, 100.0, 1.0, 0));
        assert_eq!(book.best_bid(), Some((105.0, 1.0)));
        assert_eq!(book.best_ask(), Some((100.0, 1.0)));
    }
}
