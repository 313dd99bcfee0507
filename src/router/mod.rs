//! Smart order routing across venue books.
//!
//! [`route_order`] walks the live per-venue books with a k-way merge: one
//! lazy cursor per venue, a priority queue of their current levels, best
//! price popped first. The result is a venue-split plan with per-leg VWAP
//! and an overall indicative average price. Complexity is O(K log V) for V
//! venues and K levels consumed until the fill.
//!
//! Cursors hold shared locks on their books for the duration of the call,
//! so routing must stay short-lived and never block on anything else while
//! cursors are live.

mod service;

pub use service::{OrderRequest, OrderResult, RouterError, RouterErrorCode, RouterService};

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::book::LevelCursor;
use crate::feed::MarketFeed;

/// Quantities at or below this are treated as zero.
pub const EPSILON: f64 = 1e-12;

/// One venue leg of a routing decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSlice {
    /// Venue the leg executes on
    pub venue: String,
    /// Planned quantity for this venue
    pub quantity: f64,
    /// Planned average execution price for this venue (VWAP across its
    /// consumed levels)
    pub avg_price: f64,
}

/// Outcome of a routing computation.
///
/// Invalid input and missing liquidity are not errors: they come back as a
/// decision with empty slices and an explanatory message.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    /// Whether the whole requested quantity found resting liquidity
    pub fully_routable: bool,
    /// Quantity the caller asked for
    pub requested_qty: f64,
    /// Quantity the plan covers (<= requested)
    pub routable_qty: f64,
    /// Notional-weighted average price across all legs; 0 when nothing
    /// routed
    pub indicative_average_price: f64,
    /// Per-venue legs in first-touch order
    pub slices: Vec<RouteSlice>,
    /// Human-readable classification of the outcome
    pub message: String,
}

impl RoutingDecision {
    fn rejected(requested_qty: f64, message: &str) -> Self {
        Self {
            fully_routable: false,
            requested_qty,
            routable_qty: 0.0,
            indicative_average_price: 0.0,
            slices: Vec::new(),
            message: message.to_string(),
        }
    }
}

/// Heap entry: one venue's current level. `rank` folds the side into the
/// ordering (negated price for buys) so one comparator serves both
/// directions; price ties prefer the larger resting size.
#[derive(Debug)]
struct HeapNode {
    rank: OrderedFloat<f64>,
    size: OrderedFloat<f64>,
    venue_idx: usize,
    price: f64,
}

impl HeapNode {
    fn new(is_buy: bool, venue_idx: usize, price: f64, size: f64) -> Self {
        let rank = if is_buy { -price } else { price };
        Self {
            rank: OrderedFloat(rank),
            size: OrderedFloat(size),
            venue_idx,
            price,
        }
    }
}

impl PartialEq for HeapNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapNode {}

impl PartialOrd for HeapNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank.cmp(&other.rank).then(self.size.cmp(&other.size))
    }
}

struct VenueCursor<'a> {
    venue: &'a str,
    cursor: LevelCursor<'a>,
}

/// Compute the best venue split for `quantity` on `side` ("buy" | "sell"),
/// optionally bounded by a limit price.
///
/// Buys consume asks lowest-price-first; sells consume bids
/// highest-price-first. A limit stops the walk at the first level beyond
/// the bound without consuming it.
pub fn route_order(
    feeds: &[Arc<dyn MarketFeed>],
    side: &str,
    quantity: f64,
    limit_price: Option<f64>,
) -> RoutingDecision {
    if !(quantity > 0.0) {
        return RoutingDecision::rejected(quantity, "invalid quantity");
    }
    let is_buy = match side {
        "buy" => true,
        "sell" => false,
        _ => return RoutingDecision::rejected(quantity, "invalid side"),
    };

    // One cursor per venue with anything resting on the relevant side.
    let mut cursors: Vec<VenueCursor<'_>> = Vec::with_capacity(feeds.len());
    for feed in feeds {
        let book = feed.book();
        let cursor = if is_buy { book.ask_cursor() } else { book.bid_cursor() };
        if cursor.valid() {
            cursors.push(VenueCursor {
                venue: feed.venue(),
                cursor,
            });
        }
    }
    if cursors.is_empty() {
        return RoutingDecision::rejected(quantity, "no liquidity available");
    }

    let mut heap: BinaryHeap<HeapNode> = BinaryHeap::with_capacity(cursors.len());
    for (idx, vc) in cursors.iter().enumerate() {
        if let Some((price, size)) = vc.cursor.level() {
            heap.push(HeapNode::new(is_buy, idx, price, size));
        }
    }

    let mut remaining = quantity;
    let mut total_notional = 0.0;
    let mut venue_qty = vec![0.0f64; cursors.len()];
    let mut venue_notional = vec![0.0f64; cursors.len()];
    // First-touch order of venues, which fixes the slice order.
    let mut touched: Vec<usize> = Vec::with_capacity(cursors.len());

    while remaining > EPSILON {
        let Some(level) = heap.pop() else {
            break;
        };
        if let Some(limit) = limit_price {
            if is_buy && level.price > limit {
                break;
            }
            if !is_buy && level.price < limit {
                break;
            }
        }

        let take = remaining.min(level.size.0);
        if take <= EPSILON {
            continue;
        }
        if venue_qty[level.venue_idx] <= EPSILON {
            touched.push(level.venue_idx);
        }
        venue_qty[level.venue_idx] += take;
        venue_notional[level.venue_idx] += take * level.price;
        remaining -= take;
        total_notional += take * level.price;

        let vc = &mut cursors[level.venue_idx];
        vc.cursor.advance();
        if let Some((price, size)) = vc.cursor.level() {
            heap.push(HeapNode::new(is_buy, level.venue_idx, price, size));
        }
    }

    let routable_qty = quantity - remaining;
    let fully_routable = remaining <= EPSILON;
    let indicative_average_price = if routable_qty > EPSILON {
        total_notional / routable_qty
    } else {
        0.0
    };

    let mut slices = Vec::with_capacity(touched.len());
    for idx in touched {
        let qty = venue_qty[idx];
        if qty <= EPSILON {
            continue;
        }
        slices.push(RouteSlice {
            venue: cursors[idx].venue.to_string(),
            quantity: qty,
            avg_price: venue_notional[idx] / qty,
        });
    }

    let message = if routable_qty <= EPSILON {
        if limit_price.is_some() {
            "no liquidity matched the limit price"
        } else {
            "no liquidity available"
        }
    } else if fully_routable {
        "fully routable from current books"
    } else if limit_price.is_some() {
        "partially routable: limit-constrained liquidity"
    } else {
        "partially routable: insufficient liquidity"
    };

    RoutingDecision {
        fully_routable,
        requested_qty: quantity,
        routable_qty,
        indicative_average_price,
        slices,
        message: message.to_string(),
    }
}
