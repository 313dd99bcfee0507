//! Coinbase Advanced Trade driver.
//!
//! Market data comes from the `level2` channel on
//! `advanced-trade-ws.coinbase.com`. Coinbase spells pairs in the canonical
//! hyphenated form already, so the symbol rule is the identity. A
//! `heartbeats` subscription rides along so quiet products keep the
//! connection alive.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::client::VenueEndpoint;
use crate::clock;
use crate::feed::{Backpressure, MarketFeed, VenueFeed};
use crate::symbol;
use crate::types::wire::{CoinbaseFrame, CoinbaseL2Update};
use crate::types::{BookDelta, BookEvent, BookOp, BookSnapshot, Side};
use crate::venues::{BookParser, VenueApi, VenueFactory};
use crate::MAX_TOP_DEPTH;

/// Venue id
pub const VENUE: &str = "coinbase";

const WS_HOST: &str = "advanced-trade-ws.coinbase.com";
const WS_PATH: &str = "/";
const PRODUCTS_URL: &str = "https://api.exchange.coinbase.com/products";

/// Pairs known to be listed, used when the REST refresh is unavailable.
const DEFAULT_PRODUCTS: &[&str] = &[
    "BTC-USD", "ETH-USD", "SOL-USD", "ADA-USD", "DOGE-USD", "XRP-USD", "LTC-USD", "AVAX-USD",
    "LINK-USD",
];

/// The venue's market-data WebSocket endpoint.
pub fn endpoint() -> VenueEndpoint {
    VenueEndpoint::new(VENUE, WS_HOST, WS_PATH)
}

/// Subscription payloads for one product: the book channel plus heartbeats.
pub fn subscriptions(venue_symbol: &str) -> Vec<String> {
    let book = json!({
        "type": "subscribe",
        "product_ids": [venue_symbol],
        "channel": "level2",
    });
    let heartbeats = json!({
        "type": "subscribe",
        "channel": "heartbeats",
    });
    vec![book.to_string(), heartbeats.to_string()]
}

/// Parser for `l2_data` frames.
#[derive(Debug, Default)]
pub struct CoinbaseParser;

impl BookParser for CoinbaseParser {
    fn parse(&mut self, raw: &str, out: &mut Vec<BookEvent>) -> bool {
        // Fast reject for heartbeats, acks and other channels.
        if !raw.contains("\"channel\":\"l2_data\"") {
            return false;
        }
        let frame: CoinbaseFrame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(venue = VENUE, %err, "unparseable frame");
                return false;
            }
        };
        if frame.channel != "l2_data" {
            return false;
        }

        let ts_ns = clock::monotonic_ns();
        let before = out.len();

        for event in &frame.events {
            let canonical = symbol::to_canonical(VENUE, &event.product_id);
            match event.kind.as_str() {
                "snapshot" => {
                    let mut snap = BookSnapshot {
                        venue: VENUE.to_string(),
                        symbol: canonical.clone(),
                        ts_ns,
                        levels: Vec::with_capacity(event.updates.len()),
                    };
                    for update in &event.updates {
                        if let Some(delta) = level_delta(update, &canonical, ts_ns) {
                            snap.levels.push(delta);
                        }
                    }
                    if !snap.levels.is_empty() {
                        out.push(BookEvent::Snapshot(snap));
                    }
                }
                "update" => {
                    for update in &event.updates {
                        if let Some(delta) = level_delta(update, &canonical, ts_ns) {
                            out.push(BookEvent::Delta(delta));
                        }
                    }
                }
                _ => {}
            }
        }
        out.len() > before
    }
}

/// One wire level to one normalized delta; malformed levels yield `None`
/// and are skipped without sinking the batch. Coinbase publishes no
/// per-level sequence, so `seq` stays 0.
fn level_delta(update: &CoinbaseL2Update, canonical: &str, ts_ns: i64) -> Option<BookDelta> {
    let price = update.price_level.trim().parse::<f64>().ok()?;
    let size = update.new_quantity.trim().parse::<f64>().ok()?;
    if !price.is_finite() || !size.is_finite() {
        return None;
    }
    Some(BookDelta {
        venue: VENUE.to_string(),
        symbol: canonical.to_string(),
        side: if update.side == "bid" { Side::Bid } else { Side::Ask },
        price,
        size,
        op: if size == 0.0 { BookOp::Delete } else { BookOp::Upsert },
        seq: 0,
        ts_ns,
    })
}

#[derive(Debug, Deserialize)]
struct ProductRecord {
    id: String,
    #[serde(default)]
    status: Option<String>,
}

/// Pair-support checks backed by the public products listing.
#[derive(Debug)]
pub struct CoinbaseApi {
    products: RwLock<Vec<String>>,
}

impl CoinbaseApi {
    /// Create the API seeded with the built-in product list.
    pub fn new() -> Self {
        Self {
            products: RwLock::new(DEFAULT_PRODUCTS.iter().map(|s| s.to_string()).collect()),
        }
    }

    /// Replace the product list from the public REST endpoint. On failure
    /// the current list is kept.
    pub fn refresh(&self) -> crate::Result<usize> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        let records: Vec<ProductRecord> = client.get(PRODUCTS_URL).send()?.json()?;
        let mut listed: Vec<String> = records
            .into_iter()
            .filter(|p| p.status.as_deref().unwrap_or("online") == "online")
            .map(|p| p.id)
            .collect();
        listed.sort();
        let count = listed.len();
        *self.products.write() = listed;
        Ok(count)
    }
}

impl Default for CoinbaseApi {
    fn default() -> Self {
        Self::new()
    }
}

impl VenueApi for CoinbaseApi {
    fn name(&self) -> &str {
        VENUE
    }

    fn supports_pair(&self, canonical: &str) -> bool {
        self.products
            .read()
            .iter()
            .any(|p| p.eq_ignore_ascii_case(canonical))
    }
}

/// The venue's capability set.
pub fn factory() -> VenueFactory {
    VenueFactory {
        name: VENUE.to_string(),
        make_feed: Box::new(|canonical: &str| {
            let venue_symbol = symbol::to_venue(VENUE, canonical);
            let feed: Arc<dyn MarketFeed> = Arc::new(VenueFeed::<CoinbaseParser>::new(
                VENUE,
                canonical,
                endpoint(),
                subscriptions(&venue_symbol),
                Backpressure::DropOldest,
                MAX_TOP_DEPTH,
            ));
            feed
        }),
        make_api: Box::new(|| {
            let api = CoinbaseApi::new();
            if let Err(err) = api.refresh() {
                warn!(venue = VENUE, %err, "product refresh failed; using built-in list");
            }
            Box::new(api)
        }),
        to_venue_symbol: Box::new(|canonical: &str| symbol::to_venue(VENUE, canonical)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(raw: &str) -> (bool, Vec<BookEvent>) {
        let mut parser = CoinbaseParser;
        let mut out = Vec::new();
        let produced = parser.parse(raw, &mut out);
        (produced, out)
    }

    #[test]
    fn test_snapshot_frame() {
        let raw = r#"{
            "channel": "l2_data",
            "timestamp": "2024-03-01T10:00:00.000Z",
            "sequence_num": 1,
            "events": [{
                "type": "snapshot",
                "product_id": "BTC-USD",
                "updates": [
                    {"side": "bid", "event_time": "2024-03-01T10:00:00.000Z", "price_level": "50000.10", "new_quantity": "1.5"},
                    {"side": "offer", "event_time": "2024-03-01T10:00:00.000Z", "price_level": "50001.20", "new_quantity": "2.0"}
                ]
            }]
        }"#;
        let (produced, events) = parse_all(raw);
        assert!(produced);
        assert_eq!(events.len(), 1);
        let BookEvent::Snapshot(snap) = &events[0] else {
            panic!("expected snapshot");
        };
        assert_eq!(snap.venue, "coinbase");
        assert_eq!(snap.symbol, "BTC-USD");
        assert_eq!(snap.levels.len(), 2);
        assert_eq!(snap.levels[0].side, Side::Bid);
        assert_eq!(snap.levels[0].price, 50000.10);
        assert_eq!(snap.levels[1].side, Side::Ask);
    }

    #[test]
    fn test_update_frame_preserves_order_and_encodes_delete() {
        let raw = r#"{
            "channel": "l2_data",
            "sequence_num": 7,
            "events": [{
                "type": "update",
                "product_id": "ETH-USD",
                "updates": [
                    {"side": "bid", "price_level": "3000.00", "new_quantity": "4.0"},
                    {"side": "bid", "price_level": "2999.50", "new_quantity": "0"}
                ]
            }]
        }"#;
        let (produced, events) = parse_all(raw);
        assert!(produced);
        assert_eq!(events.len(), 2);
        let BookEvent::Delta(first) = &events[0] else {
            panic!("expected delta");
        };
        assert_eq!(first.price, 3000.0);
        assert_eq!(first.op, BookOp::Upsert);
        let BookEvent::Delta(second) = &events[1] else {
            panic!("expected delta");
        };
        assert_eq!(second.op, BookOp::Delete);
        assert_eq!(second.size, 0.0);
    }

    #[test]
    fn test_non_book_frames_ignored() {
        let (produced, events) =
            parse_all(r#"{"channel":"heartbeats","events":[{"type":"update"}]}"#);
        assert!(!produced);
        assert!(events.is_empty());

        let (produced, _) = parse_all(r#"{"channel":"subscriptions","events":[]}"#);
        assert!(!produced);
    }

    #[test]
    fn test_malformed_level_skipped_not_fatal() {
        let raw = r#"{
            "channel": "l2_data",
            "sequence_num": 2,
            "events": [{
                "type": "update",
                "product_id": "BTC-USD",
                "updates": [
                    {"side": "bid", "price_level": "not-a-price", "new_quantity": "1"},
                    {"side": "bid", "price_level": "49999.00", "new_quantity": "1.0"}
                ]
            }]
        }"#;
        let (produced, events) = parse_all(raw);
        assert!(produced);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_subscription_payloads() {
        let subs = subscriptions("BTC-USD");
        assert_eq!(subs.len(), 2);
        assert!(subs[0].contains("\"channel\":\"level2\""));
        assert!(subs[0].contains("BTC-USD"));
        assert!(subs[1].contains("\"channel\":\"heartbeats\""));
    }

    #[test]
    fn test_api_default_support() {
        let api = CoinbaseApi::new();
        assert!(api.supports_pair("BTC-USD"));
        assert!(api.supports_pair("btc-usd"));
        assert!(!api.supports_pair("FOO-BAR"));
    }
}
