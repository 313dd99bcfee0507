//! Kraken WebSocket v2 driver.
//!
//! Market data comes from the `book` channel on `ws.kraken.com/v2`,
//! subscribed at depth 1000. Kraken spells pairs with a slash separator
//! (`BTC/USD`), hence the symbol codec rule.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::client::VenueEndpoint;
use crate::clock;
use crate::feed::{Backpressure, MarketFeed, VenueFeed};
use crate::symbol;
use crate::types::wire::{KrakenBookData, KrakenFrame};
use crate::types::{BookDelta, BookEvent, BookOp, BookSnapshot, Side};
use crate::venues::{BookParser, VenueApi, VenueFactory};
use crate::MAX_TOP_DEPTH;

/// Venue id
pub const VENUE: &str = "kraken";

const WS_HOST: &str = "ws.kraken.com";
const WS_PATH: &str = "/v2";
const BOOK_DEPTH: u32 = 1000;
const ASSET_PAIRS_URL: &str = "https://api.kraken.com/0/public/AssetPairs";

/// Pairs known to be listed, used when the REST refresh is unavailable.
const DEFAULT_PAIRS: &[&str] = &[
    "BTC-USD", "ETH-USD", "SOL-USD", "ADA-USD", "DOGE-USD", "XRP-USD", "LTC-USD",
];

/// The venue's market-data WebSocket endpoint.
pub fn endpoint() -> VenueEndpoint {
    VenueEndpoint::new(VENUE, WS_HOST, WS_PATH)
}

/// Subscription payload for one symbol on the book channel.
pub fn subscriptions(venue_symbol: &str) -> Vec<String> {
    let book = json!({
        "method": "subscribe",
        "params": {
            "channel": "book",
            "symbol": [venue_symbol],
            "depth": BOOK_DEPTH,
        },
    });
    vec![book.to_string()]
}

/// Parser for v2 `book` frames.
#[derive(Debug, Default)]
pub struct KrakenParser;

impl BookParser for KrakenParser {
    fn parse(&mut self, raw: &str, out: &mut Vec<BookEvent>) -> bool {
        // Fast reject: acks carry "method", data frames carry the channel.
        if !raw.contains("\"channel\":\"book\"") || raw.contains("\"method\":\"subscribe\"") {
            return false;
        }
        let frame: KrakenFrame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(venue = VENUE, %err, "unparseable frame");
                return false;
            }
        };
        if frame.channel != "book" {
            return false;
        }

        let ts_ns = clock::monotonic_ns();
        let before = out.len();

        for data in &frame.data {
            let canonical = symbol::to_canonical(VENUE, &data.symbol);
            match frame.kind.as_str() {
                "snapshot" => {
                    let mut snap = BookSnapshot {
                        venue: VENUE.to_string(),
                        symbol: canonical.clone(),
                        ts_ns,
                        levels: Vec::with_capacity(data.bids.len() + data.asks.len()),
                    };
                    push_side(&mut snap.levels, data, Side::Bid, &canonical, ts_ns);
                    push_side(&mut snap.levels, data, Side::Ask, &canonical, ts_ns);
                    if !snap.levels.is_empty() {
                        out.push(BookEvent::Snapshot(snap));
                    }
                }
                "update" => {
                    let mut deltas = Vec::with_capacity(data.bids.len() + data.asks.len());
                    push_side(&mut deltas, data, Side::Bid, &canonical, ts_ns);
                    push_side(&mut deltas, data, Side::Ask, &canonical, ts_ns);
                    out.extend(deltas.into_iter().map(BookEvent::Delta));
                }
                _ => {}
            }
        }
        out.len() > before
    }
}

/// Append one side's levels in published order. Kraken publishes no
/// per-level sequence, so `seq` stays 0.
fn push_side(
    out: &mut Vec<BookDelta>,
    data: &KrakenBookData,
    side: Side,
    canonical: &str,
    ts_ns: i64,
) {
    let levels = match side {
        Side::Bid => &data.bids,
        Side::Ask => &data.asks,
    };
    for level in levels {
        if !level.price.is_finite() || !level.qty.is_finite() {
            continue;
        }
        out.push(BookDelta {
            venue: VENUE.to_string(),
            symbol: canonical.to_string(),
            side,
            price: level.price,
            size: level.qty,
            op: if level.qty == 0.0 { BookOp::Delete } else { BookOp::Upsert },
            seq: 0,
            ts_ns,
        });
    }
}

#[derive(Debug, Deserialize)]
struct AssetPairsResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: std::collections::HashMap<String, AssetPairRecord>,
}

#[derive(Debug, Deserialize)]
struct AssetPairRecord {
    #[serde(default)]
    wsname: Option<String>,
}

/// Kraken's websocket names use legacy codes for a few assets.
fn normalize_asset(code: &str) -> &str {
    match code {
        "XBT" => "BTC",
        "XDG" => "DOGE",
        other => other,
    }
}

fn wsname_to_canonical(wsname: &str) -> Option<String> {
    let (base, quote) = wsname.split_once('/')?;
    Some(format!("{}-{}", normalize_asset(base), normalize_asset(quote)))
}

/// Pair-support checks backed by the public AssetPairs listing.
#[derive(Debug)]
pub struct KrakenApi {
    pairs: RwLock<Vec<String>>,
}

impl KrakenApi {
    /// Create the API seeded with the built-in pair list.
    pub fn new() -> Self {
        Self {
            pairs: RwLock::new(DEFAULT_PAIRS.iter().map(|s| s.to_string()).collect()),
        }
    }

    /// Replace the pair list from the public REST endpoint. On failure the
    /// current list is kept.
    pub fn refresh(&self) -> crate::Result<usize> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        let response: AssetPairsResponse = client.get(ASSET_PAIRS_URL).send()?.json()?;
        if !response.error.is_empty() {
            return Err(crate::Error::Config(format!(
                "asset pairs query failed: {}",
                response.error.join(", ")
            )));
        }
        let mut listed: Vec<String> = response
            .result
            .values()
            .filter_map(|record| record.wsname.as_deref().and_then(wsname_to_canonical))
            .collect();
        listed.sort();
        listed.dedup();
        let count = listed.len();
        *self.pairs.write() = listed;
        Ok(count)
    }
}

impl Default for KrakenApi {
    fn default() -> Self {
        Self::new()
    }
}

impl VenueApi for KrakenApi {
    fn name(&self) -> &str {
        VENUE
    }

    fn supports_pair(&self, canonical: &str) -> bool {
        self.pairs
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
            let feed: Arc<dyn MarketFeed> = Arc::new(VenueFeed::<KrakenParser>::new(
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
            let api = KrakenApi::new();
            if let Err(err) = api.refresh() {
                warn!(venue = VENUE, %err, "asset pair refresh failed; using built-in list");
            }
            Box::new(api)
        }),
        to_venue_symbol: Box::new(|canonical: &str| symbol::to_venue(VENUE, canonical)),
    }
}
