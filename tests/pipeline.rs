//! End-to-end pipeline tests: raw venue frames in, consolidated views and
//! routing decisions out.
//!
//! Feeds run in offline mode - the real ring, parser thread, book and
//! snapshot publishing, with frames injected instead of read from a
//! socket.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbook::client::VenueEndpoint;
use crossbook::feed::{Backpressure, FrameInjector, MarketFeed, MasterFeed, VenueFeed};
use crossbook::router::{route_order, EPSILON};
use crossbook::venues::coinbase::CoinbaseParser;
use crossbook::venues::kraken::KrakenParser;

fn coinbase_feed(symbol: &str) -> VenueFeed<CoinbaseParser> {
    VenueFeed::new(
        "coinbase",
        symbol,
        VenueEndpoint::new("coinbase", "localhost", "/"),
        vec![],
        Backpressure::DropOldest,
        50,
    )
}

fn kraken_feed(symbol: &str) -> VenueFeed<KrakenParser> {
    VenueFeed::new(
        "kraken",
        symbol,
        VenueEndpoint::new("kraken", "localhost", "/v2"),
        vec![],
        Backpressure::DropOldest,
        50,
    )
}

fn coinbase_snapshot_frame(product: &str, bids: &[(f64, f64)], asks: &[(f64, f64)]) -> String {
    let mut updates = Vec::new();
    for (price, size) in bids {
        updates.push(format!(
            r#"{{"side":"bid","price_level":"{}","new_quantity":"{}"}}"#,
            price, size
        ));
    }
    for (price, size) in asks {
        updates.push(format!(
            r#"{{"side":"offer","price_level":"{}","new_quantity":"{}"}}"#,
            price, size
        ));
    }
    format!(
        r#"{{"channel":"l2_data","sequence_num":1,"events":[{{"type":"snapshot","product_id":"{}","updates":[{}]}}]}}"#,
        product,
        updates.join(",")
    )
}

fn coinbase_update_frame(product: &str, side: &str, price: f64, size: f64) -> String {
    format!(
        r#"{{"channel":"l2_data","sequence_num":2,"events":[{{"type":"update","product_id":"{}","updates":[{{"side":"{}","price_level":"{}","new_quantity":"{}"}}]}}]}}"#,
        product, side, price, size
    )
}

fn kraken_snapshot_frame(symbol: &str, bids: &[(f64, f64)], asks: &[(f64, f64)]) -> String {
    let encode = |levels: &[(f64, f64)]| {
        levels
            .iter()
            .map(|(p, q)| format!(r#"{{"price":{},"qty":{}}}"#, p, q))
            .collect::<Vec<_>>()
            .join(",")
    };
    format!(
        r#"{{"channel":"book","type":"snapshot","data":[{{"symbol":"{}","bids":[{}],"asks":[{}],"checksum":1}}]}}"#,
        symbol,
        encode(bids),
        encode(asks)
    )
}

fn wait_for<F: Fn() -> bool>(what: &str, predicate: F) {
    for _ in 0..400 {
        if predicate() {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("timed out waiting for {}", what);
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_coinbase_frames_to_top_snapshot() {
    let feed = coinbase_feed("BTC-USD");
    let mut injector = feed.start_offline().expect("offline start");

    injector.push(&coinbase_snapshot_frame(
        "BTC-USD",
        &[(50_000.0, 1.5), (49_999.0, 2.0)],
        &[(50_001.0, 1.0)],
    ));
    wait_for("snapshot applied", || !feed.load_top().is_empty());

    let top = feed.load_top();
    assert_eq!(top.venue, "coinbase");
    assert_eq!(top.symbol, "BTC-USD");
    assert_eq!(top.bids, vec![(50_000.0, 1.5), (49_999.0, 2.0)]);
    assert_eq!(top.asks, vec![(50_001.0, 1.0)]);

    // A zero-quantity update erases its level.
    injector.push(&coinbase_update_frame("BTC-USD", "bid", 50_000.0, 0.0));
    wait_for("level deleted", || feed.load_top().bids.len() == 1);
    assert_eq!(feed.load_top().bids, vec![(49_999.0, 2.0)]);

    feed.stop();
}

#[test]
fn test_kraken_frames_to_top_snapshot() {
    let feed = kraken_feed("BTC-USD");
    let mut injector = feed.start_offline().expect("offline start");

    // Kraken speaks the venue spelling; the feed publishes canonical.
    injector.push(&kraken_snapshot_frame(
        "BTC/USD",
        &[(50_000.5, 0.25)],
        &[(50_002.5, 0.75)],
    ));
    wait_for("snapshot applied", || !feed.load_top().is_empty());

    let top = feed.load_top();
    assert_eq!(top.symbol, "BTC-USD");
    assert_eq!(top.best_bid(), Some((50_000.5, 0.25)));
    assert_eq!(top.best_ask(), Some((50_002.5, 0.75)));

    feed.stop();
}

#[test]
fn test_consolidated_view_across_venues() {
    let cb = Arc::new(coinbase_feed("ETH-USD"));
    let kr = Arc::new(kraken_feed("ETH-USD"));
    let mut cb_inject = cb.start_offline().expect("offline start");
    let mut kr_inject = kr.start_offline().expect("offline start");

    cb_inject.push(&coinbase_snapshot_frame(
        "ETH-USD",
        &[(3_000.0, 2.0)],
        &[(3_001.0, 1.0)],
    ));
    kr_inject.push(&kraken_snapshot_frame(
        "ETH/USD",
        &[(3_000.5, 1.0)],
        &[(3_000.8, 3.0)],
    ));
    wait_for("both venues published", || {
        !cb.load_top().is_empty() && !kr.load_top().is_empty()
    });

    let master = MasterFeed::new("ETH-USD");
    master.add_feed(Arc::clone(&cb) as Arc<dyn MarketFeed>);
    master.add_feed(Arc::clone(&kr) as Arc<dyn MarketFeed>);

    let view = master.snapshot_consolidated(10);
    assert!(!view.is_cold);
    assert!(view.last_updated_ms > 0);
    assert_eq!(view.per_venue.len(), 2);

    // Best bid is kraken's 3000.5, then coinbase's 3000.0.
    assert_eq!(view.bids[0].venue, "kraken");
    assert!(close(view.bids[0].price, 3_000.5));
    assert_eq!(view.bids[1].venue, "coinbase");
    // Best ask is kraken's 3000.8, then coinbase's 3001.0.
    assert_eq!(view.asks[0].venue, "kraken");
    assert!(close(view.asks[0].price, 3_000.8));

    // Every consolidated row is attributable to a live venue snapshot.
    for level in view.bids.iter().chain(view.asks.iter()) {
        assert!(view.per_venue.contains_key(&level.venue));
    }

    cb.stop();
    kr.stop();
}

#[test]
fn test_route_across_live_books() {
    // Two-venue price-priority split: coinbase asks (100,1),(103,5);
    // kraken asks (101,2),(102,4); buy 5 => 1 from coinbase at 100,
    // 4 from kraken at 101.5, overall average 506/5 = 101.2.
    let cb = Arc::new(coinbase_feed("BTC-USD"));
    let kr = Arc::new(kraken_feed("BTC-USD"));
    let mut cb_inject = cb.start_offline().expect("offline start");
    let mut kr_inject = kr.start_offline().expect("offline start");

    cb_inject.push(&coinbase_snapshot_frame(
        "BTC-USD",
        &[],
        &[(100.0, 1.0), (103.0, 5.0)],
    ));
    kr_inject.push(&kraken_snapshot_frame(
        "BTC/USD",
        &[],
        &[(101.0, 2.0), (102.0, 4.0)],
    ));
    wait_for("both venues published", || {
        !cb.load_top().is_empty() && !kr.load_top().is_empty()
    });

    let feeds: Vec<Arc<dyn MarketFeed>> = vec![
        Arc::clone(&cb) as Arc<dyn MarketFeed>,
        Arc::clone(&kr) as Arc<dyn MarketFeed>,
    ];
    let decision = route_order(&feeds, "buy", 5.0, None);

    assert!(decision.fully_routable);
    assert!(close(decision.routable_qty, 5.0));
    assert!(close(decision.indicative_average_price, 101.2));
    assert_eq!(decision.slices.len(), 2);
    assert_eq!(decision.slices[0].venue, "coinbase");
    assert!(close(decision.slices[0].quantity, 1.0));
    assert!(close(decision.slices[0].avg_price, 100.0));
    assert_eq!(decision.slices[1].venue, "kraken");
    assert!(close(decision.slices[1].quantity, 4.0));
    assert!(close(decision.slices[1].avg_price, 101.5));

    // Limit-constrained partial on the same books: buy 5 limit 100.
    let decision = route_order(&feeds, "buy", 5.0, Some(100.0));
    assert!(!decision.fully_routable);
    assert!(close(decision.routable_qty, 1.0));
    assert_eq!(decision.message, "partially routable: limit-constrained liquidity");

    // Routed quantity always reconciles with its legs.
    let total: f64 = decision.slices.iter().map(|s| s.quantity).sum();
    assert!((decision.routable_qty - total).abs() <= EPSILON);

    cb.stop();
    kr.stop();
}

#[test]
fn test_feed_stop_is_idempotent() {
    let feed = coinbase_feed("BTC-USD");
    let injector: Option<FrameInjector> = feed.start_offline();
    assert!(injector.is_some());
    feed.stop();
    feed.stop();
}

#[test]
fn test_restart_after_stop_resubscribes_from_scratch() {
    let feed = coinbase_feed("BTC-USD");
    let mut injector = feed.start_offline().expect("offline start");
    injector.push(&coinbase_snapshot_frame("BTC-USD", &[(100.0, 1.0)], &[]));
    wait_for("first round applied", || !feed.load_top().is_empty());
    feed.stop();

    // A stopped pair that comes back gets a fresh pipeline; the book
    // still holds the last image until a new snapshot replaces it.
    let mut injector = feed.start_offline().expect("second offline start");
    injector.push(&coinbase_snapshot_frame("BTC-USD", &[(200.0, 2.0)], &[]));
    wait_for("second round applied", || {
        feed.load_top().best_bid() == Some((200.0, 2.0))
    });
    feed.stop();
}
