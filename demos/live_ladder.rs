//! Live consolidated ladder for one pair across both venues.
//!
//! Connects venue feeds directly (no manager) and prints the merged
//! ladder once a second. When a venue goes stale its feed is restarted
//! with exponential backoff, showing the host-side restart policy the
//! connector itself deliberately does not implement.
//!
//! ```bash
//! cargo run --example live_ladder            # BTC-USD
//! cargo run --example live_ladder ETH-USD
//! ```

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbook::feed::{MarketFeed, MasterFeed};
use crossbook::venues;

const WS_PORT: u16 = 443;
const DEPTH: usize = 10;
const STALE_RESTART_AFTER: Duration = Duration::from_secs(10);
const BACKOFF_INITIAL: Duration = Duration::from_millis(500);
const BACKOFF_MAX: Duration = Duration::from_secs(30);

struct Supervised {
    feed: Arc<dyn MarketFeed>,
    stale_since: Option<std::time::Instant>,
    attempt: u32,
}

impl Supervised {
    fn backoff(&self) -> Duration {
        let exp = BACKOFF_INITIAL.saturating_mul(2u32.saturating_pow(self.attempt));
        exp.min(BACKOFF_MAX)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let symbol = std::env::args().nth(1).unwrap_or_else(|| "BTC-USD".to_string());
    let master = MasterFeed::new(symbol.clone());

    let mut supervised: Vec<Supervised> = Vec::new();
    for factory in venues::registry() {
        let feed = (factory.make_feed)(&symbol);
        feed.start(WS_PORT);
        master.add_feed(Arc::clone(&feed));
        supervised.push(Supervised {
            feed,
            stale_since: None,
            attempt: 0,
        });
    }

    loop {
        thread::sleep(Duration::from_secs(1));

        let view = master.snapshot_consolidated(DEPTH);
        print!("\x1B[2J\x1B[H"); // clear screen
        println!("{}  (cold: {}, updated: {} ms)", view.symbol, view.is_cold, view.last_updated_ms);
        println!("{:>12} {:>14} {:>10} | {:<10} {:<14} {:<12}", "bid venue", "bid px", "bid sz", "ask sz", "ask px", "ask venue");
        for i in 0..DEPTH {
            let bid = view.bids.get(i);
            let ask = view.asks.get(i);
            println!(
                "{:>12} {:>14} {:>10} | {:<10} {:<14} {:<12}",
                bid.map_or("", |l| l.venue.as_str()),
                bid.map_or(String::new(), |l| format!("{:.2}", l.price)),
                bid.map_or(String::new(), |l| format!("{:.4}", l.size)),
                ask.map_or(String::new(), |l| format!("{:.4}", l.size)),
                ask.map_or(String::new(), |l| format!("{:.2}", l.price)),
                ask.map_or("", |l| l.venue.as_str()),
            );
        }

        // Restart any venue that dropped out of the live set for too long.
        let now = std::time::Instant::now();
        for sup in &mut supervised {
            let live = view.per_venue.contains_key(sup.feed.venue());
            if live {
                sup.stale_since = None;
                sup.attempt = 0;
                continue;
            }
            let since = *sup.stale_since.get_or_insert(now);
            if now.duration_since(since) < STALE_RESTART_AFTER {
                continue;
            }
            let delay = sup.backoff();
            tracing::warn!(
                venue = sup.feed.venue(),
                attempt = sup.attempt,
                delay_ms = delay.as_millis() as u64,
                "venue stale; restarting feed"
            );
            sup.feed.stop();
            thread::sleep(delay);
            sup.feed.start(WS_PORT);
            sup.attempt = sup.attempt.saturating_add(1);
            sup.stale_since = Some(std::time::Instant::now());
        }
    }
}
