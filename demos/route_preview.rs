//! Subscribe a pair through the feed manager, let the books warm up, and
//! preview a routed order.
//!
//! ```bash
//! cargo run --example route_preview               # buy 0.5 BTC-USD
//! cargo run --example route_preview ETH-USD sell 2.0
//! cargo run --example route_preview BTC-USD buy 1.0 64000   # limit
//! ```

use std::thread;
use std::time::Duration;

use crossbook::config::FeedOptions;
use crossbook::feed::{FeedManager, VenueRuntime};
use crossbook::router::{OrderRequest, RouterService};
use crossbook::venues;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let symbol = args.next().unwrap_or_else(|| "BTC-USD".to_string());
    let side = args.next().unwrap_or_else(|| "buy".to_string());
    let quantity: f64 = args.next().and_then(|v| v.parse().ok()).unwrap_or(0.5);
    let limit_price: Option<f64> = args.next().and_then(|v| v.parse().ok());

    let runtimes: Vec<VenueRuntime> = venues::registry()
        .into_iter()
        .map(VenueRuntime::from_factory)
        .collect();
    let manager = FeedManager::new(runtimes, vec![symbol.clone()], FeedOptions::from_env());

    let Some(ui) = manager.get_or_subscribe(&symbol) else {
        eprintln!("no venue supports {}", symbol);
        return;
    };

    println!("warming books for {} ...", symbol);
    for _ in 0..20 {
        thread::sleep(Duration::from_millis(500));
        if !ui.snapshot_consolidated(1).is_cold {
            break;
        }
    }

    let service = RouterService::new(manager.clone());
    let order_type = if limit_price.is_some() { "limit" } else { "market" };
    let request = OrderRequest {
        user_id: "demo".to_string(),
        symbol: symbol.clone(),
        side,
        order_type: order_type.to_string(),
        quantity,
        limit_price,
    };

    match service.create_order(&request) {
        Ok(result) => {
            let routing = &result.routing;
            println!(
                "order {} [{}]: {} of {} routable at avg {:.2} ({})",
                result.order_id,
                result.status,
                routing.routable_qty,
                routing.requested_qty,
                routing.indicative_average_price,
                routing.message
            );
            for slice in &routing.slices {
                println!(
                    "  leg: {:>10}  qty {:.6}  avg px {:.2}",
                    slice.venue, slice.quantity, slice.avg_price
                );
            }
        }
        Err(err) => eprintln!("order rejected: {}", err),
    }

    manager.shutdown();
}
