//! Order-entry surface over the router.
//!
//! `RouterService` is what the HTTP layer calls: it validates the request,
//! resolves routing inputs from the feed manager, runs the split
//! computation, and rejects degenerate plans. Persistence and exchange
//! execution stay with the host; the plan returned here is indicative,
//! computed from the latest local snapshots, and the order opens in
//! "open" status awaiting execution reports.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::feed::FeedManager;
use crate::router::{route_order, RoutingDecision, EPSILON};

/// An incoming order request.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    /// Caller identity, recorded on the order
    pub user_id: String,
    /// Canonical symbol, e.g. "BTC-USD"
    pub symbol: String,
    /// "buy" or "sell" (lowercase)
    pub side: String,
    /// "market" or "limit" (lowercase)
    pub order_type: String,
    /// Requested quantity, must be positive
    pub quantity: f64,
    /// Limit price; required (positive) for limit orders
    pub limit_price: Option<f64>,
}

/// A created order with its routing plan.
#[derive(Debug, Clone, Serialize)]
pub struct OrderResult {
    /// Assigned order id
    pub order_id: String,
    /// Order status; always "open" until execution reports arrive
    pub status: String,
    /// The venue-split plan
    pub routing: RoutingDecision,
}

/// Why an order was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RouterErrorCode {
    /// Side, type, quantity or limit price failed validation
    InvalidRequest,
    /// No configured venue supports the symbol, or the pair is not live
    SymbolNotSupported,
    /// No resting liquidity on the relevant side across all venues
    MarketNoLiquidity,
    /// The routing computation produced a degenerate plan
    InvalidRoutingPlan,
}

/// A structured order rejection.
#[derive(Debug, Clone, Serialize)]
pub struct RouterError {
    /// Machine-readable reason
    pub code: RouterErrorCode,
    /// Human-readable detail
    pub message: String,
}

impl RouterError {
    fn new(code: RouterErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for RouterError {}

/// Order entry over live feeds.
pub struct RouterService {
    feeds: Arc<FeedManager>,
}

impl RouterService {
    /// Create a service over the given feed manager.
    pub fn new(feeds: Arc<FeedManager>) -> Self {
        Self { feeds }
    }

    /// Validate the request, compute the venue split, and return the
    /// opened order with its plan.
    ///
    /// Market orders require some immediately routable size; an empty side
    /// across all venues is a rejection, not a resting order. Limit orders
    /// are intentionally not failed on liquidity here - they may rest -
    /// but a plan with zero routable quantity still rejects since nothing
    /// can be dispatched.
    pub fn create_order(&self, req: &OrderRequest) -> Result<OrderResult, RouterError> {
        if req.side != "buy" && req.side != "sell" {
            return Err(RouterError::new(
                RouterErrorCode::InvalidRequest,
                format!("invalid side '{}'", req.side),
            ));
        }
        if req.order_type != "market" && req.order_type != "limit" {
            return Err(RouterError::new(
                RouterErrorCode::InvalidRequest,
                format!("invalid order type '{}'", req.order_type),
            ));
        }
        if !(req.quantity > 0.0) {
            return Err(RouterError::new(
                RouterErrorCode::InvalidRequest,
                "quantity must be positive",
            ));
        }
        let limit_price = match req.order_type.as_str() {
            "limit" => match req.limit_price {
                Some(limit) if limit > 0.0 => Some(limit),
                _ => {
                    return Err(RouterError::new(
                        RouterErrorCode::InvalidRequest,
                        "limit orders require a positive limit price",
                    ))
                }
            },
            _ => None,
        };

        let Some(inputs) = self.feeds.acquire_routing_inputs(&req.symbol) else {
            return Err(RouterError::new(
                RouterErrorCode::SymbolNotSupported,
                "symbol not supported",
            ));
        };

        let routing = route_order(&inputs.feeds, &req.side, req.quantity, limit_price);

        if routing.routable_qty <= EPSILON {
            return Err(RouterError::new(
                RouterErrorCode::MarketNoLiquidity,
                "order rejected: no liquidity on the book side across venues",
            ));
        }
        if routing.slices.is_empty() {
            return Err(RouterError::new(
                RouterErrorCode::InvalidRoutingPlan,
                "invalid routing plan: routable quantity has no legs",
            ));
        }
        for slice in &routing.slices {
            if slice.quantity <= EPSILON || slice.avg_price <= EPSILON {
                return Err(RouterError::new(
                    RouterErrorCode::InvalidRoutingPlan,
                    "invalid routing plan: leg quantity/price must be positive",
                ));
            }
        }

        let order_id = Uuid::new_v4().to_string();
        info!(
            order_id = %order_id,
            symbol = %req.symbol,
            side = %req.side,
            routable = routing.routable_qty,
            venues = routing.slices.len(),
            "order routed"
        );
        Ok(OrderResult {
            order_id,
            status: "open".to_string(),
            routing,
        })
    }
}

impl fmt::Debug for RouterService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterService").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedOptions;
    use crate::feed::testing::{stub_runtime, StubFeed};
    use crate::feed::MarketFeed;
    use crate::types::{BookDelta, BookOp, Side};
    use parking_lot::Mutex;
    use std::time::Duration;

    fn request(symbol: &str, side: &str, order_type: &str, qty: f64, limit: Option<f64>) -> OrderRequest {
        OrderRequest {
            user_id: "user-1".to_string(),
            symbol: symbol.to_string(),
            side: side.to_string(),
            order_type: order_type.to_string(),
            quantity: qty,
            limit_price: limit,
        }
    }

    fn service_with_liquidity() -> (RouterService, Arc<Mutex<Vec<Arc<StubFeed>>>>) {
        let track = Arc::new(Mutex::new(Vec::new()));
        let manager = FeedManager::new(
            vec![stub_runtime("a", &["BTC-USD"], Arc::clone(&track))],
            vec!["BTC-USD".to_string()],
            FeedOptions::new().with_sweep_interval(Duration::ZERO),
        );
        manager.get_or_subscribe("BTC-USD").unwrap();
        {
            let feeds = track.lock();
            feeds[0].book().apply_delta(&BookDelta {
                venue: "a".to_string(),
                symbol: "BTC-USD".to_string(),
                side: Side::Ask,
                price: 100.0,
                size: 3.0,
                op: BookOp::Upsert,
                seq: 0,
                ts_ns: 1,
            });
        }
        (RouterService::new(manager), track)
    }

    #[test]
    fn test_create_order_happy_path() {
        let (service, _track) = service_with_liquidity();
        let result = service
            .create_order(&request("BTC-USD", "buy", "market", 2.0, None))
            .unwrap();
        assert_eq!(result.status, "open");
        assert!(!result.order_id.is_empty());
        assert!(result.routing.fully_routable);
        assert_eq!(result.routing.slices.len(), 1);
    }

    #[test]
    fn test_validation_rejections() {
        let (service, _track) = service_with_liquidity();

        let err = service
            .create_order(&request("BTC-USD", "hodl", "market", 1.0, None))
            .unwrap_err();
        assert_eq!(err.code, RouterErrorCode::InvalidRequest);

        let err = service
            .create_order(&request("BTC-USD", "buy", "stop", 1.0, None))
            .unwrap_err();
        assert_eq!(err.code, RouterErrorCode::InvalidRequest);

        let err = service
            .create_order(&request("BTC-USD", "buy", "market", -1.0, None))
            .unwrap_err();
        assert_eq!(err.code, RouterErrorCode::InvalidRequest);

        let err = service
            .create_order(&request("BTC-USD", "buy", "limit", 1.0, None))
            .unwrap_err();
        assert_eq!(err.code, RouterErrorCode::InvalidRequest);
    }

    #[test]
    fn test_unknown_symbol_rejected() {
        let (service, _track) = service_with_liquidity();
        let err = service
            .create_order(&request("XMR-USD", "buy", "market", 1.0, None))
            .unwrap_err();
        assert_eq!(err.code, RouterErrorCode::SymbolNotSupported);
    }

    #[test]
    fn test_no_liquidity_rejected() {
        let (service, _track) = service_with_liquidity();
        // The ask side has liquidity; the bid side does not.
        let err = service
            .create_order(&request("BTC-USD", "sell", "market", 1.0, None))
            .unwrap_err();
        assert_eq!(err.code, RouterErrorCode::MarketNoLiquidity);
    }

    #[test]
    fn test_limit_order_carries_limit() {
        let (service, _track) = service_with_liquidity();
        let result = service
            .create_order(&request("BTC-USD", "buy", "limit", 2.0, Some(101.0)))
            .unwrap();
        assert!(result.routing.fully_routable);

        // A limit below every ask routes nothing and rejects.
        let err = service
            .create_order(&request("BTC-USD", "buy", "limit", 2.0, Some(99.0)))
            .unwrap_err();
        assert_eq!(err.code, RouterErrorCode::MarketNoLiquidity);
    }
}
