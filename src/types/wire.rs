//! Venue wire-format types.
//!
//! Rust bindings for the JSON frames the two supported venues publish on
//! their book channels. These types never leave the venue drivers; parsers
//! normalize them into [`BookEvent`](super::BookEvent)s.

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Coinbase Advanced Trade, `level2` channel
// ---------------------------------------------------------------------------

/// One `l2_data` frame from Coinbase
///
/// `sequence_num` is a per-connection counter shared by every event in the
/// frame; it is not a per-level book sequence, so normalized deltas carry
/// `seq = 0` ("unknown").
#[derive(Debug, Clone, Deserialize)]
pub struct CoinbaseFrame {
    /// Channel the frame belongs to ("l2_data" for book traffic)
    pub channel: String,
    /// Per-connection monotonic sequence number
    #[serde(default)]
    pub sequence_num: u64,
    /// Book events carried by the frame
    #[serde(default)]
    pub events: Vec<CoinbaseL2Event>,
}

/// One event inside an `l2_data` frame
#[derive(Debug, Clone, Deserialize)]
pub struct CoinbaseL2Event {
    /// "snapshot" or "update"
    #[serde(rename = "type")]
    pub kind: String,
    /// Venue product id, e.g. "BTC-USD"
    #[serde(default)]
    pub product_id: String,
    /// Level updates, in published order
    #[serde(default)]
    pub updates: Vec<CoinbaseL2Update>,
}

/// One level inside a Coinbase l2 event. Prices and sizes arrive as decimal
/// strings; a zero `new_quantity` encodes deletion.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinbaseL2Update {
    /// "bid" or "offer"
    pub side: String,
    /// Price as a decimal string
    pub price_level: String,
    /// Absolute size as a decimal string
    pub new_quantity: String,
}

// ---------------------------------------------------------------------------
// Kraken WebSocket v2, `book` channel
// ---------------------------------------------------------------------------

/// One frame from a Kraken v2 data channel
#[derive(Debug, Clone, Deserialize)]
pub struct KrakenFrame {
    /// Channel the frame belongs to ("book" for book traffic)
    pub channel: String,
    /// "snapshot" or "update"
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Per-symbol payloads
    #[serde(default)]
    pub data: Vec<KrakenBookData>,
}

/// Book payload for one symbol inside a Kraken frame
#[derive(Debug, Clone, Deserialize)]
pub struct KrakenBookData {
    /// Venue symbol, e.g. "BTC/USD"
    pub symbol: String,
    /// Bid levels, best first
    #[serde(default)]
    pub bids: Vec<KrakenLevel>,
    /// Ask levels, best first
    #[serde(default)]
    pub asks: Vec<KrakenLevel>,
}

/// One price level in a Kraken book payload. A zero `qty` encodes deletion.
#[derive(Debug, Clone, Deserialize)]
pub struct KrakenLevel {
    /// Price as a JSON number
    pub price: f64,
    /// Absolute size as a JSON number
    pub qty: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coinbase_frame_minimal() {
        let frame: CoinbaseFrame =
            serde_json::from_str(r#"{"channel":"l2_data","sequence_num":3}"#).unwrap();
        assert_eq!(frame.channel, "l2_data");
        assert_eq!(frame.sequence_num, 3);
        assert!(frame.events.is_empty());
    }

    #[test]
    fn test_kraken_frame_tolerates_missing_fields() {
        // Heartbeats carry no data array and no type.
        let frame: KrakenFrame = serde_json::from_str(r#"{"channel":"heartbeat"}"#).unwrap();
        assert_eq!(frame.channel, "heartbeat");
        assert!(frame.data.is_empty());
    }
}
