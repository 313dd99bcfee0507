//! Venue drivers.
//!
//! Each venue is a capability set: a way to build a feed for a canonical
//! pair, a way to build its support-check API, and a symbol rewriting rule.
//! The venue's WebSocket endpoint and its book parser are private to the
//! driver; the normalized [`BookEvent`](crate::types::BookEvent) stream is
//! the contract.
//!
//! Two venues ship today: [`coinbase`] and [`kraken`]. Adding a venue means
//! adding a driver module and listing its factory in [`registry`].

pub mod coinbase;
pub mod kraken;

use std::sync::Arc;

use crate::feed::MarketFeed;
use crate::types::BookEvent;

/// Uniform interface for a venue book parser (snapshot + incremental
/// updates).
pub trait BookParser: Send {
    /// Parse one raw text frame into zero or more events, appending to
    /// `out` in the venue's published order. Returns true when the frame
    /// produced at least one event.
    ///
    /// Irrelevant frames (subscription acks, heartbeats, other channels)
    /// and malformed levels are skipped, never errors: a bad level must not
    /// sink the rest of its batch.
    fn parse(&mut self, raw: &str, out: &mut Vec<BookEvent>) -> bool;
}

/// Venue metadata queries, used only for pair-support checks.
pub trait VenueApi: Send + Sync {
    /// Venue id, e.g. "coinbase"
    fn name(&self) -> &str;

    /// Whether the venue lists the canonical pair.
    fn supports_pair(&self, canonical: &str) -> bool;
}

/// Capability set for one venue.
///
/// The feed manager treats venues purely through this struct; nothing
/// outside the driver modules knows a venue's wire details.
pub struct VenueFactory {
    /// Venue id, e.g. "coinbase"
    pub name: String,
    /// Build an (unstarted) feed for a canonical pair
    pub make_feed: Box<dyn Fn(&str) -> Arc<dyn MarketFeed> + Send + Sync>,
    /// Build the venue's support-check API
    pub make_api: Box<dyn Fn() -> Box<dyn VenueApi> + Send + Sync>,
    /// Rewrite a canonical symbol into the venue's spelling
    pub to_venue_symbol: Box<dyn Fn(&str) -> String + Send + Sync>,
}

impl std::fmt::Debug for VenueFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VenueFactory").field("name", &self.name).finish()
    }
}

/// All venue factories known to this build.
pub fn registry() -> Vec<VenueFactory> {
    vec![coinbase::factory(), kraken::factory()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names() {
        let names: Vec<String> = registry().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["coinbase", "kraken"]);
    }

    #[test]
    fn test_factory_symbol_rules() {
        for factory in registry() {
            let venue_symbol = (factory.to_venue_symbol)("BTC-USD");
            match factory.name.as_str() {
                "coinbase" => assert_eq!(venue_symbol, "BTC-USD"),
                "kraken" => assert_eq!(venue_symbol, "BTC/USD"),
                other => panic!("unexpected venue {}", other),
            }
        }
    }
}
