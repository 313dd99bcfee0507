//! Venue connectivity.
//!
//! - [`connector`] - TLS WebSocket connector driving a venue's book channel
//!
//! The connector is venue-agnostic: each venue driver in [`crate::venues`]
//! supplies its endpoint (host, path) and subscription payloads, and the
//! connector does the transport work.

pub mod connector;

pub use connector::{VenueEndpoint, WsConnector};
