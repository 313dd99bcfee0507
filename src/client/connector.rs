//! TLS WebSocket connector for venue market-data feeds.
//!
//! [`WsConnector::run`] owns the calling thread: it performs the TLS and
//! WebSocket handshakes, sends the venue's subscription payloads, then loops
//! reading text frames and handing each payload to the caller's callback.
//! The callback must stay cheap - the WS thread is the sole consumer of the
//! socket, and all real work happens downstream of the ring.
//!
//! The connector does not reconnect. A failed connect or a broken read loop
//! ends `run` with one logged error; restart policy belongs to the host
//! (bounded exponential backoff is the recommended shape).

use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};

use crate::error::Error;

/// TLS + WebSocket handshake deadline.
const CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Where a venue's market-data WebSocket lives.
#[derive(Debug, Clone)]
pub struct VenueEndpoint {
    /// Venue id, e.g. "coinbase"
    pub venue: String,
    /// Hostname of the market-data WebSocket
    pub host: String,
    /// Request path, e.g. "/" or "/v2"
    pub path: String,
}

impl VenueEndpoint {
    /// Create an endpoint description.
    pub fn new(
        venue: impl Into<String>,
        host: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            venue: venue.into(),
            host: host.into(),
            path: path.into(),
        }
    }

    fn url(&self, port: u16) -> String {
        format!("wss://{}:{}{}", self.host, port, self.path)
    }
}

/// A market-data WebSocket connector.
///
/// `run` blocks the calling thread until the connection ends or [`stop`]
/// is called from another thread. `stop` is idempotent and returns once the
/// connector's I/O has ceased.
///
/// [`stop`]: WsConnector::stop
pub struct WsConnector {
    endpoint: VenueEndpoint,
    subscriptions: Vec<String>,
    stop_flag: AtomicBool,
    stop_notify: Notify,
    started: AtomicBool,
    done: Mutex<bool>,
    done_cv: Condvar,
}

impl WsConnector {
    /// Create a connector for the given endpoint.
    ///
    /// `subscriptions` are the JSON payloads sent, in order, right after the
    /// WebSocket handshake (the book-channel subscription plus any venue
    /// keepalive channels).
    pub fn new(endpoint: VenueEndpoint, subscriptions: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            endpoint,
            subscriptions,
            stop_flag: AtomicBool::new(false),
            stop_notify: Notify::new(),
            started: AtomicBool::new(false),
            done: Mutex::new(false),
            done_cv: Condvar::new(),
        })
    }

    /// Connect and pump frames into `on_message` until the peer closes or
    /// [`stop`](Self::stop) is called. Blocks the calling thread.
    ///
    /// # Errors
    ///
    /// Connect, TLS or handshake failures, and non-benign read errors, are
    /// logged and returned. A normal close (or operation-aborted / eof /
    /// not-connected from the peer) ends the loop with `Ok(())`.
    pub fn run<F>(&self, port: u16, mut on_message: F) -> crate::Result<()>
    where
        F: FnMut(&str),
    {
        self.started.store(true, Ordering::SeqCst);
        if self.stop_flag.load(Ordering::SeqCst) {
            self.mark_done();
            return Ok(());
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Config(format!("tokio runtime: {}", e)))?;

        let result = runtime.block_on(self.read_loop(port, &mut on_message));
        self.mark_done();

        if let Err(ref err) = result {
            error!(venue = %self.endpoint.venue, %err, "websocket connector failed");
        }
        result
    }

    async fn read_loop<F>(&self, port: u16, on_message: &mut F) -> crate::Result<()>
    where
        F: FnMut(&str),
    {
        let url = self.endpoint.url(port);
        // Keep stop() responsive even while the handshake is in flight.
        let connect = tokio::time::timeout(
            CONNECT_TIMEOUT,
            tokio_tungstenite::connect_async(url.as_str()),
        );
        let stream = tokio::select! {
            _ = self.stop_notify.notified() => return Ok(()),
            connected = connect => {
                let (stream, _response) = connected.map_err(|_| Error::Timeout)??;
                stream
            }
        };
        info!(venue = %self.endpoint.venue, %url, "websocket connected");

        let (mut write, mut read) = stream.split();
        for payload in &self.subscriptions {
            write.send(Message::Text(payload.clone().into())).await?;
        }
        debug!(
            venue = %self.endpoint.venue,
            subscriptions = self.subscriptions.len(),
            "subscriptions sent"
        );

        loop {
            if self.stop_flag.load(Ordering::SeqCst) {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            tokio::select! {
                _ = self.stop_notify.notified() => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => on_message(text.as_ref()),
                        Some(Ok(Message::Ping(payload))) => {
                            write.send(Message::Pong(payload)).await?;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!(venue = %self.endpoint.venue, "peer closed");
                            break;
                        }
                        Some(Ok(_)) => {} // binary / pong / raw frames: ignore
                        Some(Err(err)) if is_benign_close(&err) => {
                            debug!(venue = %self.endpoint.venue, %err, "read loop ended");
                            break;
                        }
                        Some(Err(err)) => return Err(err.into()),
                    }
                }
            }
        }
        Ok(())
    }

    /// Signal the read loop to terminate. Idempotent and thread-safe;
    /// returns once the connector's I/O has ceased.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.stop_notify.notify_one();
        if !self.started.load(Ordering::SeqCst) {
            return;
        }
        let mut done = self.done.lock();
        while !*done {
            self.done_cv.wait(&mut done);
        }
    }

    fn mark_done(&self) {
        let mut done = self.done.lock();
        *done = true;
        self.done_cv.notify_all();
    }

    /// The endpoint this connector talks to.
    pub fn endpoint(&self) -> &VenueEndpoint {
        &self.endpoint
    }
}

impl std::fmt::Debug for WsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnector")
            .field("endpoint", &self.endpoint)
            .field("stopped", &self.stop_flag.load(Ordering::Relaxed))
            .finish()
    }
}

/// Peer-initiated endings that are not worth an error: normal close,
/// operation aborted, eof, not connected.
fn is_benign_close(err: &WsError) -> bool {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => true,
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => true,
        WsError::Io(io) => matches!(
            io.kind(),
            ErrorKind::UnexpectedEof
                | ErrorKind::ConnectionAborted
                | ErrorKind::ConnectionReset
                | ErrorKind::NotConnected
        ),
        _ => false,
    }
}
