//! Per-venue feed: WebSocket thread -> ring -> parser thread -> book.
//!
//! Each started feed runs exactly two threads. The WS thread only enqueues
//! raw frames; the consumer thread parses, applies each frame's events to
//! the book as one batch, and publishes a fresh immutable
//! [`TopSnapshot`](crate::book::TopSnapshot) after every applied batch.
//! Readers load snapshots through an atomic swap and never contend with the
//! writer.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::book::{Book, TopSnapshot};
use crate::client::{VenueEndpoint, WsConnector};
use crate::clock;
use crate::feed::MarketFeed;
use crate::ring::{self, Consumer, Producer};
use crate::types::BookEvent;
use crate::venues::BookParser;
use crate::MAX_TOP_DEPTH;

/// Raw frames buffered between the WS thread and the parser thread.
const RING_CAPACITY: usize = 4096;

/// How long the consumer naps when the ring is empty.
const IDLE_NAP: Duration = Duration::from_micros(100);

/// What to do with an incoming frame when the ring is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backpressure {
    /// Discard the incoming frame
    DropNewest,
    /// Evict the oldest buffered frame, then push the incoming one
    DropOldest,
    /// Raise the resync flag and discard the frame; the host is expected
    /// to fetch a REST snapshot and feed it back via [`FrameInjector`]
    SignalResync,
}

/// Ring-full outcome counters, updated with relaxed atomics.
#[derive(Debug, Default)]
pub struct FeedStats {
    frames_dropped: AtomicU64,
    frames_evicted: AtomicU64,
    resync_signals: AtomicU64,
}

impl FeedStats {
    /// Frames discarded under `DropNewest` (or when eviction failed to
    /// make room).
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    /// Oldest frames evicted under `DropOldest`.
    pub fn frames_evicted(&self) -> u64 {
        self.frames_evicted.load(Ordering::Relaxed)
    }

    /// Times the resync flag was raised under `SignalResync`.
    pub fn resync_signals(&self) -> u64 {
        self.resync_signals.load(Ordering::Relaxed)
    }
}

/// State shared between the feed handle and its two threads.
struct FeedShared {
    venue: String,
    canonical: String,
    top_depth: usize,
    backpressure: Backpressure,
    book: Book,
    top: ArcSwap<TopSnapshot>,
    running: AtomicBool,
    resync: AtomicBool,
    stats: FeedStats,
}

impl FeedShared {
    fn publish_top(&self) {
        let snap = TopSnapshot {
            venue: self.venue.clone(),
            symbol: self.canonical.clone(),
            ts_ns: clock::monotonic_ns(),
            ts_ms: clock::wall_ms(),
            bids: self.book.top_bids(self.top_depth),
            asks: self.book.top_asks(self.top_depth),
        };
        self.top.store(Arc::new(snap));
    }

    /// Enqueue one raw frame, applying the backpressure policy on a full
    /// ring. The consumer endpoint is mutex-shared so the rare eviction
    /// serializes with the parser thread; the ring itself stays SPSC.
    fn enqueue(
        &self,
        tx: &mut Producer<String>,
        rx: &Mutex<Consumer<String>>,
        raw: &str,
    ) {
        let frame = raw.to_string();
        let Err(frame) = tx.try_push(frame) else {
            return;
        };
        match self.backpressure {
            Backpressure::DropNewest => {
                self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
            }
            Backpressure::DropOldest => {
                {
                    let mut consumer = rx.lock();
                    let _ = consumer.try_pop();
                }
                self.stats.frames_evicted.fetch_add(1, Ordering::Relaxed);
                if tx.try_push(frame).is_err() {
                    self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
            Backpressure::SignalResync => {
                self.resync.store(true, Ordering::Release);
                self.stats.resync_signals.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

fn consume_loop<P>(shared: Arc<FeedShared>, rx: Arc<Mutex<Consumer<String>>>)
where
    P: BookParser + Default,
{
    let mut parser = P::default();
    let mut events: Vec<BookEvent> = Vec::new();

    // Readers see an empty (cold) snapshot before the first frame lands.
    shared.publish_top();

    while shared.running.load(Ordering::Relaxed) {
        let frame = rx.lock().try_pop();
        match frame {
            Some(raw) => process_frame(&shared, &mut parser, &mut events, &raw),
            None => thread::sleep(IDLE_NAP),
        }
    }

    // Drain whatever the WS thread managed to enqueue before stop.
    loop {
        let frame = rx.lock().try_pop();
        match frame {
            Some(raw) => process_frame(&shared, &mut parser, &mut events, &raw),
            None => break,
        }
    }
    debug!(venue = %shared.venue, symbol = %shared.canonical, "consumer drained and stopped");
}

fn process_frame<P: BookParser>(
    shared: &FeedShared,
    parser: &mut P,
    events: &mut Vec<BookEvent>,
    raw: &str,
) {
    events.clear();
    if parser.parse(raw, events) {
        shared.book.apply_many(events);
        shared.publish_top();
    }
}

/// One venue's feed for one canonical pair.
///
/// Generic over the venue's [`BookParser`]; the WS endpoint and
/// subscription payloads arrive as data from the venue driver. Everything
/// downstream of [`start`](Self::start) talks to the feed through the
/// [`MarketFeed`] trait.
pub struct VenueFeed<P> {
    shared: Arc<FeedShared>,
    endpoint: VenueEndpoint,
    subscriptions: Vec<String>,
    connector: Mutex<Option<Arc<WsConnector>>>,
    threads: Mutex<Vec<thread::JoinHandle<()>>>,
    _parser: PhantomData<fn() -> P>,
}

impl<P> VenueFeed<P>
where
    P: BookParser + Default + Send + 'static,
{
    /// Create an (unstarted) feed.
    ///
    /// `top_depth` is clamped to [`MAX_TOP_DEPTH`].
    pub fn new(
        venue: impl Into<String>,
        canonical: impl Into<String>,
        endpoint: VenueEndpoint,
        subscriptions: Vec<String>,
        backpressure: Backpressure,
        top_depth: usize,
    ) -> Self {
        let venue = venue.into();
        let canonical = canonical.into();
        let shared = Arc::new(FeedShared {
            top_depth: top_depth.min(MAX_TOP_DEPTH),
            backpressure,
            book: Book::new(venue.clone(), canonical.clone()),
            top: ArcSwap::from_pointee(TopSnapshot::empty(venue.clone(), canonical.clone())),
            running: AtomicBool::new(false),
            resync: AtomicBool::new(false),
            stats: FeedStats::default(),
            venue,
            canonical,
        });
        Self {
            shared,
            endpoint,
            subscriptions,
            connector: Mutex::new(None),
            threads: Mutex::new(Vec::new()),
            _parser: PhantomData,
        }
    }

    /// Spawn the consumer thread and hand back the producer side.
    fn spawn_pipeline(&self) -> Option<(Producer<String>, Arc<Mutex<Consumer<String>>>)> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            warn!(venue = %self.shared.venue, symbol = %self.shared.canonical, "feed already running");
            return None;
        }
        let (tx, rx) = ring::spsc::<String>(RING_CAPACITY);
        let rx = Arc::new(Mutex::new(rx));

        let shared = Arc::clone(&self.shared);
        let consumer_rx = Arc::clone(&rx);
        let name = format!("{}-{}-consumer", self.shared.venue, self.shared.canonical);
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || consume_loop::<P>(shared, consumer_rx));
        match handle {
            Ok(handle) => {
                self.threads.lock().push(handle);
                Some((tx, rx))
            }
            Err(err) => {
                self.shared.running.store(false, Ordering::SeqCst);
                warn!(venue = %self.shared.venue, %err, "failed to spawn consumer thread");
                None
            }
        }
    }

    /// Start the consumer thread and the WebSocket thread.
    pub fn start(&self, port: u16) {
        let Some((mut tx, rx)) = self.spawn_pipeline() else {
            return;
        };

        let connector = WsConnector::new(self.endpoint.clone(), self.subscriptions.clone());
        *self.connector.lock() = Some(Arc::clone(&connector));

        let shared = Arc::clone(&self.shared);
        let name = format!("{}-{}-ws", self.shared.venue, self.shared.canonical);
        let handle = thread::Builder::new().name(name).spawn(move || {
            // run() logs its own failure; the feed just notes the exit.
            let _ = connector.run(port, |raw| shared.enqueue(&mut tx, &rx, raw));
            info!(venue = %shared.venue, symbol = %shared.canonical, "ws thread exited");
        });
        match handle {
            Ok(handle) => self.threads.lock().push(handle),
            Err(err) => {
                warn!(venue = %self.shared.venue, %err, "failed to spawn ws thread");
            }
        }
    }

    /// Start only the parse/apply pipeline and return an injector for raw
    /// frames. This is the out-of-band entry used for REST-sourced resync
    /// snapshots, and it is how tests drive the pipeline without sockets.
    pub fn start_offline(&self) -> Option<FrameInjector> {
        let (tx, rx) = self.spawn_pipeline()?;
        Some(FrameInjector {
            shared: Arc::clone(&self.shared),
            tx,
            rx,
        })
    }

    /// Whether the `SignalResync` policy has flagged a full ring since the
    /// last [`clear_resync`](Self::clear_resync).
    pub fn resync_requested(&self) -> bool {
        self.shared.resync.load(Ordering::Acquire)
    }

    /// Acknowledge a resync request.
    pub fn clear_resync(&self) {
        self.shared.resync.store(false, Ordering::Release);
    }

    /// Ring-full outcome counters.
    pub fn stats(&self) -> &FeedStats {
        &self.shared.stats
    }

    fn stop_inner(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(connector) = self.connector.lock().take() {
            connector.stop();
        }
        let handles: Vec<_> = self.threads.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
    }
}

impl<P> MarketFeed for VenueFeed<P>
where
    P: BookParser + Default + Send + 'static,
{
    fn start(&self, port: u16) {
        VenueFeed::start(self, port);
    }

    fn stop(&self) {
        self.stop_inner();
    }

    fn venue(&self) -> &str {
        &self.shared.venue
    }

    fn canonical(&self) -> &str {
        &self.shared.canonical
    }

    fn book(&self) -> &Book {
        &self.shared.book
    }

    fn load_top(&self) -> Arc<TopSnapshot> {
        self.shared.top.load_full()
    }
}

impl<P> std::fmt::Debug for VenueFeed<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VenueFeed")
            .field("venue", &self.shared.venue)
            .field("canonical", &self.shared.canonical)
            .field("running", &self.shared.running.load(Ordering::Relaxed))
            .finish()
    }
}

/// Producer-side handle into a feed started with
/// [`VenueFeed::start_offline`]. Frames pushed here travel the same
/// ring -> parser -> book -> publish path as WebSocket frames, including
/// the backpressure policy.
pub struct FrameInjector {
    shared: Arc<FeedShared>,
    tx: Producer<String>,
    rx: Arc<Mutex<Consumer<String>>>,
}

impl FrameInjector {
    /// Enqueue one raw frame.
    pub fn push(&mut self, raw: &str) {
        self.shared.enqueue(&mut self.tx, &self.rx, raw);
    }
}

impl std::fmt::Debug for FrameInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameInjector")
            .field("venue", &self.shared.venue)
            .finish()
    }
}
