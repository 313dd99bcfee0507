//! Pair lifecycle across all supported trading pairs.
//!
//! The manager owns one [`MasterFeed`] entry per live pair. Pairs come up
//! on demand (`get_or_subscribe`), hot pairs are pinned and pre-warmed, and
//! a background sweeper tears down non-pinned pairs that nobody has asked
//! about for a while. Teardown always happens outside the entries mutex so
//! request handlers are never blocked by a slow WebSocket close.

use std::sync::{Arc, Weak};
use std::thread;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{info, warn};

use crate::config::FeedOptions;
use crate::feed::{MarketFeed, MasterFeed};
use crate::venues::{VenueApi, VenueFactory};

/// Default WebSocket port used when subscribing venue feeds
const WS_PORT: u16 = 443;

/// One venue as the manager sees it: its capability set plus the API
/// object used for support checks.
pub struct VenueRuntime {
    /// Venue id
    pub name: String,
    /// Capability set (feed construction, symbol rule)
    pub factory: VenueFactory,
    /// Support-check API
    pub api: Box<dyn VenueApi>,
}

impl VenueRuntime {
    /// Build a runtime from a factory, constructing its API object.
    pub fn from_factory(factory: VenueFactory) -> Self {
        let api = (factory.make_api)();
        Self {
            name: factory.name.clone(),
            factory,
            api,
        }
    }
}

impl std::fmt::Debug for VenueRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VenueRuntime").field("name", &self.name).finish()
    }
}

/// The venue feeds backing one symbol, handed to the order router.
#[derive(Clone)]
pub struct RoutingInputs {
    /// Feeds whose books the router walks
    pub feeds: Vec<Arc<dyn MarketFeed>>,
}

impl std::fmt::Debug for RoutingInputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingInputs")
            .field("feeds", &self.feeds.len())
            .finish()
    }
}

struct Entry {
    symbol: String,
    ui: Arc<MasterFeed>,
    feeds: Vec<Arc<dyn MarketFeed>>,
    last_access: Instant,
    pinned: bool,
}

/// Signal shared with the sweeper thread; `true` means "shut down".
type StopSignal = Arc<(Mutex<bool>, Condvar)>;

/// Pair lifecycle manager.
///
/// Created with [`new`](Self::new), which returns an `Arc` because the
/// background sweeper holds a weak handle to the manager.
pub struct FeedManager {
    venues: Vec<VenueRuntime>,
    support_index: FxHashMap<String, Vec<usize>>,
    supported_pairs: Vec<String>,
    hot_pairs: Mutex<FxHashSet<String>>,
    opts: FeedOptions,
    entries: Mutex<FxHashMap<String, Entry>>,
    stop_signal: StopSignal,
    sweeper: Mutex<Option<thread::JoinHandle<()>>>,
}

impl FeedManager {
    /// Build the manager: index pair support across venues, resolve the
    /// hot set, and start the sweeper when both timeouts are positive.
    pub fn new(
        venues: Vec<VenueRuntime>,
        canonical_pairs: Vec<String>,
        opts: FeedOptions,
    ) -> Arc<Self> {
        let mut support_index: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        let mut supported_pairs = Vec::new();
        for pair in &canonical_pairs {
            let supporting: Vec<usize> = venues
                .iter()
                .enumerate()
                .filter(|(_, v)| v.api.supports_pair(pair))
                .map(|(i, _)| i)
                .collect();
            if !supporting.is_empty() {
                support_index.insert(pair.clone(), supporting);
                supported_pairs.push(pair.clone());
            }
        }

        let mut hot_pairs = FxHashSet::default();
        for pair in &opts.hot_pairs {
            if support_index.contains_key(pair) {
                hot_pairs.insert(pair.clone());
            } else {
                warn!(pair = %pair, "requested hot pair is not supported; ignoring");
            }
        }
        if opts.prewarm_all {
            hot_pairs.extend(supported_pairs.iter().cloned());
        }

        let manager = Arc::new(Self {
            venues,
            support_index,
            supported_pairs,
            hot_pairs: Mutex::new(hot_pairs),
            opts,
            entries: Mutex::new(FxHashMap::default()),
            stop_signal: Arc::new((Mutex::new(false), Condvar::new())),
            sweeper: Mutex::new(None),
        });

        if manager.can_sweep() {
            let weak = Arc::downgrade(&manager);
            let signal = Arc::clone(&manager.stop_signal);
            let interval = manager.opts.sweep_interval;
            let handle = thread::Builder::new()
                .name("feed-sweeper".to_string())
                .spawn(move || sweep_loop(weak, signal, interval));
            match handle {
                Ok(handle) => *manager.sweeper.lock() = Some(handle),
                Err(err) => warn!(%err, "failed to spawn sweeper thread"),
            }
        }

        manager
    }

    fn can_sweep(&self) -> bool {
        !self.opts.idle_timeout.is_zero() && !self.opts.sweep_interval.is_zero()
    }

    /// Canonical pairs with at least one supporting venue.
    pub fn list_supported_pairs(&self) -> Vec<String> {
        self.supported_pairs.clone()
    }

    /// Return the pair's master feed, subscribing its venue feeds first if
    /// the pair is not live yet. `None` when no venue supports the pair or
    /// every supporting venue failed to produce a feed.
    pub fn get_or_subscribe(&self, symbol: &str) -> Option<Arc<MasterFeed>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get_mut(symbol) {
            entry.last_access = now;
            if self.hot_pairs.lock().contains(symbol) {
                entry.pinned = true;
            }
            return Some(Arc::clone(&entry.ui));
        }

        let supporting = self.support_index.get(symbol)?;
        if supporting.is_empty() {
            return None;
        }

        let ui = Arc::new(MasterFeed::new(symbol));
        let pinned = self.hot_pairs.lock().contains(symbol);
        let mut feeds: Vec<Arc<dyn MarketFeed>> = Vec::with_capacity(supporting.len());

        for &idx in supporting {
            let Some(venue) = self.venues.get(idx) else {
                continue;
            };
            let feed = (venue.factory.make_feed)(symbol);
            feed.start(WS_PORT);
            ui.add_feed(Arc::clone(&feed));
            feeds.push(feed);
        }

        if feeds.is_empty() {
            warn!(symbol = %symbol, "no venue produced a feed");
            return None;
        }

        if pinned {
            info!(symbol = %symbol, venues = feeds.len(), "pre-warmed pair subscribed");
        } else {
            info!(symbol = %symbol, venues = feeds.len(), "on-demand pair subscribed");
        }

        let entry = Entry {
            symbol: symbol.to_string(),
            ui: Arc::clone(&ui),
            feeds,
            last_access: now,
            pinned,
        };
        entries.insert(symbol.to_string(), entry);
        Some(ui)
    }

    /// Subscribe every hot pair.
    pub fn start_hot(&self) {
        let hot: Vec<String> = self.hot_pairs.lock().iter().cloned().collect();
        for pair in hot {
            let _ = self.get_or_subscribe(&pair);
        }
    }

    /// Pin and subscribe every supported pair.
    pub fn start_all_supported(&self) {
        let mut all = self.supported_pairs.clone();
        all.sort();
        for pair in all {
            self.hot_pairs.lock().insert(pair.clone());
            let _ = self.get_or_subscribe(&pair);
        }
    }

    /// The venue feeds backing an active pair, for the order router.
    /// `None` when the pair is unsupported or has no live entry.
    pub fn acquire_routing_inputs(&self, symbol: &str) -> Option<RoutingInputs> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(symbol)?;
        entry.last_access = Instant::now();
        Some(RoutingInputs {
            feeds: entry.feeds.clone(),
        })
    }

    /// Stop the sweeper and every live feed. Safe to call repeatedly.
    pub fn shutdown(&self) {
        {
            let (lock, cv) = &*self.stop_signal;
            let mut stopped = lock.lock();
            *stopped = true;
            cv.notify_all();
        }
        if let Some(handle) = self.sweeper.lock().take() {
            let _ = handle.join();
        }

        let drained: Vec<Entry> = {
            let mut entries = self.entries.lock();
            entries.drain().map(|(_, entry)| entry).collect()
        };
        for entry in drained {
            for feed in &entry.feeds {
                feed.stop();
            }
            info!(symbol = %entry.symbol, "pair stopped at shutdown");
        }
    }
}

impl Drop for FeedManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for FeedManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedManager")
            .field("venues", &self.venues.len())
            .field("supported_pairs", &self.supported_pairs.len())
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}

/// Sweeper: every `interval`, drop non-pinned entries idle past the
/// timeout. Classification happens under the mutex; feed teardown happens
/// after it is released.
fn sweep_loop(manager: Weak<FeedManager>, signal: StopSignal, interval: std::time::Duration) {
    loop {
        {
            let (lock, cv) = &*signal;
            let mut stopped = lock.lock();
            if !*stopped {
                cv.wait_for(&mut stopped, interval);
            }
            if *stopped {
                return;
            }
        }

        let Some(manager) = manager.upgrade() else {
            return;
        };
        let now = Instant::now();
        let idle_timeout = manager.opts.idle_timeout;

        let expired: Vec<Entry> = {
            let mut entries = manager.entries.lock();
            let victims: Vec<String> = entries
                .iter()
                .filter(|(_, e)| !e.pinned && now.duration_since(e.last_access) > idle_timeout)
                .map(|(symbol, _)| symbol.clone())
                .collect();
            victims
                .into_iter()
                .filter_map(|symbol| entries.remove(&symbol))
                .collect()
        };

        for entry in expired {
            let idle_for = now.duration_since(entry.last_access);
            info!(
                symbol = %entry.symbol,
                idle_secs = idle_for.as_secs(),
                "idle pair swept"
            );
            for feed in &entry.feeds {
                feed.stop();
            }
        }
    }
}
