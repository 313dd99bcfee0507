//! Feed lifecycle configuration.
//!
//! [`FeedOptions`] controls the feed manager's hot set and idle sweep. It
//! can be built programmatically or loaded from the environment:
//!
//! - `FEED_HOT_PAIRS` - comma-separated canonical symbols to pin hot
//! - `FEED_IDLE_SECONDS` - idle timeout before a cold pair is swept (180)
//! - `FEED_SWEEP_SECONDS` - sweep scan interval (15)
//! - `FEED_PREWARM_ALL` - subscribe and pin every supported pair (false)
//!
//! Unrecognized or invalid values fall back to the defaults.

use std::time::Duration;

/// Default idle timeout before a non-pinned pair is torn down
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(180);

/// Default interval between sweeper scans
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(15);

/// Options for the feed manager
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use crossbook::config::FeedOptions;
///
/// let opts = FeedOptions::new()
///     .with_hot_pairs(["BTC-USD"])
///     .with_idle_timeout(Duration::from_secs(60));
/// assert_eq!(opts.hot_pairs, vec!["BTC-USD".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct FeedOptions {
    /// How long a non-pinned pair may go unaccessed before the sweeper
    /// stops its feeds. Zero disables sweeping.
    pub idle_timeout: Duration,
    /// How often the sweeper scans. Zero disables sweeping.
    pub sweep_interval: Duration,
    /// Canonical pairs pinned hot (never swept)
    pub hot_pairs: Vec<String>,
    /// Subscribe and pin every supported pair at startup
    pub prewarm_all: bool,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            hot_pairs: Vec::new(),
            prewarm_all: false,
        }
    }
}

impl FeedOptions {
    /// Create options with the defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the idle timeout
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the sweep interval
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the hot pair list
    #[must_use]
    pub fn with_hot_pairs<I, S>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hot_pairs = pairs.into_iter().map(Into::into).collect();
        self
    }

    /// Set whether every supported pair is prewarmed and pinned
    #[must_use]
    pub fn with_prewarm_all(mut self, prewarm: bool) -> Self {
        self.prewarm_all = prewarm;
        self
    }

    /// Load options from `FEED_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load options from an arbitrary key lookup (the environment in
    /// production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut opts = Self::default();

        if let Some(raw) = lookup("FEED_HOT_PAIRS") {
            opts.hot_pairs = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(secs) = lookup("FEED_IDLE_SECONDS").and_then(|v| parse_positive_secs(&v)) {
            opts.idle_timeout = secs;
        }
        if let Some(secs) = lookup("FEED_SWEEP_SECONDS").and_then(|v| parse_positive_secs(&v)) {
            opts.sweep_interval = secs;
        }
        if let Some(raw) = lookup("FEED_PREWARM_ALL") {
            if let Some(flag) = parse_bool(&raw) {
                opts.prewarm_all = flag;
            }
        }

        opts
    }
}

fn parse_positive_secs(raw: &str) -> Option<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
