//! Timestamp helpers shared by the pipeline.
//!
//! Snapshots carry two timestamps: a monotonic `ts_ns` used for staleness
//! arithmetic (immune to wall-clock jumps) and a wall-clock `ts_ms` shown to
//! clients. The monotonic value is nanoseconds since a process-wide anchor;
//! zero is reserved for "never published".

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

fn anchor() -> Instant {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    *ANCHOR.get_or_init(Instant::now)
}

/// Monotonic nanoseconds since the process-wide anchor. Always >= 1.
pub fn monotonic_ns() -> i64 {
    let ns = anchor().elapsed().as_nanos().min(i64::MAX as u128) as i64;
    ns.max(1)
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn wall_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_is_positive_and_increasing() {
        let a = monotonic_ns();
        let b = monotonic_ns();
        assert!(a >= 1);
        assert!(b >= a);
    }

    #[test]
    fn test_wall_ms_is_recent() {
        // Any date past 2020 proves the epoch math isn't off by a unit.
        assert!(wall_ms() > 1_577_836_800_000);
    }
}
