//! Process-wide timestamp source.
//!
//! Timestamps are nanoseconds since the Unix epoch. The wall clock is read
//! once, on first use, and every later reading adds the monotonic time
//! elapsed since then. Readings never go backwards within a process and
//! carry the resolution of [`Instant`], while staying comparable with
//! timestamps produced by another process on a clock-synchronised host.

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

struct Anchor {
    epoch_nanos: i64,
    instant: Instant,
}

static ANCHOR: OnceLock<Anchor> = OnceLock::new();

fn anchor() -> &'static Anchor {
    ANCHOR.get_or_init(|| {
        let epoch_nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
            .unwrap_or_default();
        Anchor {
            epoch_nanos,
            instant: Instant::now(),
        }
    })
}

/// Returns the current timestamp in nanoseconds since the Unix epoch.
#[inline]
#[must_use]
pub fn now_nanos() -> i64 {
    let anchor = anchor();
    let elapsed = i64::try_from(anchor.instant.elapsed().as_nanos()).unwrap_or(i64::MAX);
    anchor.epoch_nanos.saturating_add(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_monotonic() {
        let mut last = now_nanos();
        for _ in 0..10_000 {
            let now = now_nanos();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_now_is_wall_aligned() {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos() as i64;
        let ours = now_nanos();
        // Within a second of the wall clock.
        assert!((ours - wall).abs() < 1_000_000_000);
    }
}
