//! Eviction Policy - When a Dynamic Metric May Be Dropped
//!
//! A dynamic metric becomes eligible once it has been idle for longer
//! than the TTL. Realtime metrics additionally wait until the unit of
//! work they track is completed, so a scrape mid-work still sees live
//! data; historical metrics age out on idle time alone.

use std::time::Duration;

/// Decide whether an entry should be evicted.
///
/// A zero `ttl` disables eviction entirely.
pub fn is_evictable(realtime: bool, completed: bool, idle: Duration, ttl: Duration) -> bool {
    if ttl.is_zero() || idle <= ttl {
        return false;
    }

    match (realtime, completed) {
        (true, true) => true,
        (true, false) => false,
        (false, _) => true,
    }
}
