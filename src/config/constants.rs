//! Default tuning values
//!
//! This module centralizes the constants used by [`CacheConfig`](super::CacheConfig)
//! so the defaults are discoverable in one place.

use std::time::Duration;

/// Quiet window that coalesces bursts of range updates (e.g. scroll events).
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Largest number of items requested from the source in one query.
pub const DEFAULT_MAX_REQUEST_LEN: usize = 500;

/// Buffered cache events per subscriber before a slow subscriber lags.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce_is_tens_of_milliseconds() {
        assert!(DEFAULT_DEBOUNCE >= Duration::from_millis(10));
        assert!(DEFAULT_DEBOUNCE < Duration::from_millis(100));
    }

    #[test]
    fn test_limits_are_positive() {
        assert!(DEFAULT_MAX_REQUEST_LEN > 0);
        assert!(DEFAULT_EVENT_CAPACITY > 0);
    }
}
