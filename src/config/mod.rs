//! Configuration for the virtualizing cache
//!
//! This module controls how the cache coalesces range updates, how large a
//! single source query may be, and how many events are buffered per
//! subscriber.
//!
//! # Example: Using defaults
//!
//! ```rust
//! use virtualizing_cache::CacheConfig;
//!
//! // 50ms debounce, 500 items per query, 256 buffered events
//! let config = CacheConfig::default();
//! ```
//!
//! # Example: Custom configuration
//!
//! ```rust
//! use virtualizing_cache::CacheConfigBuilder;
//! use std::time::Duration;
//!
//! let config = CacheConfigBuilder::new()
//!     .debounce(Duration::from_millis(20))
//!     .max_request_len(200)  // Page the source 200 rows at a time
//!     .build();
//! ```
//!
//! # Example: Tests (no debounce)
//!
//! ```rust
//! use virtualizing_cache::CacheConfig;
//!
//! let config = CacheConfig::minimal();
//! assert!(config.debounce.is_zero());
//! ```

use std::time::Duration;

use crate::types::config::MaxRequestLen;

pub mod constants;

/// Configuration for a [`VirtualizingCache`](crate::VirtualizingCache)
///
/// Use [`CacheConfigBuilder`] for a fluent API to construct instances.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Quiet window before a burst of range updates is processed
    /// Default: 50ms
    pub debounce: Duration,

    /// Maximum number of items requested from the source in one query
    /// Default: 500
    pub max_request_len: MaxRequestLen,

    /// Events buffered per subscriber before it lags
    /// Default: 256
    pub event_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            debounce: constants::DEFAULT_DEBOUNCE,
            max_request_len: MaxRequestLen::new(constants::DEFAULT_MAX_REQUEST_LEN),
            event_capacity: constants::DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Create config with no debounce
    ///
    /// Range updates are processed as soon as the cache worker sees them.
    /// Suitable for tests and for hosts that already throttle their viewport
    /// notifications.
    ///
    /// # Example
    ///
    /// ```rust
    /// use virtualizing_cache::CacheConfig;
    ///
    /// let config = CacheConfig::minimal();
    /// assert_eq!(config.max_request_len.as_usize(), 500);
    /// ```
    pub fn minimal() -> Self {
        Self {
            debounce: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Builder for [`CacheConfig`]
///
/// # Example
///
/// ```rust
/// use virtualizing_cache::CacheConfigBuilder;
/// use std::time::Duration;
///
/// let config = CacheConfigBuilder::new()
///     .debounce(Duration::from_millis(30))
///     .event_capacity(1024)
///     .build();
/// ```
#[derive(Debug)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl Default for CacheConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheConfigBuilder {
    /// Create a new builder starting from [`CacheConfig::default`]
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
        }
    }

    /// Start from [`CacheConfig::minimal`]
    pub fn minimal() -> Self {
        Self {
            config: CacheConfig::minimal(),
        }
    }

    /// Set the debounce window for range updates
    ///
    /// # Example
    ///
    /// ```rust
    /// use virtualizing_cache::CacheConfigBuilder;
    /// use std::time::Duration;
    ///
    /// let config = CacheConfigBuilder::new()
    ///     .debounce(Duration::from_millis(100))
    ///     .build();
    /// assert_eq!(config.debounce, Duration::from_millis(100));
    /// ```
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.config.debounce = debounce;
        self
    }

    /// Set the largest number of items fetched per source query
    ///
    /// # Example
    ///
    /// ```rust
    /// use virtualizing_cache::{CacheConfigBuilder, MaxRequestLen};
    ///
    /// let config = CacheConfigBuilder::new()
    ///     .max_request_len(64)
    ///     .build();
    /// assert_eq!(config.max_request_len, MaxRequestLen::new(64));
    /// ```
    pub fn max_request_len(mut self, len: usize) -> Self {
        self.config.max_request_len = MaxRequestLen::new(len);
        self
    }

    /// Set how many events are buffered per subscriber
    ///
    /// A capacity of zero is raised to one.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity.max(1);
        self
    }

    /// Build the final configuration
    pub fn build(self) -> CacheConfig {
        self.config
    }
}
