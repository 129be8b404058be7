//! # Storefront Testing
//!
//! Testing utilities for the storefront crates.
//!
//! This crate provides:
//! - [`InMemoryStorefront`]: every store trait over one lock, so multi-table
//!   operations are as atomic as their SQL counterparts
//! - [`FixedClock`]: deterministic time that tests can move forward
//! - [`RecordingObserver`] / [`RecordingPublisher`]: capture domain events
//! - [`FailingCache`]: a cache backend that always errors
//! - [`fixtures`]: ready-made products, addresses and coupons
//!
//! ## Example
//!
//! ```
//! use storefront_testing::{fixtures, InMemoryStorefront};
//!
//! let store = InMemoryStorefront::new();
//! let category = store.insert_category(fixtures::category("Books"));
//! let product = store.insert_product(fixtures::product(category.id, "Dune", 4_990, 10));
//! assert_eq!(store.stock_of(product.id), Some(10));
//! ```

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, RwLock};
use storefront_core::environment::Clock;

mod cache;
pub mod fixtures;
mod memory;
mod observers;

pub use cache::FailingCache;
pub use memory::InMemoryStorefront;
pub use observers::{RecordingObserver, RecordingPublisher};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Arc, Clock, DateTime, Duration, RwLock, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until moved with [`FixedClock::advance`] or
    /// [`FixedClock::set`]. Clones share the same time.
    ///
    /// # Example
    ///
    /// ```
    /// use storefront_testing::mocks::FixedClock;
    /// use storefront_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// assert_eq!(time1, clock.now());
    /// clock.advance(Duration::seconds(5));
    /// assert_eq!(clock.now() - time1, Duration::seconds(5));
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, by: Duration) {
            if let Ok(mut time) = self.time.write() {
                *time += by;
            }
        }

        /// Jump to a given instant.
        pub fn set(&self, to: DateTime<Utc>) {
            if let Ok(mut time) = self.time.write() {
                *time = to;
            }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time.read().map_or_else(|e| *e.into_inner(), |t| *t)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 12:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T12:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Test helpers and utilities.
pub mod helpers {
    /// Install a test-friendly tracing subscriber once per process.
    ///
    /// Honours `RUST_LOG`; later calls are no-ops.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn clones_share_time() {
        let clock = test_clock();
        let other = clock.clone();
        clock.advance(Duration::minutes(6));
        assert_eq!(other.now(), clock.now());
    }
}
