//! # Storefront Runtime
//!
//! Services that coordinate the storefront's stores, cache and audit trail.
//!
//! ## Core Components
//!
//! - **Environment**: the injected dependencies every service shares
//! - **Services**: cart, orders, catalog, wishlist and dashboard operations
//! - **Cache**: tag-aware `remember`/`flush` over any [`CacheBackend`]
//! - **Audit**: a bounded queue that hands domain events to observers
//!
//! ## Example
//!
//! ```ignore
//! use storefront_runtime::{Environment, services::CartService};
//!
//! let env = Environment::new(store, cache, audit, clock, settings);
//! let cart = CartService::new(env.clone());
//!
//! cart.add_item(user_id, product_id, 2).await?;
//! let count = cart.count(user_id).await?;
//! ```
//!
//! [`CacheBackend`]: storefront_core::cache::CacheBackend

use std::sync::Arc;
use storefront_core::environment::Clock;
use storefront_core::event::EventPublisher;
use storefront_core::store::Storefront;

/// Best-effort audit trail
pub mod audit;

/// Tag-aware caching and the in-process backend
pub mod cache;

/// Prometheus metrics for observability
pub mod metrics;

/// Storefront services
pub mod services;

/// Store-wide settings
pub mod settings;

pub use audit::{AuditLogObserver, AuditQueue};
pub use cache::{CacheService, MemoryCache};
pub use settings::StoreSettings;

/// Dependencies shared by every service.
///
/// Cloning is cheap; every field is reference counted.
#[derive(Clone)]
pub struct Environment {
    /// Persistent storage
    pub store: Arc<dyn Storefront>,
    /// Cache front
    pub cache: CacheService,
    /// Domain event sink
    pub events: Arc<dyn EventPublisher>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Store settings, loaded once
    pub settings: Arc<StoreSettings>,
}

impl Environment {
    /// Bundle the dependencies.
    #[must_use]
    pub fn new(
        store: Arc<dyn Storefront>,
        cache: CacheService,
        events: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        settings: Arc<StoreSettings>,
    ) -> Self {
        Self {
            store,
            cache,
            events,
            clock,
            settings,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use storefront_testing::{FixedClock, InMemoryStorefront, RecordingPublisher, test_clock};

    /// Services over in-memory parts the test can inspect.
    pub(crate) struct Harness {
        pub store: InMemoryStorefront,
        pub cache: MemoryCache,
        pub events: RecordingPublisher,
        pub clock: FixedClock,
        pub settings: StoreSettings,
    }

    impl Harness {
        pub(crate) fn new() -> Self {
            storefront_testing::helpers::init_tracing();
            let clock = test_clock();
            Self {
                store: InMemoryStorefront::new(),
                cache: MemoryCache::new(Arc::new(clock.clone())),
                events: RecordingPublisher::new(),
                clock,
                settings: StoreSettings::default(),
            }
        }

        pub(crate) fn env(&self) -> Environment {
            Environment::new(
                Arc::new(self.store.clone()),
                CacheService::new(Arc::new(self.cache.clone())),
                Arc::new(self.events.clone()),
                Arc::new(self.clock.clone()),
                Arc::new(self.settings.clone()),
            )
        }
    }
}
