//! Prometheus metrics for the storefront.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `storefront_cart_items_added_total` - Units added to carts
//! - `storefront_orders_placed_total` - Orders placed
//! - `storefront_orders_cancelled_total` - Orders cancelled
//! - `storefront_order_revenue_cents_total` - Revenue of placed orders in cents
//! - `storefront_cache_hits_total` / `storefront_cache_misses_total` - Cache lookups
//! - `storefront_cache_errors_total` - Cache backend or codec failures
//! - `storefront_audit_events_dropped_total` - Events the audit queue could not accept
//!
//! # Example
//!
//! ```rust,no_run
//! use storefront_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Start metrics server on port 9090
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::counter;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to bind to (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the global recorder and spawn the HTTP listener.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or a recorder is already
    /// installed by someone else.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;
        let handle = recorder.handle();

        match metrics::set_global_recorder(recorder) {
            Ok(()) => {
                tokio::spawn(async move {
                    if exporter.await.is_err() {
                        tracing::error!("Metrics exporter stopped");
                    }
                });
                self.handle = Some(handle);
                tracing::info!(
                    addr = %self.addr,
                    "Metrics server started - available at http://{}/metrics",
                    self.addr
                );
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already") {
                    // Several servers in one test process share the first recorder
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if server hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    // Cart
    describe_counter!(
        "storefront_cart_items_added_total",
        "Total number of units added to carts"
    );

    // Orders
    describe_counter!(
        "storefront_orders_placed_total",
        "Total number of orders placed"
    );
    describe_counter!(
        "storefront_orders_cancelled_total",
        "Total number of orders cancelled"
    );
    describe_counter!(
        "storefront_order_revenue_cents_total",
        "Total value of placed orders in cents"
    );

    // Cache
    describe_counter!(
        "storefront_cache_hits_total",
        "Total number of cache hits"
    );
    describe_counter!(
        "storefront_cache_misses_total",
        "Total number of cache misses"
    );
    describe_counter!(
        "storefront_cache_errors_total",
        "Total number of cache backend or serialization errors"
    );

    // Audit
    describe_counter!(
        "storefront_audit_events_dropped_total",
        "Total number of domain events dropped by the audit queue"
    );
}

/// Cart metrics recorder.
pub struct CartMetrics;

impl CartMetrics {
    /// Record units added to a cart.
    pub fn record_added(quantity: u32) {
        counter!("storefront_cart_items_added_total").increment(u64::from(quantity));
    }
}

/// Order metrics recorder.
pub struct OrderMetrics;

impl OrderMetrics {
    /// Record a placed order and its value.
    pub fn record_placed(total_cents: i64) {
        counter!("storefront_orders_placed_total").increment(1);
        counter!("storefront_order_revenue_cents_total")
            .increment(u64::try_from(total_cents).unwrap_or(0));
    }

    /// Record a cancellation.
    pub fn record_cancelled() {
        counter!("storefront_orders_cancelled_total").increment(1);
    }
}

/// Cache metrics recorder.
pub struct CacheMetrics;

impl CacheMetrics {
    /// Record a hit.
    pub fn record_hit() {
        counter!("storefront_cache_hits_total").increment(1);
    }

    /// Record a miss.
    pub fn record_miss() {
        counter!("storefront_cache_misses_total").increment(1);
    }

    /// Record a backend or codec failure.
    pub fn record_error(operation: &'static str) {
        counter!("storefront_cache_errors_total", "operation" => operation).increment(1);
    }
}

/// Audit metrics recorder.
pub struct AuditMetrics;

impl AuditMetrics {
    /// Record an event the queue could not accept.
    pub fn record_dropped(reason: &'static str) {
        counter!("storefront_audit_events_dropped_total", "reason" => reason).increment(1);
    }
}
