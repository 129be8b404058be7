//! Store-wide settings.
//!
//! Settings are read once at startup from a JSON document merged over the
//! defaults below and then shared by `Arc`. Missing keys take their default;
//! a missing file means all defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use storefront_core::Money;
use storefront_core::checkout::ShippingRates;
use thiserror::Error;

/// Errors loading the settings document.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// File exists but could not be read
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid JSON for [`StoreSettings`]
    #[error("Invalid settings file {path}: {source}")]
    Parse {
        /// File path
        path: String,
        /// Underlying error
        source: serde_json::Error,
    },

    /// A value is out of range
    #[error("Invalid setting {key}: {reason}")]
    Invalid {
        /// Setting name
        key: &'static str,
        /// What is wrong
        reason: &'static str,
    },
}

/// Storefront settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Shop name shown to customers
    pub store_name: String,
    /// Contact address
    pub store_email: Option<String>,
    /// ISO currency code of every amount
    pub currency: String,
    /// Flat shipping fee in cents
    pub shipping_base_fee_cents: i64,
    /// Shipping fee per started kilogram in cents
    pub shipping_per_kg_cents: i64,
    /// Lifetime of dashboard aggregates in seconds
    pub dashboard_cache_ttl_secs: u64,
    /// Lifetime of catalog listings in seconds
    pub catalog_cache_ttl_secs: u64,
    /// Lifetime of cached cart counts in seconds
    pub cart_count_cache_ttl_secs: u64,
    /// Rows in the dashboard's recent orders table
    pub recent_orders_limit: u32,
    /// Rows in the dashboard's low stock table
    pub low_stock_limit: u32,
    /// Days in the dashboard revenue chart
    pub revenue_window_days: u32,
    /// Events the audit queue buffers before dropping
    pub audit_queue_capacity: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            store_name: "Storefront".to_string(),
            store_email: None,
            currency: "BRL".to_string(),
            shipping_base_fee_cents: 1_500,
            shipping_per_kg_cents: 250,
            dashboard_cache_ttl_secs: 300,
            catalog_cache_ttl_secs: 600,
            cart_count_cache_ttl_secs: 3_600,
            recent_orders_limit: 10,
            low_stock_limit: 10,
            revenue_window_days: 30,
            audit_queue_capacity: 1_024,
        }
    }
}

impl StoreSettings {
    /// Load settings from `path`, falling back to defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if the file cannot be read, is malformed, or
    /// holds out-of-range values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let shown = path.display().to_string();

        let settings = match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_json(&raw).map_err(|source| SettingsError::Parse {
                path: shown.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %shown, "Settings file not found, using defaults");
                Self::default()
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: shown,
                    source,
                });
            }
        };

        settings.validate()?;
        tracing::debug!(path = %shown, store = %settings.store_name, "Settings loaded");
        Ok(settings)
    }

    /// Parse a JSON document, taking defaults for missing keys.
    ///
    /// # Errors
    ///
    /// Returns the JSON error for malformed documents.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// [`SettingsError::Invalid`] naming the first bad key.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.shipping_base_fee_cents < 0 {
            return Err(SettingsError::Invalid {
                key: "shipping_base_fee_cents",
                reason: "must not be negative",
            });
        }
        if self.shipping_per_kg_cents < 0 {
            return Err(SettingsError::Invalid {
                key: "shipping_per_kg_cents",
                reason: "must not be negative",
            });
        }
        if self.revenue_window_days == 0 {
            return Err(SettingsError::Invalid {
                key: "revenue_window_days",
                reason: "must be at least 1",
            });
        }
        if self.audit_queue_capacity == 0 {
            return Err(SettingsError::Invalid {
                key: "audit_queue_capacity",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Shipping price table.
    #[must_use]
    pub const fn shipping_rates(&self) -> ShippingRates {
        ShippingRates {
            base_fee: Money::from_cents(self.shipping_base_fee_cents),
            per_kg_fee: Money::from_cents(self.shipping_per_kg_cents),
        }
    }

    /// Dashboard TTL.
    #[must_use]
    pub const fn dashboard_ttl(&self) -> Duration {
        Duration::from_secs(self.dashboard_cache_ttl_secs)
    }

    /// Catalog TTL.
    #[must_use]
    pub const fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_cache_ttl_secs)
    }

    /// Cart count TTL.
    #[must_use]
    pub const fn cart_count_ttl(&self) -> Duration {
        Duration::from_secs(self.cart_count_cache_ttl_secs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let settings = StoreSettings::from_json(r#"{"store_name":"Loja","shipping_base_fee_cents":990}"#)
            .unwrap();
        assert_eq!(settings.store_name, "Loja");
        assert_eq!(settings.shipping_base_fee_cents, 990);
        assert_eq!(settings.dashboard_cache_ttl_secs, 300);
        assert_eq!(settings.revenue_window_days, 30);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let settings = StoreSettings::from_json(r#"{"maintenance_mode":true}"#).unwrap();
        assert_eq!(settings, StoreSettings::default());
    }

    #[test]
    fn missing_file_means_defaults() {
        let settings = StoreSettings::load("/nonexistent/storefront/settings.json").unwrap();
        assert_eq!(settings, StoreSettings::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("storefront-settings-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        let result = StoreSettings::load(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(
            &result,
            Err(SettingsError::Parse { path: shown, .. }) if *shown == path.display().to_string()
        ));
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let path = std::env::temp_dir().join(format!(
            "storefront-settings-valid-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"store_name":"Loja Azul","low_stock_limit":5}"#).unwrap();
        let settings = StoreSettings::load(&path);
        std::fs::remove_file(&path).ok();

        let settings = settings.unwrap();
        assert_eq!(settings.store_name, "Loja Azul");
        assert_eq!(settings.low_stock_limit, 5);
        assert_eq!(settings.recent_orders_limit, 10);
    }

    #[test]
    fn zero_revenue_window_is_rejected() {
        let settings = StoreSettings {
            revenue_window_days: 0,
            ..StoreSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid { key: "revenue_window_days", .. })
        ));
    }

    #[test]
    fn shipping_rates_come_from_cents() {
        let rates = StoreSettings::default().shipping_rates();
        assert_eq!(rates, ShippingRates::default());
    }
}
