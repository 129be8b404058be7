//! Error types for web handlers.
//!
//! [`AppError`] bridges domain errors and HTTP responses. Domain and validation
//! failures keep their message; storage failures are logged and answered with
//! a generic message.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;
use storefront_core::cart::CartError;
use storefront_core::catalog::CatalogError;
use storefront_core::checkout::CheckoutError;
use storefront_core::order::OrderError;
use storefront_core::store::StoreError;
use storefront_core::wishlist::WishlistError;

/// Application error type for web handlers.
///
/// Implements Axum's `IntoResponse`, rendering `{code, message}` as JSON.
///
/// # Examples
///
/// ```ignore
/// async fn handler(State(state): State<AppState>) -> Result<Json<Order>, AppError> {
///     let order = state.orders.order(id).await?;
///     Ok(Json(order))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: &'static str,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Attach the underlying error for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message, "UNAUTHORIZED")
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, "NOT_FOUND")
    }

    /// Create a 409 Conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message, "CONFLICT")
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message, "VALIDATION_ERROR")
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, "INTERNAL_SERVER_ERROR")
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message, "SERVICE_UNAVAILABLE")
    }

    /// HTTP status this error renders with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// User-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: &'static str,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    error = %source,
                    "Internal server error"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    "Internal server error"
                ),
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::UNPROCESSABLE_ENTITY {
            Self::validation(rejection.body_text())
        } else {
            Self::bad_request(rejection.body_text())
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::not_found(err.to_string()),
            StoreError::EmptyCart => Self::bad_request(err.to_string()),
            StoreError::InsufficientStock { .. }
            | StoreError::CartChanged
            | StoreError::InvalidTransition { .. }
            | StoreError::InvalidPaymentTransition { .. }
            | StoreError::Conflict(_) => Self::conflict(err.to_string()),
            StoreError::Database(_) => {
                Self::internal("An internal error occurred").with_source(err.into())
            }
        }
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::Store(e) => e.into(),
            CartError::InvalidQuantity { .. } => Self::validation(err.to_string()),
            CartError::ProductNotAvailable { .. } => Self::conflict(err.to_string()),
            CartError::ProductNotFound(_) | CartError::ItemNotFound(_) => {
                Self::not_found(err.to_string())
            }
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Store(e) => e.into(),
            CheckoutError::EmptyCart | CheckoutError::InvalidCoupon(_) => {
                Self::bad_request(err.to_string())
            }
            CheckoutError::InvalidShippingData(_) => Self::validation(err.to_string()),
            CheckoutError::ProductNotAvailable { .. } | CheckoutError::CartChanged => {
                Self::conflict(err.to_string())
            }
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Store(e) => e.into(),
            OrderError::NotFound(_) => Self::not_found(err.to_string()),
            OrderError::InvalidTransition { .. } | OrderError::InvalidPaymentTransition { .. } => {
                Self::conflict(err.to_string())
            }
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Store(e) => e.into(),
            CatalogError::ProductNotFound(_) => Self::not_found(err.to_string()),
            CatalogError::ProductReferenced(_) => Self::conflict(err.to_string()),
        }
    }
}

impl From<WishlistError> for AppError {
    fn from(err: WishlistError) -> Self {
        match err {
            WishlistError::Store(e) => e.into(),
            WishlistError::ProductNotFound(_) => Self::not_found(err.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use storefront_core::order::OrderStatus;
    use storefront_core::{OrderId, ProductId};

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn test_database_errors_hide_details() {
        let err: AppError = StoreError::Database("connection refused".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "An internal error occurred");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_domain_errors_keep_their_message() {
        let err: AppError = CartError::InvalidQuantity { quantity: 0 }.into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.message().contains("between 1 and 99"));

        let err: AppError = CatalogError::ProductReferenced(ProductId::new()).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: AppError = OrderError::InvalidTransition {
            from: OrderStatus::Shipped,
            to: OrderStatus::Cancelled,
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_not_found_variants() {
        let err: AppError = OrderError::NotFound(OrderId::new()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: AppError = CartError::Store(StoreError::not_found("product", "x")).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_body_is_code_and_message() {
        let response = AppError::conflict("busy").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({"code": "CONFLICT", "message": "busy"}));
    }
}
