//! Request tracking middleware.
//!
//! Every request runs inside an `http_request` span carrying its correlation
//! id, method, path and (when present) the forwarding user id. The correlation
//! id is taken from `X-Correlation-ID` or generated, stored in the request
//! extensions and echoed in the response.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use storefront_web::middleware::correlation_id_layer;
//!
//! let app = Router::new()
//!     .route("/cart", get(show_cart))
//!     .layer(correlation_id_layer());
//! ```

use crate::extractors::USER_ID_HEADER;
use axum::{extract::Request, http::HeaderValue, response::Response};
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Create the correlation-id layer.
#[must_use]
pub const fn correlation_id_layer() -> CorrelationIdLayer {
    CorrelationIdLayer
}

/// Layer for correlation ID tracking.
#[derive(Clone, Copy, Debug)]
pub struct CorrelationIdLayer;

impl<S> Layer<S> for CorrelationIdLayer {
    type Service = CorrelationIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationIdMiddleware { inner }
    }
}

/// Middleware service for correlation ID tracking.
#[derive(Clone, Debug)]
pub struct CorrelationIdMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for CorrelationIdMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let correlation_id = req
            .headers()
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);
        req.extensions_mut().insert(correlation_id);

        let user_id = req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();

        let span = tracing::info_span!(
            "http_request",
            correlation_id = %correlation_id,
            method = %req.method(),
            path = %req.uri().path(),
            user_id = %user_id,
        );

        let started = Instant::now();
        let fut = self.inner.call(req);

        Box::pin(
            async move {
                let mut response = fut.await?;

                let status = response.status();
                let elapsed_ms = started.elapsed().as_millis();
                if status.is_server_error() {
                    tracing::warn!(status = status.as_u16(), elapsed_ms, "Request failed");
                } else {
                    tracing::debug!(status = status.as_u16(), elapsed_ms, "Request completed");
                }

                if let Ok(header_value) = HeaderValue::from_str(&correlation_id.to_string()) {
                    response
                        .headers_mut()
                        .insert(CORRELATION_ID_HEADER, header_value);
                }

                Ok(response)
            }
            .instrument(span),
        )
    }
}
