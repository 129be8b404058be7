//! Custom Axum extractors.
//!
//! - [`CurrentUser`]: the shopper identified by the upstream gateway
//! - [`CorrelationId`]: the request's correlation id
//! - [`OptionalJson`]: a JSON body that may be left out entirely
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(user: CurrentUser, correlation_id: CorrelationId) -> String {
//!     format!("{} via {}", user.0, correlation_id.0)
//! }
//! ```

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use axum::{
    Json, async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use storefront_core::UserId;
use uuid::Uuid;

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// User on whose behalf the request runs.
///
/// Authentication happens upstream; the gateway forwards the user id in
/// [`USER_ID_HEADER`]. A missing or malformed header is rejected with 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::unauthorized("Missing X-User-Id header"))?;

        let user_id = raw
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .ok_or_else(|| AppError::unauthorized("Invalid X-User-Id header"))?;

        Ok(Self(UserId::from_uuid(user_id)))
    }
}

/// Correlation ID for request tracing.
///
/// Prefers the id the middleware stored in the request extensions, then the
/// `X-Correlation-ID` header, and generates a new UUID v4 otherwise.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<Uuid>() {
            return Ok(Self(*id));
        }

        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// JSON body that may be omitted.
///
/// An empty body yields `None`. A body that is present but malformed is
/// rejected through [`AppError`], never treated as absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionalJson<T>(pub Option<T>);

#[async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(None));
        }

        let Json(value) = Json::<T>::from_bytes(&bytes)?;
        Ok(Self(Some(value)))
    }
}
