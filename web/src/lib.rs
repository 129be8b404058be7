//! Axum HTTP surface for the storefront.
//!
//! Handlers are thin: extract the user and the request body, call one
//! service, and map the result to JSON, a flash redirect, or an [`AppError`].
//!
//! # Request Flow
//!
//! 1. **Correlation id** assigned by [`middleware::correlation_id_layer`]
//! 2. **User** taken from `X-User-Id` by [`extractors::CurrentUser`]
//! 3. **Service call** on the [`AppState`]
//! 4. **Response**: JSON body, or a 303 with a [`flash::Flash`] cookie
//!
//! # Example
//!
//! ```ignore
//! use storefront_web::{AppState, build_router};
//!
//! let app = build_router(AppState::new(&env));
//! axum::serve(listener, app).await?;
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod flash;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use extractors::{CorrelationId, CurrentUser, OptionalJson, USER_ID_HEADER};
pub use flash::{Flash, FlashRedirect};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};
pub use routes::build_router;
pub use state::AppState;
