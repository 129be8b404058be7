//! One-shot flash messages carried across a redirect.
//!
//! The message travels in a `flash` cookie holding `level:message`,
//! URL-encoded. Reading it back clears the cookie.

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Cookie name.
pub const FLASH_COOKIE: &str = "flash";

/// Seconds a flash survives if never read.
const FLASH_MAX_AGE: u32 = 60;

/// Severity of a flash message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    /// Operation succeeded
    Success,
    /// Operation was refused
    Error,
}

impl FlashLevel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// A message shown once on the next page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Flash {
    /// Severity
    pub level: FlashLevel,
    /// Text shown to the user
    pub message: String,
}

impl Flash {
    /// Success message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            message: message.into(),
        }
    }

    /// Error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }

    fn encode(&self) -> String {
        urlencoding::encode(&format!("{}:{}", self.level.as_str(), self.message)).into_owned()
    }

    fn decode(raw: &str) -> Option<Self> {
        let decoded = urlencoding::decode(raw).ok()?;
        let (level, message) = decoded.split_once(':')?;
        let level = match level {
            "success" => FlashLevel::Success,
            "error" => FlashLevel::Error,
            _ => return None,
        };
        Some(Self {
            level,
            message: message.to_string(),
        })
    }

    /// Read the flash cookie from request headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == FLASH_COOKIE)
            .and_then(|(_, value)| Self::decode(value))
    }
}

/// `Set-Cookie` value that removes the flash cookie.
#[must_use]
pub fn clear_cookie() -> HeaderValue {
    HeaderValue::from_static("flash=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
}

/// A 303 See Other to `location` carrying `flash`.
#[derive(Debug)]
pub struct FlashRedirect {
    location: String,
    flash: Flash,
}

impl FlashRedirect {
    /// Redirect to `location` with `flash`.
    pub fn to(location: impl Into<String>, flash: Flash) -> Self {
        Self {
            location: location.into(),
            flash,
        }
    }
}

impl IntoResponse for FlashRedirect {
    fn into_response(self) -> Response {
        let cookie = format!(
            "{FLASH_COOKIE}={}; Path=/; Max-Age={FLASH_MAX_AGE}; HttpOnly; SameSite=Lax",
            self.flash.encode()
        );
        let (Ok(location), Ok(cookie)) = (
            HeaderValue::from_str(&self.location),
            HeaderValue::from_str(&cookie),
        ) else {
            tracing::error!(location = %self.location, "Unencodable redirect");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        };

        (
            StatusCode::SEE_OTHER,
            [(header::LOCATION, location), (header::SET_COOKIE, cookie)],
        )
            .into_response()
    }
}
