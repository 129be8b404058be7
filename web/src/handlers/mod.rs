//! HTTP request handlers.
//!
//! This module contains all HTTP handlers organized by domain.

pub mod admin;
pub mod cart;
pub mod catalog;
pub mod health;
pub mod orders;
pub mod wishlist;

pub use health::{health_check, readiness_check};
