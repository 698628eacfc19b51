//! Custom [axum::extract] Extractors.

pub mod auth;
pub mod bearer_addon;
pub mod json;
