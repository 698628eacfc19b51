//! Routes for [axum::Router].

pub mod fallback;
pub mod health;
pub mod logout;
pub mod otp;
pub mod ping;
pub mod profile;
