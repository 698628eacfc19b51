#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_debug_implementations, missing_docs, rust_2018_idioms)]
#![deny(unreachable_pub)]

//! otp-server

pub mod app_state;
pub mod cookie;
pub mod db;
pub mod docs;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod otp;
pub mod router;
pub mod routes;
pub mod settings;
pub mod setups;
pub mod token;

#[cfg(test)]
mod test_utils;
