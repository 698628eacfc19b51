//! This module contains all the models used in the application.
pub mod otp_session;
pub mod profile;
