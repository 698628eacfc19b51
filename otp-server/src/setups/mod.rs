//! This abstracts otp server side-effects into "setups".
//!
//! This module defines the traits, submodules define test, local & production
//! collections of implementations.
use crate::models::{
    otp_session::{NewOtpSession, OtpSession, OtpStatus, SweepReport},
    profile::Profile,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod local;
pub mod memory;
pub mod prod;

/// This trait groups type parameters to the server's `AppState` struct.
///
/// It captures the setup of the server, distinguishing between e.g.
/// unit testing & production setups.
pub trait ServerSetup: Clone + Send + Sync + 'static {
    /// Where OTP sessions and profiles are stored
    type OtpStore: OtpStore;
    /// Which implementation to use to send verification codes
    type VerificationCodeSender: VerificationCodeSender;
}

/// Storage for OTP sessions and profiles.
///
/// Every status change is a compare-and-set away from
/// [OtpStatus::Pending], so a session is verified at most once no matter how
/// many requests race for it.
#[async_trait]
pub trait OtpStore: Clone + Send + Sync + 'static {
    /// Persist a new pending session. Older pending sessions for the same
    /// identity are expired atomically with the insert.
    async fn insert_pending(&self, session: NewOtpSession) -> Result<OtpSession>;

    /// The most recently issued pending session for `identity`.
    async fn latest_pending(&self, identity: &str) -> Result<Option<OtpSession>>;

    /// The most recently issued session for `identity`, whatever its status.
    async fn latest(&self, identity: &str) -> Result<Option<OtpSession>>;

    /// Move session `id` from pending to `to`.
    /// Returns `false` if it wasn't pending anymore.
    async fn transition(&self, id: i32, to: OtpStatus, now: DateTime<Utc>) -> Result<bool>;

    /// Count a failed verification against session `id`, returning the new total.
    async fn record_failed_attempt(&self, id: i32) -> Result<i32>;

    /// Expire pending sessions past their deadline and delete settled
    /// sessions last updated before `cutoff`.
    async fn sweep(&self, now: DateTime<Utc>, cutoff: DateTime<Utc>) -> Result<SweepReport>;

    /// Create the profile for `identity` or refresh its last login.
    async fn upsert_profile(&self, identity: &str, last_login: DateTime<Utc>) -> Result<Profile>;

    /// Look up the profile for `identity`.
    async fn find_profile(&self, identity: &str) -> Result<Option<Profile>>;

    /// Report whether the backing storage is reachable.
    async fn health(&self) -> StoreHealth;
}

/// Storage health as reported by [OtpStore::health]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHealth {
    /// Whether the storage answered
    pub connected: bool,
    /// Whether all schema migrations are applied. `None` when not applicable.
    pub up_to_date: Option<bool>,
}

/// The service that sends verification codes
#[async_trait]
pub trait VerificationCodeSender: Clone + Send + Sync + 'static {
    /// Send the code associated with the email
    async fn send_code(&self, email: &str, code: &str) -> Result<()>;
}
