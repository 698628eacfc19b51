//! Issuing and verifying one-time passcodes

use crate::{
    models::otp_session::{generate_code, NewOtpSession, OtpStatus, SweepReport},
    settings,
    setups::{OtpStore, VerificationCodeSender},
    token::{IssuedToken, TokenService},
};
use chrono::{DateTime, Utc};
use otp_core::common::{OtpSendRequest, OtpVerifyRequest};
use tokio_util::sync::CancellationToken;
use validator::Validate;

mod error;

pub use error::Error;

/// Result of a successful verification
#[derive(Debug, Clone)]
pub struct Verified {
    /// The identity the code was issued to
    pub identity: String,
    /// The session token asserting that identity
    pub token: IssuedToken,
}

/// Generate a code for the requested identity, store it and hand it to the sender.
///
/// Older pending codes for the same identity stop being accepted.
/// A delivery failure leaves the stored session in place and is not retried.
#[tracing::instrument(skip_all, fields(identity = %request.identity))]
pub async fn issue(
    store: &impl OtpStore,
    sender: &impl VerificationCodeSender,
    settings: &settings::Otp,
    request: &OtpSendRequest,
    now: DateTime<Utc>,
) -> Result<(), Error> {
    request.validate()?;

    let code = generate_code();
    let session = NewOtpSession::new(&request.identity, &code, now, settings.code_ttl());

    let session = store
        .insert_pending(session)
        .await
        .map_err(Error::Storage)?;

    tracing::debug!(session_id = session.id, expires_at = %session.expires_at, "Stored otp session");

    sender
        .send_code(&request.identity, &code)
        .await
        .map_err(Error::Delivery)?;

    tracing::info!(session_id = session.id, "Issued one-time passcode");

    Ok(())
}

/// Check a submitted code against the latest pending session of its identity.
///
/// On success the session is consumed, the profile's last login is refreshed
/// and a session token is issued.
#[tracing::instrument(skip_all, fields(identity = %request.identity))]
pub async fn verify(
    store: &impl OtpStore,
    tokens: &TokenService,
    settings: &settings::Otp,
    request: &OtpVerifyRequest,
    now: DateTime<Utc>,
) -> Result<Verified, Error> {
    request.validate()?;

    let Some(session) = store
        .latest_pending(&request.identity)
        .await
        .map_err(Error::Storage)?
    else {
        return Err(settled_outcome(store, &request.identity, now).await?);
    };

    if session.is_expired(now) {
        store
            .transition(session.id, OtpStatus::Expired, now)
            .await
            .map_err(Error::Storage)?;
        tracing::info!(session_id = session.id, "Rejected expired code");
        return Err(Error::Expired);
    }

    if !session.matches(&request.code) {
        let attempts = store
            .record_failed_attempt(session.id)
            .await
            .map_err(Error::Storage)?;

        tracing::info!(session_id = session.id, attempts, "Rejected wrong code");

        if let Some(max_attempts) = settings.max_attempts {
            if i64::from(attempts) >= i64::from(max_attempts) {
                store
                    .transition(session.id, OtpStatus::Expired, now)
                    .await
                    .map_err(Error::Storage)?;
                return Err(Error::TooManyAttempts);
            }
        }

        return Err(Error::Mismatch);
    }

    let consumed = store
        .transition(session.id, OtpStatus::Verified, now)
        .await
        .map_err(Error::Storage)?;

    if !consumed {
        tracing::info!(session_id = session.id, "Code was consumed concurrently");
        return Err(Error::NotFound);
    }

    if let Err(err) = store.upsert_profile(&request.identity, now).await {
        tracing::warn!(?err, "Could not record login on profile");
    }

    let token = tokens.issue(&request.identity, now)?;

    tracing::info!(session_id = session.id, "Verified one-time passcode");

    Ok(Verified {
        identity: request.identity.clone(),
        token,
    })
}

/// Explain why `identity` has no pending session: its newest code timed out
/// (possibly already marked by the cleanup sweep), or there is nothing to use.
async fn settled_outcome(
    store: &impl OtpStore,
    identity: &str,
    now: DateTime<Utc>,
) -> Result<Error, Error> {
    let latest = store.latest(identity).await.map_err(Error::Storage)?;

    Ok(match latest {
        Some(session) if session.status == OtpStatus::Expired && session.is_expired(now) => {
            tracing::info!(session_id = session.id, "Rejected code that timed out");
            Error::Expired
        }
        _ => Error::NotFound,
    })
}

/// Run one cleanup pass at `now`.
pub async fn sweep(
    store: &impl OtpStore,
    settings: &settings::Otp,
    now: DateTime<Utc>,
) -> anyhow::Result<SweepReport> {
    store.sweep(now, now - settings.retention()).await
}

/// Periodically sweep the store until `cancellation_token` is cancelled.
pub async fn run_cleanup(
    store: impl OtpStore,
    settings: settings::Otp,
    cancellation_token: CancellationToken,
) {
    let mut interval = tokio::time::interval(settings.cleanup_interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                tracing::debug!("Stopping otp cleanup task");
                break;
            }
            _ = interval.tick() => {
                match sweep(&store, &settings, Utc::now()).await {
                    Ok(report) if report == SweepReport::default() => {}
                    Ok(report) => {
                        tracing::info!(expired = report.expired, deleted = report.deleted, "Swept otp sessions");
                    }
                    Err(err) => tracing::error!(?err, "Otp cleanup sweep failed"),
                }
            }
        }
    }
}
