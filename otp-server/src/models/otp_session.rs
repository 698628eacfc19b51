//! One-time passcode session model
use crate::db::{schema::otp_sessions, Conn};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use diesel::{
    pg::Pg, ExpressionMethods, Insertable, OptionalExtension, QueryDsl, Queryable, Selectable,
    SelectableHelper,
};
use diesel_async::{scoped_futures::ScopedFutureExt, AsyncConnection, RunQueryDsl};
use rand::Rng;
use std::{fmt, str::FromStr};

const CODE_HASH_CONTEXT: &str = "otp-server 2024-01-15 email one-time passcodes";

/// Lifecycle state of an [OtpSession]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OtpStatus {
    /// Issued and waiting for verification
    Pending,
    /// Successfully verified. Terminal.
    Verified,
    /// Timed out, superseded or locked. Terminal.
    Expired,
}

impl OtpStatus {
    /// The stored representation
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for OtpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            "expired" => Ok(Self::Expired),
            other => Err(anyhow!("Unknown otp session status: {other}")),
        }
    }
}

/// A freshly issued session, not yet persisted
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = otp_sessions)]
pub struct NewOtpSession {
    /// Email address the code was sent to
    pub identity: String,
    /// Hash of the code, see [hash_code]
    pub code_hash: String,
    /// Issue time
    pub created_at: DateTime<Utc>,
    /// The code is rejected strictly after this instant
    pub expires_at: DateTime<Utc>,
}

impl NewOtpSession {
    /// Create a new pending session for `code`, valid for `ttl` from `now`.
    pub fn new(identity: &str, code: &str, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            identity: identity.to_string(),
            code_hash: hash_code(identity, code).to_hex().to_string(),
            created_at: now,
            expires_at: now + ttl,
        }
    }
}

/// One-time passcode session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpSession {
    /// Internal identifier
    pub id: i32,
    /// Email address the code was sent to
    pub identity: String,
    /// Hash of the code, see [hash_code]
    pub code_hash: String,
    /// Lifecycle state
    pub status: OtpStatus,
    /// Number of failed verification attempts
    pub attempts: i32,
    /// Issue time
    pub created_at: DateTime<Utc>,
    /// The code is rejected strictly after this instant
    pub expires_at: DateTime<Utc>,
    /// Time of the last status change
    pub updated_at: DateTime<Utc>,
}

impl OtpSession {
    /// Materialize a [NewOtpSession] under the given id.
    pub fn from_new(id: i32, new: NewOtpSession) -> Self {
        Self {
            id,
            identity: new.identity,
            code_hash: new.code_hash,
            status: OtpStatus::Pending,
            attempts: 0,
            created_at: new.created_at,
            expires_at: new.expires_at,
            updated_at: new.created_at,
        }
    }

    /// Whether the validity window has elapsed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether `code` is the code this session was issued with.
    pub fn matches(&self, code: &str) -> bool {
        // blake3::Hash equality is constant time
        blake3::Hash::from_hex(&self.code_hash)
            .map(|stored| stored == hash_code(&self.identity, code))
            .unwrap_or(false)
    }
}

/// Outcome of a cleanup sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Pending sessions past their expiry that were marked expired
    pub expired: usize,
    /// Settled sessions older than the retention window that were deleted
    pub deleted: usize,
}

/// [OtpSession] as stored in postgres
#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = otp_sessions)]
#[diesel(check_for_backend(Pg))]
pub struct OtpSessionRecord {
    /// Internal Database Identifier
    pub id: i32,
    /// Email address the code was sent to
    pub identity: String,
    /// Hash of the code
    pub code_hash: String,
    /// Lifecycle state, see [OtpStatus]
    pub status: String,
    /// Number of failed verification attempts
    pub attempts: i32,
    /// Issue time
    pub created_at: DateTime<Utc>,
    /// Expiry time
    pub expires_at: DateTime<Utc>,
    /// Updated at timestamp
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OtpSessionRecord> for OtpSession {
    type Error = anyhow::Error;

    fn try_from(record: OtpSessionRecord) -> Result<Self> {
        Ok(Self {
            id: record.id,
            identity: record.identity,
            code_hash: record.code_hash,
            status: record.status.parse()?,
            attempts: record.attempts,
            created_at: record.created_at,
            expires_at: record.expires_at,
            updated_at: record.updated_at,
        })
    }
}

impl OtpSessionRecord {
    /// Insert a pending session, expiring any older pending session for the
    /// same identity in the same transaction.
    pub async fn insert_superseding(
        conn: &mut Conn<'_>,
        session: &NewOtpSession,
    ) -> Result<OtpSession> {
        tracing::debug!(identity = %session.identity, "Creating new otp session record");

        let session = session.clone();
        let record = conn
            .transaction::<_, diesel::result::Error, _>(move |conn| {
                async move {
                    let superseded = diesel::update(
                        otp_sessions::table
                            .filter(otp_sessions::identity.eq(&session.identity))
                            .filter(otp_sessions::status.eq(OtpStatus::Pending.as_str())),
                    )
                    .set((
                        otp_sessions::status.eq(OtpStatus::Expired.as_str()),
                        otp_sessions::updated_at.eq(session.created_at),
                    ))
                    .execute(conn)
                    .await?;

                    if superseded > 0 {
                        tracing::debug!(superseded, "Expired superseded otp sessions");
                    }

                    diesel::insert_into(otp_sessions::table)
                        .values(&session)
                        .returning(OtpSessionRecord::as_returning())
                        .get_result(conn)
                        .await
                }
                .scope_boxed()
            })
            .await?;

        record.try_into()
    }

    /// Find the most recent pending session for `identity`.
    pub async fn latest_pending(conn: &mut Conn<'_>, identity: &str) -> Result<Option<OtpSession>> {
        otp_sessions::table
            .filter(otp_sessions::identity.eq(identity))
            .filter(otp_sessions::status.eq(OtpStatus::Pending.as_str()))
            .order((otp_sessions::created_at.desc(), otp_sessions::id.desc()))
            .select(OtpSessionRecord::as_select())
            .first(conn)
            .await
            .optional()?
            .map(OtpSession::try_from)
            .transpose()
    }

    /// Find the most recent session for `identity` in any status.
    pub async fn latest(conn: &mut Conn<'_>, identity: &str) -> Result<Option<OtpSession>> {
        otp_sessions::table
            .filter(otp_sessions::identity.eq(identity))
            .order((otp_sessions::created_at.desc(), otp_sessions::id.desc()))
            .select(OtpSessionRecord::as_select())
            .first(conn)
            .await
            .optional()?
            .map(OtpSession::try_from)
            .transpose()
    }

    /// Move a pending session to `to`. Returns `false` when the session was no
    /// longer pending.
    pub async fn transition(
        conn: &mut Conn<'_>,
        id: i32,
        to: OtpStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let updated = diesel::update(
            otp_sessions::table
                .filter(otp_sessions::id.eq(id))
                .filter(otp_sessions::status.eq(OtpStatus::Pending.as_str())),
        )
        .set((
            otp_sessions::status.eq(to.as_str()),
            otp_sessions::updated_at.eq(now),
        ))
        .execute(conn)
        .await?;

        Ok(updated == 1)
    }

    /// Increment the failed attempt counter, returning the new count.
    pub async fn record_failed_attempt(conn: &mut Conn<'_>, id: i32) -> Result<i32> {
        Ok(
            diesel::update(otp_sessions::table.filter(otp_sessions::id.eq(id)))
                .set(otp_sessions::attempts.eq(otp_sessions::attempts + 1))
                .returning(otp_sessions::attempts)
                .get_result(conn)
                .await?,
        )
    }

    /// Expire stale pending sessions and delete settled ones last touched before `cutoff`.
    pub async fn sweep(
        conn: &mut Conn<'_>,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> Result<SweepReport> {
        let expired = diesel::update(
            otp_sessions::table
                .filter(otp_sessions::status.eq(OtpStatus::Pending.as_str()))
                .filter(otp_sessions::expires_at.lt(now)),
        )
        .set((
            otp_sessions::status.eq(OtpStatus::Expired.as_str()),
            otp_sessions::updated_at.eq(now),
        ))
        .execute(conn)
        .await?;

        let deleted = diesel::delete(
            otp_sessions::table
                .filter(otp_sessions::status.ne(OtpStatus::Pending.as_str()))
                .filter(otp_sessions::updated_at.lt(cutoff)),
        )
        .execute(conn)
        .await?;

        Ok(SweepReport { expired, deleted })
    }
}

/// Generate a code that can be sent to the user.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    let code: u32 = rng.gen_range(0..1_000_000);
    // 0-pad the 6-digit code:
    format!("{code:0>6}")
}

/// Compute a hash given email and verification code.
pub fn hash_code(identity: &str, code: &str) -> blake3::Hash {
    let identity_len = (identity.len() as u64).to_le_bytes();
    blake3::Hash::from(blake3::derive_key(
        CODE_HASH_CONTEXT,
        &[&identity_len, identity.as_bytes(), code.as_bytes()].concat(),
    ))
}
