//! In-memory [OtpStore], used by the local & test setups

use crate::{
    models::{
        otp_session::{NewOtpSession, OtpSession, OtpStatus, SweepReport},
        profile::Profile,
    },
    setups::{OtpStore, StoreHealth},
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};

/// An [OtpStore] holding everything in process memory.
///
/// A single lock guards all sessions, so each operation is atomic.
#[derive(Debug, Clone, Default)]
pub struct MemoryOtpStore {
    inner: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    next_id: i32,
    sessions: Vec<OtpSession>,
    profiles: HashMap<String, Profile>,
}

impl MemoryOtpStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// All sessions ever issued for `identity`, oldest first.
    pub fn sessions(&self, identity: &str) -> Vec<OtpSession> {
        self.inner
            .lock()
            .sessions
            .iter()
            .filter(|session| session.identity == identity)
            .cloned()
            .collect()
    }

    fn newest(&self, identity: &str, filter: impl Fn(&OtpSession) -> bool) -> Option<OtpSession> {
        self.inner
            .lock()
            .sessions
            .iter()
            .filter(|session| session.identity == identity && filter(session))
            .max_by_key(|session| (session.created_at, session.id))
            .cloned()
    }
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
    async fn insert_pending(&self, session: NewOtpSession) -> Result<OtpSession> {
        let mut state = self.inner.lock();

        let now = session.created_at;
        for existing in state.sessions.iter_mut().filter(|existing| {
            existing.identity == session.identity && existing.status == OtpStatus::Pending
        }) {
            existing.status = OtpStatus::Expired;
            existing.updated_at = now;
        }

        state.next_id += 1;
        let session = OtpSession::from_new(state.next_id, session);
        state.sessions.push(session.clone());

        Ok(session)
    }

    async fn latest_pending(&self, identity: &str) -> Result<Option<OtpSession>> {
        Ok(self.newest(identity, |session| session.status == OtpStatus::Pending))
    }

    async fn latest(&self, identity: &str) -> Result<Option<OtpSession>> {
        Ok(self.newest(identity, |_| true))
    }

    async fn transition(&self, id: i32, to: OtpStatus, now: DateTime<Utc>) -> Result<bool> {
        let mut state = self.inner.lock();

        match state
            .sessions
            .iter_mut()
            .find(|session| session.id == id && session.status == OtpStatus::Pending)
        {
            Some(session) => {
                session.status = to;
                session.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_failed_attempt(&self, id: i32) -> Result<i32> {
        let mut state = self.inner.lock();

        let session = state
            .sessions
            .iter_mut()
            .find(|session| session.id == id)
            .ok_or_else(|| anyhow!("No otp session with id {id}"))?;

        session.attempts += 1;
        Ok(session.attempts)
    }

    async fn sweep(&self, now: DateTime<Utc>, cutoff: DateTime<Utc>) -> Result<SweepReport> {
        let mut state = self.inner.lock();
        let mut report = SweepReport::default();

        for session in state
            .sessions
            .iter_mut()
            .filter(|session| session.status == OtpStatus::Pending && session.expires_at < now)
        {
            session.status = OtpStatus::Expired;
            session.updated_at = now;
            report.expired += 1;
        }

        let before = state.sessions.len();
        state
            .sessions
            .retain(|session| session.status == OtpStatus::Pending || session.updated_at >= cutoff);
        report.deleted = before - state.sessions.len();

        Ok(report)
    }

    async fn upsert_profile(&self, identity: &str, last_login: DateTime<Utc>) -> Result<Profile> {
        let mut state = self.inner.lock();

        let profile = state
            .profiles
            .entry(identity.to_string())
            .and_modify(|profile| profile.last_login = last_login)
            .or_insert_with(|| Profile::new(identity, last_login));

        Ok(profile.clone())
    }

    async fn find_profile(&self, identity: &str) -> Result<Option<Profile>> {
        Ok(self.inner.lock().profiles.get(identity).cloned())
    }

    async fn health(&self) -> StoreHealth {
        StoreHealth {
            connected: true,
            up_to_date: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use testresult::TestResult;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    fn new_session(identity: &str, code: &str, at: DateTime<Utc>) -> NewOtpSession {
        NewOtpSession::new(identity, code, at, Duration::minutes(5))
    }

    #[tokio::test]
    async fn test_insert_supersedes_older_pending_sessions() -> TestResult {
        let store = MemoryOtpStore::new();

        let first = store
            .insert_pending(new_session("a@b.com", "111111", now()))
            .await?;
        let second = store
            .insert_pending(new_session("a@b.com", "222222", now() + Duration::seconds(1)))
            .await?;
        store
            .insert_pending(new_session("c@d.com", "333333", now()))
            .await?;

        let latest = store.latest_pending("a@b.com").await?;
        assert_eq!(latest.map(|s| s.id), Some(second.id));

        let sessions = store.sessions("a@b.com");
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, first.id);
        assert_eq!(sessions[0].status, OtpStatus::Expired);

        assert!(store.latest_pending("c@d.com").await?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_transition_only_applies_to_pending_sessions() -> TestResult {
        let store = MemoryOtpStore::new();
        let session = store
            .insert_pending(new_session("a@b.com", "111111", now()))
            .await?;

        assert!(store.transition(session.id, OtpStatus::Verified, now()).await?);
        assert!(!store.transition(session.id, OtpStatus::Verified, now()).await?);
        assert!(!store.transition(session.id, OtpStatus::Expired, now()).await?);
        assert!(store.latest_pending("a@b.com").await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_transitions_have_one_winner() -> TestResult {
        let store = MemoryOtpStore::new();
        let session = store
            .insert_pending(new_session("a@b.com", "111111", now()))
            .await?;

        let handles = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.transition(session.id, OtpStatus::Verified, now()).await
                })
            })
            .collect::<Vec<_>>();

        let mut winners = 0;
        for handle in handles {
            if handle.await?? {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_attempts_are_counted() -> TestResult {
        let store = MemoryOtpStore::new();
        let session = store
            .insert_pending(new_session("a@b.com", "111111", now()))
            .await?;

        assert_eq!(store.record_failed_attempt(session.id).await?, 1);
        assert_eq!(store.record_failed_attempt(session.id).await?, 2);
        assert!(store.record_failed_attempt(session.id + 1).await.is_err());

        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_expires_and_deletes() -> TestResult {
        let store = MemoryOtpStore::new();
        let verified = store
            .insert_pending(new_session("a@b.com", "111111", now()))
            .await?;
        store.transition(verified.id, OtpStatus::Verified, now()).await?;
        let stale = store
            .insert_pending(new_session("c@d.com", "222222", now()))
            .await?;
        let fresh = store
            .insert_pending(new_session("e@f.com", "333333", now() + Duration::minutes(10)))
            .await?;

        let later = now() + Duration::minutes(6);
        let report = store.sweep(later, now() + Duration::seconds(1)).await?;

        assert_eq!(
            report,
            SweepReport {
                expired: 1,
                deleted: 1
            }
        );
        assert!(store.sessions("a@b.com").is_empty());
        assert_eq!(store.sessions("c@d.com")[0].id, stale.id);
        assert_eq!(store.sessions("c@d.com")[0].status, OtpStatus::Expired);
        assert_eq!(store.sessions("e@f.com")[0].id, fresh.id);
        assert_eq!(store.sessions("e@f.com")[0].status, OtpStatus::Pending);

        Ok(())
    }

    #[tokio::test]
    async fn test_profile_upsert_refreshes_last_login() -> TestResult {
        let store = MemoryOtpStore::new();

        let created = store.upsert_profile("a@b.com", now()).await?;
        let later = now() + Duration::hours(1);
        let updated = store.upsert_profile("a@b.com", later).await?;

        assert_eq!(created.inserted_at, now());
        assert_eq!(updated.inserted_at, now());
        assert_eq!(updated.last_login, later);
        assert_eq!(store.find_profile("a@b.com").await?, Some(updated));
        assert_eq!(store.find_profile("c@d.com").await?, None);

        Ok(())
    }
}
