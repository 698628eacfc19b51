//! Profile Model
use crate::db::{schema::profiles, Conn};
use anyhow::Result;
use chrono::{DateTime, Utc};
use diesel::{
    pg::Pg, ExpressionMethods, Insertable, OptionalExtension, QueryDsl, Queryable, Selectable,
    SelectableHelper,
};
use diesel_async::RunQueryDsl;

/// Minimal user record keyed by identity
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = profiles)]
#[diesel(check_for_backend(Pg))]
pub struct Profile {
    /// Email address
    pub identity: String,
    /// Time of the most recent successful verification
    pub last_login: DateTime<Utc>,
    /// Inserted at timestamp
    pub inserted_at: DateTime<Utc>,
}

impl Profile {
    /// Create a new instance of [Profile] for a first login.
    pub fn new(identity: &str, last_login: DateTime<Utc>) -> Self {
        Self {
            identity: identity.to_string(),
            last_login,
            inserted_at: last_login,
        }
    }

    /// Create the profile or refresh its `last_login`.
    pub async fn upsert(
        conn: &mut Conn<'_>,
        identity: &str,
        last_login: DateTime<Utc>,
    ) -> Result<Self> {
        tracing::debug!(identity, %last_login, "Upserting profile");

        Ok(diesel::insert_into(profiles::table)
            .values(Self::new(identity, last_login))
            .on_conflict(profiles::identity)
            .do_update()
            .set(profiles::last_login.eq(last_login))
            .returning(Self::as_returning())
            .get_result(conn)
            .await?)
    }

    /// Find a profile by identity.
    pub async fn find(conn: &mut Conn<'_>, identity: &str) -> Result<Option<Self>> {
        Ok(profiles::table
            .filter(profiles::identity.eq(identity))
            .select(Self::as_select())
            .first(conn)
            .await
            .optional()?)
    }
}
