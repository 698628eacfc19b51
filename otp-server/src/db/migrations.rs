//! Migration code

use anyhow::{anyhow, Context, Result};
use diesel::{migration::MigrationSource, pg::Pg, Connection, PgConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness};

/// Embed migrations into binary
pub const MIGRATIONS: EmbeddedMigrations = diesel_migrations::embed_migrations!("./migrations");

/// Run pending migrations on a dedicated blocking connection.
pub async fn run(url: &str) -> Result<()> {
    let url = url.to_string();

    tokio::task::spawn_blocking(move || {
        let mut conn =
            PgConnection::establish(&url).context("Cannot connect to postgres database.")?;

        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow!(e))
            .context("Could not run migrations")?;

        tracing::info!(count = applied.len(), "Applied pending migrations");

        Ok(())
    })
    .await?
}

/// The newest migration version embedded in the binary.
pub fn latest_version() -> Option<String> {
    MigrationSource::<Pg>::migrations(&MIGRATIONS)
        .ok()?
        .iter()
        .map(|migration| migration.name().version().to_string())
        .max()
}
