use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::RunQueryDsl;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use serde::Serialize;

use crate::error::{FelonEntrepreneurError, Result};
use crate::tiers::Tier;

mod schema;
use schema::profiles;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub user_id: String,
    pub email: String,
    pub preferred_name: Option<String>,
    pub zip_code: Option<String>,
    pub path_choice: Option<String>,
    pub onboarding_step: Option<i64>,
    pub tier: Tier,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Queryable)]
struct ProfileRow {
    _id: i32,
    user_id: String,
    email: String,
    preferred_name: Option<String>,
    zip_code: Option<String>,
    path_choice: Option<String>,
    onboarding_step: Option<i64>,
    tier: String,
    created_at: i64,
    updated_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = profiles)]
struct NewProfile<'a> {
    user_id: &'a str,
    email: &'a str,
    preferred_name: Option<&'a str>,
    zip_code: Option<&'a str>,
    path_choice: Option<&'a str>,
    onboarding_step: Option<i64>,
    tier: &'a str,
    created_at: i64,
    updated_at: i64,
}

/// Result of the conditional onboarding-step write. `AlreadyAhead` means
/// the guard blocked a regressing write; the stored step is returned so
/// callers can report the canonical route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Advanced { step: i64 },
    AlreadyAhead { step: i64 },
}

impl AdvanceOutcome {
    pub fn step(&self) -> i64 {
        match self {
            AdvanceOutcome::Advanced { step } => *step,
            AdvanceOutcome::AlreadyAhead { step } => *step,
        }
    }
}

pub struct ProfileStore {
    pool: SqlitePool,
}

impl ProfileStore {
    pub async fn new(sqlite_path: impl AsRef<str>) -> Result<Self> {
        let sqlite_path = sqlite_path.as_ref();
        ensure_parent_dir(sqlite_path)?;
        run_migrations(sqlite_path).await?;

        let manager = AsyncDieselConnectionManager::<SqliteAsyncConn>::new(sqlite_path);
        let pool: SqlitePool = Pool::builder()
            .build(manager)
            .await
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
        Ok(Self { pool })
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<Profile>> {
        let mut conn = self.conn().await?;
        let row: Option<ProfileRow> = profiles::table
            .filter(profiles::user_id.eq(user_id))
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
        Ok(row.map(map_row))
    }

    /// Load the profile for an authenticated subject, creating it at step 0
    /// on first contact. Returns the profile and whether it was created.
    pub async fn ensure_profile(&self, user_id: &str, email: &str) -> Result<(Profile, bool)> {
        if let Some(existing) = self.get(user_id).await? {
            return Ok((existing, false));
        }

        let now = now_ts();
        let new = NewProfile {
            user_id,
            email,
            preferred_name: None,
            zip_code: None,
            path_choice: None,
            onboarding_step: Some(0),
            tier: Tier::Starter.as_str(),
            created_at: now,
            updated_at: now,
        };

        let mut conn = self.conn().await?;
        let inserted = diesel::insert_into(profiles::table)
            .values(&new)
            .on_conflict(profiles::user_id)
            .do_nothing()
            .execute(&mut conn)
            .await
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
        drop(conn);

        let profile = self
            .get(user_id)
            .await?
            .ok_or_else(|| FelonEntrepreneurError::Runtime("profile insert vanished".to_string()))?;
        Ok((profile, inserted > 0))
    }

    /// Conditional step advance: `SET onboarding_step = target WHERE
    /// onboarding_step IS NULL OR onboarding_step < target`. Two racing
    /// submits can never move the step backward.
    pub async fn advance_step(&self, user_id: &str, target: i64) -> Result<AdvanceOutcome> {
        let now = now_ts();
        let mut conn = self.conn().await?;
        let updated = diesel::update(
            profiles::table.filter(profiles::user_id.eq(user_id)).filter(
                profiles::onboarding_step
                    .is_null()
                    .or(profiles::onboarding_step.lt(target)),
            ),
        )
        .set((
            profiles::onboarding_step.eq(Some(target)),
            profiles::updated_at.eq(now),
        ))
        .execute(&mut conn)
        .await
        .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
        drop(conn);

        let profile = self
            .get(user_id)
            .await?
            .ok_or_else(|| FelonEntrepreneurError::Runtime("no profile row".to_string()))?;
        let step = profile.onboarding_step.unwrap_or(0);
        if updated > 0 {
            Ok(AdvanceOutcome::Advanced { step })
        } else {
            Ok(AdvanceOutcome::AlreadyAhead { step })
        }
    }

    pub async fn set_preferred_name(&self, user_id: &str, name: &str) -> Result<bool> {
        let now = now_ts();
        let mut conn = self.conn().await?;
        let updated = diesel::update(profiles::table.filter(profiles::user_id.eq(user_id)))
            .set((
                profiles::preferred_name.eq(Some(name)),
                profiles::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .await
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
        Ok(updated > 0)
    }

    pub async fn set_zip_code(&self, user_id: &str, zip: &str) -> Result<bool> {
        let now = now_ts();
        let mut conn = self.conn().await?;
        let updated = diesel::update(profiles::table.filter(profiles::user_id.eq(user_id)))
            .set((profiles::zip_code.eq(Some(zip)), profiles::updated_at.eq(now)))
            .execute(&mut conn)
            .await
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
        Ok(updated > 0)
    }

    pub async fn set_path_choice(&self, user_id: &str, path: &str) -> Result<bool> {
        let now = now_ts();
        let mut conn = self.conn().await?;
        let updated = diesel::update(profiles::table.filter(profiles::user_id.eq(user_id)))
            .set((
                profiles::path_choice.eq(Some(path)),
                profiles::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .await
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
        Ok(updated > 0)
    }

    pub async fn set_tier(&self, user_id: &str, tier: Tier) -> Result<bool> {
        let now = now_ts();
        let mut conn = self.conn().await?;
        let updated = diesel::update(profiles::table.filter(profiles::user_id.eq(user_id)))
            .set((profiles::tier.eq(tier.as_str()), profiles::updated_at.eq(now)))
            .execute(&mut conn)
            .await
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
        Ok(updated > 0)
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))
    }
}

fn map_row(row: ProfileRow) -> Profile {
    Profile {
        user_id: row.user_id,
        email: row.email,
        preferred_name: row.preferred_name,
        zip_code: row.zip_code,
        path_choice: row.path_choice,
        onboarding_step: row.onboarding_step,
        tier: row.tier.parse().unwrap_or_default(),
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
    }
    Ok(())
}

async fn run_migrations(database_url: &str) -> Result<()> {
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = SqliteConnection::establish(&database_url)
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
        Ok::<_, FelonEntrepreneurError>(())
    })
    .await
    .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))??;
    Ok(())
}
