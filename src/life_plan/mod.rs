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

mod schema;
use schema::{life_plan_versions, life_plans};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

const CLAIM_CANDIDATES: i64 = 8;

/// Closed set of stored version statuses. Anything else in the column is
/// treated as corrupt and surfaces as an error, never as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStatus {
    Queued,
    Processing,
    Succeeded,
    Failed,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStatus::Queued => "queued",
            VersionStatus::Processing => "processing",
            VersionStatus::Succeeded => "succeeded",
            VersionStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(VersionStatus::Queued),
            "processing" => Some(VersionStatus::Processing),
            "succeeded" => Some(VersionStatus::Succeeded),
            "failed" => Some(VersionStatus::Failed),
            _ => None,
        }
    }
}

/// Wire-level status reported by the HTTP surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Queued,
    Processing,
    Complete,
    Error,
}

impl PlanStatus {
    pub fn from_version(version: &LifePlanVersion) -> Self {
        match VersionStatus::parse(&version.status) {
            Some(VersionStatus::Queued) => PlanStatus::Queued,
            Some(VersionStatus::Processing) => PlanStatus::Processing,
            Some(VersionStatus::Succeeded) => PlanStatus::Complete,
            Some(VersionStatus::Failed) => PlanStatus::Error,
            None => PlanStatus::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Queued => "queued",
            PlanStatus::Processing => "processing",
            PlanStatus::Complete => "complete",
            PlanStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(PlanStatus::Queued),
            "processing" => Some(PlanStatus::Processing),
            "complete" => Some(PlanStatus::Complete),
            "error" => Some(PlanStatus::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LifePlanVersion {
    pub id: i32,
    pub user_id: String,
    pub status: String,
    pub payload: Option<String>,
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Queryable)]
struct VersionRow {
    id: i32,
    user_id: String,
    status: String,
    payload: Option<String>,
    error: Option<String>,
    created_at: i64,
    updated_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = life_plan_versions)]
struct NewVersion<'a> {
    user_id: &'a str,
    status: &'a str,
    payload: Option<&'a str>,
    error: Option<&'a str>,
    created_at: i64,
    updated_at: i64,
}

pub struct LifePlanStore {
    pool: SqlitePool,
}

impl LifePlanStore {
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

    /// Version the user's current-plan pointer refers to, if any.
    pub async fn current_version(&self, user_id: &str) -> Result<Option<LifePlanVersion>> {
        let mut conn = self.conn().await?;
        let pointer: Option<Option<i32>> = life_plans::table
            .filter(life_plans::user_id.eq(user_id))
            .select(life_plans::current_version_id)
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;

        let Some(Some(version_id)) = pointer else {
            return Ok(None);
        };

        let row: Option<VersionRow> = life_plan_versions::table
            .filter(life_plan_versions::id.eq(version_id))
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
        Ok(row.map(map_row))
    }

    pub async fn get_version(&self, id: i32) -> Result<Option<LifePlanVersion>> {
        let mut conn = self.conn().await?;
        let row: Option<VersionRow> = life_plan_versions::table
            .filter(life_plan_versions::id.eq(id))
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
        Ok(row.map(map_row))
    }

    /// Insert a fresh queued version and point the user's plan at it.
    pub async fn enqueue_version(&self, user_id: &str) -> Result<LifePlanVersion> {
        let now = now_ts();
        let new = NewVersion {
            user_id,
            status: VersionStatus::Queued.as_str(),
            payload: None,
            error: None,
            created_at: now,
            updated_at: now,
        };

        let mut conn = self.conn().await?;
        diesel::insert_into(life_plan_versions::table)
            .values(&new)
            .execute(&mut conn)
            .await
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;

        let row: VersionRow = life_plan_versions::table
            .filter(life_plan_versions::user_id.eq(user_id))
            .order(life_plan_versions::id.desc())
            .first(&mut conn)
            .await
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;

        diesel::insert_into(life_plans::table)
            .values((
                life_plans::user_id.eq(user_id),
                life_plans::current_version_id.eq(Some(row.id)),
                life_plans::updated_at.eq(now),
            ))
            .on_conflict(life_plans::user_id)
            .do_update()
            .set((
                life_plans::current_version_id.eq(Some(row.id)),
                life_plans::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .await
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;

        Ok(map_row(row))
    }

    /// Claim the oldest queued version by a conditional `queued →
    /// processing` update, so two scheduler ticks never double-process.
    pub async fn claim_next(&self) -> Result<Option<LifePlanVersion>> {
        let now = now_ts();
        let mut conn = self.conn().await?;
        let candidates: Vec<i32> = life_plan_versions::table
            .filter(life_plan_versions::status.eq(VersionStatus::Queued.as_str()))
            .order(life_plan_versions::id.asc())
            .limit(CLAIM_CANDIDATES)
            .select(life_plan_versions::id)
            .load(&mut conn)
            .await
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;

        for id in candidates {
            let claimed = diesel::update(
                life_plan_versions::table
                    .filter(life_plan_versions::id.eq(id))
                    .filter(life_plan_versions::status.eq(VersionStatus::Queued.as_str())),
            )
            .set((
                life_plan_versions::status.eq(VersionStatus::Processing.as_str()),
                life_plan_versions::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .await
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;

            if claimed > 0 {
                let row: VersionRow = life_plan_versions::table
                    .filter(life_plan_versions::id.eq(id))
                    .first(&mut conn)
                    .await
                    .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
                return Ok(Some(map_row(row)));
            }
        }
        Ok(None)
    }

    pub async fn complete_version(&self, id: i32, payload: &serde_json::Value) -> Result<bool> {
        let now = now_ts();
        let rendered = serde_json::to_string(payload)
            .map_err(|e| FelonEntrepreneurError::Serialization(e.to_string()))?;
        let mut conn = self.conn().await?;
        let updated = diesel::update(
            life_plan_versions::table
                .filter(life_plan_versions::id.eq(id))
                .filter(life_plan_versions::status.eq(VersionStatus::Processing.as_str())),
        )
        .set((
            life_plan_versions::status.eq(VersionStatus::Succeeded.as_str()),
            life_plan_versions::payload.eq(Some(rendered)),
            life_plan_versions::updated_at.eq(now),
        ))
        .execute(&mut conn)
        .await
        .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
        Ok(updated > 0)
    }

    pub async fn fail_version(&self, id: i32, message: &str) -> Result<bool> {
        let now = now_ts();
        let mut conn = self.conn().await?;
        let updated = diesel::update(
            life_plan_versions::table
                .filter(life_plan_versions::id.eq(id))
                .filter(life_plan_versions::status.eq(VersionStatus::Processing.as_str())),
        )
        .set((
            life_plan_versions::status.eq(VersionStatus::Failed.as_str()),
            life_plan_versions::error.eq(Some(message)),
            life_plan_versions::updated_at.eq(now),
        ))
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

fn map_row(row: VersionRow) -> LifePlanVersion {
    LifePlanVersion {
        id: row.id,
        user_id: row.user_id,
        status: row.status,
        payload: row.payload,
        error: row.error,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_maps_to_error() {
        let version = LifePlanVersion {
            id: 1,
            user_id: "u".to_string(),
            status: "archived".to_string(),
            payload: None,
            error: None,
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(PlanStatus::from_version(&version), PlanStatus::Error);
    }

    #[test]
    fn succeeded_maps_to_complete() {
        let version = LifePlanVersion {
            id: 1,
            user_id: "u".to_string(),
            status: "succeeded".to_string(),
            payload: None,
            error: None,
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(PlanStatus::from_version(&version), PlanStatus::Complete);
    }
}
