use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::RunQueryDsl;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::error::{FelonEntrepreneurError, Result};

mod schema;
use schema::sessions;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub user_id: String,
    pub email: String,
    pub created_at: i64,
    pub expires_at: i64,
}

#[derive(Queryable)]
struct SessionRow {
    _id: i32,
    _token_digest: String,
    user_id: String,
    email: String,
    created_at: i64,
    expires_at: i64,
    revoked_at: Option<i64>,
}

#[derive(Insertable)]
#[diesel(table_name = sessions)]
struct NewSession<'a> {
    token_digest: &'a str,
    user_id: &'a str,
    email: &'a str,
    created_at: i64,
    expires_at: i64,
    revoked_at: Option<i64>,
}

pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
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

    /// Issue a fresh bearer token for the subject. Only the SHA-256 digest
    /// is stored; the raw token is returned once and never again.
    pub async fn create_session(
        &self,
        user_id: &str,
        email: &str,
        ttl_seconds: i64,
    ) -> Result<String> {
        let token = generate_token();
        let digest = token_digest(&token);
        let now = now_ts();
        let new = NewSession {
            token_digest: &digest,
            user_id,
            email,
            created_at: now,
            expires_at: now + ttl_seconds.max(1),
            revoked_at: None,
        };

        let mut conn = self.conn().await?;
        diesel::insert_into(sessions::table)
            .values(&new)
            .execute(&mut conn)
            .await
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
        Ok(token)
    }

    /// Resolve a bearer token to a live session. Expired and revoked
    /// sessions resolve to `None`.
    pub async fn lookup(&self, token: &str) -> Result<Option<SessionRecord>> {
        let digest = token_digest(token);
        let now = now_ts();
        let mut conn = self.conn().await?;
        let row: Option<SessionRow> = sessions::table
            .filter(sessions::token_digest.eq(&digest))
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;

        Ok(row.filter(|row| row.revoked_at.is_none() && row.expires_at > now).map(|row| {
            SessionRecord {
                user_id: row.user_id,
                email: row.email,
                created_at: row.created_at,
                expires_at: row.expires_at,
            }
        }))
    }

    pub async fn revoke(&self, token: &str) -> Result<bool> {
        let digest = token_digest(token);
        let now = now_ts();
        let mut conn = self.conn().await?;
        let updated = diesel::update(
            sessions::table
                .filter(sessions::token_digest.eq(&digest))
                .filter(sessions::revoked_at.is_null()),
        )
        .set(sessions::revoked_at.eq(Some(now)))
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

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    URL_SAFE_NO_PAD.encode(digest)
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
    fn tokens_are_unique_and_digested() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_ne!(token_digest(&a), a);
        assert_eq!(token_digest(&a), token_digest(&a));
    }
}
