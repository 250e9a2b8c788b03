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
use schema::questionnaire_answers;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

/// One questionnaire answer; `value` is the stored JSON (scalar or array).
#[derive(Debug, Clone, Serialize)]
pub struct AnswerItem {
    pub question: String,
    pub value: serde_json::Value,
    pub updated_at: i64,
}

#[derive(Queryable)]
struct AnswerRow {
    _id: i32,
    _user_id: String,
    question: String,
    value_json: String,
    updated_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = questionnaire_answers)]
struct NewAnswer<'a> {
    user_id: &'a str,
    question: &'a str,
    value_json: &'a str,
    updated_at: i64,
}

pub struct AnswerStore {
    pool: SqlitePool,
}

impl AnswerStore {
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

    /// Upsert one answer, keyed on (user, question).
    pub async fn upsert_answer(
        &self,
        user_id: &str,
        question: &str,
        value: &serde_json::Value,
    ) -> Result<()> {
        let now = now_ts();
        let rendered = serde_json::to_string(value)
            .map_err(|e| FelonEntrepreneurError::Serialization(e.to_string()))?;
        let new = NewAnswer {
            user_id,
            question,
            value_json: &rendered,
            updated_at: now,
        };

        let mut conn = self.conn().await?;
        diesel::insert_into(questionnaire_answers::table)
            .values(&new)
            .on_conflict((
                questionnaire_answers::user_id,
                questionnaire_answers::question,
            ))
            .do_update()
            .set((
                questionnaire_answers::value_json.eq(&rendered),
                questionnaire_answers::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .await
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
        Ok(())
    }

    pub async fn list_answers(&self, user_id: &str) -> Result<Vec<AnswerItem>> {
        let mut conn = self.conn().await?;
        let rows: Vec<AnswerRow> = questionnaire_answers::table
            .filter(questionnaire_answers::user_id.eq(user_id))
            .order(questionnaire_answers::question.asc())
            .load(&mut conn)
            .await
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
        Ok(rows.into_iter().map(map_row).collect())
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))
    }
}

fn map_row(row: AnswerRow) -> AnswerItem {
    let value = serde_json::from_str(&row.value_json)
        .unwrap_or(serde_json::Value::String(row.value_json));
    AnswerItem {
        question: row.question,
        value,
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
