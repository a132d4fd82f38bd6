//! Conversation session persistence.

use std::path::PathBuf;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::core::errors::ApiError;

/// SQLite-backed session store. Each session is a list of user/assistant
/// exchanges; history is rendered as the flat transcript the system prompt
/// expects.
pub struct SessionStore {
    pool: SqlitePool,
    max_history: usize,
}

impl SessionStore {
    pub async fn new(db_path: PathBuf, max_history: usize) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { pool, max_history };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS exchanges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                user_message TEXT NOT NULL,
                assistant_message TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_exchanges_session ON exchanges(session_id)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(())
    }

    pub async fn create_session(&self) -> Result<String, ApiError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO sessions (id) VALUES (?1)")
            .bind(&id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(id)
    }

    /// Records one completed exchange. Sessions the client minted itself are
    /// adopted on first write.
    pub async fn add_exchange(
        &self,
        session_id: &str,
        user_message: &str,
        assistant_message: &str,
    ) -> Result<(), ApiError> {
        sqlx::query("INSERT OR IGNORE INTO sessions (id) VALUES (?1)")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        sqlx::query(
            "UPDATE sessions SET updated_at = STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE id = ?1",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "INSERT INTO exchanges (session_id, user_message, assistant_message)
             VALUES (?1, ?2, ?3)",
        )
        .bind(session_id)
        .bind(user_message)
        .bind(assistant_message)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    /// The most recent exchanges rendered as "User: ...\nAssistant: ..."
    /// lines, oldest first. None when the session has no history yet.
    pub async fn get_conversation_history(
        &self,
        session_id: &str,
    ) -> Result<Option<String>, ApiError> {
        let mut rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT user_message, assistant_message FROM exchanges
             WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2",
        )
        .bind(session_id)
        .bind(self.max_history as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        if rows.is_empty() {
            return Ok(None);
        }
        rows.reverse();

        let transcript = rows
            .iter()
            .map(|(user, assistant)| format!("User: {}\nAssistant: {}", user, assistant))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(Some(transcript))
    }

    /// Drops a session's exchanges so the conversation starts fresh. The
    /// session id itself stays valid.
    pub async fn clear_session(&self, session_id: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM exchanges WHERE session_id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(())
    }
}
