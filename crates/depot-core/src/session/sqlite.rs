use async_trait::async_trait;
use sqlx::{
    Row,
    sqlite::{
        SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
    },
};
use std::path::Path;
use std::str::FromStr;

use super::{CheckpointError, CheckpointStore, ThreadId, ThreadState};
use crate::app::consequence::RiskLevel;
use crate::app::conversation::Message;

pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    pub async fn new(path: &Path) -> Result<Self, CheckpointError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CheckpointError::connection(format!("Failed to create directory: {e}"))
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .map_err(|e| CheckpointError::connection(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        Self::with_options(options).await
    }

    pub async fn new_in_memory() -> Result<Self, CheckpointError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| CheckpointError::connection(format!("Invalid SQLite path: {e}")))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        Self::with_options(options).await
    }

    async fn with_options(options: SqliteConnectOptions) -> Result<Self, CheckpointError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                CheckpointError::connection(format!("Failed to connect to SQLite: {e}"))
            })?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), CheckpointError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS threads (
                thread_id TEXT PRIMARY KEY,
                context_tag TEXT NOT NULL DEFAULT '',
                target_entity_id TEXT,
                consequence_risk TEXT,
                consequence_message TEXT,
                awaiting_confirmation INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CheckpointError::Migration {
            message: format!("Failed to create threads table: {e}"),
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS thread_messages (
                thread_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                message_data TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (thread_id, seq),
                FOREIGN KEY (thread_id) REFERENCES threads(thread_id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CheckpointError::Migration {
            message: format!("Failed to create messages table: {e}"),
        })?;

        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self, thread_id: &ThreadId) -> Result<Option<ThreadState>, CheckpointError> {
        let row = sqlx::query(
            r#"
            SELECT context_tag, target_entity_id, consequence_risk,
                   consequence_message, awaiting_confirmation
            FROM threads WHERE thread_id = ?1
            "#,
        )
        .bind(thread_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CheckpointError::database(format!("Failed to load thread: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let consequence_risk = row
            .get::<Option<String>, _>("consequence_risk")
            .map(|raw| {
                RiskLevel::from_str(&raw).map_err(|_| {
                    CheckpointError::serialization(format!("Invalid risk level: {raw}"))
                })
            })
            .transpose()?;

        let message_rows = sqlx::query(
            r#"
            SELECT message_data FROM thread_messages
            WHERE thread_id = ?1
            ORDER BY seq ASC
            "#,
        )
        .bind(thread_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CheckpointError::database(format!("Failed to load messages: {e}")))?;

        let mut messages = Vec::with_capacity(message_rows.len());
        for message_row in message_rows {
            let raw: String = message_row.get("message_data");
            let message: Message = serde_json::from_str(&raw).map_err(|e| {
                CheckpointError::serialization(format!("Invalid message data: {e}"))
            })?;
            messages.push(message);
        }

        Ok(Some(ThreadState {
            thread_id: thread_id.clone(),
            messages,
            context_tag: row.get("context_tag"),
            target_entity_id: row.get("target_entity_id"),
            consequence_risk,
            consequence_message: row.get("consequence_message"),
            awaiting_confirmation: row.get::<i64, _>("awaiting_confirmation") != 0,
        }))
    }

    async fn save(&self, state: &ThreadState) -> Result<(), CheckpointError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CheckpointError::database(format!("Failed to begin save: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO threads (thread_id, context_tag, target_entity_id,
                                 consequence_risk, consequence_message,
                                 awaiting_confirmation, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
            ON CONFLICT(thread_id) DO UPDATE SET
                context_tag = excluded.context_tag,
                target_entity_id = excluded.target_entity_id,
                consequence_risk = excluded.consequence_risk,
                consequence_message = excluded.consequence_message,
                awaiting_confirmation = excluded.awaiting_confirmation,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(state.thread_id.as_str())
        .bind(&state.context_tag)
        .bind(&state.target_entity_id)
        .bind(state.consequence_risk.map(|r| r.to_string()))
        .bind(&state.consequence_message)
        .bind(i64::from(state.awaiting_confirmation))
        .execute(&mut *tx)
        .await
        .map_err(|e| CheckpointError::database(format!("Failed to save thread: {e}")))?;

        // The message log is append-only: persist only what lies beyond the
        // stored high-water mark.
        let stored: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(seq), -1) + 1 FROM thread_messages WHERE thread_id = ?1",
        )
        .bind(state.thread_id.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CheckpointError::database(format!("Failed to get message count: {e}")))?;

        for (seq, message) in state.messages.iter().enumerate().skip(stored as usize) {
            let payload = serde_json::to_string(message).map_err(|e| {
                CheckpointError::serialization(format!("Failed to serialize message: {e}"))
            })?;
            sqlx::query(
                "INSERT INTO thread_messages (thread_id, seq, message_data) VALUES (?1, ?2, ?3)",
            )
            .bind(state.thread_id.as_str())
            .bind(seq as i64)
            .bind(payload)
            .execute(&mut *tx)
            .await
            .map_err(|e| CheckpointError::database(format!("Failed to append message: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| CheckpointError::database(format!("Failed to commit save: {e}")))?;

        Ok(())
    }
}
