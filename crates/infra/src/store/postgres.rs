//! Postgres-backed mapping store.
//!
//! The bridge calls the store from plain OS threads (dispatch workers, the
//! scheduler), so this store owns a small Tokio runtime and blocks on it for
//! every query.
//!
//! ## Error Mapping
//!
//! | SQLx error | StoreError |
//! |------------|------------|
//! | any query/connection failure | `Storage` |
//! | a row whose peer chat id does not validate | `Corrupt` |
//!
//! ## Thread Safety
//!
//! `PostgresMappingStore` is `Send + Sync`; the SQLx pool handles connection
//! sharing.

use std::sync::Arc;

use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tokio::runtime::Runtime;
use tracing::{debug, instrument};

use topicbridge_core::{ChatThreadPair, GroupId, MessageIdPair, PeerChatId, ThreadId};

use super::{MappingStore, StoreError};

/// Schema for both mapping tables.
pub const SCHEMA: &str = include_str!("../../migrations/0001_mapping_tables.sql");

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        StoreError::Storage(value.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        StoreError::Storage(format!("failed to start database runtime: {value}"))
    }
}

/// Postgres-backed mapping store.
pub struct PostgresMappingStore {
    pool: PgPool,
    runtime: Arc<Runtime>,
}

impl std::fmt::Debug for PostgresMappingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresMappingStore").finish_non_exhaustive()
    }
}

impl PostgresMappingStore {
    /// Connect to `database_url` with a pool of at most `max_connections`.
    ///
    /// Must not be called from inside an async runtime.
    pub fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("mapping-store")
            .enable_all()
            .build()?;
        let pool = runtime.block_on(
            PgPoolOptions::new()
                .max_connections(max_connections.max(1))
                .connect(database_url),
        )?;
        Ok(Self {
            pool,
            runtime: Arc::new(runtime),
        })
    }

    /// Create the mapping tables if they do not exist yet.
    pub fn migrate(&self) -> Result<(), StoreError> {
        self.runtime
            .block_on(sqlx::raw_sql(SCHEMA).execute(&self.pool))?;
        Ok(())
    }
}

fn peer_chat_id(raw: String) -> Result<PeerChatId, StoreError> {
    PeerChatId::parse(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn chat_thread_from_row(row: &PgRow) -> Result<ChatThreadPair, StoreError> {
    Ok(ChatThreadPair::new(
        peer_chat_id(row.try_get("chat_id")?)?,
        GroupId::new(row.try_get("tg_chat_id")?),
        ThreadId::new(row.try_get("tg_thread_id")?),
    ))
}

fn message_from_row(row: &PgRow) -> Result<MessageIdPair, StoreError> {
    Ok(MessageIdPair {
        tg_chat_id: GroupId::new(row.try_get("tg_chat_id")?),
        tg_thread_id: ThreadId::new(row.try_get("tg_thread_id")?),
        peer_chat_id: peer_chat_id(row.try_get("peer_chat_id")?)?,
        peer_message_id: row.try_get("peer_message_id")?,
        tg_message_id: row.try_get("tg_message_id")?,
    })
}

impl MappingStore for PostgresMappingStore {
    #[instrument(skip(self), fields(group_id = %group))]
    fn chat_thread_pairs(&self, group: GroupId) -> Result<Vec<ChatThreadPair>, StoreError> {
        let rows = self.runtime.block_on(
            sqlx::query(
                r#"
                SELECT chat_id, tg_chat_id, tg_thread_id
                FROM chat_thread_pairs
                WHERE tg_chat_id = $1
                ORDER BY tg_thread_id, chat_id
                "#,
            )
            .bind(group.get())
            .fetch_all(&self.pool),
        )?;
        rows.iter().map(chat_thread_from_row).collect()
    }

    fn save_chat_thread_pair(&self, pair: &ChatThreadPair) -> Result<(), StoreError> {
        self.runtime.block_on(
            sqlx::query(
                r#"
                INSERT INTO chat_thread_pairs (chat_id, tg_chat_id, tg_thread_id)
                VALUES ($1, $2, $3)
                ON CONFLICT (chat_id, tg_chat_id)
                DO UPDATE SET tg_thread_id = EXCLUDED.tg_thread_id
                "#,
            )
            .bind(pair.chat_id.as_str())
            .bind(pair.tg_chat_id.get())
            .bind(pair.tg_thread_id.get())
            .execute(&self.pool),
        )?;
        Ok(())
    }

    fn thread_for_chat(
        &self,
        group: GroupId,
        chat: &PeerChatId,
    ) -> Result<Option<ThreadId>, StoreError> {
        let row = self.runtime.block_on(
            sqlx::query(
                r#"
                SELECT tg_thread_id
                FROM chat_thread_pairs
                WHERE chat_id = $1 AND tg_chat_id = $2
                "#,
            )
            .bind(chat.as_str())
            .bind(group.get())
            .fetch_optional(&self.pool),
        )?;
        row.map(|r| r.try_get::<i64, _>("tg_thread_id").map(ThreadId::new))
            .transpose()
            .map_err(StoreError::from)
    }

    #[instrument(skip(self), fields(group_id = %group, thread_id = %thread))]
    fn drop_chat_thread_pair(&self, group: GroupId, thread: ThreadId) -> Result<(), StoreError> {
        let result = self.runtime.block_on(
            sqlx::query("DELETE FROM chat_thread_pairs WHERE tg_chat_id = $1 AND tg_thread_id = $2")
                .bind(group.get())
                .bind(thread.get())
                .execute(&self.pool),
        )?;
        debug!(rows_affected = result.rows_affected(), "dropped chat_thread_pairs");
        Ok(())
    }

    fn save_message_pair(&self, pair: &MessageIdPair) -> Result<(), StoreError> {
        self.runtime.block_on(
            sqlx::query(
                r#"
                INSERT INTO msg_id_pairs (
                    peer_chat_id,
                    peer_message_id,
                    tg_chat_id,
                    tg_thread_id,
                    tg_message_id
                )
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (peer_chat_id, peer_message_id)
                DO UPDATE SET
                    tg_chat_id = EXCLUDED.tg_chat_id,
                    tg_thread_id = EXCLUDED.tg_thread_id,
                    tg_message_id = EXCLUDED.tg_message_id
                "#,
            )
            .bind(pair.peer_chat_id.as_str())
            .bind(&pair.peer_message_id)
            .bind(pair.tg_chat_id.get())
            .bind(pair.tg_thread_id.get())
            .bind(pair.tg_message_id)
            .execute(&self.pool),
        )?;
        Ok(())
    }

    fn message_pairs_by_thread(
        &self,
        group: GroupId,
        thread: ThreadId,
    ) -> Result<Vec<MessageIdPair>, StoreError> {
        let rows = self.runtime.block_on(
            sqlx::query(
                r#"
                SELECT peer_chat_id, peer_message_id, tg_chat_id, tg_thread_id, tg_message_id
                FROM msg_id_pairs
                WHERE tg_chat_id = $1 AND tg_thread_id = $2
                ORDER BY tg_message_id
                "#,
            )
            .bind(group.get())
            .bind(thread.get())
            .fetch_all(&self.pool),
        )?;
        rows.iter().map(message_from_row).collect()
    }

    #[instrument(skip(self), fields(group_id = %group, thread_id = %thread))]
    fn delete_message_pairs_by_thread(
        &self,
        group: GroupId,
        thread: ThreadId,
    ) -> Result<u64, StoreError> {
        let result = self.runtime.block_on(
            sqlx::query("DELETE FROM msg_id_pairs WHERE tg_chat_id = $1 AND tg_thread_id = $2")
                .bind(group.get())
                .bind(thread.get())
                .execute(&self.pool),
        )?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    fn sweep_orphan_message_pairs(&self) -> Result<u64, StoreError> {
        let result = self.runtime.block_on(
            sqlx::query(
                r#"
                DELETE FROM msg_id_pairs AS m
                WHERE NOT EXISTS (
                    SELECT 1
                    FROM chat_thread_pairs AS c
                    WHERE c.tg_chat_id = m.tg_chat_id
                      AND c.tg_thread_id = m.tg_thread_id
                )
                "#,
            )
            .execute(&self.pool),
        )?;
        Ok(result.rows_affected())
    }
}
