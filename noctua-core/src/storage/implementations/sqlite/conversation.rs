//! SQLite implementation of ConversationStore

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use llm::Role;
use rusqlite::{Connection, OptionalExtension, params};

use super::{SqliteStore, from_sql_time, to_sql_time};
use crate::storage::ids::ConversationId;
use crate::storage::traits::ConversationStore;
use crate::storage::types::{
    Conversation, ConversationPatch, Message, MessageMetadata, Stored, StoredConversation,
};

pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            deleted_at TEXT
        );

        CREATE TABLE IF NOT EXISTS messages (
            conversation_id TEXT NOT NULL REFERENCES conversations(id),
            seq INTEGER NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            metadata TEXT,
            PRIMARY KEY (conversation_id, seq)
        );
        "#,
    )
    .context("Failed to initialize conversation schema")?;
    Ok(())
}

fn role_from_sql(value: &str) -> rusqlite::Result<Role> {
    match value {
        "user" => Ok(Role::User),
        "assistant" => Ok(Role::Assistant),
        other => Err(rusqlite::Error::InvalidColumnType(
            2,
            format!("role {}", other),
            rusqlite::types::Type::Text,
        )),
    }
}

fn load_messages(conn: &Connection, id: &ConversationId) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT role, content, timestamp, metadata FROM messages
         WHERE conversation_id = ?1 ORDER BY seq",
    )?;
    let rows = stmt.query_map(params![id], |row| {
        let role: String = row.get(0)?;
        let timestamp: String = row.get(2)?;
        let metadata: Option<String> = row.get(3)?;
        Ok((role, row.get::<_, String>(1)?, timestamp, metadata))
    })?;

    let mut messages = Vec::new();
    for row in rows {
        let (role, content, timestamp, metadata) = row?;
        let metadata = metadata
            .map(|json| serde_json::from_str::<MessageMetadata>(&json))
            .transpose()
            .context("Corrupt message metadata")?;
        messages.push(Message {
            role: role_from_sql(&role)?,
            content,
            timestamp: from_sql_time(&timestamp)?,
            metadata,
        });
    }
    Ok(messages)
}

fn load_conversation(conn: &Connection, id: &ConversationId) -> Result<Option<StoredConversation>> {
    let row = conn
        .query_row(
            "SELECT user_id, title, created_at, updated_at, is_deleted, deleted_at
             FROM conversations WHERE id = ?1",
            params![id],
            |row| {
                let created_at: String = row.get(2)?;
                let updated_at: String = row.get(3)?;
                let deleted_at: Option<String> = row.get(5)?;
                Ok(Conversation {
                    user_id: row.get(0)?,
                    title: row.get(1)?,
                    messages: Vec::new(),
                    created_at: from_sql_time(&created_at)?,
                    updated_at: from_sql_time(&updated_at)?,
                    is_deleted: row.get(4)?,
                    deleted_at: deleted_at.as_deref().map(from_sql_time).transpose()?,
                })
            },
        )
        .optional()?;

    let Some(mut conversation) = row else {
        return Ok(None);
    };
    conversation.messages = load_messages(conn, id)?;
    Ok(Some(Stored::new(id.clone(), conversation)))
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn create_conversation(&self, conversation: Conversation) -> Result<ConversationId> {
        let id = ConversationId::new();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO conversations (id, user_id, title, created_at, updated_at, is_deleted, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                conversation.user_id,
                conversation.title,
                to_sql_time(&conversation.created_at),
                to_sql_time(&conversation.updated_at),
                conversation.is_deleted,
                conversation.deleted_at.as_ref().map(to_sql_time),
            ],
        )?;
        insert_messages(&tx, &id, &conversation.messages)?;
        tx.commit()?;
        Ok(id)
    }

    async fn get_conversation(&self, id: &ConversationId) -> Result<Option<StoredConversation>> {
        let conn = self.conn()?;
        load_conversation(&conn, id)
    }

    async fn get_conversations(&self, ids: &[ConversationId]) -> Result<Vec<StoredConversation>> {
        let conn = self.conn()?;
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(conversation) = load_conversation(&conn, id)? {
                found.push(conversation);
            }
        }
        Ok(found)
    }

    async fn conversation_exists(&self, id: &ConversationId) -> Result<bool> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM conversations WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    async fn append_messages(
        &self,
        id: &ConversationId,
        messages: Vec<Message>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let updated = tx.execute(
            "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
            params![id, to_sql_time(&updated_at)],
        )?;
        if updated == 0 {
            bail!("conversation {} not found", id);
        }
        insert_messages(&tx, id, &messages)?;
        tx.commit()?;
        Ok(())
    }

    async fn update_conversation(
        &self,
        id: &ConversationId,
        patch: ConversationPatch,
    ) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE conversations SET
                title = COALESCE(?2, title),
                updated_at = COALESCE(?3, updated_at),
                is_deleted = COALESCE(?4, is_deleted),
                deleted_at = COALESCE(?5, deleted_at)
             WHERE id = ?1",
            params![
                id,
                patch.title,
                patch.updated_at.as_ref().map(to_sql_time),
                patch.is_deleted,
                patch.deleted_at.as_ref().map(to_sql_time),
            ],
        )?;
        if updated == 0 {
            bail!("conversation {} not found", id);
        }
        Ok(())
    }
}

fn insert_messages(conn: &Connection, id: &ConversationId, messages: &[Message]) -> Result<()> {
    if messages.is_empty() {
        return Ok(());
    }
    let next_seq: i64 = conn.query_row(
        "SELECT COALESCE(MAX(seq), -1) + 1 FROM messages WHERE conversation_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO messages (conversation_id, seq, role, content, timestamp, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for (offset, message) in messages.iter().enumerate() {
        let metadata = message
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        stmt.execute(params![
            id,
            next_seq + offset as i64,
            message.role.as_str(),
            message.content,
            to_sql_time(&message.timestamp),
            metadata,
        ])?;
    }
    Ok(())
}
