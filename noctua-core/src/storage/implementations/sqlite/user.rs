//! SQLite implementation of UserStore

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};

use super::{SqliteStore, from_sql_time, to_sql_time};
use crate::storage::ids::ConversationId;
use crate::storage::traits::UserStore;
use crate::storage::types::User;

pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            email TEXT PRIMARY KEY,
            name TEXT,
            image TEXT,
            created_at TEXT NOT NULL
        );

        -- Ordered set of conversations per user
        CREATE TABLE IF NOT EXISTS user_conversations (
            email TEXT NOT NULL,
            conversation_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (email, conversation_id)
        );
        CREATE INDEX IF NOT EXISTS idx_user_conversations_position
            ON user_conversations(email, position);
        "#,
    )
    .context("Failed to initialize user schema")?;
    Ok(())
}

fn load_user(conn: &Connection, email: &str) -> Result<Option<User>> {
    let row = conn
        .query_row(
            "SELECT email, name, image, created_at FROM users WHERE email = ?1",
            params![email],
            |row| {
                let created_at: String = row.get(3)?;
                Ok(User {
                    email: row.get(0)?,
                    name: row.get(1)?,
                    image: row.get(2)?,
                    conversation_ids: Vec::new(),
                    created_at: from_sql_time(&created_at)?,
                })
            },
        )
        .optional()?;

    let Some(mut user) = row else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT conversation_id FROM user_conversations WHERE email = ?1 ORDER BY position",
    )?;
    user.conversation_ids = stmt
        .query_map(params![email], |row| row.get::<_, ConversationId>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Some(user))
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn get_user(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        load_user(&conn, email)
    }

    async fn user_exists(&self, email: &str) -> Result<bool> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
            params![email],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    async fn create_user(&self, user: User) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO users (email, name, image, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user.email, user.name, user.image, to_sql_time(&user.created_at)],
        )?;
        tx.execute(
            "DELETE FROM user_conversations WHERE email = ?1",
            params![user.email],
        )?;
        for (position, id) in user.conversation_ids.iter().enumerate() {
            tx.execute(
                "INSERT OR IGNORE INTO user_conversations (email, conversation_id, position)
                 VALUES (?1, ?2, ?3)",
                params![user.email, id, position as i64],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn ensure_user(&self, user: User) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO users (email, name, image, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user.email, user.name, user.image, to_sql_time(&user.created_at)],
        )?;
        if inserted == 1 {
            for (position, id) in user.conversation_ids.iter().enumerate() {
                tx.execute(
                    "INSERT OR IGNORE INTO user_conversations (email, conversation_id, position)
                     VALUES (?1, ?2, ?3)",
                    params![user.email, id, position as i64],
                )?;
            }
        }
        tx.commit()?;
        Ok(inserted == 1)
    }

    async fn append_conversation_id(&self, email: &str, id: &ConversationId) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
            params![email],
            |row| row.get(0),
        )?;
        if !exists {
            bail!("user {} not found", email);
        }
        tx.execute(
            "INSERT OR IGNORE INTO user_conversations (email, conversation_id, position)
             VALUES (?1, ?2,
                (SELECT COALESCE(MAX(position), -1) + 1 FROM user_conversations WHERE email = ?1))",
            params![email, id],
        )?;
        tx.commit()?;
        Ok(())
    }

    async fn remove_conversation_id(&self, email: &str, id: &ConversationId) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM user_conversations WHERE email = ?1 AND conversation_id = ?2",
            params![email, id],
        )?;
        Ok(())
    }
}
