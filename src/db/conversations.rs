use chrono::Utc;
use sqlx::{query, query_as, sqlite::SqliteRow, FromRow, Row, SqlitePool};

use crate::domain::Conversation;

/// Chats the bot has observed. The Bot API cannot list dialogs, so this
/// registry is what "known conversations" means for a bot account.
#[derive(Clone)]
pub struct ConversationRepository {
    pool: SqlitePool,
}

impl ConversationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Inserts the chat or refreshes its title; first-seen order is kept.
    pub async fn record(&self, conversation: &Conversation) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        query(
            r#"INSERT INTO conversations (chat_id, title, is_group, first_seen_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?4)
                ON CONFLICT(chat_id) DO UPDATE SET
                    title = excluded.title,
                    is_group = excluded.is_group,
                    updated_at = excluded.updated_at"#,
        )
        .bind(conversation.id)
        .bind(&conversation.name)
        .bind(conversation.is_group)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Conversation>, sqlx::Error> {
        let rows = query_as::<_, ConversationRow>(
            r#"SELECT chat_id, title, is_group
                FROM conversations ORDER BY seq ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Conversation::from).collect())
    }
}

#[derive(Debug, Clone)]
struct ConversationRow {
    chat_id: i64,
    title: String,
    is_group: bool,
}

impl<'r> FromRow<'r, SqliteRow> for ConversationRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            chat_id: row.try_get("chat_id")?,
            title: row.try_get("title")?,
            is_group: row.try_get("is_group")?,
        })
    }
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Conversation {
            id: row.chat_id,
            name: row.title,
            is_group: row.is_group,
        }
    }
}
