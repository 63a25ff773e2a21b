//! SQLite-backed conversation store: companions, conversations, messages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use reverie_domain::{
    CompanionId, CompanionProfile, Conversation, ConversationId, ConversationMessage, MessageId,
    MessageRole, SceneState,
};

use crate::infrastructure::ports::{ConversationRepo, RepoError};

pub struct SqliteConversationRepo {
    pool: SqlitePool,
}

impl SqliteConversationRepo {
    pub async fn new(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS companions (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                persona TEXT NOT NULL,
                base_visual TEXT NOT NULL,
                user_appearance TEXT
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                companion_id TEXT NOT NULL,
                user_name TEXT NOT NULL,
                scene_outfit TEXT NOT NULL,
                scene_location TEXT NOT NULL,
                scene_action TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                image_ref TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation
             ON messages (conversation_id, created_at)",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Seed a companion profile. Character creation lives outside this
    /// service; this exists for bootstrap scripts and tests.
    pub async fn create_companion(&self, profile: &CompanionProfile) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO companions (id, name, persona, base_visual, user_appearance)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(profile.id.to_string())
        .bind(&profile.name)
        .bind(&profile.persona)
        .bind(&profile.base_visual)
        .bind(&profile.user_appearance)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("companions", e))?;

        Ok(())
    }

    /// Seed a conversation with its initial scene.
    pub async fn create_conversation(&self, conversation: &Conversation) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO conversations (
                id, companion_id, user_name, scene_outfit, scene_location, scene_action, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(conversation.id.to_string())
        .bind(conversation.companion_id.to_string())
        .bind(&conversation.user_name)
        .bind(&conversation.scene.outfit)
        .bind(&conversation.scene.location)
        .bind(&conversation.scene.action)
        .bind(conversation.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("conversations", e))?;

        Ok(())
    }
}

#[async_trait]
impl ConversationRepo for SqliteConversationRepo {
    async fn get(&self, id: ConversationId) -> Result<Option<Conversation>, RepoError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("conversations", e))?;

        row.map(row_to_conversation).transpose()
    }

    async fn get_companion(
        &self,
        id: CompanionId,
    ) -> Result<Option<CompanionProfile>, RepoError> {
        let row = sqlx::query("SELECT * FROM companions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("companions", e))?;

        row.map(row_to_companion).transpose()
    }

    async fn update_scene_state(
        &self,
        id: ConversationId,
        scene: &SceneState,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE conversations SET scene_outfit = ?, scene_location = ?, scene_action = ?
             WHERE id = ?",
        )
        .bind(&scene.outfit)
        .bind(&scene.location)
        .bind(&scene.action)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("conversations", e))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        Ok(())
    }

    async fn recent_messages(
        &self,
        id: ConversationId,
        limit: usize,
    ) -> Result<Vec<ConversationMessage>, RepoError> {
        // Newest-first page, then reversed so callers see chronological order.
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE conversation_id = ?
             ORDER BY created_at DESC LIMIT ?",
        )
        .bind(id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("messages", e))?;

        let mut messages = rows
            .into_iter()
            .map(row_to_message)
            .collect::<Result<Vec<_>, _>>()?;
        messages.reverse();
        Ok(messages)
    }

    async fn insert_message(&self, message: &ConversationMessage) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO messages (id, conversation_id, role, content, image_ref, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(message.id.to_string())
        .bind(message.conversation_id.to_string())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(&message.image_ref)
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("messages", e))?;

        Ok(())
    }
}

fn parse_id(value: &str) -> Result<Uuid, RepoError> {
    Uuid::parse_str(value).map_err(|e| RepoError::Serialization(format!("bad id '{value}': {e}")))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepoError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepoError::Serialization(format!("bad timestamp '{value}': {e}")))
}

fn row_to_conversation(row: SqliteRow) -> Result<Conversation, RepoError> {
    let db = |e: sqlx::Error| RepoError::database("conversations", e);

    let id: String = row.try_get("id").map_err(db)?;
    let companion_id: String = row.try_get("companion_id").map_err(db)?;
    let created_at: String = row.try_get("created_at").map_err(db)?;

    Ok(Conversation {
        id: ConversationId::from_uuid(parse_id(&id)?),
        companion_id: CompanionId::from_uuid(parse_id(&companion_id)?),
        user_name: row.try_get("user_name").map_err(db)?,
        scene: SceneState {
            outfit: row.try_get("scene_outfit").map_err(db)?,
            location: row.try_get("scene_location").map_err(db)?,
            action: row.try_get("scene_action").map_err(db)?,
        },
        created_at: parse_timestamp(&created_at)?,
    })
}

fn row_to_companion(row: SqliteRow) -> Result<CompanionProfile, RepoError> {
    let db = |e: sqlx::Error| RepoError::database("companions", e);

    let id: String = row.try_get("id").map_err(db)?;

    Ok(CompanionProfile {
        id: CompanionId::from_uuid(parse_id(&id)?),
        name: row.try_get("name").map_err(db)?,
        persona: row.try_get("persona").map_err(db)?,
        base_visual: row.try_get("base_visual").map_err(db)?,
        user_appearance: row.try_get("user_appearance").map_err(db)?,
    })
}

fn row_to_message(row: SqliteRow) -> Result<ConversationMessage, RepoError> {
    let db = |e: sqlx::Error| RepoError::database("messages", e);

    let id: String = row.try_get("id").map_err(db)?;
    let conversation_id: String = row.try_get("conversation_id").map_err(db)?;
    let role_str: String = row.try_get("role").map_err(db)?;
    let role = MessageRole::parse(&role_str)
        .ok_or_else(|| RepoError::Serialization(format!("unknown role '{role_str}'")))?;
    let created_at: String = row.try_get("created_at").map_err(db)?;

    Ok(ConversationMessage {
        id: MessageId::from_uuid(parse_id(&id)?),
        conversation_id: ConversationId::from_uuid(parse_id(&conversation_id)?),
        role,
        content: row.try_get("content").map_err(db)?,
        image_ref: row.try_get("image_ref").map_err(db)?,
        created_at: parse_timestamp(&created_at)?,
    })
}
