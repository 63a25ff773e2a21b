//! SQLite-backed execution record store.
//!
//! Append semantics for `streamed_text` are pushed into SQL
//! (`streamed_text || ?`) so concurrent readers never see a partial
//! overwrite, only a shorter prefix.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use reverie_domain::{
    ConversationId, ExecutionId, ExecutionRecord, ExecutionStatus, MessageId, SceneState,
    TurnResult,
};

use crate::infrastructure::ports::{ExecutionRepo, RepoError};

pub struct SqliteExecutionRepo {
    pool: SqlitePool,
}

impl SqliteExecutionRepo {
    pub async fn new(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS executions (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                status TEXT NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                current_step TEXT NOT NULL DEFAULT '',
                streamed_text TEXT NOT NULL DEFAULT '',
                result_text TEXT,
                result_image_ref TEXT,
                result_scene TEXT,
                error TEXT,
                source_message_id TEXT,
                finalized_message_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_executions_conversation
             ON executions (conversation_id, status)",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl ExecutionRepo for SqliteExecutionRepo {
    async fn insert(&self, record: &ExecutionRecord) -> Result<(), RepoError> {
        let scene_json = record
            .result_scene
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RepoError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO executions (
                id, conversation_id, status, progress, current_step, streamed_text,
                result_text, result_image_ref, result_scene, error,
                source_message_id, finalized_message_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.conversation_id.to_string())
        .bind(record.status.as_str())
        .bind(record.progress as i64)
        .bind(&record.current_step)
        .bind(&record.streamed_text)
        .bind(&record.result_text)
        .bind(&record.result_image_ref)
        .bind(scene_json)
        .bind(&record.error)
        .bind(record.source_message_id.map(|id| id.to_string()))
        .bind(record.finalized_message_id.map(|id| id.to_string()))
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("executions", e))?;

        Ok(())
    }

    async fn get(&self, id: ExecutionId) -> Result<Option<ExecutionRecord>, RepoError> {
        let row = sqlx::query("SELECT * FROM executions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("executions", e))?;

        row.map(row_to_record).transpose()
    }

    async fn set_stage(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        progress: u8,
        current_step: &str,
    ) -> Result<(), RepoError> {
        sqlx::query(
            "UPDATE executions SET status = ?, progress = ?, current_step = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(progress as i64)
        .bind(current_step)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("executions", e))?;

        Ok(())
    }

    async fn append_streamed_text(&self, id: ExecutionId, chunk: &str) -> Result<(), RepoError> {
        sqlx::query(
            "UPDATE executions SET streamed_text = streamed_text || ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(chunk)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("executions", e))?;

        Ok(())
    }

    async fn reset_streamed_text(&self, id: ExecutionId) -> Result<(), RepoError> {
        sqlx::query(
            "UPDATE executions SET streamed_text = '', updated_at = ?
             WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("executions", e))?;

        Ok(())
    }

    async fn complete(&self, id: ExecutionId, result: &TurnResult) -> Result<(), RepoError> {
        let scene_json = serde_json::to_string(&result.final_scene)
            .map_err(|e| RepoError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE executions SET
                status = 'completed', progress = 100, current_step = 'done',
                result_text = ?, result_image_ref = ?, result_scene = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&result.text)
        .bind(&result.image_ref)
        .bind(scene_json)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("executions", e))?;

        Ok(())
    }

    async fn fail(&self, id: ExecutionId, error: &str) -> Result<(), RepoError> {
        sqlx::query(
            "UPDATE executions SET status = 'failed', error = ?, updated_at = ? WHERE id = ?",
        )
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("executions", e))?;

        Ok(())
    }

    async fn set_finalized(&self, id: ExecutionId, message_id: MessageId) -> Result<(), RepoError> {
        sqlx::query(
            "UPDATE executions SET finalized_message_id = ?, updated_at = ? WHERE id = ?",
        )
        .bind(message_id.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("executions", e))?;

        Ok(())
    }

    async fn active_for_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<ExecutionId>, RepoError> {
        let row = sqlx::query(
            "SELECT id FROM executions
             WHERE conversation_id = ? AND status NOT IN ('completed', 'failed')
             LIMIT 1",
        )
        .bind(conversation_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::database("executions", e))?;

        row.map(|r| {
            let id: String = r
                .try_get("id")
                .map_err(|e| RepoError::database("executions", e))?;
            parse_id(&id).map(ExecutionId::from_uuid)
        })
        .transpose()
    }

    async fn fail_orphaned(&self, error: &str) -> Result<u64, RepoError> {
        let result = sqlx::query(
            "UPDATE executions SET status = 'failed', error = ?, updated_at = ?
             WHERE status NOT IN ('completed', 'failed')",
        )
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("executions", e))?;

        Ok(result.rows_affected())
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

fn row_to_record(row: SqliteRow) -> Result<ExecutionRecord, RepoError> {
    let db = |e: sqlx::Error| RepoError::database("executions", e);

    let status_str: String = row.try_get("status").map_err(db)?;
    let status = ExecutionStatus::parse(&status_str)
        .ok_or_else(|| RepoError::Serialization(format!("unknown status '{status_str}'")))?;

    let scene_json: Option<String> = row.try_get("result_scene").map_err(db)?;
    let result_scene: Option<SceneState> = scene_json
        .map(|json| serde_json::from_str(&json))
        .transpose()
        .map_err(|e| RepoError::Serialization(e.to_string()))?;

    let id: String = row.try_get("id").map_err(db)?;
    let conversation_id: String = row.try_get("conversation_id").map_err(db)?;
    let source_message_id: Option<String> = row.try_get("source_message_id").map_err(db)?;
    let finalized_message_id: Option<String> = row.try_get("finalized_message_id").map_err(db)?;
    let created_at: String = row.try_get("created_at").map_err(db)?;
    let updated_at: String = row.try_get("updated_at").map_err(db)?;
    let progress: i64 = row.try_get("progress").map_err(db)?;

    Ok(ExecutionRecord {
        id: ExecutionId::from_uuid(parse_id(&id)?),
        conversation_id: ConversationId::from_uuid(parse_id(&conversation_id)?),
        status,
        progress: progress.clamp(0, 100) as u8,
        current_step: row.try_get("current_step").map_err(db)?,
        streamed_text: row.try_get("streamed_text").map_err(db)?,
        result_text: row.try_get("result_text").map_err(db)?,
        result_image_ref: row.try_get("result_image_ref").map_err(db)?,
        result_scene,
        error: row.try_get("error").map_err(db)?,
        source_message_id: source_message_id
            .map(|s| parse_id(&s).map(MessageId::from_uuid))
            .transpose()?,
        finalized_message_id: finalized_message_id
            .map(|s| parse_id(&s).map(MessageId::from_uuid))
            .transpose()?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}
