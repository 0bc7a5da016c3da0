use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use thiserror::Error;

use crate::models::{Body, Section, SectionId, SectionType};
use crate::sync::LessonEditor;

const SNAPSHOT_INITIAL: &str = "initial";
const SNAPSHOT_CURRENT: &str = "current";

#[derive(Error, Debug)]
pub enum DraftError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Draft for lesson '{lesson_id}' is corrupt: {reason}")]
    Corrupt { lesson_id: String, reason: String },

    #[error("Failed to encode section body: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One stored draft, as shown by `section drafts`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftSummary {
    pub lesson_id: String,
    pub pulled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub section_count: usize,
    pub pending_operations: usize,
}

pub struct DraftRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct LessonDraftRow {
    lesson_id: String,
    pulled_at: String,
    updated_at: String,
}

#[derive(sqlx::FromRow)]
struct SectionDraftRow {
    snapshot: String,
    id: String,
    section_type: String,
    content: String,
    body: String,
    sort_order: i64,
}

impl DraftRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store both snapshots of an editor, replacing any previous draft rows.
    ///
    /// `pulled_at` is kept from the existing draft; a new draft gets the
    /// current time.
    pub async fn save(&self, editor: &LessonEditor) -> Result<(), DraftError> {
        let mut tx = self.pool.begin().await?;
        let lesson_id = editor.lesson_id();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO lesson_drafts (lesson_id, pulled_at, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(lesson_id) DO UPDATE SET updated_at = excluded.updated_at
            "#,
        )
        .bind(lesson_id)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM section_drafts WHERE lesson_id = ?")
            .bind(lesson_id)
            .execute(&mut *tx)
            .await?;

        insert_sections(&mut tx, lesson_id, SNAPSHOT_INITIAL, editor.snapshot()).await?;
        insert_sections(&mut tx, lesson_id, SNAPSHOT_CURRENT, editor.sections()).await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn load(&self, lesson_id: &str) -> Result<Option<LessonEditor>, DraftError> {
        let exists: Option<(String,)> =
            sqlx::query_as("SELECT lesson_id FROM lesson_drafts WHERE lesson_id = ?")
                .bind(lesson_id)
                .fetch_optional(&self.pool)
                .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let rows: Vec<SectionDraftRow> = sqlx::query_as(
            r#"
            SELECT snapshot, id, section_type, content, body, sort_order
            FROM section_drafts
            WHERE lesson_id = ?
            ORDER BY snapshot, position
            "#,
        )
        .bind(lesson_id)
        .fetch_all(&self.pool)
        .await?;

        let mut initial = Vec::new();
        let mut current = Vec::new();
        for row in rows {
            let target = match row.snapshot.as_str() {
                SNAPSHOT_INITIAL => &mut initial,
                SNAPSHOT_CURRENT => &mut current,
                other => {
                    return Err(corrupt(lesson_id, format!("unknown snapshot '{}'", other)));
                }
            };
            target.push(hydrate_section(lesson_id, row)?);
        }

        Ok(Some(LessonEditor::from_parts(lesson_id, initial, current)))
    }

    /// Remove a lesson's draft. Returns true if one existed.
    pub async fn delete(&self, lesson_id: &str) -> Result<bool, DraftError> {
        let result = sqlx::query("DELETE FROM lesson_drafts WHERE lesson_id = ?")
            .bind(lesson_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list(&self) -> Result<Vec<DraftSummary>, DraftError> {
        let rows: Vec<LessonDraftRow> =
            sqlx::query_as("SELECT * FROM lesson_drafts ORDER BY lesson_id")
                .fetch_all(&self.pool)
                .await?;

        let mut drafts = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(editor) = self.load(&row.lesson_id).await? else {
                continue;
            };
            // A draft that no longer plans cleanly still has pending work.
            // A draft that cannot be planned still has something to fix.
            let pending_operations = editor.plan().map_or(1, |plan| plan.operation_count());

            drafts.push(DraftSummary {
                pulled_at: parse_timestamp(&row.lesson_id, &row.pulled_at)?,
                updated_at: parse_timestamp(&row.lesson_id, &row.updated_at)?,
                section_count: editor.sections().len(),
                pending_operations,
                lesson_id: row.lesson_id,
            });
        }
        Ok(drafts)
    }
}

fn encode_body(body: &Body) -> Result<String, DraftError> {
    Ok(serde_json::to_string(body)?)
}

async fn insert_sections(
    tx: &mut Transaction<'_, Sqlite>,
    lesson_id: &str,
    snapshot: &str,
    sections: &[Section],
) -> Result<(), DraftError> {
    for (position, section) in sections.iter().enumerate() {
        let body = encode_body(&section.body)?;

        sqlx::query(
            r#"
            INSERT INTO section_drafts (lesson_id, snapshot, position, id, section_type, content, body, sort_order)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(lesson_id)
        .bind(snapshot)
        .bind(position as i64)
        .bind(section.id.to_string())
        .bind(section.section_type.to_string())
        .bind(&section.content)
        .bind(&body)
        .bind(i64::from(section.order))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn hydrate_section(lesson_id: &str, row: SectionDraftRow) -> Result<Section, DraftError> {
    let id: SectionId = row
        .id
        .parse()
        .map_err(|e: crate::models::SectionIdError| corrupt(lesson_id, e.to_string()))?;
    let section_type: SectionType = row
        .section_type
        .parse()
        .map_err(|e: String| corrupt(lesson_id, e))?;
    let body: Body = serde_json::from_str(&row.body)
        .map_err(|e| corrupt(lesson_id, format!("section {} body: {}", id, e)))?;
    let order = u32::try_from(row.sort_order)
        .map_err(|_| corrupt(lesson_id, format!("section {} order {}", id, row.sort_order)))?;

    Ok(Section::new(lesson_id, section_type)
        .with_id(id)
        .with_content(row.content)
        .with_body(body)
        .with_order(order))
}

fn parse_timestamp(lesson_id: &str, value: &str) -> Result<DateTime<Utc>, DraftError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt(lesson_id, format!("timestamp '{}': {}", value, e)))
}

fn corrupt(lesson_id: &str, reason: String) -> DraftError {
    DraftError::Corrupt {
        lesson_id: lesson_id.to_string(),
        reason,
    }
}
