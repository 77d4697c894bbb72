use sqlx::SqlitePool;

use crate::error::{AppError, Result};
use crate::types::{now_ms, DocumentKind};

use super::models::DocumentRow;

/// Registers an uploaded identity document, pending review.
pub async fn insert_document(
    pool: &SqlitePool,
    user_id: Option<&str>,
    kind: DocumentKind,
    url: &str,
) -> Result<DocumentRow> {
    let id = uuid::Uuid::new_v4().simple().to_string();
    let now = now_ms();
    sqlx::query(
        r#"
        INSERT INTO user_documents (id, user_id, kind, url, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'pending', ?, ?)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(kind.to_string())
    .bind(url)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, DocumentRow>(
        "SELECT id, user_id, url, status, created_at FROM user_documents WHERE id = ?",
    )
    .bind(&id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Document"))
}
