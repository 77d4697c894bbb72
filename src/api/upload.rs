//! `POST /api/upload`: stores an ID-card image and registers it for review.

use std::path::Path;

use axum::{
    extract::{Multipart, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::MAX_UPLOAD_BYTES;
use crate::db::documents::insert_document;
use crate::error::{AppError, Result};
use crate::types::{now_ms, DocumentKind};

use super::routes::ApiState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub message: &'static str,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub document_id: String,
    pub user_id: Option<String>,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
}

struct UploadedFile {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

pub async fn upload_document(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut file: Option<UploadedFile> = None;
    let mut kind: Option<String> = None;
    let mut user_id: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?.to_vec();
                file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            Some("type") => kind = Some(field.text().await?),
            Some("userId") => user_id = Some(field.text().await?).filter(|s| !s.is_empty()),
            _ => {}
        }
    }

    let file = file.ok_or_else(|| AppError::BadRequest("file is required".to_string()))?;
    let kind: DocumentKind = kind
        .ok_or_else(|| AppError::BadRequest("type is required".to_string()))?
        .parse()?;

    if !file
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("image/"))
    {
        return Err(AppError::BadRequest("only image files are accepted".to_string()));
    }
    if file.bytes.is_empty() {
        return Err(AppError::BadRequest("file is empty".to_string()));
    }
    if file.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::BadRequest(format!(
            "file exceeds {} MB",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }

    let stored_name = stored_file_name(file.file_name.as_deref());
    tokio::fs::create_dir_all(&state.config.upload_dir).await?;
    tokio::fs::write(Path::new(&state.config.upload_dir).join(&stored_name), &file.bytes).await?;

    let url = format!("/uploads/{stored_name}");
    let document = insert_document(&state.pool, user_id.as_deref(), kind, &url).await?;
    info!(
        document_id = %document.id,
        kind = %kind,
        bytes = file.bytes.len(),
        "Stored identity document {url}"
    );

    Ok(Json(UploadResponse {
        success: true,
        message: "File uploaded",
        url: document.url,
        kind,
        document_id: document.id,
        user_id: document.user_id,
        status: document.status,
        created_at: DateTime::from_timestamp_millis(document.created_at),
    }))
}

/// `{millis}_{random}.{ext}`; the extension keeps only ASCII alphanumerics.
fn stored_file_name(original: Option<&str>) -> String {
    let ext: String = original
        .and_then(|name| Path::new(name).extension())
        .and_then(|e| e.to_str())
        .map(|e| {
            e.chars()
                .filter(char::is_ascii_alphanumeric)
                .take(8)
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "bin".to_string());
    let random = &uuid::Uuid::new_v4().simple().to_string()[..8];
    format!("{}_{random}.{ext}", now_ms())
}
