use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, Multipart, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::errors::AppError;
use crate::extract::Path;
use crate::response::ApiResponse;
use crate::state::AppState;

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct UploadedFile {
    pub filename: String,
    pub size: u64,
}

/// POST /api/v1/uploads (multipart field `file`)
pub async fn handle_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<UploadedFile>, AppError> {
    let mut multipart = multipart?;
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let original = field
            .file_name()
            .ok_or_else(|| AppError::Validation("file name is missing".to_string()))?
            .to_string();

        let (stored, mut file) = state.uploads.create(&original).await?;
        let mut size = 0u64;
        loop {
            let chunk = match field.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    state.uploads.discard(&stored).await;
                    return Err(AppError::Validation(e.body_text()));
                }
            };
            size += chunk.len() as u64;
            if let Err(e) = file.write_all(&chunk).await {
                state.uploads.discard(&stored).await;
                return Err(anyhow::Error::new(e).context("Failed to write upload").into());
            }
        }
        if let Err(e) = file.flush().await {
            state.uploads.discard(&stored).await;
            return Err(anyhow::Error::new(e).context("Failed to flush upload").into());
        }

        info!(filename = %stored, size, "File uploaded");
        return Ok(ApiResponse::created(UploadedFile {
            filename: stored,
            size,
        }));
    }

    Err(AppError::Validation("multipart field 'file' is required".to_string()))
}

/// GET /api/v1/uploads/:filename
pub async fn handle_download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let (file, len) = state.uploads.open(&filename).await?;
    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        [
            (CONTENT_TYPE, "application/octet-stream".to_string()),
            (CONTENT_LENGTH, len.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}
