use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use futures::{StreamExt, TryStreamExt};
use serde_json::Value;

use crate::error::{ApiResponse, AppError, Result};
use crate::handlers::extract::{AppJson, AppQuery};
use crate::models::{
    FileFilter, FileInfo, FileListResponse, FileRecord, FileResponse, NewBlob, PaginationQuery,
    UpdateFileRequest,
};
use crate::services::FileService;
use crate::AppState;

/// Upload a file
/// POST /api/v1/files (multipart: `file`, optional `metadata` JSON object)
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<FileResponse>>> {
    let mut stored: Option<FileRecord> = None;

    match receive_upload(&state, &mut multipart, &mut stored).await {
        Ok(file) => Ok(Json(ApiResponse::success(FileResponse::from(file)))),
        Err(e) => {
            // The request failed after the content was committed
            if let Some(file) = stored {
                discard_upload(&state, &file.id).await;
            }
            Err(e)
        }
    }
}

/// Read the multipart parts, storing the file part as soon as it arrives.
///
/// `stored` holds the committed file so the caller can remove it if a later part fails.
async fn receive_upload(
    state: &AppState,
    multipart: &mut Multipart,
    stored: &mut Option<FileRecord>,
) -> Result<FileRecord> {
    let mut metadata: Option<Value> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(format!("Failed to process multipart: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "metadata" => {
                let text = field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read metadata: {}", e))
                })?;
                if !text.trim().is_empty() {
                    metadata = Some(serde_json::from_str(&text)?);
                }
            }
            "file" => {
                if stored.is_some() {
                    return Err(AppError::BadRequest(
                        "Only one file per upload".to_string(),
                    ));
                }

                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .ok_or_else(|| AppError::BadRequest("No file name provided".to_string()))?;
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .or_else(|| mime_guess::from_path(&filename).first().map(|m| m.to_string()));

                let data = field
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file chunk: {}", e)))
                    .boxed();

                let blob = NewBlob {
                    filename,
                    content_type,
                    metadata: metadata.take(),
                };
                *stored = Some(FileService::store(state.storage.as_ref(), blob, data).await?);
            }
            _ => {}
        }
    }

    let file = stored
        .clone()
        .ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;

    // A metadata part sent after the file part
    match metadata {
        Some(metadata) => {
            let update = UpdateFileRequest {
                metadata: Some(metadata),
                ..Default::default()
            };
            FileService::update_file(&state.db, &file.id, update).await?;
            FileService::get_file(&state.db, &file.id).await
        }
        None => Ok(file),
    }
}

async fn discard_upload(state: &AppState, id: &str) {
    match state.storage.delete(id).await {
        Ok(_) => tracing::info!("Discarded rejected upload {}", id),
        Err(e) => tracing::warn!("Failed to discard rejected upload {}: {}", id, e),
    }
}

/// Find files by exact field values
/// GET /api/v1/files?filename=test.png&content_type=image/png
pub async fn list_files(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<HashMap<String, String>>,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>> {
    let filter = FileFilter::from_params(params)?;
    let files = FileService::find_all_file(&state.db, &filter).await?;
    Ok(Json(ApiResponse::success(files)))
}

/// One page of files; `page_index` starts at 0
/// GET /api/v1/files/page?page_index=0&page_size=10&content_type=image/png
pub async fn query_files(
    State(state): State<AppState>,
    AppQuery(mut params): AppQuery<HashMap<String, String>>,
) -> Result<Json<ApiResponse<FileListResponse>>> {
    let pagination = PaginationQuery::take_from(&mut params)?;
    let filter = FileFilter::from_params(params)?;
    let page = FileService::query_file_info(&state.db, &filter, &pagination).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// Get file info
/// GET /api/v1/files/:id
pub async fn get_file_info(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<FileInfo>>> {
    let info = FileService::find_info(&state.db, &id).await?;
    Ok(Json(ApiResponse::success(info)))
}

/// Stream a file's content
/// GET /api/v1/files/:id/download
pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let file = FileService::get_file(&state.db, &id).await?;
    let content = FileService::read_stream(state.storage.as_ref(), &id).await?;

    let content_type = file
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let fallback_name: String = file
        .filename
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    let encoded_name = urlencoding::encode(&file.filename);

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, file.length)
        .header(
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"; filename*=UTF-8''{}",
                fallback_name, encoded_name
            ),
        )
        .body(Body::from_stream(content))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

/// Update file metadata; responds with the file as it was before the update
/// PUT /api/v1/files/:id
pub async fn update_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateFileRequest>,
) -> Result<Json<ApiResponse<FileResponse>>> {
    let previous = FileService::update_file(&state.db, &id, req).await?;
    Ok(Json(ApiResponse::success(FileResponse::from(previous))))
}

/// Delete a file
/// DELETE /api/v1/files/:id
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<bool>>> {
    let deleted = FileService::delete_file(state.storage.as_ref(), &id).await?;
    Ok(Json(ApiResponse::success(deleted)))
}
