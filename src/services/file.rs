use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite};

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    FileFilter, FileInfo, FileListResponse, FileRecord, FileResponse, NewBlob, PaginationQuery,
    UpdateFileRequest,
};
use crate::storage::{BlobStore, ByteStream};

/// File service
pub struct FileService;

impl FileService {
    /// Store an uploaded file in the blob store
    pub async fn store(
        store: &dyn BlobStore,
        blob: NewBlob,
        data: ByteStream<'_>,
    ) -> Result<FileRecord> {
        validate_filename(&blob.filename)?;
        if let Some(ref metadata) = blob.metadata {
            validate_metadata(metadata)?;
        }

        let record = store.put(blob, data).await?;
        tracing::info!(
            "Stored file {} ({} bytes) as {}",
            record.filename,
            record.length,
            record.id
        );
        Ok(record)
    }

    /// Open a stored file's content for reading
    pub async fn read_stream(store: &dyn BlobStore, id: &str) -> Result<ByteStream<'static>> {
        store.open(id).await
    }

    /// Get a file's metadata record
    pub async fn get_file(db: &Database, id: &str) -> Result<FileRecord> {
        let file: FileRecord = sqlx::query_as("SELECT * FROM fs_files WHERE id = ?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File #{} not found", id)))?;

        Ok(file)
    }

    pub async fn find_info(db: &Database, id: &str) -> Result<FileInfo> {
        Self::get_file(db, id).await.map(FileInfo::from)
    }

    /// Delete a file and its content
    pub async fn delete_file(store: &dyn BlobStore, id: &str) -> Result<bool> {
        if !store.delete(id).await? {
            return Err(AppError::NotFound(format!("File #{} not found", id)));
        }
        tracing::info!("Deleted file {}", id);
        Ok(true)
    }

    /// All files matching the filter, unpaginated
    pub async fn find_all_file(db: &Database, filter: &FileFilter) -> Result<Vec<FileResponse>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM fs_files");
        filter.push_where(&mut query);
        query.push(" ORDER BY rowid");

        let files: Vec<FileRecord> = query.build_query_as().fetch_all(db.pool()).await?;
        Ok(files.into_iter().map(FileResponse::from).collect())
    }

    /// One page of files matching the filter; `page_index` starts at 0.
    ///
    /// `total` counts every stored file, whatever the filter.
    pub async fn query_file_info(
        db: &Database,
        filter: &FileFilter,
        pagination: &PaginationQuery,
    ) -> Result<FileListResponse> {
        let page = pagination.zero_based()?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fs_files")
            .fetch_one(db.pool())
            .await?;

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM fs_files");
        filter.push_where(&mut query);
        query.push(" ORDER BY rowid LIMIT ");
        query.push_bind(page.limit);
        query.push(" OFFSET ");
        query.push_bind(page.offset);

        let files: Vec<FileRecord> = query.build_query_as().fetch_all(db.pool()).await?;

        Ok(FileListResponse {
            total,
            data: files.into_iter().map(FileResponse::from).collect(),
        })
    }

    /// Apply a partial update and return the record as it was before the update
    pub async fn update_file(
        db: &Database,
        id: &str,
        req: UpdateFileRequest,
    ) -> Result<FileRecord> {
        if let Some(ref name) = req.filename {
            validate_filename(name)?;
        }
        if let Some(ref content_type) = req.content_type {
            validate_content_type(content_type)?;
        }
        if let Some(ref metadata) = req.metadata {
            validate_metadata(metadata)?;
        }

        let mut tx = db.pool().begin_with("BEGIN IMMEDIATE").await?;

        let existing: FileRecord = sqlx::query_as("SELECT * FROM fs_files WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File #{} not found", id)))?;

        if !req.is_empty() {
            let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE fs_files SET ");
            let mut separated = query.separated(", ");

            if let Some(filename) = req.filename {
                separated.push("filename = ");
                separated.push_bind_unseparated(filename);
            }
            if let Some(content_type) = req.content_type {
                separated.push("content_type = ");
                separated.push_bind_unseparated(content_type);
            }
            if let Some(metadata) = req.metadata {
                let metadata = match metadata {
                    Value::Null => None,
                    other => Some(serde_json::to_string(&other)?),
                };
                separated.push("metadata = ");
                separated.push_bind_unseparated(metadata);
            }

            query.push(" WHERE id = ");
            query.push_bind(id);
            query.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;

        tracing::info!("Updated file {}", id);
        Ok(existing)
    }
}

fn validate_filename(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.len() > 255 || name.chars().any(char::is_control) {
        return Err(AppError::BadRequest("Invalid file name".to_string()));
    }
    Ok(())
}

fn validate_content_type(content_type: &str) -> Result<()> {
    if content_type.trim().is_empty() || content_type.chars().any(char::is_control) {
        return Err(AppError::BadRequest("Invalid content type".to_string()));
    }
    Ok(())
}

fn validate_metadata(metadata: &Value) -> Result<()> {
    if !(metadata.is_object() || metadata.is_null()) {
        return Err(AppError::BadRequest(
            "File metadata must be a JSON object".to_string(),
        ));
    }
    Ok(())
}
