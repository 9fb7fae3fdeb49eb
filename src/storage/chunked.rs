use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures::{stream, StreamExt};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{FileRecord, NewBlob};
use crate::storage::{BlobStore, ByteStream};

/// Blob store keeping content as numbered chunks in `fs_chunks`, indexed by `fs_files`.
///
/// Chunks are written first and the `fs_files` row last, so a file is only
/// visible once all of its content is in place.
pub struct ChunkedBlobStore {
    db: Database,
    chunk_size: usize,
}

impl ChunkedBlobStore {
    pub fn new(db: Database, chunk_size: usize) -> Self {
        Self {
            db,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Write the stream as chunks, returning the total length and hex SHA-256
    async fn write_chunks(&self, id: &str, mut data: ByteStream<'_>) -> Result<(i64, String)> {
        let mut hasher = Sha256::new();
        let mut buf = BytesMut::with_capacity(self.chunk_size);
        let mut n: i64 = 0;
        let mut length: i64 = 0;

        while let Some(piece) = data.next().await {
            let mut piece = piece?;
            hasher.update(&piece);
            length += piece.len() as i64;

            while !piece.is_empty() {
                let take = (self.chunk_size - buf.len()).min(piece.len());
                buf.extend_from_slice(&piece.split_to(take));
                if buf.len() == self.chunk_size {
                    self.insert_chunk(id, n, buf.split().freeze()).await?;
                    n += 1;
                }
            }
        }

        if !buf.is_empty() {
            self.insert_chunk(id, n, buf.freeze()).await?;
        }

        Ok((length, format!("{:x}", hasher.finalize())))
    }

    async fn insert_chunk(&self, id: &str, n: i64, chunk: Bytes) -> Result<()> {
        sqlx::query("INSERT INTO fs_chunks (files_id, n, data) VALUES (?, ?, ?)")
            .bind(id)
            .bind(n)
            .bind(&chunk[..])
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    async fn remove_chunks(&self, id: &str) {
        if let Err(e) = sqlx::query("DELETE FROM fs_chunks WHERE files_id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await
        {
            tracing::warn!("Failed to clean up chunks of aborted upload {}: {}", id, e);
        }
    }

    async fn insert_record(&self, record: &FileRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fs_files (id, filename, length, chunk_size, checksum, content_type, metadata, upload_date)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.filename)
        .bind(record.length)
        .bind(record.chunk_size)
        .bind(&record.checksum)
        .bind(&record.content_type)
        .bind(&record.metadata)
        .bind(&record.upload_date)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }
}

async fn read_chunk(
    pool: SqlitePool,
    id: String,
    n: i64,
    total: i64,
) -> Result<Option<(Bytes, i64)>> {
    if n >= total {
        return Ok(None);
    }

    let data: Option<Vec<u8>> =
        sqlx::query_scalar("SELECT data FROM fs_chunks WHERE files_id = ? AND n = ?")
            .bind(&id)
            .bind(n)
            .fetch_optional(&pool)
            .await?;

    let data = data.ok_or_else(|| {
        AppError::Storage(format!("Chunk {} of file {} is missing", n, id))
    })?;

    Ok(Some((Bytes::from(data), n + 1)))
}

#[async_trait]
impl BlobStore for ChunkedBlobStore {
    async fn put(&self, blob: NewBlob, data: ByteStream<'_>) -> Result<FileRecord> {
        let id = Uuid::new_v4().to_string();
        let metadata = blob
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let (length, checksum) = match self.write_chunks(&id, data).await {
            Ok(written) => written,
            Err(e) => {
                self.remove_chunks(&id).await;
                return Err(e);
            }
        };

        let record = FileRecord {
            id,
            filename: blob.filename,
            length,
            chunk_size: self.chunk_size as i64,
            checksum,
            content_type: blob.content_type,
            metadata,
            upload_date: Utc::now().to_rfc3339(),
        };

        if let Err(e) = self.insert_record(&record).await {
            self.remove_chunks(&record.id).await;
            return Err(e);
        }

        tracing::debug!(
            "Stored {} ({} bytes, {} chunks) as {}",
            record.filename,
            record.length,
            record.chunk_count(),
            record.id
        );
        Ok(record)
    }

    async fn open(&self, id: &str) -> Result<ByteStream<'static>> {
        let record: FileRecord = sqlx::query_as("SELECT * FROM fs_files WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File #{} not found", id)))?;

        let total = record.chunk_count();
        let pool = self.db.pool().clone();
        let id = record.id;

        let chunks = stream::try_unfold(0i64, move |n| read_chunk(pool.clone(), id.clone(), n, total));
        Ok(chunks.boxed())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut tx = self.db.pool().begin().await?;

        let removed = sqlx::query("DELETE FROM fs_files WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM fs_chunks WHERE files_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if removed > 0 {
            tracing::debug!("Deleted blob {}", id);
        }
        Ok(removed > 0)
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn storage_type(&self) -> &'static str {
        "chunked"
    }
}
