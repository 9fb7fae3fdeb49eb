use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Metadata row of a stored blob
#[derive(Debug, Clone, FromRow)]
pub struct FileRecord {
    pub id: String,
    pub filename: String,
    pub length: i64,
    pub chunk_size: i64,
    /// Hex SHA-256 of the content
    pub checksum: String,
    pub content_type: Option<String>,
    /// JSON object, if any
    pub metadata: Option<String>,
    pub upload_date: String,
}

impl FileRecord {
    pub fn metadata_value(&self) -> Option<Value> {
        self.metadata
            .as_deref()
            .and_then(|m| serde_json::from_str(m).ok())
    }

    /// Number of chunks the content is split into
    pub fn chunk_count(&self) -> i64 {
        if self.length == 0 || self.chunk_size <= 0 {
            0
        } else {
            (self.length + self.chunk_size - 1) / self.chunk_size
        }
    }
}

/// File response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileResponse {
    pub id: String,
    pub filename: String,
    pub length: i64,
    pub chunk_size: i64,
    pub checksum: String,
    pub content_type: Option<String>,
    pub metadata: Option<Value>,
    pub upload_date: String,
}

impl From<FileRecord> for FileResponse {
    fn from(file: FileRecord) -> Self {
        let metadata = file.metadata_value();
        Self {
            id: file.id,
            filename: file.filename,
            length: file.length,
            chunk_size: file.chunk_size,
            checksum: file.checksum,
            content_type: file.content_type,
            metadata,
            upload_date: file.upload_date,
        }
    }
}

/// The descriptive subset of a file's metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub filename: String,
    pub length: i64,
    pub chunk_size: i64,
    pub checksum: String,
    pub content_type: Option<String>,
}

impl From<FileRecord> for FileInfo {
    fn from(file: FileRecord) -> Self {
        Self {
            filename: file.filename,
            length: file.length,
            chunk_size: file.chunk_size,
            checksum: file.checksum,
            content_type: file.content_type,
        }
    }
}

/// Blob to be written to the store
#[derive(Debug, Clone)]
pub struct NewBlob {
    pub filename: String,
    pub content_type: Option<String>,
    pub metadata: Option<Value>,
}

/// Partial file update; absent fields are left as they are
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFileRequest {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, alias = "contentType")]
    pub content_type: Option<String>,
    /// Replaces the whole metadata object
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl UpdateFileRequest {
    pub fn is_empty(&self) -> bool {
        self.filename.is_none() && self.content_type.is_none() && self.metadata.is_none()
    }
}

/// One page of files
#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub total: i64,
    pub data: Vec<FileResponse>,
}
