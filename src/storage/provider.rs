use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::models::{FileRecord, NewBlob};

/// A stream of content bytes
pub type ByteStream<'a> = BoxStream<'a, Result<Bytes>>;

/// Blob storage: content chunks plus one metadata row per file
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store the bytes of `data` as a new file and return its metadata
    async fn put(&self, blob: NewBlob, data: ByteStream<'_>) -> Result<FileRecord>;

    /// Open the content of a stored file for reading
    async fn open(&self, id: &str) -> Result<ByteStream<'static>>;

    /// Remove a file and its content; `false` if it did not exist
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Chunk size applied to new files
    fn chunk_size(&self) -> usize;

    /// Get the storage type name
    fn storage_type(&self) -> &'static str;
}
