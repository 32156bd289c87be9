use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{ByteStream, FileId, SharedBackend, StorageResult, Uploadable};

/// A backend plus an identifier. Cheap to clone; every method does fresh I/O.
#[derive(Clone)]
pub struct StoredFile {
    backend: SharedBackend,
    id: FileId,
}

impl StoredFile {
    pub fn new(backend: SharedBackend, id: FileId) -> Self {
        Self { backend, id }
    }

    pub fn id(&self) -> &FileId {
        &self.id
    }

    pub fn backend(&self) -> &SharedBackend {
        &self.backend
    }

    pub async fn read(&self) -> StorageResult<Bytes> {
        self.backend.read(&self.id).await
    }

    pub async fn stream(&self) -> StorageResult<ByteStream> {
        self.backend.stream(&self.id).await
    }

    pub async fn size(&self) -> StorageResult<u64> {
        self.backend.size(&self.id).await
    }

    pub async fn exists(&self) -> StorageResult<bool> {
        self.backend.exists(&self.id).await
    }

    pub async fn delete(&self) -> StorageResult<()> {
        self.backend.delete(&self.id).await
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.backend.path(&self.id)
    }

    /// Re-offer this content as an upload to another backend.
    ///
    /// Stats the content once so the upload has a known size.
    pub async fn to_upload(&self) -> StorageResult<StoredUpload> {
        let size = self.size().await?;
        Ok(StoredUpload {
            path: self.path(),
            file: self.clone(),
            size,
            filename: None,
            content_type: None,
        })
    }
}

impl std::fmt::Debug for StoredFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredFile")
            .field("backend", &self.backend.name())
            .field("id", &self.id)
            .finish()
    }
}

impl PartialEq for StoredFile {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.backend.name() == other.backend.name()
    }
}

/// Stored content being copied into another backend
#[derive(Debug, Clone)]
pub struct StoredUpload {
    file: StoredFile,
    size: u64,
    path: Option<PathBuf>,
    filename: Option<String>,
    content_type: Option<String>,
}

impl StoredUpload {
    pub fn with_filename(mut self, filename: Option<String>) -> Self {
        self.filename = filename;
        self
    }

    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }
}

#[async_trait]
impl Uploadable for StoredUpload {
    fn size(&self) -> u64 {
        self.size
    }

    async fn open(&self) -> StorageResult<ByteStream> {
        self.file.stream().await
    }

    fn local_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn original_filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}
