use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{ByteStream, FileId, StorageError, StorageResult, StoredFile, Uploadable};

/// Shared handle to a backend, as held by attachers and file handles
pub type SharedBackend = Arc<dyn Backend>;

/// Key-addressed content storage - implemented by every cache and store tier.
///
/// All operations must be safe to call concurrently for distinct identifiers.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Write the uploadable under a freshly generated identifier.
    ///
    /// The id is only returned once the content is retrievable by it.
    async fn put(&self, uploadable: &dyn Uploadable) -> StorageResult<FileId>;

    /// Read the whole content; `NotFound` if absent
    async fn read(&self, id: &FileId) -> StorageResult<Bytes>;

    /// Open the content as a finite stream of chunks.
    ///
    /// Every OS resource behind the stream is released when it ends or is dropped.
    async fn stream(&self, id: &FileId) -> StorageResult<ByteStream>;

    /// Size in bytes; `NotFound` if absent
    async fn size(&self, id: &FileId) -> StorageResult<u64>;

    async fn exists(&self, id: &FileId) -> StorageResult<bool>;

    /// Delete content. Deleting an unknown id succeeds.
    async fn delete(&self, id: &FileId) -> StorageResult<()>;

    /// Local path of the content, for backends that keep files on disk
    fn path(&self, _id: &FileId) -> Option<PathBuf> {
        None
    }

    /// Largest upload this backend is meant to accept
    fn max_size(&self) -> Option<u64> {
        None
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities::basic()
    }

    /// Descriptor for a client-direct upload into this backend
    async fn presign(&self) -> StorageResult<Presign> {
        Err(StorageError::Unsupported)
    }
}

/// Handle-producing operations on a shared backend
#[async_trait]
pub trait BackendExt {
    /// Upload and return a handle to the stored content
    async fn upload(&self, uploadable: &dyn Uploadable) -> StorageResult<StoredFile>;

    /// Handle for `id`. No I/O happens until the handle is used.
    fn get(&self, id: FileId) -> StoredFile;
}

#[async_trait]
impl BackendExt for SharedBackend {
    async fn upload(&self, uploadable: &dyn Uploadable) -> StorageResult<StoredFile> {
        let id = self.put(uploadable).await?;
        Ok(StoredFile::new(self.clone(), id))
    }

    fn get(&self, id: FileId) -> StoredFile {
        StoredFile::new(self.clone(), id)
    }
}

#[async_trait]
impl<B: Backend + 'static> BackendExt for Arc<B> {
    async fn upload(&self, uploadable: &dyn Uploadable) -> StorageResult<StoredFile> {
        let shared: SharedBackend = self.clone();
        shared.upload(uploadable).await
    }

    fn get(&self, id: FileId) -> StoredFile {
        StoredFile::new(self.clone(), id)
    }
}

/// Optional features a backend advertises
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreCapabilities {
    pub supports_presign: bool,
    pub supports_local_path: bool,
}

impl StoreCapabilities {
    pub fn basic() -> Self {
        Self {
            supports_presign: false,
            supports_local_path: false,
        }
    }

    pub fn with_presign(mut self) -> Self {
        self.supports_presign = true;
        self
    }

    pub fn with_local_path(mut self) -> Self {
        self.supports_local_path = true;
        self
    }
}

/// Everything a form needs to upload straight to a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presign {
    /// Identifier the content will be stored under
    pub id: FileId,
    /// Endpoint to post to
    pub url: String,
    /// Name of the form field carrying the file
    #[serde(rename = "as")]
    pub field: String,
    /// Extra form fields the endpoint requires
    pub fields: BTreeMap<String, String>,
}

impl Presign {
    pub fn new<U: Into<String>>(id: FileId, url: U) -> Self {
        Self {
            id,
            url: url.into(),
            field: "file".to_string(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field<S: Into<String>>(mut self, field: S) -> Self {
        self.field = field.into();
        self
    }

    pub fn with_form_field<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_builders() {
        let caps = StoreCapabilities::basic();
        assert!(!caps.supports_presign);

        let caps = caps.with_presign().with_local_path();
        assert!(caps.supports_presign);
        assert!(caps.supports_local_path);
    }

    #[test]
    fn test_presign_json_shape() {
        let presign = Presign::new(FileId::from("abc"), "https://uploads.example.com")
            .with_form_field("key", "cache/abc");

        let json = serde_json::to_value(&presign).unwrap();
        assert_eq!(json["id"], "abc");
        assert_eq!(json["as"], "file");
        assert_eq!(json["fields"]["key"], "cache/abc");
    }
}
