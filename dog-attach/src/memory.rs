use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tracing::debug;

use crate::{
    read_all, Backend, ByteStream, FileId, IdGenerator, RandomIdGenerator, StorageError,
    StorageResult, StoreCapabilities, Uploadable,
};

/// In-process backend. Content is lost when the backend is dropped.
pub struct MemoryBackend {
    name: String,
    files: RwLock<HashMap<FileId, Bytes>>,
    chunk_size: usize,
    max_size: Option<u64>,
    ids: Arc<dyn IdGenerator>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            name: "memory".to_string(),
            files: RwLock::new(HashMap::new()),
            chunk_size: 16 * 1024,
            max_size: None,
            ids: Arc::new(RandomIdGenerator),
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size = Some(bytes);
        self
    }

    pub fn with_id_generator<G: IdGenerator + 'static>(mut self, ids: G) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }

    fn lookup(&self, id: &FileId) -> StorageResult<Bytes> {
        self.files
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(id.as_str()))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, uploadable: &dyn Uploadable) -> StorageResult<FileId> {
        let data = read_all(uploadable).await?;
        let id = self.ids.next_id();
        debug!(backend = %self.name, id = %id, size = data.len(), "File stored");
        self.files.write().insert(id.clone(), data);
        Ok(id)
    }

    async fn read(&self, id: &FileId) -> StorageResult<Bytes> {
        self.lookup(id)
    }

    async fn stream(&self, id: &FileId) -> StorageResult<ByteStream> {
        let data = self.lookup(id)?;
        let chunk_size = self.chunk_size;
        let stream = async_stream::stream! {
            let mut offset = 0;
            while offset < data.len() {
                let end = (offset + chunk_size).min(data.len());
                yield Ok::<Bytes, std::io::Error>(data.slice(offset..end));
                offset = end;
            }
        };
        Ok(Box::pin(stream))
    }

    async fn size(&self, id: &FileId) -> StorageResult<u64> {
        Ok(self.lookup(id)?.len() as u64)
    }

    async fn exists(&self, id: &FileId) -> StorageResult<bool> {
        Ok(self.files.read().contains_key(id))
    }

    async fn delete(&self, id: &FileId) -> StorageResult<()> {
        self.files.write().remove(id);
        Ok(())
    }

    fn max_size(&self) -> Option<u64> {
        self.max_size
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities::basic()
    }
}
