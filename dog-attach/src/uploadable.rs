use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tokio_util::io::ReaderStream;

use crate::{ByteStream, StorageResult};

/// Anything that can be handed to an attacher or a backend as new content.
///
/// `size` and `open` are required. Metadata and the local path are optional;
/// backends use `local_path` for a link/copy fast path when it resolves to
/// an existing file, and fall back to `open` otherwise.
#[async_trait]
pub trait Uploadable: Send + Sync {
    /// Content length in bytes
    fn size(&self) -> u64;

    /// Open the content as a stream of chunks
    async fn open(&self) -> StorageResult<ByteStream>;

    /// Path to an existing file holding the same bytes
    fn local_path(&self) -> Option<&Path> {
        None
    }

    /// Filename supplied by the client
    fn original_filename(&self) -> Option<&str> {
        None
    }

    /// Declared MIME type
    fn content_type(&self) -> Option<&str> {
        None
    }
}

/// Read an uploadable's full content into memory
pub async fn read_all(uploadable: &dyn Uploadable) -> StorageResult<Bytes> {
    let mut stream = uploadable.open().await?;
    let mut buf = BytesMut::with_capacity(uploadable.size() as usize);
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}

/// In-memory upload, e.g. a decoded multipart field
#[derive(Debug, Clone, Default)]
pub struct MemoryUpload {
    data: Bytes,
    filename: Option<String>,
    content_type: Option<String>,
}

impl MemoryUpload {
    pub fn new<B: Into<Bytes>>(data: B) -> Self {
        Self {
            data: data.into(),
            filename: None,
            content_type: None,
        }
    }

    pub fn with_filename<S: Into<String>>(mut self, filename: S) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}

#[async_trait]
impl Uploadable for MemoryUpload {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn open(&self) -> StorageResult<ByteStream> {
        let data = self.data.clone();
        Ok(Box::pin(futures_util::stream::once(async move { Ok(data) })))
    }

    fn original_filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

/// A file already on local disk, e.g. a spooled multipart upload
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    size: u64,
    filename: Option<String>,
    content_type: Option<String>,
}

impl LocalFile {
    /// Stat `path` and derive filename and content type from it.
    pub async fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let meta = tokio::fs::metadata(&path).await?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string);
        let content_type = mime_guess::from_path(&path).first().map(|m| m.to_string());

        Ok(Self {
            path,
            size: meta.len(),
            filename,
            content_type,
        })
    }

    pub fn with_filename<S: Into<String>>(mut self, filename: S) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Uploadable for LocalFile {
    fn size(&self) -> u64 {
        self.size
    }

    async fn open(&self) -> StorageResult<ByteStream> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(Box::pin(ReaderStream::new(file)))
    }

    fn local_path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn original_filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}
