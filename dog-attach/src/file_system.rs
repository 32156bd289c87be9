use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument, warn};

use crate::{
    Backend, ByteStream, FileId, IdGenerator, RandomIdGenerator, StorageError, StorageResult,
    StoreCapabilities, Uploadable,
};

const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Backend keeping one file per identifier directly under a root directory.
///
/// Writes land in a hidden staging file and are renamed into place, so a
/// visible path always holds complete content. Uploads that expose a local
/// path are hard-linked (or copied when linking fails, e.g. across devices).
pub struct FileSystemBackend {
    name: String,
    root: PathBuf,
    chunk_size: usize,
    max_size: Option<u64>,
    ids: Arc<dyn IdGenerator>,
}

impl FileSystemBackend {
    /// Create a backend rooted at `root`. The directory is created on first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            name: "file_system".to_string(),
            root: root.as_ref().to_path_buf(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_size: None,
            ids: Arc::new(RandomIdGenerator),
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Chunk size used by `stream`
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    /// Advertise a maximum upload size to attachers using this backend
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size = Some(bytes);
        self
    }

    pub fn with_id_generator<G: IdGenerator + 'static>(mut self, ids: G) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, id: &FileId) -> StorageResult<PathBuf> {
        if !id.is_path_safe() {
            return Err(StorageError::invalid_id(id.as_str()));
        }
        Ok(self.root.join(id.as_str()))
    }

    // Leading dot keeps staging names out of the identifier namespace.
    fn staging_path(&self, id: &FileId) -> PathBuf {
        self.root.join(format!(".{}.part", id))
    }

    async fn link_or_copy(&self, source: &Path, id: &FileId, dest: &Path) -> std::io::Result<()> {
        match tokio::fs::hard_link(source, dest).await {
            Ok(()) => {
                debug!(source = ?source, dest = ?dest, "Linked local file");
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "Hard link failed, copying");
                let staging = self.staging_path(id);
                let copied = async {
                    tokio::fs::copy(source, &staging).await?;
                    tokio::fs::rename(&staging, dest).await
                }
                .await;
                if copied.is_err() {
                    let _ = tokio::fs::remove_file(&staging).await;
                }
                copied
            }
        }
    }

    async fn write_stream(
        &self,
        uploadable: &dyn Uploadable,
        id: &FileId,
        dest: &Path,
    ) -> StorageResult<u64> {
        let staging = self.staging_path(id);
        let written = async {
            let mut body = uploadable.open().await?;
            let mut file = tokio::fs::File::create(&staging).await?;
            let mut written = 0u64;
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&staging, dest).await?;
            Ok::<u64, StorageError>(written)
        }
        .await;

        if written.is_err() {
            let _ = tokio::fs::remove_file(&staging).await;
        }
        written
    }
}

fn not_found_as(id: &FileId, error: std::io::Error) -> StorageError {
    if error.kind() == std::io::ErrorKind::NotFound {
        StorageError::not_found(id.as_str())
    } else {
        StorageError::Io(error)
    }
}

#[async_trait]
impl Backend for FileSystemBackend {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, uploadable), fields(backend = %self.name, size = uploadable.size()))]
    async fn put(&self, uploadable: &dyn Uploadable) -> StorageResult<FileId> {
        tokio::fs::create_dir_all(&self.root).await?;

        let id = self.ids.next_id();
        let dest = self.resolve(&id)?;

        if let Some(source) = uploadable.local_path() {
            let is_file = tokio::fs::metadata(source)
                .await
                .map(|meta| meta.is_file())
                .unwrap_or(false);
            if is_file {
                match self.link_or_copy(source, &id, &dest).await {
                    Ok(()) => return Ok(id),
                    Err(e) => {
                        warn!(error = %e, source = ?source, "Local copy failed, streaming instead")
                    }
                }
            } else {
                debug!(source = ?source, "Local path unavailable, streaming instead");
            }
        }

        let written = self.write_stream(uploadable, &id, &dest).await?;
        debug!(id = %id, written, "File stored");
        Ok(id)
    }

    async fn read(&self, id: &FileId) -> StorageResult<Bytes> {
        let path = self.resolve(id)?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| not_found_as(id, e))?;
        Ok(Bytes::from(data))
    }

    #[instrument(skip(self), fields(backend = %self.name))]
    async fn stream(&self, id: &FileId) -> StorageResult<ByteStream> {
        let path = self.resolve(id)?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| not_found_as(id, e))?;

        // The file closes at EOF or when the stream is dropped.
        Ok(Box::pin(ReaderStream::with_capacity(file, self.chunk_size)))
    }

    async fn size(&self, id: &FileId) -> StorageResult<u64> {
        let path = self.resolve(id)?;
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| not_found_as(id, e))?;
        Ok(meta.len())
    }

    async fn exists(&self, id: &FileId) -> StorageResult<bool> {
        let Ok(path) = self.resolve(id) else {
            return Ok(false);
        };
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self), fields(backend = %self.name))]
    async fn delete(&self, id: &FileId) -> StorageResult<()> {
        let Ok(path) = self.resolve(id) else {
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = ?path, "File deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn path(&self, id: &FileId) -> Option<PathBuf> {
        self.resolve(id).ok()
    }

    fn max_size(&self) -> Option<u64> {
        self.max_size
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities::basic().with_local_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BackendExt, LocalFile, MemoryUpload};

    fn backend(dir: &tempfile::TempDir) -> Arc<FileSystemBackend> {
        Arc::new(FileSystemBackend::new(dir.path().join("store")))
    }

    /// Upload whose stream and local path disagree, to see which one was used
    struct PathDouble {
        body: MemoryUpload,
        path: PathBuf,
    }

    #[async_trait]
    impl Uploadable for PathDouble {
        fn size(&self) -> u64 {
            self.body.size()
        }

        async fn open(&self) -> StorageResult<ByteStream> {
            self.body.open().await
        }

        fn local_path(&self) -> Option<&Path> {
            Some(&self.path)
        }
    }

    #[tokio::test]
    async fn test_upload_uses_local_path_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        let path = dir.path().join("test.txt");
        tokio::fs::write(&path, "hello").await.unwrap();

        let upload = PathDouble {
            body: MemoryUpload::new("wrong"),
            path,
        };
        let file = backend.upload(&upload).await.unwrap();

        assert_eq!(backend.get(file.id().clone()).read().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_upload_ignores_missing_local_path() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);

        let upload = PathDouble {
            body: MemoryUpload::new("yes"),
            path: dir.path().join("doesnotexist.txt"),
        };
        let file = backend.upload(&upload).await.unwrap();

        assert_eq!(file.read().await.unwrap(), "yes");
    }

    #[tokio::test]
    async fn test_linked_upload_survives_source_removal() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        let path = dir.path().join("spool.bin");
        tokio::fs::write(&path, "spooled").await.unwrap();

        let file = backend.upload(&LocalFile::open(&path).await.unwrap()).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(file.read().await.unwrap(), "spooled");
        assert_eq!(file.size().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_no_staging_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);

        backend.upload(&MemoryUpload::new("one")).await.unwrap();
        backend.upload(&MemoryUpload::new("two")).await.unwrap();

        let mut entries = tokio::fs::read_dir(backend.root()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name();
            assert!(!name.to_string_lossy().starts_with('.'), "stray {:?}", name);
        }
    }

    #[tokio::test]
    async fn test_unsafe_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        let id = FileId::from("../escape");

        assert!(matches!(
            backend.read(&id).await,
            Err(StorageError::InvalidId { .. })
        ));
        assert!(!backend.exists(&id).await.unwrap());
        backend.delete(&id).await.unwrap();
        assert!(backend.path(&id).is_none());
    }

    #[tokio::test]
    async fn test_chunked_stream() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FileSystemBackend::new(dir.path()).with_chunk_size(2));
        let file = backend.upload(&MemoryUpload::new("hello")).await.unwrap();

        let chunks: Vec<Bytes> = file
            .stream()
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;

        assert_eq!(chunks, vec![Bytes::from("he"), Bytes::from("ll"), Bytes::from("o")]);
    }

    #[tokio::test]
    async fn test_advertised_limits() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileSystemBackend::new(dir.path()).with_max_size(100);
        assert_eq!(backend.max_size(), Some(100));
        assert!(backend.capabilities().supports_local_path);
        assert!(!backend.capabilities().supports_presign);
    }
}
