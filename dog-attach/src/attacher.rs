use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::validation::{self, Validation};
use crate::{
    AttachError, AttachResult, AttacherConfig, AttachmentState, BackendExt, DownloadError,
    DownloadResult, ErrorKind, FetchConfig, FileId, IntoRemoveFlag, Presign, RemoteFetcher,
    SharedBackend, StoredFile, Uploadable,
};

/// Lifecycle controller for one attachment attribute of one record.
///
/// New content is validated and written to the cache backend (`cache`,
/// `download`), promoted to the store backend on `store`, and removed by
/// `delete`. The attacher owns the attribute's [`AttachmentState`]; the
/// record layer persists it via [`state`](Self::state).
///
/// Not meant for concurrent mutation: give each edit its own attacher.
pub struct Attacher {
    name: String,
    cache: SharedBackend,
    store: SharedBackend,
    config: AttacherConfig,
    fetcher: Option<Arc<RemoteFetcher>>,
    state: AttachmentState,
    errors: Vec<ErrorKind>,
    remove: bool,
    // Store copy superseded by a cached upload, deleted once the new one is stored.
    replaced: Option<FileId>,
    cached_here: bool,
}

impl Attacher {
    /// Create an attacher for attribute `name` with no attachment
    pub fn new(
        name: impl Into<String>,
        cache: SharedBackend,
        store: SharedBackend,
        config: AttacherConfig,
    ) -> Self {
        Self {
            name: name.into(),
            cache,
            store,
            config,
            fetcher: None,
            state: AttachmentState::default(),
            errors: Vec::new(),
            remove: false,
            replaced: None,
            cached_here: false,
        }
    }

    /// Use a shared fetcher for `download` instead of a default one
    pub fn with_fetcher(mut self, fetcher: Arc<RemoteFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Load persisted state.
    ///
    /// A state carrying both ids (a new upload cached over a stored file)
    /// keeps the cache id; the store id is deleted on the next `store`.
    pub fn with_state(mut self, mut state: AttachmentState) -> Self {
        if state.cache_id.is_some() {
            self.replaced = state.id.take();
        }
        self.state = state;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &AttacherConfig {
        &self.config
    }

    pub fn cache_backend(&self) -> &SharedBackend {
        &self.cache
    }

    pub fn store_backend(&self) -> &SharedBackend {
        &self.store
    }

    pub fn state(&self) -> &AttachmentState {
        &self.state
    }

    pub fn into_state(self) -> AttachmentState {
        self.state
    }

    /// Store tier identifier
    pub fn id(&self) -> Option<&FileId> {
        self.state.id.as_ref()
    }

    /// Cache tier identifier
    pub fn cache_id(&self) -> Option<&FileId> {
        self.state.cache_id.as_ref()
    }

    /// Assign a cache id carried over from a previous request.
    ///
    /// Ignored once this attacher has cached a file itself, so a stale form
    /// value cannot replace a fresh upload. Empty ids are ignored.
    pub fn set_cache_id(&mut self, cache_id: Option<FileId>) {
        if self.cached_here {
            debug!(attachment = %self.name, "Ignoring cache id, file already cached");
            return;
        }
        let Some(cache_id) = cache_id.filter(|id| !id.as_str().is_empty()) else {
            return;
        };
        if let Some(stored) = self.state.id.take() {
            self.replaced = Some(stored);
        }
        self.state.cache_id = Some(cache_id);
    }

    /// Error kinds from the last rejected `cache` or `download`
    pub fn errors(&self) -> &[ErrorKind] {
        &self.errors
    }

    /// Request removal on the next `store`
    pub fn set_remove<V: IntoRemoveFlag>(&mut self, value: V) {
        self.remove = value.into_remove_flag();
    }

    /// Whether removal is requested
    pub fn remove(&self) -> bool {
        self.remove
    }

    /// Size limit in force: the configured one, else the cache backend's
    pub fn max_size(&self) -> Option<u64> {
        self.config.max_size.or_else(|| self.cache.max_size())
    }

    pub fn validate(&self, uploadable: &dyn Uploadable) -> Validation {
        validation::validate(&self.config, self.max_size(), uploadable)
    }

    /// Value for the upload field's `accept` attribute
    pub fn accept(&self) -> String {
        validation::accept(&self.config)
    }

    /// Handle to the current file, preferring the cache tier
    pub fn get(&self) -> Option<StoredFile> {
        if let Some(cache_id) = &self.state.cache_id {
            Some(self.cache.get(cache_id.clone()))
        } else {
            self.state.id.as_ref().map(|id| self.store.get(id.clone()))
        }
    }

    /// Validate `uploadable` and write it to the cache tier.
    ///
    /// On rejection the error kind is recorded and the attachment is left as
    /// it was; with `raise_errors` the call also fails with `Invalid`.
    /// Backend failures are always returned.
    #[instrument(skip(self, uploadable), fields(attachment = %self.name, size = uploadable.size()))]
    pub async fn cache(&mut self, uploadable: &dyn Uploadable) -> AttachResult<()> {
        self.errors.clear();

        if let Err(kinds) = self.validate(uploadable) {
            warn!(errors = ?kinds, "Upload rejected");
            let first = kinds.first().copied();
            self.errors = kinds;
            return match first {
                Some(kind) if self.config.raise_errors => Err(AttachError::invalid(kind)),
                _ => Ok(()),
            };
        }

        let file = self.cache.upload(uploadable).await?;

        if let Some(stored) = self.state.id.take() {
            self.replaced = Some(stored);
        }
        self.state.cache_id = Some(file.id().clone());
        self.state.filename = uploadable.original_filename().map(str::to_string);
        self.state.size = Some(uploadable.size());
        self.state.content_type = uploadable.content_type().map(str::to_string);
        self.cached_here = true;

        info!(cache_id = %file.id(), backend = %self.cache.name(), "File cached");
        Ok(())
    }

    /// Fetch `url` and cache the result. Blank URLs are ignored.
    ///
    /// The size limit is enforced while the body downloads and reported as
    /// `TooLarge`, like a direct upload. Other transport failures become
    /// `DownloadFailed` unless `raise_errors` is set, in which case the
    /// `DownloadError` is returned as is.
    #[instrument(skip(self), fields(attachment = %self.name))]
    pub async fn download(&mut self, url: &str) -> AttachResult<()> {
        let url = url.trim();
        if url.is_empty() {
            return Ok(());
        }
        self.errors.clear();

        let max_size = self.max_size();
        let fetched = match self.fetcher() {
            Ok(fetcher) => fetcher.fetch_limited(url, max_size).await,
            Err(e) => Err(e),
        };

        match fetched {
            Ok(remote) => self.cache(&remote).await,
            Err(DownloadError::TooLarge { limit, .. }) => {
                warn!(limit, "Remote file rejected while downloading");
                self.errors = vec![ErrorKind::TooLarge];
                if self.config.raise_errors {
                    return Err(AttachError::invalid(ErrorKind::TooLarge));
                }
                Ok(())
            }
            Err(e) if self.config.raise_errors => Err(e.into()),
            Err(e) => {
                warn!(error = %e, "Download failed");
                self.errors = vec![ErrorKind::DownloadFailed];
                Ok(())
            }
        }
    }

    fn fetcher(&mut self) -> DownloadResult<Arc<RemoteFetcher>> {
        if let Some(fetcher) = &self.fetcher {
            return Ok(fetcher.clone());
        }
        let fetcher = Arc::new(RemoteFetcher::new(FetchConfig::default())?);
        self.fetcher = Some(fetcher.clone());
        Ok(fetcher)
    }

    /// Promote the cached file to the store tier.
    ///
    /// A pending removal wins over promotion. Without a cached file this is
    /// a no-op. The cache entry and any superseded store entry are deleted
    /// only after the store write succeeded. If the promotion itself fails,
    /// the superseded store id is put back next to the cache id so the state
    /// still references every live file.
    #[instrument(skip(self), fields(attachment = %self.name))]
    pub async fn store(&mut self) -> AttachResult<()> {
        if self.remove {
            self.delete().await?;
            self.remove = false;
            info!("Attachment removed");
            return Ok(());
        }

        let Some(cache_id) = self.state.cache_id.clone() else {
            return Ok(());
        };

        let cached = self.cache.get(cache_id);
        let stored = match self.promote(&cached).await {
            Ok(stored) => stored,
            Err(e) => {
                // The superseded file is still live; keep it referenced.
                if self.replaced.is_some() {
                    self.state.id = self.replaced.clone();
                }
                warn!(error = %e, cache_id = %cached.id(), "Promotion failed");
                return Err(e);
            }
        };

        self.state.id = Some(stored.id().clone());
        self.state.cache_id = None;
        self.cached_here = false;

        let cache_cleanup = cached.delete().await;
        if let Some(old) = self.replaced.take() {
            if &old != stored.id() {
                if let Err(e) = self.store.delete(&old).await {
                    self.replaced = Some(old);
                    return Err(e.into());
                }
                debug!(id = %old, "Superseded file deleted");
            }
        }
        cache_cleanup?;

        info!(id = %stored.id(), backend = %self.store.name(), "File promoted");
        Ok(())
    }

    async fn promote(&self, cached: &StoredFile) -> AttachResult<StoredFile> {
        let upload = cached
            .to_upload()
            .await?
            .with_filename(self.state.filename.clone())
            .with_content_type(self.state.content_type.clone());
        Ok(self.store.upload(&upload).await?)
    }

    /// Delete whatever this attachment holds and clear the state. Idempotent.
    #[instrument(skip(self), fields(attachment = %self.name))]
    pub async fn delete(&mut self) -> AttachResult<()> {
        if let Some(id) = self.state.id.clone() {
            self.store.delete(&id).await?;
            self.state.id = None;
        }
        if let Some(id) = self.state.cache_id.clone() {
            self.cache.delete(&id).await?;
            self.state.cache_id = None;
        }
        if let Some(id) = self.replaced.clone() {
            self.store.delete(&id).await?;
            self.replaced = None;
        }

        self.state.filename = None;
        self.state.size = None;
        self.state.content_type = None;
        self.cached_here = false;
        Ok(())
    }

    /// Direct-upload descriptor from the cache backend, if it can presign
    pub async fn presign(&self) -> AttachResult<Option<Presign>> {
        if !self.cache.capabilities().supports_presign {
            return Ok(None);
        }
        Ok(Some(self.cache.presign().await?))
    }
}

/// Record-facing accessors, for records exposing one attacher per attribute.
impl Attacher {
    pub async fn assign(&mut self, uploadable: &dyn Uploadable) -> AttachResult<()> {
        self.cache(uploadable).await
    }

    pub fn assign_remove<V: IntoRemoveFlag>(&mut self, value: V) {
        self.set_remove(value)
    }

    pub async fn assign_remote_url(&mut self, url: Option<&str>) -> AttachResult<()> {
        match url {
            Some(url) => self.download(url).await,
            None => Ok(()),
        }
    }

    pub fn current_file(&self) -> Option<StoredFile> {
        self.get()
    }

    pub async fn commit(&mut self) -> AttachResult<()> {
        self.store().await
    }

    pub async fn discard(&mut self) -> AttachResult<()> {
        self.delete().await
    }

    pub fn validation_errors(&self) -> &[ErrorKind] {
        self.errors()
    }

    pub fn accepted_types(&self) -> String {
        self.accept()
    }
}

impl std::fmt::Debug for Attacher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attacher")
            .field("name", &self.name)
            .field("cache", &self.cache.name())
            .field("store", &self.store.name())
            .field("state", &self.state)
            .field("errors", &self.errors)
            .field("remove", &self.remove)
            .finish()
    }
}
