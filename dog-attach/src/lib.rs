//! # dog-attach: two-tier file attachments
//!
//! `dog-attach` lets a record carry uploaded files. New uploads are validated
//! and parked in a transient **cache** backend; when the record is saved they
//! are promoted into a permanent **store** backend. Removal, remote URL
//! ingestion and idempotent cleanup are part of the same lifecycle.
//!
//! ## Key Features
//!
//! - **Two tiers**: cache on assignment, promote on commit, never lose the old copy early
//! - **Deterministic validation**: size, then content type, then extension; one error kind per attempt
//! - **Raise or collect**: per attribute, invalid input either fails the call or lands in `errors()`
//! - **Remote URLs**: bounded redirect following, same validation path as direct uploads
//! - **Streaming reads**: file handles close as soon as a stream ends or is dropped
//! - **Storage agnostic**: filesystem and in-memory backends, or bring your own `Backend`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dog_attach::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> AttachResult<()> {
//! let cache = Arc::new(FileSystemBackend::new("/tmp/uploads/cache"));
//! let store = Arc::new(FileSystemBackend::new("/var/lib/app/store"));
//!
//! let mut document = Attacher::new(
//!     "document",
//!     cache,
//!     store,
//!     AttacherConfig::new().with_max_size(10 * 1024 * 1024).with_extension("pdf"),
//! );
//!
//! // Form submission: validate and cache
//! let upload = MemoryUpload::new(&b"%PDF-1.7 ..."[..]).with_filename("report.pdf");
//! document.cache(&upload).await?;
//!
//! // Record saved: promote to the store tier
//! document.store().await?;
//! let persisted = document.state().to_columns("document");
//! # let _ = persisted;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   Your Record   │  ← one Attacher per attachment attribute
//! ├─────────────────┤
//! │    Attacher     │  ← validation, errors, cache → store → delete
//! ├─────────────────┤
//! │ Backend (x2)    │  ← key-addressed storage primitives
//! └─────────────────┘
//! ```

mod attacher;
mod config;
mod error;
mod file;
mod file_system;
mod flag;
mod memory;
mod remote;
mod state;
pub mod store;
mod types;
mod uploadable;
pub mod validation;

// Re-export main types for clean API
pub use attacher::Attacher;
pub use config::{AttacherConfig, FetchConfig, FileType, IMAGE_CONTENT_TYPES};
pub use error::{
    AttachError, AttachResult, DownloadError, DownloadResult, ErrorKind, StorageError,
    StorageResult,
};
pub use file::{StoredFile, StoredUpload};
pub use file_system::FileSystemBackend;
pub use flag::{parse_flag, IntoRemoveFlag};
pub use memory::MemoryBackend;
pub use remote::{RemoteFetcher, RemoteFile};
pub use state::AttachmentState;
pub use store::{Backend, BackendExt, Presign, SharedBackend, StoreCapabilities};
pub use types::{ByteStream, FileId, IdGenerator, RandomIdGenerator};
pub use uploadable::{read_all, LocalFile, MemoryUpload, Uploadable};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        AttachError, AttachResult, Attacher, AttacherConfig, AttachmentState, Backend,
        BackendExt, ErrorKind, FileId, FileSystemBackend, MemoryBackend, MemoryUpload,
        StoredFile, Uploadable,
    };
}
