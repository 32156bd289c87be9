use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;

use dog_attach::{
    BackendExt, FileId, FileSystemBackend, MemoryBackend, MemoryUpload, SharedBackend,
    StorageError,
};

/// Every backend runs the same checks
async fn conformance(backend: SharedBackend) {
    upload_and_read(&backend).await;
    get_is_lazy(&backend).await;
    read_missing_is_not_found(&backend).await;
    stream_yields_full_content(&backend).await;
    delete_is_idempotent(&backend).await;
    identifiers_are_distinct(&backend).await;
    concurrent_uploads(&backend).await;
}

async fn upload_and_read(backend: &SharedBackend) {
    let file = backend.upload(&MemoryUpload::new("hello")).await.unwrap();

    assert_eq!(file.read().await.unwrap(), "hello");
    assert_eq!(backend.get(file.id().clone()).read().await.unwrap(), "hello");
    assert_eq!(file.size().await.unwrap(), 5);
    assert!(file.exists().await.unwrap());
}

async fn get_is_lazy(backend: &SharedBackend) {
    let file = backend.get(FileId::from("doesnotexist"));

    assert_eq!(file.id().as_str(), "doesnotexist");
    assert!(!file.exists().await.unwrap());
}

async fn read_missing_is_not_found(backend: &SharedBackend) {
    let id = FileId::from("doesnotexist");

    assert!(matches!(backend.read(&id).await, Err(StorageError::NotFound { .. })));
    assert!(matches!(backend.size(&id).await, Err(StorageError::NotFound { .. })));
    assert!(matches!(backend.stream(&id).await, Err(StorageError::NotFound { .. })));
}

async fn stream_yields_full_content(backend: &SharedBackend) {
    let body = "x".repeat(100_000);
    let file = backend.upload(&MemoryUpload::new(body.clone())).await.unwrap();

    let mut stream = file.stream().await.unwrap();
    let mut collected = Vec::new();
    while let Some(chunk) = stream.next().await {
        collected.extend_from_slice(&chunk.unwrap());
    }

    assert_eq!(Bytes::from(collected), Bytes::from(body));
}

async fn delete_is_idempotent(backend: &SharedBackend) {
    let file = backend.upload(&MemoryUpload::new("bye")).await.unwrap();

    file.delete().await.unwrap();
    assert!(!file.exists().await.unwrap());

    file.delete().await.unwrap();
    backend.delete(&FileId::from("neverexisted")).await.unwrap();
}

async fn identifiers_are_distinct(backend: &SharedBackend) {
    let a = backend.upload(&MemoryUpload::new("same")).await.unwrap();
    let b = backend.upload(&MemoryUpload::new("same")).await.unwrap();

    assert_ne!(a.id(), b.id());
    a.delete().await.unwrap();
    assert_eq!(b.read().await.unwrap(), "same");
}

async fn concurrent_uploads(backend: &SharedBackend) {
    let mut tasks = Vec::new();
    for i in 0..16 {
        let backend = backend.clone();
        tasks.push(tokio::spawn(async move {
            let body = format!("file-{}", i);
            let file = backend.upload(&MemoryUpload::new(body.clone())).await.unwrap();
            (file, body)
        }));
    }

    for task in tasks {
        let (file, body) = task.await.unwrap();
        assert_eq!(file.read().await.unwrap(), body);
    }
}

#[tokio::test]
async fn test_memory_backend_conformance() {
    conformance(Arc::new(MemoryBackend::new())).await;
}

#[tokio::test]
async fn test_file_system_backend_conformance() {
    let dir = tempfile::tempdir().unwrap();
    conformance(Arc::new(FileSystemBackend::new(dir.path().join("store1")))).await;
}

#[tokio::test]
async fn test_file_system_backend_small_chunks_conformance() {
    let dir = tempfile::tempdir().unwrap();
    conformance(Arc::new(
        FileSystemBackend::new(dir.path().join("nested/dirs/store")).with_chunk_size(7),
    ))
    .await;
}
