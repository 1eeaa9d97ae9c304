use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::{ObjectMetadata, ObjectStorage};
use crate::error::{StorageError, StorageResult};

#[derive(Clone)]
struct StoredObject {
  data: Bytes,
  last_modified: DateTime<Utc>,
}

/// In-memory backend for tests and local development.
///
/// Honors the full contract (idempotent delete, exact-byte prefix listing in
/// lexicographic order, `exists` never failing on absence). It cannot sign
/// URLs, so `get_url` is `Unsupported`. A lock poisoned by a panicking task
/// is recovered rather than propagated; the map itself is never left in a
/// torn state, each write is a single insert or remove.
#[derive(Default)]
pub struct MemoryStorage {
  objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, StoredObject>> {
    self.objects.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, StoredObject>> {
    self.objects.write().unwrap_or_else(PoisonError::into_inner)
  }

  fn get(&self, remote_key: &str) -> Option<StoredObject> {
    self.read().get(remote_key).cloned()
  }
}

#[async_trait::async_trait]
impl ObjectStorage for MemoryStorage {
  async fn upload(&self, local_path: &Path, remote_key: &str) -> StorageResult<()> {
    let data = tokio::fs::read(local_path)
      .await
      .map_err(|err| super::local_read_error(local_path, err))?;
    self.upload_bytes(Bytes::from(data), remote_key).await
  }

  async fn upload_bytes(&self, data: Bytes, remote_key: &str) -> StorageResult<()> {
    let object = StoredObject { data, last_modified: Utc::now() };
    self.write().insert(remote_key.to_string(), object);
    Ok(())
  }

  async fn download(&self, remote_key: &str, local_path: &Path) -> StorageResult<()> {
    // Look up first: a missing key must not create the local file.
    let data = self.download_bytes(remote_key).await?;
    tokio::fs::write(local_path, &data).await?;
    Ok(())
  }

  async fn download_bytes(&self, remote_key: &str) -> StorageResult<Bytes> {
    self
      .get(remote_key)
      .map(|object| object.data)
      .ok_or_else(|| StorageError::not_found(format!("no such object: {remote_key}")))
  }

  async fn delete(&self, remote_key: &str) -> StorageResult<()> {
    self.write().remove(remote_key);
    Ok(())
  }

  async fn list_files(&self, prefix: &str) -> StorageResult<Vec<String>> {
    let objects = self.read();
    Ok(objects.keys().filter(|key| key.starts_with(prefix)).cloned().collect())
  }

  async fn exists(&self, remote_key: &str) -> StorageResult<bool> {
    Ok(self.read().contains_key(remote_key))
  }

  async fn get_url(&self, remote_key: &str, _expires_in: Option<Duration>) -> StorageResult<String> {
    Err(StorageError::unsupported(format!("in-memory storage cannot sign URLs for {remote_key}")))
  }

  async fn get_metadata(&self, remote_key: &str) -> StorageResult<ObjectMetadata> {
    let object = self
      .get(remote_key)
      .ok_or_else(|| StorageError::not_found(format!("no such object: {remote_key}")))?;
    Ok(ObjectMetadata {
      key: remote_key.to_string(),
      size: object.data.len() as u64,
      last_modified: Some(object.last_modified),
      content_type: None,
      etag: None,
      custom: Default::default(),
    })
  }

  fn provider_name(&self) -> &'static str {
    "in-memory"
  }
}
