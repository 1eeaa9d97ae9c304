//! Provider-agnostic object storage contract and its backend implementations.
//!
//! Every backend implements [`ObjectStorage`]; callers obtain one through
//! [`create_storage`] and never see a provider-native type. Each operation is
//! a single round trip; the adapters hold no per-call mutable state, so one
//! `Arc<dyn ObjectStorage>` is safe to share across tasks.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::{pin_mut, Stream, StreamExt};
use tokio::io::AsyncWriteExt;

use crate::error::StorageResult;

pub mod aws_s3;
pub mod azure_blob;
pub mod factory;
pub mod gcs;
pub mod memory;

pub use aws_s3::S3Storage;
pub use azure_blob::AzureBlobStorage;
pub use factory::create_storage;
pub use gcs::GcsStorage;
pub use memory::MemoryStorage;

/// Expiry applied by [`ObjectStorage::get_url`] when the caller passes `None`.
pub const DEFAULT_URL_EXPIRY: Duration = Duration::from_secs(3600);

/// Normalized metadata for a stored object, derived fresh on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
  /// Key of the object within its bucket/container.
  pub key: String,
  /// Object size in bytes.
  pub size: u64,
  /// Last modification time, if the backend reported one.
  pub last_modified: Option<DateTime<Utc>>,
  /// MIME type, if the backend reported one.
  pub content_type: Option<String>,
  /// ETag or checksum in the backend's native format.
  pub etag: Option<String>,
  /// User-defined key/value metadata; empty when the backend has none.
  pub custom: HashMap<String, String>,
}

/// Common operation set over a single bucket/container of one cloud backend.
///
/// Keys are opaque flat strings; comparisons and prefix matches are
/// exact-byte and case-sensitive. All errors are normalized
/// [`StorageError`](crate::error::StorageError)s.
#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
  /// Upload a local file, creating or overwriting the object at `remote_key`.
  ///
  /// An unreadable `local_path` yields a `NotFound` error before any network
  /// call is made.
  async fn upload(&self, local_path: &Path, remote_key: &str) -> StorageResult<()>;

  /// Upload an in-memory payload, creating or overwriting the object.
  async fn upload_bytes(&self, data: Bytes, remote_key: &str) -> StorageResult<()>;

  /// Download an object into a local file, creating or overwriting it.
  ///
  /// If the object does not exist the local file is not created; if the
  /// transfer aborts midway the partial file is removed and a `Transient`
  /// error returned.
  async fn download(&self, remote_key: &str, local_path: &Path) -> StorageResult<()>;

  /// Download an object into memory.
  async fn download_bytes(&self, remote_key: &str) -> StorageResult<Bytes>;

  /// Delete an object. Deleting a key that does not exist is a success: the
  /// post-condition "object absent" already holds.
  async fn delete(&self, remote_key: &str) -> StorageResult<()>;

  /// List all keys under `prefix`, following backend pagination to
  /// exhaustion. The result is finite, duplicate-free, and in the backend's
  /// listing order (lexicographic for all supported backends).
  async fn list_files(&self, prefix: &str) -> StorageResult<Vec<String>>;

  /// Whether an object exists. An absent key is `Ok(false)`, never an error;
  /// only connectivity or permission failures surface as errors.
  async fn exists(&self, remote_key: &str) -> StorageResult<bool>;

  /// Return a time-limited signed URL for the object. `None` expiry means
  /// [`DEFAULT_URL_EXPIRY`]. Configurations that cannot sign yield an
  /// `Unsupported` error.
  async fn get_url(&self, remote_key: &str, expires_in: Option<Duration>) -> StorageResult<String>;

  /// Fetch normalized metadata for an object.
  async fn get_metadata(&self, remote_key: &str) -> StorageResult<ObjectMetadata>;

  /// Human-readable backend label, for diagnostics and log events.
  fn provider_name(&self) -> &'static str;
}

impl std::fmt::Debug for dyn ObjectStorage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "ObjectStorage({})", self.provider_name())
  }
}

/// A local file that could not be read for upload. The contract treats this
/// as `NotFound`, distinguished from remote failures by the message.
pub(crate) fn local_read_error(path: &Path, err: impl std::fmt::Display) -> crate::error::StorageError {
  crate::error::StorageError::not_found(format!("cannot read local file {}: {err}", path.display()))
}

/// Best-effort removal of a partially written download target.
pub(crate) async fn remove_partial(path: &Path) {
  if let Err(err) = tokio::fs::remove_file(path).await {
    tracing::warn!(path = %path.display(), %err, "failed to remove partial download");
  }
}

/// Stream a download into a local file.
///
/// The first chunk is awaited before the file is created, so an object whose
/// request fails outright (missing, forbidden) leaves no file behind. Once
/// writing has started, any failure removes the partial file before the error
/// is returned: stream errors keep the kind the adapter assigned them, local
/// write and flush failures map through `From<std::io::Error>`.
pub(crate) async fn write_stream_to_file<S>(stream: S, path: &Path) -> StorageResult<()>
where
  S: Stream<Item = StorageResult<Bytes>>,
{
  pin_mut!(stream);
  let first = match stream.next().await {
    Some(chunk) => Some(chunk?),
    None => None,
  };

  let mut file = tokio::fs::File::create(path).await?;
  let copied: StorageResult<()> = async {
    if let Some(data) = first {
      file.write_all(&data).await?;
    }
    while let Some(chunk) = stream.next().await {
      file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    Ok(())
  }
  .await;

  if copied.is_err() {
    drop(file);
    remove_partial(path).await;
  }
  copied
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::{ErrorKind, StorageError};
  use futures_util::stream;

  #[tokio::test]
  async fn stream_copy_writes_chunks_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.bin");
    let chunks =
      stream::iter(vec![Ok(Bytes::from_static(b"abc")), Ok(Bytes::from_static(b"def"))]);

    write_stream_to_file(chunks, &path).await.unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"abcdef");
  }

  #[tokio::test]
  async fn mid_stream_abort_removes_the_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.bin");
    let chunks = stream::iter(vec![
      Ok(Bytes::from_static(b"written before the abort")),
      Err(StorageError::transient("connection reset mid-transfer")),
    ]);

    let err = write_stream_to_file(chunks, &path).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transient);
    assert!(!path.exists());
  }

  #[tokio::test]
  async fn failing_first_chunk_never_creates_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.bin");
    let chunks = stream::iter(vec![Err(StorageError::not_found("no such object"))]);

    let err = write_stream_to_file(chunks, &path).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!path.exists());
  }

  #[tokio::test]
  async fn empty_stream_yields_an_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.bin");
    let chunks = stream::iter(Vec::<StorageResult<Bytes>>::new());

    write_stream_to_file(chunks, &path).await.unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"");
  }
}
