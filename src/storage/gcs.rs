use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use google_cloud_auth::credentials::CredentialsFile;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::objects::delete::DeleteObjectRequest;
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::list::ListObjectsRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use google_cloud_storage::http::Error as GcsError;
use google_cloud_storage::sign::SignedURLOptions;

use super::{ObjectMetadata, ObjectStorage, DEFAULT_URL_EXPIRY};
use crate::credentials::GcpCredentialSource;
use crate::error::{ErrorKind, StorageError, StorageResult};

/// Google Cloud Storage backend, bound to a single bucket.
pub struct GcsStorage {
  client: Client,
  bucket: String,
}

impl std::fmt::Debug for GcsStorage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("GcsStorage").field("bucket", &self.bucket).finish_non_exhaustive()
  }
}

impl GcsStorage {
  /// Build a client from resolved key material. Reads the key file / parses
  /// the inline JSON but performs no network traffic.
  pub async fn new(bucket: &str, source: GcpCredentialSource) -> StorageResult<Self> {
    let credentials = match source {
      GcpCredentialSource::InlineJson(json) => CredentialsFile::new_from_str(&json).await,
      GcpCredentialSource::KeyFile(path) => {
        CredentialsFile::new_from_file(path.to_string_lossy().into_owned()).await
      }
    }
    .map_err(|err| StorageError::configuration(format!("invalid GCP credentials: {err}")))?;

    let config = ClientConfig::default()
      .with_credentials(credentials)
      .await
      .map_err(|err| StorageError::configuration(format!("invalid GCP credentials: {err}")))?;

    Ok(GcsStorage { client: Client::new(config), bucket: bucket.to_string() })
  }
}

#[async_trait::async_trait]
impl ObjectStorage for GcsStorage {
  async fn upload(&self, local_path: &Path, remote_key: &str) -> StorageResult<()> {
    // The simple (non-resumable) media upload takes the full body.
    let data = tokio::fs::read(local_path)
      .await
      .map_err(|err| super::local_read_error(local_path, err))?;
    self.upload_bytes(Bytes::from(data), remote_key).await
  }

  async fn upload_bytes(&self, data: Bytes, remote_key: &str) -> StorageResult<()> {
    tracing::debug!(key = remote_key, bucket = %self.bucket, "gcs upload_object");
    let request = UploadObjectRequest { bucket: self.bucket.clone(), ..Default::default() };
    let upload_type = UploadType::Simple(Media::new(remote_key.to_string()));
    self
      .client
      .upload_object(&request, data, &upload_type)
      .await
      .map_err(|err| map_gcs_error("upload_object", remote_key, err))?;
    Ok(())
  }

  async fn download(&self, remote_key: &str, local_path: &Path) -> StorageResult<()> {
    let request = GetObjectRequest {
      bucket: self.bucket.clone(),
      object: remote_key.to_string(),
      ..Default::default()
    };
    // A missing object fails here, before the local file is created.
    let stream = self
      .client
      .download_streamed_object(&request, &Range::default())
      .await
      .map_err(|err| map_gcs_error("download_object", remote_key, err))?;
    let stream = stream.map(|chunk| {
      chunk.map_err(|err| StorageError::transient(format!("gcs download of {remote_key} aborted: {err}")))
    });
    super::write_stream_to_file(stream, local_path).await
  }

  async fn download_bytes(&self, remote_key: &str) -> StorageResult<Bytes> {
    let request = GetObjectRequest {
      bucket: self.bucket.clone(),
      object: remote_key.to_string(),
      ..Default::default()
    };
    let data = self
      .client
      .download_object(&request, &Range::default())
      .await
      .map_err(|err| map_gcs_error("download_object", remote_key, err))?;
    Ok(Bytes::from(data))
  }

  async fn delete(&self, remote_key: &str) -> StorageResult<()> {
    let request = DeleteObjectRequest {
      bucket: self.bucket.clone(),
      object: remote_key.to_string(),
      ..Default::default()
    };
    match self.client.delete_object(&request).await {
      Ok(()) => Ok(()),
      Err(err) => {
        let mapped = map_gcs_error("delete_object", remote_key, err);
        // absent object: the post-condition already holds
        if mapped.is_not_found() {
          Ok(())
        } else {
          Err(mapped)
        }
      }
    }
  }

  async fn list_files(&self, prefix: &str) -> StorageResult<Vec<String>> {
    let mut keys = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
      let request = ListObjectsRequest {
        bucket: self.bucket.clone(),
        prefix: Some(prefix.to_string()),
        page_token: page_token.clone(),
        ..Default::default()
      };
      let response = self
        .client
        .list_objects(&request)
        .await
        .map_err(|err| map_gcs_error("list_objects", prefix, err))?;

      if let Some(items) = response.items {
        keys.extend(items.into_iter().map(|object| object.name));
      }

      page_token = response.next_page_token;
      if page_token.is_none() {
        break;
      }
    }

    Ok(keys)
  }

  async fn exists(&self, remote_key: &str) -> StorageResult<bool> {
    let request = GetObjectRequest {
      bucket: self.bucket.clone(),
      object: remote_key.to_string(),
      ..Default::default()
    };
    match self.client.get_object(&request).await {
      Ok(_) => Ok(true),
      Err(err) => {
        let mapped = map_gcs_error("get_object", remote_key, err);
        if mapped.is_not_found() {
          Ok(false)
        } else {
          Err(mapped)
        }
      }
    }
  }

  async fn get_url(&self, remote_key: &str, expires_in: Option<Duration>) -> StorageResult<String> {
    let options = SignedURLOptions {
      expires: expires_in.unwrap_or(DEFAULT_URL_EXPIRY),
      ..Default::default()
    };
    // V4 signing requires key material able to sign; token-only credentials
    // (e.g. metadata-server auth) cannot, hence Unsupported.
    self
      .client
      .signed_url(&self.bucket, remote_key, None, None, options)
      .await
      .map_err(|err| StorageError::unsupported(format!("cannot sign URL for {remote_key}: {err}")))
  }

  async fn get_metadata(&self, remote_key: &str) -> StorageResult<ObjectMetadata> {
    let request = GetObjectRequest {
      bucket: self.bucket.clone(),
      object: remote_key.to_string(),
      ..Default::default()
    };
    let object = self
      .client
      .get_object(&request)
      .await
      .map_err(|err| map_gcs_error("get_object", remote_key, err))?;

    let last_modified = object
      .updated
      .and_then(|t| chrono::DateTime::from_timestamp(t.unix_timestamp(), t.nanosecond()));

    Ok(ObjectMetadata {
      key: object.name,
      size: object.size.max(0) as u64,
      last_modified,
      content_type: object.content_type,
      etag: Some(object.etag),
      custom: object.metadata.unwrap_or_default(),
    })
  }

  fn provider_name(&self) -> &'static str {
    "Google Cloud Storage"
  }
}

/// Translate a GCS client error into the shared vocabulary. JSON API error
/// responses are classified by HTTP status; transport errors from reqwest by
/// their timeout/connect nature.
fn map_gcs_error(operation: &str, key: &str, err: GcsError) -> StorageError {
  let message = format!("gcs {operation} failed for {key}: {err}");
  match &err {
    GcsError::Response(response) => {
      let kind = classify_gcs_status(response.code as u16);
      StorageError::new(kind, message).with_code(response.code.to_string())
    }
    GcsError::HttpClient(err) if err.is_timeout() || err.is_connect() => {
      StorageError::transient(message)
    }
    GcsError::HttpClient(_) => StorageError::unknown(message),
    GcsError::TokenSource(_) => StorageError::permission_denied(message),
    _ => StorageError::unknown(message),
  }
}

/// HTTP status classification table for the GCS JSON API.
fn classify_gcs_status(code: u16) -> ErrorKind {
  match code {
    404 => ErrorKind::NotFound,
    401 | 403 => ErrorKind::PermissionDenied,
    408 | 429 | 500 | 502 | 503 | 504 => ErrorKind::Transient,
    _ => ErrorKind::Unknown,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_classification() {
    assert_eq!(classify_gcs_status(404), ErrorKind::NotFound);
    assert_eq!(classify_gcs_status(401), ErrorKind::PermissionDenied);
    assert_eq!(classify_gcs_status(403), ErrorKind::PermissionDenied);
    assert_eq!(classify_gcs_status(429), ErrorKind::Transient);
    assert_eq!(classify_gcs_status(503), ErrorKind::Transient);
    assert_eq!(classify_gcs_status(412), ErrorKind::Unknown);
  }

  #[tokio::test]
  async fn garbage_inline_json_is_a_configuration_error() {
    let source = GcpCredentialSource::InlineJson("not json".to_string());
    let err = GcsStorage::new("bucket", source).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
  }
}
