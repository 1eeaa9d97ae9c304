use std::path::Path;
use std::time::Duration;

use azure_core::error::ErrorKind as AzureErrorKind;
use azure_core::StatusCode;
use azure_storage::prelude::*;
use azure_storage::ConnectionString;
use azure_storage_blobs::prelude::*;
use bytes::Bytes;
use futures_util::StreamExt;
use time::OffsetDateTime;

use super::{ObjectMetadata, ObjectStorage, DEFAULT_URL_EXPIRY};
use crate::error::{ErrorKind, StorageError, StorageResult};

/// Azure Blob Storage backend, bound to a single container.
#[derive(Debug)]
pub struct AzureBlobStorage {
  container: ContainerClient,
}

impl AzureBlobStorage {
  /// Build a client from a storage-account connection string. Parsing happens
  /// here; no network traffic until the first operation.
  pub fn new(container_name: &str, connection_string: &str) -> StorageResult<Self> {
    let connection = ConnectionString::new(connection_string)
      .map_err(|err| StorageError::configuration(format!("invalid Azure connection string: {err}")))?;
    let account = connection
      .account_name
      .ok_or_else(|| StorageError::configuration("Azure connection string is missing AccountName"))?;
    let credentials = connection
      .storage_credentials()
      .map_err(|err| StorageError::configuration(format!("invalid Azure connection string: {err}")))?;

    let container = ClientBuilder::new(account, credentials).container_client(container_name);
    Ok(AzureBlobStorage { container })
  }
}

#[async_trait::async_trait]
impl ObjectStorage for AzureBlobStorage {
  async fn upload(&self, local_path: &Path, remote_key: &str) -> StorageResult<()> {
    // put_block_blob wants the whole body up front; the SDK has no streaming
    // single-shot upload.
    let data = tokio::fs::read(local_path)
      .await
      .map_err(|err| super::local_read_error(local_path, err))?;
    self.upload_bytes(Bytes::from(data), remote_key).await
  }

  async fn upload_bytes(&self, data: Bytes, remote_key: &str) -> StorageResult<()> {
    tracing::debug!(key = remote_key, "azure put_block_blob");
    self
      .container
      .blob_client(remote_key)
      .put_block_blob(data)
      .await
      .map_err(|err| map_azure_error("put_block_blob", remote_key, err))?;
    Ok(())
  }

  async fn download(&self, remote_key: &str, local_path: &Path) -> StorageResult<()> {
    let blob_client = self.container.blob_client(remote_key);

    // Each stream item is one ranged GET response whose body still has to be
    // collected; flatten both failure modes before handing off to the copy
    // helper, which creates the file only after the first chunk arrives.
    let chunks = blob_client.get().into_stream().then(|chunk| async move {
      match chunk {
        Ok(chunk) => chunk.data.collect().await.map_err(|err| {
          StorageError::transient(format!("azure download of {remote_key} aborted: {err}"))
        }),
        Err(err) => Err(map_azure_error("get_blob", remote_key, err)),
      }
    });
    super::write_stream_to_file(chunks, local_path).await
  }

  async fn download_bytes(&self, remote_key: &str) -> StorageResult<Bytes> {
    let data = self
      .container
      .blob_client(remote_key)
      .get_content()
      .await
      .map_err(|err| map_azure_error("get_blob", remote_key, err))?;
    Ok(Bytes::from(data))
  }

  async fn delete(&self, remote_key: &str) -> StorageResult<()> {
    match self.container.blob_client(remote_key).delete().await {
      Ok(_) => Ok(()),
      Err(err) => {
        let mapped = map_azure_error("delete_blob", remote_key, err);
        // absent blob: the post-condition already holds
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
    let mut pages = self.container.list_blobs().prefix(prefix.to_string()).into_stream();

    while let Some(page) = pages.next().await {
      let page = page.map_err(|err| map_azure_error("list_blobs", prefix, err))?;
      for blob in page.blobs.blobs() {
        keys.push(blob.name.clone());
      }
    }

    Ok(keys)
  }

  async fn exists(&self, remote_key: &str) -> StorageResult<bool> {
    match self.container.blob_client(remote_key).get_properties().await {
      Ok(_) => Ok(true),
      Err(err) => {
        let mapped = map_azure_error("get_blob_properties", remote_key, err);
        if mapped.is_not_found() {
          Ok(false)
        } else {
          Err(mapped)
        }
      }
    }
  }

  async fn get_url(&self, remote_key: &str, expires_in: Option<Duration>) -> StorageResult<String> {
    let expiry = expires_in.unwrap_or(DEFAULT_URL_EXPIRY);
    let blob_client = self.container.blob_client(remote_key);

    let permissions = BlobSasPermissions { read: true, ..Default::default() };
    let expiry_time = OffsetDateTime::now_utc() + time::Duration::seconds(expiry.as_secs() as i64);
    let sas = blob_client
      .shared_access_signature(permissions, expiry_time)
      .await
      .map_err(|err| {
        // signing a service SAS needs the account key; SAS-token credentials can't
        StorageError::unsupported(format!("cannot create SAS for {remote_key}: {err}"))
      })?;

    let url = blob_client
      .generate_signed_blob_url(&sas)
      .map_err(|err| StorageError::unknown(format!("cannot build signed URL for {remote_key}: {err}")))?;
    Ok(url.to_string())
  }

  async fn get_metadata(&self, remote_key: &str) -> StorageResult<ObjectMetadata> {
    let response = self
      .container
      .blob_client(remote_key)
      .get_properties()
      .await
      .map_err(|err| map_azure_error("get_blob_properties", remote_key, err))?;

    let properties = &response.blob.properties;
    let last_modified = chrono::DateTime::from_timestamp(
      properties.last_modified.unix_timestamp(),
      properties.last_modified.nanosecond(),
    );
    let content_type =
      (!properties.content_type.is_empty()).then(|| properties.content_type.clone());

    Ok(ObjectMetadata {
      key: remote_key.to_string(),
      size: properties.content_length,
      last_modified,
      content_type,
      etag: Some(properties.etag.to_string()),
      custom: response.blob.metadata.clone().unwrap_or_default(),
    })
  }

  fn provider_name(&self) -> &'static str {
    "Azure Blob Storage"
  }
}

/// Translate an `azure_core` error into the shared vocabulary using the HTTP
/// status, keeping the service's error code string for diagnostics.
fn map_azure_error(operation: &str, key: &str, err: azure_core::Error) -> StorageError {
  let message = format!("azure {operation} failed for {key}: {err}");
  match err.kind() {
    AzureErrorKind::HttpResponse { status, error_code } => {
      let mut mapped = StorageError::new(classify_status(*status), message);
      if let Some(code) = error_code {
        mapped = mapped.with_code(code.clone());
      }
      mapped
    }
    AzureErrorKind::Io => StorageError::transient(message),
    AzureErrorKind::Credential => StorageError::permission_denied(message),
    _ => StorageError::unknown(message),
  }
}

/// HTTP status classification table for Blob Storage responses.
fn classify_status(status: StatusCode) -> ErrorKind {
  match status {
    StatusCode::NotFound => ErrorKind::NotFound,
    StatusCode::Unauthorized | StatusCode::Forbidden => ErrorKind::PermissionDenied,
    StatusCode::RequestTimeout
    | StatusCode::TooManyRequests
    | StatusCode::InternalServerError
    | StatusCode::BadGateway
    | StatusCode::ServiceUnavailable
    | StatusCode::GatewayTimeout => ErrorKind::Transient,
    _ => ErrorKind::Unknown,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_classification() {
    assert_eq!(classify_status(StatusCode::NotFound), ErrorKind::NotFound);
    assert_eq!(classify_status(StatusCode::Unauthorized), ErrorKind::PermissionDenied);
    assert_eq!(classify_status(StatusCode::Forbidden), ErrorKind::PermissionDenied);
    assert_eq!(classify_status(StatusCode::TooManyRequests), ErrorKind::Transient);
    assert_eq!(classify_status(StatusCode::ServiceUnavailable), ErrorKind::Transient);
    assert_eq!(classify_status(StatusCode::Conflict), ErrorKind::Unknown);
  }

  #[test]
  fn bad_connection_string_is_a_configuration_error() {
    let err = AzureBlobStorage::new("container", "definitely not a connection string").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
  }

  #[test]
  fn well_formed_connection_string_constructs() {
    let connection_string = "DefaultEndpointsProtocol=https;AccountName=devaccount;\
                             AccountKey=ZGV2a2V5;EndpointSuffix=core.windows.net";
    let storage = AzureBlobStorage::new("container", connection_string).unwrap();
    assert_eq!(storage.provider_name(), "Azure Blob Storage");
  }
}
