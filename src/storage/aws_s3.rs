use std::path::Path;
use std::time::Duration;

use aws_sdk_s3::config::{Builder, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use futures_util::stream;

use super::{ObjectMetadata, ObjectStorage, DEFAULT_URL_EXPIRY};
use crate::error::{ErrorKind, StorageError, StorageResult};

/// AWS S3 backend, bound to a single bucket.
pub struct S3Storage {
  client: Client,
  bucket: String,
}

impl S3Storage {
  pub fn new(bucket: &str, access_key_id: &str, secret_access_key: &str, region: &str) -> Self {
    let credentials = Credentials::new(access_key_id, secret_access_key, None, None, "omnistore");
    let config = Builder::new()
      .region(Region::new(region.to_string()))
      .credentials_provider(credentials)
      .behavior_version_latest()
      .build();
    S3Storage { client: Client::from_conf(config), bucket: bucket.to_string() }
  }
}

#[async_trait::async_trait]
impl ObjectStorage for S3Storage {
  async fn upload(&self, local_path: &Path, remote_key: &str) -> StorageResult<()> {
    let body = ByteStream::from_path(local_path)
      .await
      .map_err(|err| super::local_read_error(local_path, err))?;

    tracing::debug!(key = remote_key, bucket = %self.bucket, "s3 put_object");
    self
      .client
      .put_object()
      .bucket(&self.bucket)
      .key(remote_key)
      .body(body)
      .send()
      .await
      .map_err(|err| map_sdk_error("put_object", remote_key, err))?;
    Ok(())
  }

  async fn upload_bytes(&self, data: Bytes, remote_key: &str) -> StorageResult<()> {
    self
      .client
      .put_object()
      .bucket(&self.bucket)
      .key(remote_key)
      .body(ByteStream::from(data))
      .send()
      .await
      .map_err(|err| map_sdk_error("put_object", remote_key, err))?;
    Ok(())
  }

  async fn download(&self, remote_key: &str, local_path: &Path) -> StorageResult<()> {
    let object = self
      .client
      .get_object()
      .bucket(&self.bucket)
      .key(remote_key)
      .send()
      .await
      .map_err(|err| map_sdk_error("get_object", remote_key, err))?;

    // Body errors are network-side and retryable; local write failures keep
    // their io mapping inside the copy helper.
    let body = stream::unfold(object.body, |mut body| async move {
      match body.try_next().await {
        Ok(Some(chunk)) => Some((Ok(chunk), body)),
        Ok(None) => None,
        Err(err) => {
          Some((Err(StorageError::transient(format!("s3 download of {remote_key} aborted: {err}"))), body))
        }
      }
    });
    super::write_stream_to_file(body, local_path).await
  }

  async fn download_bytes(&self, remote_key: &str) -> StorageResult<Bytes> {
    let object = self
      .client
      .get_object()
      .bucket(&self.bucket)
      .key(remote_key)
      .send()
      .await
      .map_err(|err| map_sdk_error("get_object", remote_key, err))?;
    let data = object
      .body
      .collect()
      .await
      .map_err(|err| StorageError::transient(format!("s3 download of {remote_key} aborted: {err}")))?;
    Ok(data.into_bytes())
  }

  async fn delete(&self, remote_key: &str) -> StorageResult<()> {
    // S3 delete_object succeeds for absent keys, which is exactly the
    // idempotent contract.
    self
      .client
      .delete_object()
      .bucket(&self.bucket)
      .key(remote_key)
      .send()
      .await
      .map_err(|err| map_sdk_error("delete_object", remote_key, err))?;
    Ok(())
  }

  async fn list_files(&self, prefix: &str) -> StorageResult<Vec<String>> {
    let mut keys = Vec::new();
    let mut continuation_token: Option<String> = None;

    loop {
      let mut request = self.client.list_objects_v2().bucket(&self.bucket).prefix(prefix);
      if let Some(token) = continuation_token {
        request = request.continuation_token(token);
      }

      let response =
        request.send().await.map_err(|err| map_sdk_error("list_objects_v2", prefix, err))?;
      for object in response.contents() {
        if let Some(key) = object.key() {
          keys.push(key.to_string());
        }
      }

      continuation_token = response.next_continuation_token().map(str::to_string);
      if continuation_token.is_none() {
        break;
      }
    }

    Ok(keys)
  }

  async fn exists(&self, remote_key: &str) -> StorageResult<bool> {
    match self.client.head_object().bucket(&self.bucket).key(remote_key).send().await {
      Ok(_) => Ok(true),
      Err(err) if err.as_service_error().map(|e| e.is_not_found()).unwrap_or(false) => Ok(false),
      Err(err) => Err(map_sdk_error("head_object", remote_key, err)),
    }
  }

  async fn get_url(&self, remote_key: &str, expires_in: Option<Duration>) -> StorageResult<String> {
    let expiry = expires_in.unwrap_or(DEFAULT_URL_EXPIRY);
    let presigning = PresigningConfig::expires_in(expiry)
      .map_err(|err| StorageError::configuration(format!("invalid presign expiry: {err}")))?;

    let presigned = self
      .client
      .get_object()
      .bucket(&self.bucket)
      .key(remote_key)
      .presigned(presigning)
      .await
      .map_err(|err| map_sdk_error("presign get_object", remote_key, err))?;
    Ok(presigned.uri().to_string())
  }

  async fn get_metadata(&self, remote_key: &str) -> StorageResult<ObjectMetadata> {
    let head = self
      .client
      .head_object()
      .bucket(&self.bucket)
      .key(remote_key)
      .send()
      .await
      .map_err(|err| map_sdk_error("head_object", remote_key, err))?;

    let last_modified = head
      .last_modified()
      .and_then(|t| chrono::DateTime::from_timestamp(t.secs(), t.subsec_nanos()));

    Ok(ObjectMetadata {
      key: remote_key.to_string(),
      size: head.content_length().unwrap_or(0).max(0) as u64,
      last_modified,
      content_type: head.content_type().map(str::to_string),
      etag: head.e_tag().map(str::to_string),
      custom: head.metadata().cloned().unwrap_or_default(),
    })
  }

  fn provider_name(&self) -> &'static str {
    "AWS S3"
  }
}

/// Translate an SDK error into the shared vocabulary. Transport-level
/// failures are retryable; service errors are classified by their S3 error
/// code, which is also preserved verbatim on the returned error.
fn map_sdk_error<E, R>(operation: &str, key: &str, err: SdkError<E, R>) -> StorageError
where
  E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
  R: std::fmt::Debug,
{
  let message = format!("s3 {operation} failed for {key}: {}", DisplayErrorContext(&err));
  match &err {
    SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
      StorageError::transient(message)
    }
    SdkError::ServiceError(_) => {
      let code = err.code().unwrap_or("").to_string();
      StorageError::new(classify_s3_code(&code), message).with_code(code)
    }
    _ => StorageError::unknown(message),
  }
}

/// S3 error-code classification table.
fn classify_s3_code(code: &str) -> ErrorKind {
  match code {
    "NoSuchKey" | "NoSuchBucket" | "NotFound" => ErrorKind::NotFound,
    "AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "ExpiredToken"
    | "TokenRefreshRequired" | "AccountProblem" => ErrorKind::PermissionDenied,
    "SlowDown" | "RequestTimeout" | "ServiceUnavailable" | "InternalError" | "Throttling"
    | "ThrottlingException" | "OperationAborted" => ErrorKind::Transient,
    _ => ErrorKind::Unknown,
  }
}
