use std::sync::Arc;

use super::{AzureBlobStorage, GcsStorage, ObjectStorage, S3Storage};
use crate::config::StorageConfig;
use crate::credentials::{self, ResolvedCredentials};
use crate::error::StorageResult;

/// Construct the storage backend selected by `config`.
///
/// Resolves missing credential fields from the environment (see
/// [`credentials::resolve`]), then builds the matching adapter. All
/// validation failures surface as `Configuration` errors before any network
/// call; no adapter is returned in that case. The only I/O performed here is
/// reading a GCP key file when one is configured.
pub async fn create_storage(config: StorageConfig) -> StorageResult<Arc<dyn ObjectStorage>> {
  let bucket = config.bucket.clone();
  match credentials::resolve(&config)? {
    ResolvedCredentials::Aws { access_key_id, secret_access_key, region } => {
      tracing::info!(%bucket, %region, "initializing AWS S3 storage");
      Ok(Arc::new(S3Storage::new(&bucket, &access_key_id, &secret_access_key, &region)))
    }
    ResolvedCredentials::Azure { connection_string } => {
      tracing::info!(container = %bucket, "initializing Azure Blob storage");
      Ok(Arc::new(AzureBlobStorage::new(&bucket, &connection_string)?))
    }
    ResolvedCredentials::Gcp(source) => {
      tracing::info!(%bucket, "initializing Google Cloud storage");
      Ok(Arc::new(GcsStorage::new(&bucket, source).await?))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::CloudProvider;
  use crate::error::ErrorKind;

  // The factory must fail closed on bad configuration, before any network
  // call. These configs are invalid regardless of the test environment.

  #[test]
  fn empty_bucket_fails_fast() {
    let config = StorageConfig::aws("")
      .with_aws_access_key_id("AKID")
      .with_aws_secret_access_key("SECRET")
      .with_aws_region("us-east-1");
    let err = tokio_test::block_on(create_storage(config)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
  }

  #[test]
  fn malformed_azure_connection_string_fails_fast() {
    let config = StorageConfig::azure("container").with_azure_connection_string("ludicrous");
    let err = tokio_test::block_on(create_storage(config)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
  }

  #[tokio::test]
  async fn garbage_gcp_inline_credentials_fail_fast() {
    let config = StorageConfig::gcp("bucket").with_gcp_credentials_json("{not json");
    let err = create_storage(config).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
  }

  #[tokio::test]
  async fn explicit_aws_credentials_construct_an_adapter() {
    let config = StorageConfig::new(CloudProvider::Aws, "bucket")
      .with_aws_access_key_id("AKIDEXAMPLE")
      .with_aws_secret_access_key("wJalrXUtnFEMI")
      .with_aws_region("us-east-1");
    let storage = create_storage(config).await.unwrap();
    assert_eq!(storage.provider_name(), "AWS S3");
  }
}
