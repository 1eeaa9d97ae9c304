use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Supported cloud storage providers.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
  Aws,
  Azure,
  Gcp,
}

impl CloudProvider {
  pub fn as_str(&self) -> &'static str {
    match self {
      CloudProvider::Aws => "aws",
      CloudProvider::Azure => "azure",
      CloudProvider::Gcp => "gcp",
    }
  }
}

impl fmt::Display for CloudProvider {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for CloudProvider {
  type Err = StorageError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "aws" | "s3" => Ok(CloudProvider::Aws),
      "azure" => Ok(CloudProvider::Azure),
      "gcp" | "gcs" => Ok(CloudProvider::Gcp),
      other => Err(StorageError::configuration(format!(
        "unsupported cloud provider: {other}. Supported providers: aws, azure, gcp"
      ))),
    }
  }
}

/// Configuration handed to [`create_storage`](crate::storage::create_storage).
///
/// Only `provider` and `bucket` are always required. Credential fields may be
/// left unset and are then resolved from the environment (see
/// [`resolve`](crate::credentials::resolve) for the exact precedence). The
/// config is consumed by the factory and immutable from then on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
  /// Which backend to construct.
  pub provider: CloudProvider,
  /// Bucket (AWS, GCP) or container (Azure) name.
  pub bucket: String,
  /// AWS access key id. Env fallback: `AWS_ACCESS_KEY_ID`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub aws_access_key_id: Option<String>,
  /// AWS secret access key. Env fallback: `AWS_SECRET_ACCESS_KEY`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub aws_secret_access_key: Option<String>,
  /// AWS region. Env fallback: `AWS_REGION`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub aws_region: Option<String>,
  /// Azure storage connection string. Env fallback: `AZURE_STORAGE_CONNECTION_STRING`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub azure_connection_string: Option<String>,
  /// Path to a GCP service-account JSON key file. Env fallback:
  /// `GOOGLE_APPLICATION_CREDENTIALS`, then the gcloud application-default file.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub gcp_credentials_path: Option<String>,
  /// GCP service-account key as an inline JSON string. Takes precedence over
  /// `gcp_credentials_path` when both are set.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub gcp_credentials_json: Option<String>,
}

impl StorageConfig {
  pub fn new(provider: CloudProvider, bucket: impl Into<String>) -> Self {
    Self {
      provider,
      bucket: bucket.into(),
      aws_access_key_id: None,
      aws_secret_access_key: None,
      aws_region: None,
      azure_connection_string: None,
      gcp_credentials_path: None,
      gcp_credentials_json: None,
    }
  }

  pub fn aws(bucket: impl Into<String>) -> Self {
    Self::new(CloudProvider::Aws, bucket)
  }

  pub fn azure(container: impl Into<String>) -> Self {
    Self::new(CloudProvider::Azure, container)
  }

  pub fn gcp(bucket: impl Into<String>) -> Self {
    Self::new(CloudProvider::Gcp, bucket)
  }

  pub fn with_aws_access_key_id(mut self, value: impl Into<String>) -> Self {
    self.aws_access_key_id = Some(value.into());
    self
  }

  pub fn with_aws_secret_access_key(mut self, value: impl Into<String>) -> Self {
    self.aws_secret_access_key = Some(value.into());
    self
  }

  pub fn with_aws_region(mut self, value: impl Into<String>) -> Self {
    self.aws_region = Some(value.into());
    self
  }

  pub fn with_azure_connection_string(mut self, value: impl Into<String>) -> Self {
    self.azure_connection_string = Some(value.into());
    self
  }

  pub fn with_gcp_credentials_path(mut self, value: impl Into<String>) -> Self {
    self.gcp_credentials_path = Some(value.into());
    self
  }

  pub fn with_gcp_credentials_json(mut self, value: impl Into<String>) -> Self {
    self.gcp_credentials_json = Some(value.into());
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn provider_parses_aliases_case_insensitively() {
    assert_eq!("aws".parse::<CloudProvider>().unwrap(), CloudProvider::Aws);
    assert_eq!("S3".parse::<CloudProvider>().unwrap(), CloudProvider::Aws);
    assert_eq!("Azure".parse::<CloudProvider>().unwrap(), CloudProvider::Azure);
    assert_eq!("gcs".parse::<CloudProvider>().unwrap(), CloudProvider::Gcp);
    assert_eq!("GCP".parse::<CloudProvider>().unwrap(), CloudProvider::Gcp);
  }

  #[test]
  fn unknown_provider_is_a_configuration_error() {
    let err = "ftp".parse::<CloudProvider>().unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
  }

  #[test]
  fn provider_display_round_trips() {
    for provider in [CloudProvider::Aws, CloudProvider::Azure, CloudProvider::Gcp] {
      assert_eq!(provider.to_string().parse::<CloudProvider>().unwrap(), provider);
    }
  }

  #[test]
  fn builder_sets_fields() {
    let config = StorageConfig::aws("my-bucket")
      .with_aws_access_key_id("AKIDEXAMPLE")
      .with_aws_secret_access_key("secret")
      .with_aws_region("eu-west-1");

    assert_eq!(config.provider, CloudProvider::Aws);
    assert_eq!(config.bucket, "my-bucket");
    assert_eq!(config.aws_access_key_id.as_deref(), Some("AKIDEXAMPLE"));
    assert_eq!(config.aws_region.as_deref(), Some("eu-west-1"));
    assert!(config.azure_connection_string.is_none());
  }

  #[test]
  fn config_serde_round_trips() {
    let config = StorageConfig::gcp("data").with_gcp_credentials_path("/etc/gcp/key.json");
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"provider\":\"gcp\""));
    // unset credential fields are omitted entirely
    assert!(!json.contains("aws_access_key_id"));

    let back: StorageConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back.provider, CloudProvider::Gcp);
    assert_eq!(back.gcp_credentials_path.as_deref(), Some("/etc/gcp/key.json"));
  }
}
