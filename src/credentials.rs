//! Credential resolution for the storage factory.
//!
//! Missing credential fields on a [`StorageConfig`] are filled from the
//! process environment with a fixed precedence:
//!
//! 1. explicit field on the config,
//! 2. environment variable (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`,
//!    `AWS_REGION`, `AZURE_STORAGE_CONNECTION_STRING`,
//!    `GOOGLE_APPLICATION_CREDENTIALS`),
//! 3. for GCP only, the gcloud application-default credentials file.
//!
//! An explicit field always wins, even when the environment variable is also
//! set. Resolution performs no network I/O; its only filesystem access is an
//! existence probe for the application-default file.

use std::path::PathBuf;

use crate::config::{CloudProvider, StorageConfig};
use crate::error::{StorageError, StorageResult};

pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const AWS_REGION: &str = "AWS_REGION";
pub const AZURE_STORAGE_CONNECTION_STRING: &str = "AZURE_STORAGE_CONNECTION_STRING";
pub const GOOGLE_APPLICATION_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Fully resolved, per-provider credential bundle. Every required field is
/// present and owned; the factory consumes this without further lookups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedCredentials {
  Aws { access_key_id: String, secret_access_key: String, region: String },
  Azure { connection_string: String },
  Gcp(GcpCredentialSource),
}

/// Where the GCP adapter should take its key material from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GcpCredentialSource {
  /// Service-account key supplied inline as a JSON string.
  InlineJson(String),
  /// Path to a service-account JSON key file.
  KeyFile(PathBuf),
}

/// Resolve credentials from the config and the process environment.
pub fn resolve(config: &StorageConfig) -> StorageResult<ResolvedCredentials> {
  resolve_with(config, |name| std::env::var(name).ok())
}

/// Same as [`resolve`], with an injectable environment lookup so precedence
/// can be tested without mutating process-wide state.
pub fn resolve_with<E>(config: &StorageConfig, env: E) -> StorageResult<ResolvedCredentials>
where
  E: Fn(&str) -> Option<String>,
{
  if config.bucket.is_empty() {
    return Err(StorageError::configuration("bucket/container name must not be empty"));
  }

  match config.provider {
    CloudProvider::Aws => {
      let access_key_id = field(config.aws_access_key_id.as_deref(), AWS_ACCESS_KEY_ID, &env)?;
      let secret_access_key =
        field(config.aws_secret_access_key.as_deref(), AWS_SECRET_ACCESS_KEY, &env)?;
      let region = field(config.aws_region.as_deref(), AWS_REGION, &env)?;
      Ok(ResolvedCredentials::Aws { access_key_id, secret_access_key, region })
    }
    CloudProvider::Azure => {
      let connection_string =
        field(config.azure_connection_string.as_deref(), AZURE_STORAGE_CONNECTION_STRING, &env)?;
      Ok(ResolvedCredentials::Azure { connection_string })
    }
    CloudProvider::Gcp => resolve_gcp(config, &env).map(ResolvedCredentials::Gcp),
  }
}

fn resolve_gcp<E>(config: &StorageConfig, env: &E) -> StorageResult<GcpCredentialSource>
where
  E: Fn(&str) -> Option<String>,
{
  if let Some(json) = &config.gcp_credentials_json {
    serde_json::from_str::<serde_json::Value>(json).map_err(|err| {
      StorageError::configuration(format!("gcp_credentials_json is not valid JSON: {err}"))
    })?;
    return Ok(GcpCredentialSource::InlineJson(json.clone()));
  }
  if let Some(path) = &config.gcp_credentials_path {
    return Ok(GcpCredentialSource::KeyFile(PathBuf::from(path)));
  }
  if let Some(path) = env(GOOGLE_APPLICATION_CREDENTIALS) {
    return Ok(GcpCredentialSource::KeyFile(PathBuf::from(path)));
  }
  if let Some(default_path) = application_default_path(env) {
    if default_path.exists() {
      return Ok(GcpCredentialSource::KeyFile(default_path));
    }
  }
  Err(StorageError::configuration(format!(
    "missing GCP credentials: set gcp_credentials_path / gcp_credentials_json, \
     the {GOOGLE_APPLICATION_CREDENTIALS} environment variable, or run `gcloud auth application-default login`"
  )))
}

// Well-known gcloud location: $HOME/.config/gcloud/application_default_credentials.json
fn application_default_path<E>(env: &E) -> Option<PathBuf>
where
  E: Fn(&str) -> Option<String>,
{
  let home = env("HOME")?;
  Some(PathBuf::from(home).join(".config/gcloud/application_default_credentials.json"))
}

fn field<E>(explicit: Option<&str>, env_var: &str, env: &E) -> StorageResult<String>
where
  E: Fn(&str) -> Option<String>,
{
  if let Some(value) = explicit {
    return Ok(value.to_string());
  }
  env(env_var).ok_or_else(|| {
    StorageError::configuration(format!(
      "missing required credential field: set it explicitly or via the {env_var} environment variable"
    ))
  })
}
