//! Provider-agnostic object storage client.
//!
//! One [`ObjectStorage`] trait, three cloud backends (AWS S3, Azure Blob
//! Storage, Google Cloud Storage) plus an in-memory backend for tests.
//! Select a backend at construction time through [`create_storage`]:
//!
//! ```no_run
//! use omnistore::{create_storage, StorageConfig};
//!
//! # async fn run() -> omnistore::StorageResult<()> {
//! let storage = create_storage(
//!   StorageConfig::aws("my-bucket").with_aws_region("eu-west-1"),
//! )
//! .await?;
//!
//! storage.upload("report.pdf".as_ref(), "reports/2024/q3.pdf").await?;
//! let keys = storage.list_files("reports/").await?;
//! # let _ = keys;
//! # Ok(())
//! # }
//! ```
//!
//! Credential fields left unset on the config are resolved from the
//! environment; see [`credentials`] for the precedence rules.

pub mod config;
pub mod credentials;
pub mod error;
pub mod storage;

pub use config::{CloudProvider, StorageConfig};
pub use error::{ErrorKind, StorageError, StorageResult};
pub use storage::{
  create_storage, AzureBlobStorage, GcsStorage, MemoryStorage, ObjectMetadata, ObjectStorage, S3Storage,
  DEFAULT_URL_EXPIRY,
};
