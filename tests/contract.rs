//! Contract properties every backend must honor, exercised against the
//! in-memory backend.

use std::sync::Arc;

use bytes::Bytes;
use omnistore::{ErrorKind, MemoryStorage, ObjectStorage};

fn storage() -> Arc<dyn ObjectStorage> {
  Arc::new(MemoryStorage::new())
}

#[tokio::test]
async fn upload_download_round_trip_is_byte_exact() {
  let storage = storage();
  let dir = tempfile::tempdir().unwrap();
  let source = dir.path().join("local.bin");
  let payload: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();
  std::fs::write(&source, &payload).unwrap();

  storage.upload(&source, "data/blob.bin").await.unwrap();

  let target = dir.path().join("roundtrip.bin");
  storage.download("data/blob.bin", &target).await.unwrap();
  assert_eq!(std::fs::read(&target).unwrap(), payload);
}

#[tokio::test]
async fn upload_exists_delete_scenario() {
  let storage = storage();
  let dir = tempfile::tempdir().unwrap();
  let local = dir.path().join("local.txt");
  std::fs::write(&local, b"hello").unwrap();

  storage.upload(&local, "remote.txt").await.unwrap();
  assert!(storage.exists("remote.txt").await.unwrap());

  storage.delete("remote.txt").await.unwrap();
  assert!(!storage.exists("remote.txt").await.unwrap());

  // deleting again is not an error: the object is already absent
  storage.delete("remote.txt").await.unwrap();
}

#[tokio::test]
async fn absent_keys_read_as_false_and_delete_cleanly() {
  let storage = storage();
  assert!(!storage.exists("never-uploaded").await.unwrap());
  storage.delete("never-uploaded").await.unwrap();
}

#[tokio::test]
async fn download_of_missing_key_leaves_no_local_file() {
  let storage = storage();
  let dir = tempfile::tempdir().unwrap();
  let target = dir.path().join("out.txt");

  let err = storage.download("missing-key", &target).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  assert!(!target.exists());
}

#[tokio::test]
async fn unreadable_local_file_is_not_found() {
  let storage = storage();
  let err = storage.upload("/no/such/dir/file.txt".as_ref(), "k").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn list_returns_exactly_the_prefixed_keys_without_duplicates() {
  let storage = storage();
  for key in ["logs/2024/a.log", "logs/2024/b.log", "logs/2023/z.log", "data/a.bin"] {
    storage.upload_bytes(Bytes::from_static(b"x"), key).await.unwrap();
  }

  let keys = storage.list_files("logs/2024/").await.unwrap();
  assert_eq!(keys, vec!["logs/2024/a.log".to_string(), "logs/2024/b.log".to_string()]);

  let all = storage.list_files("").await.unwrap();
  assert_eq!(all.len(), 4);

  // prefix matching is exact-byte and case-sensitive
  assert!(storage.list_files("LOGS/").await.unwrap().is_empty());
}

#[tokio::test]
async fn listing_is_restartable() {
  let storage = storage();
  storage.upload_bytes(Bytes::from_static(b"x"), "a").await.unwrap();
  let first = storage.list_files("").await.unwrap();
  let second = storage.list_files("").await.unwrap();
  assert_eq!(first, second);
}

#[tokio::test]
async fn metadata_reports_uploaded_size() {
  let storage = storage();
  storage.upload_bytes(Bytes::from(vec![0u8; 4096]), "sized").await.unwrap();

  let metadata = storage.get_metadata("sized").await.unwrap();
  assert_eq!(metadata.key, "sized");
  assert_eq!(metadata.size, 4096);
  assert!(metadata.last_modified.is_some());

  let err = storage.get_metadata("absent").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn overwriting_a_key_replaces_its_content() {
  let storage = storage();
  storage.upload_bytes(Bytes::from_static(b"first"), "k").await.unwrap();
  storage.upload_bytes(Bytes::from_static(b"second"), "k").await.unwrap();
  assert_eq!(storage.download_bytes("k").await.unwrap(), Bytes::from_static(b"second"));
  assert_eq!(storage.list_files("").await.unwrap().len(), 1);
}

#[tokio::test]
async fn get_url_without_signing_capability_is_unsupported() {
  let storage = storage();
  storage.upload_bytes(Bytes::from_static(b"x"), "k").await.unwrap();
  let err = storage.get_url("k", None).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[tokio::test]
async fn one_instance_is_safe_for_concurrent_use() {
  let storage = storage();
  let mut handles = Vec::new();
  for task in 0..8 {
    let storage = Arc::clone(&storage);
    handles.push(tokio::spawn(async move {
      for i in 0..25 {
        let key = format!("task{task}/obj{i}");
        storage.upload_bytes(Bytes::from(vec![task as u8; 64]), &key).await.unwrap();
        assert!(storage.exists(&key).await.unwrap());
      }
      storage.list_files(&format!("task{task}/")).await.unwrap().len()
    }));
  }
  for handle in handles {
    assert_eq!(handle.await.unwrap(), 25);
  }
}
