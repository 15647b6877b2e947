//! File-backed key-value store with atomic writes (spec §4.9).
//!
//! Each key maps to one file under the configured root directory. A write
//! goes to a sibling `.tmp` file first, is fsynced, then renamed over the
//! target — the rename is atomic on the same filesystem, so a reader never
//! observes a partially-written snapshot, and a crash mid-write leaves the
//! previous snapshot (or nothing) rather than a torn file.

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::envelope::{Envelope, CURRENT_VERSION};
use crate::error::StorageError;

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// `root` is created if missing; each key becomes `root/<key>.json`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|source| StorageError::Io {
            key: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    fn tmp_path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json.tmp"))
    }

    /// Serialize `value` and write it atomically under `key` (spec §4.9
    /// "writes are atomic (write-temp-then-rename) and fsynced before
    /// acknowledging").
    pub async fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let envelope = Envelope::new(value);
        let bytes = serde_json::to_vec_pretty(&envelope).map_err(|source| StorageError::Serde {
            key: key.to_string(),
            source,
        })?;

        let tmp_path = self.tmp_path_for(key);
        let final_path = self.path_for(key);

        let mut file = fs::File::create(&tmp_path).await.map_err(|source| StorageError::Io {
            key: key.to_string(),
            source,
        })?;
        file.write_all(&bytes).await.map_err(|source| StorageError::Io {
            key: key.to_string(),
            source,
        })?;
        file.sync_all().await.map_err(|source| StorageError::Io {
            key: key.to_string(),
            source,
        })?;
        drop(file);

        fs::rename(&tmp_path, &final_path).await.map_err(|source| StorageError::Io {
            key: key.to_string(),
            source,
        })?;
        debug!(key, "snapshot saved");
        Ok(())
    }

    /// Load and deserialize `key`'s current value. Rejects envelopes from a
    /// version this build doesn't know how to migrate.
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<T, StorageError> {
        let path = self.path_for(key);
        let bytes = fs::read(&path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Io { key: key.to_string(), source }
            }
        })?;
        let envelope: Envelope<T> = serde_json::from_slice(&bytes).map_err(|source| StorageError::Serde {
            key: key.to_string(),
            source,
        })?;
        if envelope.version > CURRENT_VERSION {
            return Err(StorageError::UnsupportedVersion {
                key: key.to_string(),
                found: envelope.version,
                supported: CURRENT_VERSION,
            });
        }
        Ok(envelope.payload)
    }

    pub async fn exists(&self, key: &str) -> bool {
        fs::metadata(self.path_for(key)).await.is_ok()
    }

    /// List every key with a persisted snapshot (the `.json` files directly
    /// under the root, `.tmp` siblings excluded).
    pub async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = fs::read_dir(&self.root).await.map_err(|source| StorageError::Io {
            key: self.root.display().to_string(),
            source,
        })?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|source| StorageError::Io {
            key: self.root.display().to_string(),
            source,
        })? {
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if let Some(key) = name.strip_suffix(".json") {
                keys.push(key.to_string());
            }
        }
        Ok(keys)
    }

    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { key: key.to_string(), source }),
        }
    }

    /// Copy every current snapshot into `backup_dir` (spec §4.9 "periodic
    /// backup"). Best-effort per key: one bad key is logged and skipped
    /// rather than aborting the whole pass.
    pub async fn backup_to(&self, backup_dir: impl AsRef<Path>) -> Result<usize, StorageError> {
        let backup_dir = backup_dir.as_ref();
        fs::create_dir_all(backup_dir).await.map_err(|source| StorageError::Io {
            key: backup_dir.display().to_string(),
            source,
        })?;

        let mut copied = 0;
        for key in self.list().await? {
            let src = self.path_for(&key);
            let dst = backup_dir.join(format!("{key}.json"));
            if let Err(err) = fs::copy(&src, &dst).await {
                warn!(key, error = %err, "backup skipped for key");
                continue;
            }
            copied += 1;
        }
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use uuid::Uuid;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
        count: u32,
    }

    async fn temp_storage() -> (Storage, PathBuf) {
        let dir = std::env::temp_dir().join(format!("dlmm-storage-test-{}", Uuid::new_v4()));
        let storage = Storage::open(&dir).await.unwrap();
        (storage, dir)
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let (storage, dir) = temp_storage().await;
        let record = Record { name: "inst-1".to_string(), count: 7 };
        storage.save("inst-1", &record).await.unwrap();

        let loaded: Record = storage.load("inst-1").await.unwrap();
        assert_eq!(loaded, record);

        fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn load_missing_key_is_not_found() {
        let (storage, dir) = temp_storage().await;
        let result: Result<Record, _> = storage.load("missing").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn exists_list_and_delete_agree() {
        let (storage, dir) = temp_storage().await;
        storage.save("a", &Record { name: "a".to_string(), count: 1 }).await.unwrap();
        storage.save("b", &Record { name: "b".to_string(), count: 2 }).await.unwrap();

        assert!(storage.exists("a").await);
        let mut keys = storage.list().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);

        storage.delete("a").await.unwrap();
        assert!(!storage.exists("a").await);

        fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn overwrite_leaves_no_tmp_file_behind() {
        let (storage, dir) = temp_storage().await;
        storage.save("k", &Record { name: "v1".to_string(), count: 1 }).await.unwrap();
        storage.save("k", &Record { name: "v2".to_string(), count: 2 }).await.unwrap();

        let loaded: Record = storage.load("k").await.unwrap();
        assert_eq!(loaded.name, "v2");
        assert!(!dir.join("k.json.tmp").exists());

        fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn backup_to_copies_every_key() {
        let (storage, dir) = temp_storage().await;
        storage.save("a", &Record { name: "a".to_string(), count: 1 }).await.unwrap();
        storage.save("b", &Record { name: "b".to_string(), count: 2 }).await.unwrap();

        let backup_dir = dir.join("backup");
        let copied = storage.backup_to(&backup_dir).await.unwrap();
        assert_eq!(copied, 2);
        assert!(backup_dir.join("a.json").exists());

        fs::remove_dir_all(&dir).await.ok();
    }
}
