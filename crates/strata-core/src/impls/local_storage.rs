//! LocalStorage - ディレクトリをルートとするフラットな tier
//!
//! # 実装詳細
//! - キーはすべてファイル名として解釈し、パスに解決する前に sanitize する
//! - 書き込みは `tokio::fs` のみ（ブロッキング I/O なし）
//! - 同一ファイルシステム内の move は rename、デバイスを跨ぐ場合は copy + remove

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::StorageError;
use crate::ports::StoredObject;

const RESERVED: &[char] = &['/', '\\', '<', '>', ':', '"', '|', '?', '*'];

/// Strip separators, reserved and control characters from a key.
///
/// Keys that collapse to nothing, `.` or `..` are rejected.
pub fn sanitize_key(key: &str) -> Result<String, StorageError> {
    let cleaned: String = key
        .chars()
        .filter(|c| !c.is_control() && !RESERVED.contains(c))
        .collect();
    let cleaned = cleaned.trim_end_matches([' ', '.']);

    match cleaned {
        "" | "." | ".." => Err(StorageError::InvalidKey(key.to_string())),
        cleaned => Ok(cleaned.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if needed.
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::from_io(&self.root.display().to_string(), e))
    }

    /// Resolve a key to its file path inside the root.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(sanitize_key(key)?))
    }

    pub async fn exists(&self, key: &str) -> bool {
        match self.path_for(key) {
            Ok(path) => tokio::fs::metadata(path)
                .await
                .is_ok_and(|meta| meta.is_file()),
            Err(_) => false,
        }
    }

    pub async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.path_for(key)?;
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::from_io(key, e))?;
        Ok(Bytes::from(data))
    }

    pub async fn put(&self, key: &str, src: &Path) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        tokio::fs::copy(src, &path)
            .await
            .map_err(|e| StorageError::from_io(key, e))?;
        debug!(key, root = %self.root.display(), "local put");
        Ok(())
    }

    pub async fn put_bytes(&self, key: &str, bytes: Bytes) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| StorageError::from_io(key, e))
    }

    /// Fails with `NotFound` when the key is absent.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| StorageError::from_io(key, e))
    }

    pub async fn last_modified(&self, key: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::metadata(path).await {
            Ok(meta) => {
                let modified = meta.modified().map_err(|e| StorageError::from_io(key, e))?;
                Ok(Some(DateTime::<Utc>::from(modified)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::from_io(key, e)),
        }
    }

    /// Regular files directly under the root.
    pub async fn list(&self) -> Result<Vec<StoredObject>, StorageError> {
        let root = self.root.display().to_string();
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| StorageError::from_io(&root, e))?;

        let mut objects = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::from_io(&root, e))?
        {
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let Some(key) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let modified = meta.modified().map_err(|e| StorageError::from_io(&key, e))?;
            objects.push(StoredObject {
                key,
                last_modified: DateTime::<Utc>::from(modified),
            });
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    pub async fn copy_to(&self, key: &str, dest: &LocalStorage) -> Result<(), StorageError> {
        dest.put(key, &self.path_for(key)?).await
    }

    pub async fn move_to(&self, key: &str, dest: &LocalStorage) -> Result<(), StorageError> {
        let from = self.path_for(key)?;
        let to = dest.path_for(key)?;
        match tokio::fs::rename(&from, &to).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StorageError::from_io(key, e)),
            Err(e) => {
                debug!(key, error = %e, "rename failed, falling back to copy");
                self.copy_to(key, dest).await?;
                self.delete(key).await
            }
        }
    }
}
