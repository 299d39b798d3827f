//! Storage port - 3 つの tier（temp / incoming / active）の抽象化
//!
//! # 設計原則
//! - backend は閉じた enum（`Local` / `Remote`）で表現する
//! - copy / move は (source, destination) の組み合わせによる小さな dispatch table
//! - temp tier は backend 設定に関係なく常に local
//!
//! # 削除の非対称性
//! 存在しないキーの削除は remote では成功、local では `NotFound`。
//! ベストエフォートで削除する呼び出し側は local の `NotFound` を明示的に握りつぶすこと
//! （`app::batch` を参照）。

use std::fmt;
use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::domain::StorageError;
use crate::impls::local_storage::LocalStorage;
use crate::impls::remote_storage::RemoteStorage;

/// One entry returned by `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

/// A storage tier backend.
#[derive(Debug, Clone)]
pub enum Storage {
    Local(LocalStorage),
    Remote(RemoteStorage),
}

impl Storage {
    /// Never fails; any backend error counts as "absent".
    pub async fn exists(&self, key: &str) -> bool {
        match self {
            Storage::Local(local) => local.exists(key).await,
            Storage::Remote(remote) => remote.exists(key).await,
        }
    }

    pub async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        match self {
            Storage::Local(local) => local.get(key).await,
            Storage::Remote(remote) => remote.get(key).await,
        }
    }

    /// Write the file at `src` under `key`, overwriting.
    pub async fn put(&self, key: &str, src: &Path) -> Result<(), StorageError> {
        match self {
            Storage::Local(local) => local.put(key, src).await,
            Storage::Remote(remote) => remote.put(key, src).await,
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self {
            Storage::Local(local) => local.delete(key).await,
            Storage::Remote(remote) => remote.delete(key).await,
        }
    }

    /// `None` when the key is absent.
    pub async fn last_modified(&self, key: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        match self {
            Storage::Local(local) => local.last_modified(key).await,
            Storage::Remote(remote) => remote.last_modified(key).await,
        }
    }

    pub async fn list(&self) -> Result<Vec<StoredObject>, StorageError> {
        match self {
            Storage::Local(local) => local.list().await,
            Storage::Remote(remote) => remote.list().await,
        }
    }

    /// Copy `key` from this tier into `dest` under the same key.
    pub async fn copy_to(&self, key: &str, dest: &Storage) -> Result<(), StorageError> {
        match (self, dest) {
            (Storage::Local(src), Storage::Local(dst)) => src.copy_to(key, dst).await,
            (Storage::Local(src), Storage::Remote(dst)) => dst.put(key, &src.path_for(key)?).await,
            (Storage::Remote(src), Storage::Local(dst)) => {
                let bytes = src.get(key).await?;
                dst.put_bytes(key, bytes).await
            }
            (Storage::Remote(src), Storage::Remote(dst)) => src.copy_to(key, dst).await,
        }
    }

    /// Move `key` into `dest`: copy, then delete from this tier.
    ///
    /// Local → local is a rename.
    pub async fn move_to(&self, key: &str, dest: &Storage) -> Result<(), StorageError> {
        match (self, dest) {
            (Storage::Local(src), Storage::Local(dst)) => src.move_to(key, dst).await,
            _ => {
                self.copy_to(key, dest).await?;
                self.delete(key).await
            }
        }
    }
}

impl fmt::Display for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Storage::Local(local) => write!(f, "local:{}", local.root().display()),
            Storage::Remote(remote) => write!(f, "remote:{}", remote.location()),
        }
    }
}

impl From<LocalStorage> for Storage {
    fn from(local: LocalStorage) -> Self {
        Storage::Local(local)
    }
}

impl From<RemoteStorage> for Storage {
    fn from(remote: RemoteStorage) -> Self {
        Storage::Remote(remote)
    }
}

/// The three tiers shared by every orchestrator.
#[derive(Debug, Clone)]
pub struct Tiers {
    temp_dir: LocalStorage,
    temp: Storage,
    incoming: Storage,
    active: Storage,
}

impl Tiers {
    pub fn new(temp: LocalStorage, incoming: Storage, active: Storage) -> Self {
        Self {
            temp: Storage::Local(temp.clone()),
            temp_dir: temp,
            incoming,
            active,
        }
    }

    /// The temp tier as a directory, for tools that need real paths.
    pub fn temp_dir(&self) -> &LocalStorage {
        &self.temp_dir
    }

    pub fn temp(&self) -> &Storage {
        &self.temp
    }

    pub fn incoming(&self) -> &Storage {
        &self.incoming
    }

    pub fn active(&self) -> &Storage {
        &self.active
    }
}
