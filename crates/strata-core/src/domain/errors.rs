//! Errors - エラー型と分類
//!
//! 呼び出し側（HTTP 層など）に見せるのは `ImageError` だけです。
//! 下位の `ToolError` / `StorageError` は `#[from]` で包まれ、
//! `ImageError::kind()` で運用分類に落とし込まれます。

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ErrorKind は呼び出し側に返すエラーの分類
///
/// # 分類
/// - BadInput: 入力が不正（未対応フォーマット、不正なキー、ファイル欠落）
/// - NotFound: 期待した tier にキーが存在しない
/// - Internal: 外部ツール・ストレージの障害
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadInput,
    NotFound,
    Internal,
}

/// 外部プロセス（ImageMagick, rsvg-convert）の失敗
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{program} is not installed")]
    NotInstalled { program: String },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("unrecognized output from {program}: {output:?}")]
    UnrecognizedOutput { program: String, output: String },

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Storage tier の操作エラー
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    #[error("no content type known for key {0}")]
    UnsupportedContentType(String),

    #[error("io error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("object store error on {key}: {source}")]
    Remote {
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("storage configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// io::ErrorKind::NotFound は NotFound に寄せる
    pub(crate) fn from_io(key: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound {
                key: key.to_string(),
            }
        } else {
            StorageError::Io {
                key: key.to_string(),
                source,
            }
        }
    }

    pub(crate) fn from_remote(key: &str, source: object_store::Error) -> Self {
        match source {
            object_store::Error::NotFound { .. } => StorageError::NotFound {
                key: key.to_string(),
            },
            source => StorageError::Remote {
                key: key.to_string(),
                source,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// ImageError は呼び出し側に返すドメインエラー
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("bad key: {0:?}")]
    InvalidKey(String),

    #[error("bad parameter: {0}")]
    InvalidParameter(String),

    #[error("missing file: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("unknown image: {key}")]
    NotFound { key: String },

    #[error("external tool failed: {0}")]
    Tool(#[from] ToolError),

    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),
}

impl ImageError {
    pub fn not_found(key: impl Into<String>) -> Self {
        ImageError::NotFound { key: key.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ImageError::UnsupportedFormat(_)
            | ImageError::InvalidKey(_)
            | ImageError::InvalidParameter(_)
            | ImageError::MissingFile(_) => ErrorKind::BadInput,
            ImageError::NotFound { .. } => ErrorKind::NotFound,
            ImageError::Storage(StorageError::NotFound { .. }) => ErrorKind::NotFound,
            ImageError::Storage(StorageError::InvalidKey(_)) => ErrorKind::BadInput,
            ImageError::Tool(_) | ImageError::Storage(_) => ErrorKind::Internal,
        }
    }
}
