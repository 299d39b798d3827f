//! Key prefixes (ULID based).
//!
//! 1 回の upload / rotate ごとに 1 つの prefix を払い出し、
//! original と全 derivative のキーはこの prefix から導出されます。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: timestamp が先頭にあるため、生成順序でソートできる
//! - **分散生成可能**: 調整なしで複数プロセスで生成できる
//!
//! 表記は小文字の Crockford base32（26 文字）。profile suffix（`BI` など大文字）と
//! 見分けやすくするためです。

use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyPrefix(Ulid);

impl KeyPrefix {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }

    /// Original key for this prefix: `<prefix>.<ext>`.
    pub fn key_with_extension(&self, ext: &str) -> String {
        format!("{self}.{ext}")
    }
}

impl From<Ulid> for KeyPrefix {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_string().to_ascii_lowercase())
    }
}
