//! KeyGenerator port - key prefix 生成の抽象化
//!
//! テスト容易性のために trait として抽象化しています。
//!
//! # 実装
//! - **UlidKeyGenerator**: ULID ベース（本番用）

use crate::domain::KeyPrefix;
use crate::ports::Clock;
use ulid::Ulid;

/// KeyGenerator は upload / rotate ごとに一意な prefix を生成
///
/// # 要件
/// - 一意であること
/// - 時刻順にソートできること
pub trait KeyGenerator: Send + Sync {
    fn generate_prefix(&self) -> KeyPrefix;
}

/// UlidKeyGenerator は Clock を使って現在時刻ベースの ULID を生成します。
pub struct UlidKeyGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidKeyGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> KeyGenerator for UlidKeyGenerator<C> {
    fn generate_prefix(&self) -> KeyPrefix {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        KeyPrefix::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}
