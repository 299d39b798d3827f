//! Batch helpers - キー集合をまとめて移動・削除する
//!
//! - `migrate`: レスポンスに必要な移動。1 つでも失敗したらエラー
//! - `move_present`: 存在するキーだけを移動し、無かったキーを返す
//! - `delete_best_effort`: 結果を集めてログに残し、バッチを中断しない
//!
//! キー間の順序は保証しません（並行に実行）。

use futures::future::{join_all, try_join_all};
use tracing::{debug, warn};

use crate::domain::StorageError;
use crate::ports::Storage;

/// How an artifact set crosses tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Copy,
    Move,
}

/// Transfer every key; the first failure is returned.
pub async fn migrate(
    src: &Storage,
    dest: &Storage,
    keys: &[(String, Transfer)],
) -> Result<(), StorageError> {
    try_join_all(keys.iter().map(|(key, transfer)| async move {
        match transfer {
            Transfer::Copy => src.copy_to(key, dest).await,
            Transfer::Move => src.move_to(key, dest).await,
        }
    }))
    .await?;
    Ok(())
}

/// Move the keys that exist in `src`; return the ones that did not.
pub async fn move_present(
    src: &Storage,
    dest: &Storage,
    keys: &[String],
) -> Result<Vec<String>, StorageError> {
    let results = try_join_all(keys.iter().map(|key| async move {
        if src.exists(key).await {
            src.move_to(key, dest).await?;
            Ok::<_, StorageError>(None)
        } else {
            Ok(Some(key.clone()))
        }
    }))
    .await?;
    Ok(results.into_iter().flatten().collect())
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted: Vec<String>,
    /// Already absent (local backend reports these as errors).
    pub absent: Vec<String>,
    pub failed: Vec<String>,
}

/// Delete every key, logging failures without aborting the batch.
pub async fn delete_best_effort(storage: &Storage, keys: &[String]) -> DeleteOutcome {
    let results = join_all(keys.iter().map(|key| async move {
        (key, storage.delete(key).await)
    }))
    .await;

    let mut outcome = DeleteOutcome::default();
    for (key, result) in results {
        match result {
            Ok(()) => outcome.deleted.push(key.clone()),
            Err(e) if e.is_not_found() => {
                debug!(key = %key, tier = %storage, "already absent");
                outcome.absent.push(key.clone());
            }
            Err(e) => {
                warn!(key = %key, tier = %storage, error = %e, "delete failed");
                outcome.failed.push(key.clone());
            }
        }
    }
    outcome
}
