//! Clean - incoming tier の期限切れアーティファクトを削除
//!
//! 有効期限メタデータを無視するストレージ向け。
//! `last_modified` が `now - incoming_expiry` より古いものを全て消す。

use tracing::info;

use crate::app::batch::delete_best_effort;
use crate::app::builder::App;
use crate::domain::{CleanReport, ImageError};

impl App {
    pub async fn clean_incoming(&self) -> Result<CleanReport, ImageError> {
        let shared = &self.shared;
        let incoming = shared.tiers.incoming();
        let cutoff = shared.clock.now() - shared.settings.incoming_expiry;

        let objects = incoming.list().await?;
        let expired: Vec<String> = objects
            .iter()
            .filter(|object| object.last_modified < cutoff)
            .map(|object| object.key.clone())
            .collect();
        let outcome = delete_best_effort(incoming, &expired).await;

        info!(
            tier = %incoming,
            scanned = objects.len(),
            deleted = outcome.deleted.len(),
            failed = outcome.failed.len(),
            "incoming tier cleaned"
        );
        Ok(CleanReport {
            scanned: objects.len(),
            deleted: outcome.deleted,
            failed: outcome.failed,
        })
    }
}
