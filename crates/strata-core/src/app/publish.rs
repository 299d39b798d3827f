//! Publish - incoming → active
//!
//! # 実装
//! 1. active に既にあれば何もしない（冪等）
//! 2. incoming に存在する派生画像を active へ移し、無いものは deferred とする
//! 3. 最後に original を移す（original の移動失敗はエラー）
//! 4. deferred があれば grace period 後に一度だけ再確認し、届いていれば移す
//!
//! grace period 後も届かない派生画像は abandoned として警告を出します。
//! publish の呼び出し自体はそれを待ちません。

use tracing::{info, warn};

use crate::app::batch::move_present;
use crate::app::builder::App;
use crate::domain::{ImageError, PublishOutcome, validate_key};

impl App {
    /// Make an uploaded image publicly visible.
    pub async fn publish(&self, key: &str) -> Result<PublishOutcome, ImageError> {
        validate_key(key)?;
        let shared = &self.shared;
        let (incoming, active) = (shared.tiers.incoming(), shared.tiers.active());

        if active.exists(key).await {
            info!(key, "already published");
            return Ok(PublishOutcome::AlreadyPublished {
                key: key.to_string(),
            });
        }
        if !incoming.exists(key).await {
            return Err(ImageError::not_found(key));
        }

        let deferred = move_present(incoming, active, &shared.keys.all_thumbnail_keys(key)).await?;
        incoming.move_to(key, active).await?;

        if !deferred.is_empty() {
            self.recheck_deferred(key.to_string(), deferred.clone());
        }

        shared.counters.published();
        info!(key, deferred = deferred.len(), "image published");
        Ok(PublishOutcome::Published {
            key: key.to_string(),
            deferred,
        })
    }

    fn recheck_deferred(&self, key: String, deferred: Vec<String>) {
        let app = self.clone();
        self.shared.tracker.spawn(async move {
            let shared = &app.shared;
            tokio::time::sleep(shared.settings.publish_grace).await;

            let (incoming, active) = (shared.tiers.incoming(), shared.tiers.active());
            match move_present(incoming, active, &deferred).await {
                Ok(abandoned) => {
                    shared
                        .counters
                        .deferred_recovered(deferred.len() - abandoned.len());
                    if abandoned.is_empty() {
                        info!(key = %key, recovered = deferred.len(), "deferred thumbnails published");
                    } else {
                        shared.counters.abandoned(abandoned.len());
                        warn!(key = %key, ?abandoned, "thumbnails still missing after grace period");
                    }
                }
                Err(e) => {
                    shared.counters.background_errors(1);
                    warn!(key = %key, error = %e, "failed to publish deferred thumbnails");
                }
            }
        });
    }
}
