//! Rotate - active → temp → active
//!
//! # 実装
//! 1. active の original を temp へコピー
//! 2. 回転結果を新しい prefix のキー（拡張子は同じ）で temp に書き出す
//! 3. 派生画像を生成し、original と base 派生画像を直接 active へ
//! 4. 古いキーの artifact set を active からベストエフォートで削除
//! 5. modern 派生画像は完了後に active へ（`App::finish_renders`）
//!
//! 古いキーはレスポンス時点で解決できない前提です。

use tracing::{debug, info};

use crate::app::batch::delete_best_effort;
use crate::app::builder::App;
use crate::domain::{ImageError, RotateResult, Rotation, validate_key};

impl App {
    /// Replace an active image by a rotated copy under a new key.
    pub async fn rotate(&self, key: &str, rotation: Rotation) -> Result<RotateResult, ImageError> {
        let format = validate_key(key)?;
        let shared = &self.shared;
        let (temp, active) = (shared.tiers.temp(), shared.tiers.active());

        if !active.exists(key).await {
            return Err(ImageError::not_found(key));
        }
        active.copy_to(key, temp).await?;

        let new_key = shared
            .key_generator
            .generate_prefix()
            .key_with_extension(format.extension());
        let (src, dst) = (
            shared.tiers.temp_dir().path_for(key)?,
            shared.tiers.temp_dir().path_for(&new_key)?,
        );
        let rotated = shared
            .tool
            .transform(&src, &dst, &rotation.transform_args())
            .await;
        delete_best_effort(temp, &[key.to_string()]).await;
        rotated?;
        debug!(key, new_key = %new_key, %rotation, "original rotated");

        let handle = match shared.generator.create_thumbnails(&dst).await {
            Ok(handle) => handle,
            Err(e) => {
                self.discard_temp(&new_key).await;
                return Err(e);
            }
        };

        let migration = self.promote(&new_key, active).await;
        let dest = migration.is_ok().then(|| active.clone());
        self.finish_renders(new_key.clone(), handle, dest);
        migration?;

        let stale = delete_best_effort(active, &shared.keys.artifact_set(key)).await;
        shared.counters.background_errors(stale.failed.len());

        shared.counters.rotated();
        info!(key, new_key = %new_key, %rotation, "image rotated");
        Ok(RotateResult {
            key: new_key,
            previous: key.to_string(),
        })
    }
}
