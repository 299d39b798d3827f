//! Upload - temp → incoming
//!
//! # 実装
//! 1. 外部ツールで形式を判定し、新しい prefix からキーを払い出す
//! 2. staged ファイルを temp tier の `<key>` に rename
//! 3. 設定されていれば jpeg を auto-orient（temp tier 内でその場で）
//! 4. base 派生画像を同期生成
//! 5. original（copy）と base 派生画像（move）を incoming へ並行に移す
//! 6. 背景で modern 派生画像の完了を待ち、incoming へ移して temp を掃除する
//!
//! 背景処理の失敗はログとカウンタに残すだけで、返却済みのレスポンスは失敗させません。

use std::path::Path;

use tracing::{info, warn};

use crate::app::batch::{Transfer, delete_best_effort, migrate};
use crate::app::builder::App;
use crate::app::render::RenderHandle;
use crate::domain::{ImageError, ImageFormat, StorageError, UploadResult};
use crate::ports::Storage;

impl App {
    /// Ingest a staged file and return the key the caller must remember.
    pub async fn upload(&self, staged: &Path) -> Result<UploadResult, ImageError> {
        let shared = &self.shared;
        if !tokio::fs::try_exists(staged).await.unwrap_or(false) {
            return Err(ImageError::MissingFile(staged.to_path_buf()));
        }

        let identified = shared.tool.identify(staged).await?;
        let format =
            ImageFormat::from_identify(&identified.format, staged, shared.capabilities.svg_read)?;
        let key = shared
            .key_generator
            .generate_prefix()
            .key_with_extension(format.extension());

        let temp = shared.tiers.temp_dir();
        let path = temp.path_for(&key)?;
        stage(staged, &path).await.map_err(|e| StorageError::from_io(&key, e))?;

        if shared.settings.auto_orient
            && format.is_auto_orientable()
            && let Err(e) = shared
                .tool
                .transform(&path, &path, &["-auto-orient".to_string()])
                .await
        {
            self.discard_temp(&key).await;
            return Err(e.into());
        }

        let handle = match shared.generator.create_thumbnails(&path).await {
            Ok(handle) => handle,
            Err(e) => {
                self.discard_temp(&key).await;
                return Err(e);
            }
        };

        let migration = self.promote(&key, shared.tiers.incoming()).await;
        let dest = migration.is_ok().then(|| shared.tiers.incoming().clone());
        self.finish_renders(key.clone(), handle, dest);
        migration?;

        shared.counters.uploaded();
        info!(key = %key, %format, width = identified.width, height = identified.height, "image uploaded");
        Ok(UploadResult { key, format })
    }

    /// Copy the original and move the base derivatives out of temp.
    pub(crate) async fn promote(&self, key: &str, dest: &Storage) -> Result<(), StorageError> {
        let mut transfers = vec![(key.to_string(), Transfer::Copy)];
        transfers.extend(
            self.shared
                .keys
                .base_thumbnail_keys(key)
                .into_iter()
                .map(|k| (k, Transfer::Move)),
        );
        migrate(self.shared.tiers.temp(), dest, &transfers).await
    }

    /// Remove the original and base derivatives from temp after a failure.
    pub(crate) async fn discard_temp(&self, key: &str) {
        let mut keys = vec![key.to_string()];
        keys.extend(self.shared.keys.base_thumbnail_keys(key));
        delete_best_effort(self.shared.tiers.temp(), &keys).await;
    }

    /// Once modern renders settle, move them to `dest` and clear temp.
    ///
    /// With no destination (the synchronous migration failed) every
    /// leftover is deleted instead.
    pub(crate) fn finish_renders(&self, key: String, handle: RenderHandle, dest: Option<Storage>) {
        let app = self.clone();
        self.shared.tracker.spawn(async move {
            let shared = &app.shared;
            let temp = shared.tiers.temp();
            let report = handle.settled().await;
            shared.counters.render_failures(report.failed.len());

            let mut leftovers = vec![key.clone()];
            leftovers.extend(report.failed.iter().map(|f| f.key.clone()));
            if let Some(dest) = &dest {
                if let Err(e) = migrate(
                    temp,
                    dest,
                    &report
                        .rendered
                        .iter()
                        .map(|k| (k.clone(), Transfer::Move))
                        .collect::<Vec<_>>(),
                )
                .await
                {
                    warn!(key = %key, error = %e, "failed to migrate modern thumbnails");
                    shared.counters.background_errors(1);
                    leftovers.extend(report.rendered.iter().cloned());
                }
            } else {
                leftovers.extend(report.rendered.iter().cloned());
                leftovers.extend(shared.keys.base_thumbnail_keys(&key));
            }

            let outcome = delete_best_effort(temp, &leftovers).await;
            shared.counters.background_errors(outcome.failed.len());
            info!(
                key = %key,
                rendered = report.rendered.len(),
                failed = report.failed.len(),
                "modern thumbnails settled"
            );
        });
    }
}

/// Rename into the temp tier; copy when the staged file is on another device.
async fn stage(staged: &Path, path: &Path) -> std::io::Result<()> {
    if tokio::fs::rename(staged, path).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(staged, path).await?;
    tokio::fs::remove_file(staged).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::TempDir;

    use crate::app::testing::{TestApp, stage_file};
    use crate::domain::{Capabilities, ErrorKind, ImageError, ImageFormat, ModernFormat};
    use crate::impls::StubImageTool;
    use crate::ports::Storage;

    #[tokio::test]
    async fn violin_upload_lands_original_and_three_derivatives_in_incoming() {
        let env = TestApp::new().await;
        let staged = stage_file(&env.dir, "violin.jpg", "JPEG 1151x551").await;

        let result = env.app.upload(&staged).await.unwrap();
        env.app.drain().await;

        assert_eq!(result.format, ImageFormat::Jpg);
        assert!(result.key.ends_with(".jpg"));
        let mut expected = vec![result.key.clone()];
        expected.extend(env.app.keys().base_thumbnail_keys(&result.key));
        assert_eq!(env.incoming_keys().await.len(), 4);
        for key in &expected {
            assert!(env.app.tiers().incoming().exists(key).await, "{key} missing");
        }
        assert!(env.temp_keys().await.is_empty(), "temp not cleaned");
        assert!(!staged.exists());
        assert_eq!(env.app.counts().uploaded, 1);
    }

    #[tokio::test]
    async fn vector_upload_derives_raster_keys_only() {
        let env = TestApp::builder()
            .modern_formats(&[ModernFormat::Webp])
            .build()
            .await;
        let staged = stage_file(&env.dir, "logo.svg", "SVG 300x100").await;

        let result = env.app.upload(&staged).await.unwrap();
        env.app.drain().await;

        assert_eq!(result.format, ImageFormat::Svg);
        let keys = env.incoming_keys().await;
        assert_eq!(keys.len(), 1 + 3 + 3);
        for key in keys.iter().filter(|k| **k != result.key) {
            assert!(!key.ends_with(".svg"), "{key} is not raster");
        }
        assert!(env.temp_keys().await.is_empty());
    }

    #[tokio::test]
    async fn svg_read_by_a_limited_tool_is_still_classified_as_svg() {
        let tool = StubImageTool::new().with_capabilities(Capabilities {
            svg_read: false,
            ..Capabilities::all()
        });
        let env = TestApp::builder().tool(tool).build().await;
        let staged = stage_file(&env.dir, "logo.svg", "SVG 300x100").await;

        let result = env.app.upload(&staged).await.unwrap();
        assert_eq!(result.format, ImageFormat::Svg);
    }

    #[tokio::test]
    async fn modern_derivatives_reach_incoming_after_settling() {
        let tool = StubImageTool::new().with_modern_delay(Duration::from_millis(40));
        let env = TestApp::builder()
            .tool(tool)
            .modern_formats(&[ModernFormat::Avif, ModernFormat::Webp])
            .build()
            .await;
        let staged = stage_file(&env.dir, "photo.png", "PNG 2000x1000").await;

        let result = env.app.upload(&staged).await.unwrap();
        let modern = env.app.keys().modern_thumbnail_keys(&result.key);
        assert!(!env.app.tiers().incoming().exists(&modern[0]).await);

        env.app.drain().await;
        for key in &modern {
            assert!(env.app.tiers().incoming().exists(key).await, "{key} missing");
        }
        assert!(env.temp_keys().await.is_empty());
    }

    #[tokio::test]
    async fn failed_modern_renders_are_counted_and_cleaned() {
        let tool = StubImageTool::new().failing_on("avif");
        let env = TestApp::builder()
            .tool(tool)
            .modern_formats(&[ModernFormat::Avif, ModernFormat::Webp])
            .build()
            .await;
        let staged = stage_file(&env.dir, "photo.gif", "GIF 64x64").await;

        env.app.upload(&staged).await.unwrap();
        env.app.drain().await;

        assert_eq!(env.app.counts().render_failures, 3);
        assert_eq!(env.incoming_keys().await.len(), 1 + 3 + 3);
        assert!(env.temp_keys().await.is_empty());
    }

    #[tokio::test]
    async fn auto_orient_runs_in_place_for_jpeg_only() {
        let tool = Arc::new(StubImageTool::new());
        let env = TestApp::builder()
            .shared_tool(tool.clone())
            .auto_orient(true)
            .build()
            .await;

        let jpg = stage_file(&env.dir, "a.jpg", "JPEG 10x20").await;
        let png = stage_file(&env.dir, "b.png", "PNG 10x20").await;
        env.app.upload(&jpg).await.unwrap();
        env.app.upload(&png).await.unwrap();

        let orients = tool
            .transforms()
            .into_iter()
            .filter(|(_, args)| args.iter().any(|a| a == "-auto-orient"))
            .count();
        assert_eq!(orients, 1);
    }

    #[tokio::test]
    async fn failed_auto_orient_leaves_nothing_in_temp() {
        let env = TestApp::builder()
            .tool(StubImageTool::new().failing_on("jpg"))
            .auto_orient(true)
            .build()
            .await;
        let staged = stage_file(&env.dir, "a.jpg", "JPEG 10x20").await;

        let err = env.app.upload(&staged).await.unwrap_err();
        env.app.drain().await;

        assert!(matches!(err, ImageError::Tool(_)));
        assert!(env.temp_keys().await.is_empty());
        assert!(env.incoming_keys().await.is_empty());
    }

    #[tokio::test]
    async fn failed_promotion_clears_every_temp_leftover() {
        let env = TestApp::builder()
            .modern_formats(&[ModernFormat::Webp])
            .build()
            .await;
        let Storage::Local(incoming) = env.app.tiers().incoming() else {
            unreachable!()
        };
        tokio::fs::remove_dir_all(incoming.root()).await.unwrap();
        let staged = stage_file(&env.dir, "a.png", "PNG 300x200").await;

        let err = env.app.upload(&staged).await.unwrap_err();
        env.app.drain().await;

        assert!(matches!(err, ImageError::Storage(_)));
        assert!(env.temp_keys().await.is_empty(), "temp not cleaned");
        assert_eq!(env.app.counts().uploaded, 0);
    }

    #[tokio::test]
    async fn unsupported_formats_are_bad_input() {
        let env = TestApp::new().await;
        let staged = stage_file(&env.dir, "scan.tiff", "TIFF 10x10").await;

        let err = env.app.upload(&staged).await.unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedFormat(ref f) if f == "TIFF"));
        assert_eq!(err.kind(), ErrorKind::BadInput);
    }

    #[tokio::test]
    async fn missing_staged_file_is_bad_input() {
        let env = TestApp::new().await;
        let dir = TempDir::new().unwrap();

        let err = env
            .app
            .upload(&dir.path().join("gone.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::MissingFile(_)));
        assert_eq!(err.kind(), ErrorKind::BadInput);
    }

    #[tokio::test]
    async fn base_render_failure_leaves_nothing_behind() {
        let env = TestApp::builder()
            .tool(StubImageTool::new().failing_on("png"))
            .build()
            .await;
        let staged = stage_file(&env.dir, "photo.png", "PNG 100x100").await;

        let err = env.app.upload(&staged).await.unwrap_err();
        env.app.drain().await;

        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(env.temp_keys().await.is_empty());
        assert!(env.incoming_keys().await.is_empty());
    }
}
