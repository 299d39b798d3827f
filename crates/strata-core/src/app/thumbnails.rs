//! ThumbnailGenerator - 派生画像の生成
//!
//! # 実装
//! 1. ベクター画像なら rasterizer で中間ファイル（`<name>.jpg`、中身は PNG）を作る
//! 2. base format の派生画像を全 profile 分、同期的に生成（1 つでも失敗したらエラー）
//! 3. modern format の派生画像を背景タスクで生成し、`RenderHandle` を返す
//!
//! 中間ファイルは同期・非同期の両方が終わった時点で削除されます（失敗時も）。
//! 外部ツールの失敗はここでは再試行しません。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::future::{join_all, try_join_all};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::app::render::{RenderFailure, RenderHandle, RenderReport, ScratchFile};
use crate::domain::{
    ImageError, ImageFormat, KeyDeriver, ModernFormat, ResizeProfile, split_key, thumbnail_key,
};
use crate::ports::{ImageTool, Rasterizer};

#[derive(Clone)]
pub struct ThumbnailGenerator {
    tool: Arc<dyn ImageTool>,
    rasterizer: Arc<dyn Rasterizer>,
    keys: KeyDeriver,
    tracker: TaskTracker,
}

impl ThumbnailGenerator {
    pub fn new(
        tool: Arc<dyn ImageTool>,
        rasterizer: Arc<dyn Rasterizer>,
        keys: KeyDeriver,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            tool,
            rasterizer,
            keys,
            tracker,
        }
    }

    /// Render one derivative of `dir/original_key` next to it and return its key.
    pub async fn create_thumbnail(
        &self,
        dir: &Path,
        original_key: &str,
        profile: &ResizeProfile,
        format: Option<ModernFormat>,
    ) -> Result<String, ImageError> {
        Ok(render(self.tool.as_ref(), dir, original_key, profile, format).await?)
    }

    /// Render base derivatives now and modern derivatives in the background.
    ///
    /// Returns once every base derivative exists; the handle settles once every
    /// modern derivative has finished, successfully or not.
    pub async fn create_thumbnails(&self, file: &Path) -> Result<RenderHandle, ImageError> {
        let missing = || ImageError::MissingFile(file.to_path_buf());
        let dir = file.parent().ok_or_else(missing)?.to_path_buf();
        let key = file
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(missing)?
            .to_string();

        let (source_key, scratch) = self.raster_source(&dir, &key).await?;

        try_join_all(
            self.keys
                .profiles()
                .iter()
                .map(|profile| self.create_thumbnail(&dir, &source_key, profile, None)),
        )
        .await?;
        info!(key = %key, profiles = self.keys.profiles().len(), "base thumbnails created");

        let expected = self.keys.modern_thumbnail_keys(&key);
        if expected.is_empty() {
            return Ok(RenderHandle::empty());
        }

        let tool = self.tool.clone();
        let profiles = self.keys.profiles().to_vec();
        let formats = self.keys.modern_formats().to_vec();
        let task = self.tracker.spawn(async move {
            let jobs = profiles.iter().flat_map(|profile| {
                formats
                    .iter()
                    .map(|format| (profile, *format))
                    .collect::<Vec<_>>()
            });
            let results = join_all(jobs.map(|(profile, format)| {
                let tool = tool.as_ref();
                let (dir, source_key) = (&dir, &source_key);
                async move {
                    let target = thumbnail_key(source_key, &profile.suffix, Some(format));
                    render(tool, dir, source_key, profile, Some(format))
                        .await
                        .map_err(|e| RenderFailure {
                            key: target,
                            reason: e.to_string(),
                        })
                }
            }))
            .await;
            drop(scratch);

            let mut report = RenderReport::default();
            for result in results {
                match result {
                    Ok(key) => report.rendered.push(key),
                    Err(failure) => {
                        warn!(key = %failure.key, reason = %failure.reason, "modern thumbnail failed");
                        report.failed.push(failure);
                    }
                }
            }
            report
        });

        Ok(RenderHandle::spawned(task, expected))
    }

    /// Vector originals are rasterized first; everything else renders from itself.
    async fn raster_source(
        &self,
        dir: &Path,
        key: &str,
    ) -> Result<(String, Option<ScratchFile>), ImageError> {
        let (name, ext) = split_key(key);
        if !ImageFormat::from_extension(ext).is_some_and(ImageFormat::is_vector) {
            return Ok((key.to_string(), None));
        }

        let raster_key = format!("{name}.{}", ImageFormat::Jpg.extension());
        let scratch = ScratchFile::new(dir.join(&raster_key));
        self.rasterizer
            .rasterize(&dir.join(key), scratch.path())
            .await?;
        debug!(key, raster_key = %raster_key, "vector source rasterized");
        Ok((raster_key, Some(scratch)))
    }
}

async fn render(
    tool: &dyn ImageTool,
    dir: &Path,
    original_key: &str,
    profile: &ResizeProfile,
    format: Option<ModernFormat>,
) -> Result<String, crate::domain::ToolError> {
    let target = thumbnail_key(original_key, &profile.suffix, format);
    let src: PathBuf = dir.join(original_key);
    let dst: PathBuf = dir.join(&target);

    let started = Instant::now();
    tool.transform(&src, &dst, &profile.transform_args).await?;
    debug!(
        key = %target,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "thumbnail rendered"
    );
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{StubImageTool, StubRasterizer};
    use tempfile::TempDir;

    fn generator(tool: StubImageTool, modern: Vec<ModernFormat>) -> ThumbnailGenerator {
        ThumbnailGenerator::new(
            Arc::new(tool),
            Arc::new(StubRasterizer::new()),
            KeyDeriver::new(ResizeProfile::defaults(), modern),
            TaskTracker::new(),
        )
    }

    async fn seed(dir: &TempDir, key: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(key);
        tokio::fs::write(&path, contents).await.unwrap();
        path
    }

    #[tokio::test]
    async fn base_thumbnails_exist_when_the_call_returns() {
        let dir = TempDir::new().unwrap();
        let file = seed(&dir, "abc.jpg", "JPEG 1151x551").await;
        let generator = generator(StubImageTool::new(), vec![]);

        let handle = generator.create_thumbnails(&file).await.unwrap();

        for key in ["abcBI.jpg", "abcMI.jpg", "abcSI.jpg"] {
            assert!(dir.path().join(key).is_file(), "{key} missing");
        }
        assert!(handle.expected().is_empty());
        assert_eq!(handle.settled().await, RenderReport::default());
        let small = tokio::fs::read_to_string(dir.path().join("abcSI.jpg"))
            .await
            .unwrap();
        assert_eq!(small, "JPEG 200x200");
    }

    #[tokio::test]
    async fn modern_thumbnails_settle_later() {
        let dir = TempDir::new().unwrap();
        let file = seed(&dir, "abc.png", "PNG 800x600").await;
        let tool = StubImageTool::new().with_modern_delay(std::time::Duration::from_millis(30));
        let generator = generator(tool, vec![ModernFormat::Avif, ModernFormat::Webp]);

        let handle = generator.create_thumbnails(&file).await.unwrap();
        assert!(!dir.path().join("abcBI.webp").exists());

        let report = handle.settled().await;
        assert!(report.is_complete());
        assert_eq!(report.rendered.len(), 6);
        assert!(dir.path().join("abcSI.avif").is_file());
        assert!(dir.path().join("abcMI.webp").is_file());
    }

    #[tokio::test]
    async fn a_failing_base_derivative_fails_the_call() {
        let dir = TempDir::new().unwrap();
        let file = seed(&dir, "abc.gif", "GIF 10x10").await;
        let generator = generator(StubImageTool::new().failing_on("gif"), vec![]);

        let err = generator.create_thumbnails(&file).await.unwrap_err();
        assert!(matches!(err, ImageError::Tool(_)));
    }

    #[tokio::test]
    async fn modern_failures_are_isolated_per_variant() {
        let dir = TempDir::new().unwrap();
        let file = seed(&dir, "abc.jpg", "JPEG 100x100").await;
        let generator = generator(
            StubImageTool::new().failing_on("avif"),
            vec![ModernFormat::Avif, ModernFormat::Webp],
        );

        let report = generator
            .create_thumbnails(&file)
            .await
            .unwrap()
            .settled()
            .await;

        assert_eq!(report.rendered.len(), 3);
        assert_eq!(report.failed.len(), 3);
        assert!(report.failed.iter().all(|f| f.key.ends_with(".avif")));
        assert!(dir.path().join("abcBI.webp").is_file());
    }

    #[tokio::test]
    async fn vector_sources_render_raster_derivatives_and_drop_the_intermediate() {
        let dir = TempDir::new().unwrap();
        let file = seed(&dir, "abc.svg", "SVG 300x150").await;
        let generator = generator(StubImageTool::new(), vec![ModernFormat::Webp]);

        let handle = generator.create_thumbnails(&file).await.unwrap();
        assert!(dir.path().join("abcBI.jpg").is_file());
        assert_eq!(handle.expected(), ["abcBI.webp", "abcMI.webp", "abcSI.webp"]);

        let report = handle.settled().await;
        assert!(report.is_complete());
        assert!(dir.path().join("abcSI.webp").is_file());
        assert!(!dir.path().join("abc.jpg").exists(), "intermediate left behind");
        assert!(dir.path().join("abc.svg").is_file());
    }

    #[tokio::test]
    async fn intermediate_is_removed_when_base_generation_fails() {
        let dir = TempDir::new().unwrap();
        let file = seed(&dir, "abc.svg", "SVG 300x150").await;
        let generator = generator(StubImageTool::new().failing_on("jpg"), vec![]);

        assert!(generator.create_thumbnails(&file).await.is_err());
        assert!(!dir.path().join("abc.jpg").exists());
    }
}
