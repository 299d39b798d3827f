//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # 設計原則
//! - 起動時検証（Fail-fast）: profile 集合の検証、temp ディレクトリの作成
//! - capability は build 時に一度だけ検出し、以降イミュータブル
//! - `App` は `Clone` で安価に共有できる（中身は `Arc`）
//!
//! # 使用例
//! ```ignore
//! let app = AppBuilder::from_config(&config)?.build().await?;
//! let uploaded = app.upload(&staged).await?;
//! app.publish(&uploaded.key).await?;
//! app.drain().await;
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use serde::Serialize;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::app::status::{Counters, ServiceCounts};
use crate::app::thumbnails::ThumbnailGenerator;
use crate::config::{BackendConfig, Config, DEFAULT_EXPIRE_HOURS, DEFAULT_PUBLISH_GRACE_SECONDS};
use crate::domain::{
    Capabilities, KeyDeriver, ModernFormat, ResizeProfile, StorageError, ToolError,
};
use crate::impls::{
    CannedAcl, ImageMagick, LocalStorage, RemoteStorage, RsvgConvert, WritePolicy,
};
use crate::ports::{
    Clock, ImageTool, KeyGenerator, Rasterizer, Storage, SystemClock, Tiers, UlidKeyGenerator,
    detect_capabilities,
};

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing component: {0}")]
    MissingComponent(&'static str),

    #[error("at least one resize profile is required")]
    NoProfiles,

    #[error("resize profile suffix must not be empty")]
    EmptySuffix,

    #[error("duplicate resize profile suffix: {0}")]
    DuplicateSuffix(String),

    #[error("resize profile {0} has no transform arguments")]
    EmptyProfile(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Tool(#[from] ToolError),
}

pub struct AppBuilder {
    tiers: Option<Tiers>,
    tool: Option<Arc<dyn ImageTool>>,
    rasterizer: Option<Arc<dyn Rasterizer>>,
    key_generator: Option<Arc<dyn KeyGenerator>>,
    clock: Arc<dyn Clock>,
    profiles: Vec<ResizeProfile>,
    modern_formats: Vec<ModernFormat>,
    auto_orient: bool,
    publish_grace: Duration,
    incoming_expiry: TimeDelta,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            tiers: None,
            tool: None,
            rasterizer: None,
            key_generator: None,
            clock: Arc::new(SystemClock),
            profiles: ResizeProfile::defaults(),
            modern_formats: Vec::new(),
            auto_orient: false,
            publish_grace: Duration::from_secs(DEFAULT_PUBLISH_GRACE_SECONDS),
            incoming_expiry: TimeDelta::hours(i64::from(DEFAULT_EXPIRE_HOURS)),
        }
    }

    /// Wire tiers and external tools from configuration.
    pub fn from_config(config: &Config) -> Result<Self, BuildError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let expiry = TimeDelta::hours(i64::from(config.expire_hours));
        let temp = LocalStorage::new(&config.temp_folder);

        let (incoming, active) = match &config.backend {
            BackendConfig::Local { incoming, active } => (
                Storage::Local(LocalStorage::new(incoming)),
                Storage::Local(LocalStorage::new(active)),
            ),
            BackendConfig::S3 { incoming, active } => (
                Storage::Remote(RemoteStorage::s3(
                    incoming,
                    CannedAcl::Private,
                    WritePolicy::expiring(&config.cache_control, expiry),
                    clock.clone(),
                )?),
                Storage::Remote(RemoteStorage::s3(
                    active,
                    CannedAcl::PublicRead,
                    WritePolicy::public(&config.cache_control),
                    clock.clone(),
                )?),
            ),
        };

        if let Err(e) = RsvgConvert::detect() {
            warn!(error = %e, "vector uploads will fail until rsvg-convert is installed");
        }

        Ok(Self::new()
            .tiers(Tiers::new(temp, incoming, active))
            .image_tool(Arc::new(ImageMagick::detect()?))
            .rasterizer(Arc::new(RsvgConvert))
            .clock(clock)
            .profiles(config.profiles.clone())
            .modern_formats(&config.enabled_modern_formats())
            .auto_orient(config.auto_orient)
            .publish_grace(config.publish_grace())
            .incoming_expiry(expiry))
    }

    pub fn tiers(mut self, tiers: Tiers) -> Self {
        self.tiers = Some(tiers);
        self
    }

    pub fn image_tool(mut self, tool: Arc<dyn ImageTool>) -> Self {
        self.tool = Some(tool);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    /// Defaults to ULIDs stamped by the builder's clock.
    pub fn key_generator(mut self, key_generator: Arc<dyn KeyGenerator>) -> Self {
        self.key_generator = Some(key_generator);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn profiles(mut self, profiles: Vec<ResizeProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    /// Formats enabled by configuration; unsupported ones are dropped at build.
    pub fn modern_formats(mut self, formats: &[ModernFormat]) -> Self {
        self.modern_formats = formats.to_vec();
        self
    }

    pub fn auto_orient(mut self, enabled: bool) -> Self {
        self.auto_orient = enabled;
        self
    }

    pub fn publish_grace(mut self, grace: Duration) -> Self {
        self.publish_grace = grace;
        self
    }

    /// Age after which `clean_incoming` removes an artifact.
    pub fn incoming_expiry(mut self, expiry: TimeDelta) -> Self {
        self.incoming_expiry = expiry;
        self
    }

    fn validate_profiles(&self) -> Result<(), BuildError> {
        if self.profiles.is_empty() {
            return Err(BuildError::NoProfiles);
        }
        let mut seen = HashSet::new();
        for profile in &self.profiles {
            if profile.suffix.is_empty() {
                return Err(BuildError::EmptySuffix);
            }
            if profile.transform_args.is_empty() {
                return Err(BuildError::EmptyProfile(profile.suffix.clone()));
            }
            if !seen.insert(profile.suffix.as_str()) {
                return Err(BuildError::DuplicateSuffix(profile.suffix.clone()));
            }
        }
        Ok(())
    }

    /// Validate, query the transform tool and create local tier directories.
    pub async fn build(self) -> Result<App, BuildError> {
        self.validate_profiles()?;
        let tiers = self.tiers.ok_or(BuildError::MissingComponent("tiers"))?;
        let tool = self.tool.ok_or(BuildError::MissingComponent("image tool"))?;
        let rasterizer = self
            .rasterizer
            .ok_or(BuildError::MissingComponent("rasterizer"))?;

        tiers.temp_dir().ensure_root().await?;
        for tier in [tiers.incoming(), tiers.active()] {
            if let Storage::Local(local) = tier {
                local.ensure_root().await?;
            }
        }

        let capabilities = detect_capabilities(tool.as_ref()).await;
        let keys = KeyDeriver::with_capabilities(self.profiles, &self.modern_formats, &capabilities);
        let key_generator = self
            .key_generator
            .unwrap_or_else(|| -> Arc<dyn KeyGenerator> {
                Arc::new(UlidKeyGenerator::new(self.clock.clone()))
            });
        let tracker = TaskTracker::new();

        info!(
            incoming = %tiers.incoming(),
            active = %tiers.active(),
            modern_formats = ?keys.modern_formats(),
            "app built"
        );

        Ok(App {
            shared: Arc::new(Shared {
                generator: ThumbnailGenerator::new(
                    tool.clone(),
                    rasterizer.clone(),
                    keys.clone(),
                    tracker.clone(),
                ),
                tiers,
                tool,
                rasterizer,
                keys,
                key_generator,
                clock: self.clock,
                capabilities,
                settings: Settings {
                    auto_orient: self.auto_orient,
                    publish_grace: self.publish_grace,
                    incoming_expiry: self.incoming_expiry,
                },
                counters: Counters::default(),
                tracker,
            }),
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Settings {
    pub(crate) auto_orient: bool,
    pub(crate) publish_grace: Duration,
    pub(crate) incoming_expiry: TimeDelta,
}

pub(crate) struct Shared {
    pub(crate) tiers: Tiers,
    pub(crate) tool: Arc<dyn ImageTool>,
    pub(crate) rasterizer: Arc<dyn Rasterizer>,
    pub(crate) generator: ThumbnailGenerator,
    pub(crate) keys: KeyDeriver,
    pub(crate) key_generator: Arc<dyn KeyGenerator>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) capabilities: Capabilities,
    pub(crate) settings: Settings,
    pub(crate) counters: Counters,
    pub(crate) tracker: TaskTracker,
}

/// Versions of the external tools, for health output.
#[derive(Debug, Clone, Serialize)]
pub struct ToolVersions {
    pub image_tool: String,
    pub rasterizer: String,
}

/// App は画像ライフサイクルの入口
///
/// upload / publish / rotate / delete / clean_incoming は
/// それぞれ `app::{upload, publish, rotate, delete, clean}` に実装されています。
#[derive(Clone)]
pub struct App {
    pub(crate) shared: Arc<Shared>,
}

impl App {
    pub fn tiers(&self) -> &Tiers {
        &self.shared.tiers
    }

    pub fn keys(&self) -> &KeyDeriver {
        &self.shared.keys
    }

    pub fn capabilities(&self) -> Capabilities {
        self.shared.capabilities
    }

    pub fn counts(&self) -> ServiceCounts {
        self.shared.counters.snapshot()
    }

    /// A failing version query is reported in place of the version.
    pub async fn tool_versions(&self) -> ToolVersions {
        let describe = |result: Result<String, ToolError>| result.unwrap_or_else(|e| e.to_string());
        ToolVersions {
            image_tool: describe(self.shared.tool.version().await),
            rasterizer: describe(self.shared.rasterizer.version().await),
        }
    }

    /// Wait for every background task scheduled so far.
    pub async fn drain(&self) {
        let tracker = &self.shared.tracker;
        tracker.close();
        tracker.wait().await;
        tracker.reopen();
    }
}
