//! Test harness: an `App` over local tiers in a temp directory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use object_store::memory::InMemory;
use tempfile::TempDir;

use crate::app::builder::{App, AppBuilder};
use crate::domain::ModernFormat;
use crate::impls::{LocalStorage, RemoteStorage, StubImageTool, StubRasterizer, WritePolicy};
use crate::ports::{Clock, ImageTool, Storage, SystemClock, Tiers};

pub(crate) struct TestApp {
    pub(crate) dir: TempDir,
    pub(crate) app: App,
}

impl TestApp {
    pub(crate) async fn new() -> Self {
        Self::builder().build().await
    }

    pub(crate) fn builder() -> TestAppBuilder {
        TestAppBuilder::default()
    }

    async fn keys(storage: &Storage) -> Vec<String> {
        storage
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|object| object.key)
            .collect()
    }

    pub(crate) async fn temp_keys(&self) -> Vec<String> {
        Self::keys(self.app.tiers().temp()).await
    }

    pub(crate) async fn incoming_keys(&self) -> Vec<String> {
        Self::keys(self.app.tiers().incoming()).await
    }

    pub(crate) async fn active_keys(&self) -> Vec<String> {
        Self::keys(self.app.tiers().active()).await
    }
}

pub(crate) struct TestAppBuilder {
    tool: Arc<dyn ImageTool>,
    modern_formats: Vec<ModernFormat>,
    auto_orient: bool,
    publish_grace: Duration,
    clock: Arc<dyn Clock>,
    remote: bool,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self {
            tool: Arc::new(StubImageTool::new()),
            modern_formats: Vec::new(),
            auto_orient: false,
            publish_grace: Duration::from_millis(50),
            clock: Arc::new(SystemClock),
            remote: false,
        }
    }
}

impl TestAppBuilder {
    pub(crate) fn tool(self, tool: StubImageTool) -> Self {
        self.shared_tool(Arc::new(tool))
    }

    /// Keep a handle on the tool to inspect recorded transforms.
    pub(crate) fn shared_tool(mut self, tool: Arc<StubImageTool>) -> Self {
        self.tool = tool;
        self
    }

    pub(crate) fn modern_formats(mut self, formats: &[ModernFormat]) -> Self {
        self.modern_formats = formats.to_vec();
        self
    }

    pub(crate) fn auto_orient(mut self, enabled: bool) -> Self {
        self.auto_orient = enabled;
        self
    }

    pub(crate) fn publish_grace(mut self, grace: Duration) -> Self {
        self.publish_grace = grace;
        self
    }

    pub(crate) fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Incoming and active on in-memory object stores.
    pub(crate) fn remote(mut self) -> Self {
        self.remote = true;
        self
    }

    pub(crate) async fn build(self) -> TestApp {
        let dir = TempDir::new().unwrap();
        let temp = LocalStorage::new(dir.path().join("temp"));
        let (incoming, active) = if self.remote {
            let tier = |location: &str, policy: WritePolicy| {
                Storage::Remote(RemoteStorage::new(
                    location,
                    Arc::new(InMemory::new()),
                    policy,
                    self.clock.clone(),
                ))
            };
            (
                tier(
                    "mem://incoming",
                    WritePolicy::expiring("no-cache", TimeDelta::hours(2)),
                ),
                tier("mem://active", WritePolicy::public("public, max-age=60")),
            )
        } else {
            (
                Storage::Local(LocalStorage::new(dir.path().join("incoming"))),
                Storage::Local(LocalStorage::new(dir.path().join("active"))),
            )
        };

        let app = AppBuilder::new()
            .tiers(Tiers::new(temp, incoming, active))
            .image_tool(self.tool)
            .rasterizer(Arc::new(StubRasterizer::new()))
            .clock(self.clock)
            .modern_formats(&self.modern_formats)
            .auto_orient(self.auto_orient)
            .publish_grace(self.publish_grace)
            .build()
            .await
            .unwrap();
        TestApp { dir, app }
    }
}

/// Write a stub image (`<FORMAT> <W>x<H>`) outside the tiers.
pub(crate) async fn stage_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let staging = dir.path().join("staging");
    tokio::fs::create_dir_all(&staging).await.unwrap();
    let path = staging.join(name);
    tokio::fs::write(&path, contents).await.unwrap();
    path
}
