//! Render-completion handle
//!
//! modern format の派生画像は背景タスクで生成されます。
//! `RenderHandle` はその完了（成功・失敗を問わず）を一度だけ受け取るためのものです。
//!
//! # 設計原則
//! - `settled(self)` は handle を消費する（再利用・再生成できない）
//! - 個々の失敗は `RenderReport::failed` に集約され、書き込み済みの成果物は巻き戻さない

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderFailure {
    pub key: String,
    pub reason: String,
}

/// Terminal state of every modern derivative of one original.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderReport {
    pub rendered: Vec<String>,
    pub failed: Vec<RenderFailure>,
}

impl RenderReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
pub struct RenderHandle {
    task: Option<JoinHandle<RenderReport>>,
    expected: Vec<String>,
}

impl RenderHandle {
    pub(crate) fn spawned(task: JoinHandle<RenderReport>, expected: Vec<String>) -> Self {
        Self {
            task: Some(task),
            expected,
        }
    }

    /// Nothing to render.
    pub(crate) fn empty() -> Self {
        Self {
            task: None,
            expected: Vec::new(),
        }
    }

    /// Keys the background renders will produce.
    pub fn expected(&self) -> &[String] {
        &self.expected
    }

    /// Wait for every background render to finish.
    ///
    /// A panicked render task reports every expected key as failed.
    pub async fn settled(self) -> RenderReport {
        let Some(task) = self.task else {
            return RenderReport::default();
        };
        match task.await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "render task did not complete");
                RenderReport {
                    rendered: Vec::new(),
                    failed: self
                        .expected
                        .into_iter()
                        .map(|key| RenderFailure {
                            key,
                            reason: e.to_string(),
                        })
                        .collect(),
                }
            }
        }
    }
}

/// Intermediate file removed when dropped.
#[derive(Debug)]
pub(crate) struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        // a single local unlink, run inline even on a runtime worker
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "scratch file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove scratch file"),
        }
    }
}
