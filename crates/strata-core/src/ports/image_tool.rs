//! ImageTool / Rasterizer ports - 外部プロセスの抽象化
//!
//! ピクセル処理そのものは持たず、外部ツールを「文字列引数 + 成否 + stdout」
//! の契約で呼び出すだけです。
//!
//! # 実装
//! - `impls::imagemagick::ImageMagick`（本番用）
//! - `impls::rsvg::RsvgConvert`（本番用）
//! - `impls::stub_tool::{StubImageTool, StubRasterizer}`（開発・テスト用）

use std::path::Path;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::{Capabilities, ModernFormat, ToolError};

/// Read or write support, as reported by the tool's format list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

/// What `identify` reports for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identified {
    pub format: String,
    pub width: u32,
    pub height: u32,
}

impl Identified {
    /// Parse a `WxH` token.
    pub fn parse_dimensions(token: &str) -> Option<(u32, u32)> {
        let (w, h) = token.split_once('x')?;
        Some((w.parse().ok()?, h.parse().ok()?))
    }
}

/// Raster transform tool (resize, rotate, re-encode, identify).
#[async_trait]
pub trait ImageTool: Send + Sync {
    /// Run `<tool> src args... dst`. Single attempt, no retry.
    async fn transform(&self, src: &Path, dst: &Path, args: &[String]) -> Result<(), ToolError>;

    async fn identify(&self, path: &Path) -> Result<Identified, ToolError>;

    async fn is_format_supported(&self, format: &str, mode: AccessMode) -> Result<bool, ToolError>;

    /// First line of the tool's version banner.
    async fn version(&self) -> Result<String, ToolError>;
}

/// Vector → raster conversion.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, svg: &Path, png: &Path) -> Result<(), ToolError>;

    async fn version(&self) -> Result<String, ToolError>;
}

/// Resolve the capability flags once at startup.
///
/// A failing check counts as "unsupported" rather than aborting startup.
pub async fn detect_capabilities(tool: &dyn ImageTool) -> Capabilities {
    async fn supports(tool: &dyn ImageTool, format: &str, mode: AccessMode) -> bool {
        match tool.is_format_supported(format, mode).await {
            Ok(supported) => supported,
            Err(e) => {
                warn!(format, error = %e, "capability check failed");
                false
            }
        }
    }

    let capabilities = Capabilities {
        webp_write: supports(tool, ModernFormat::Webp.tool_name(), AccessMode::Write).await,
        avif_write: supports(tool, ModernFormat::Avif.tool_name(), AccessMode::Write).await,
        svg_read: supports(tool, "SVG", AccessMode::Read).await,
    };
    info!(?capabilities, "transform tool capabilities resolved");
    capabilities
}
