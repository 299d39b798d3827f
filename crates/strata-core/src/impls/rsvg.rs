//! RsvgConvert - 本番用の Rasterizer 実装（`rsvg-convert`）

use std::ffi::OsStr;
use std::path::Path;

use async_trait::async_trait;

use crate::domain::ToolError;
use crate::impls::command::{command_exists, first_line, run};
use crate::ports::Rasterizer;

const PROGRAM: &str = "rsvg-convert";

#[derive(Debug, Clone, Default)]
pub struct RsvgConvert;

impl RsvgConvert {
    pub fn detect() -> Result<Self, ToolError> {
        if command_exists(PROGRAM) {
            Ok(Self)
        } else {
            Err(ToolError::NotInstalled {
                program: PROGRAM.to_string(),
            })
        }
    }
}

#[async_trait]
impl Rasterizer for RsvgConvert {
    /// Transparent areas are flattened onto white.
    async fn rasterize(&self, svg: &Path, png: &Path) -> Result<(), ToolError> {
        run(
            PROGRAM,
            [
                OsStr::new("-b"),
                OsStr::new("white"),
                svg.as_os_str(),
                OsStr::new("-o"),
                png.as_os_str(),
            ],
        )
        .await?;
        Ok(())
    }

    async fn version(&self) -> Result<String, ToolError> {
        let banner = run(PROGRAM, ["--version"]).await?;
        Ok(first_line(&banner))
    }
}
