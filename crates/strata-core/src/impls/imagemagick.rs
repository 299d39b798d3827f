//! ImageMagick - 本番用の ImageTool 実装
//!
//! v7 は `magick`（`magick identify` を含む）、v6 は `convert` / `identify`。
//! `convert` は Windows の組み込みコマンドと衝突するため、v6 の存在確認は
//! `identify` で行います。
//!
//! `identify -format` はビルド構成によって decode delegate エラーを起こすので、
//! 既定の出力（`<path> <FORMAT> <W>x<H> ...`）をパースします。

use std::ffi::OsStr;
use std::path::Path;

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::OnceCell;
use tracing::info;

use crate::domain::ToolError;
use crate::impls::command::{command_exists, first_line, run};
use crate::ports::{AccessMode, Identified, ImageTool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagickVersion {
    V7,
    V6,
}

#[derive(Debug)]
pub struct ImageMagick {
    version: MagickVersion,
    format_list: OnceCell<String>,
}

impl ImageMagick {
    /// Locate the installed ImageMagick.
    pub fn detect() -> Result<Self, ToolError> {
        let version = if command_exists("magick") {
            MagickVersion::V7
        } else if command_exists("identify") {
            MagickVersion::V6
        } else {
            return Err(ToolError::NotInstalled {
                program: "magick".to_string(),
            });
        };
        info!(?version, "ImageMagick detected");
        Ok(Self::with_version(version))
    }

    pub fn with_version(version: MagickVersion) -> Self {
        Self {
            version,
            format_list: OnceCell::new(),
        }
    }

    fn convert_program(&self) -> &'static str {
        match self.version {
            MagickVersion::V7 => "magick",
            MagickVersion::V6 => "convert",
        }
    }

    async fn format_list(&self) -> Result<&str, ToolError> {
        let list = self
            .format_list
            .get_or_try_init(|| run(self.convert_program(), ["-list", "format"]))
            .await?;
        Ok(list.as_str())
    }
}

#[async_trait]
impl ImageTool for ImageMagick {
    async fn transform(&self, src: &Path, dst: &Path, args: &[String]) -> Result<(), ToolError> {
        let mut argv = Vec::with_capacity(args.len() + 2);
        argv.push(src.as_os_str().to_os_string());
        argv.extend(args.iter().map(Into::into));
        argv.push(dst.as_os_str().to_os_string());
        run(self.convert_program(), argv).await?;
        Ok(())
    }

    async fn identify(&self, path: &Path) -> Result<Identified, ToolError> {
        let output = match self.version {
            MagickVersion::V7 => {
                run("magick", [OsStr::new("identify"), path.as_os_str()]).await?
            }
            MagickVersion::V6 => run("identify", [path]).await?,
        };
        parse_identify(self.convert_program(), &output)
    }

    async fn is_format_supported(&self, format: &str, mode: AccessMode) -> Result<bool, ToolError> {
        let list = self.format_list().await?;
        Ok(format_supported(list, format, mode))
    }

    async fn version(&self) -> Result<String, ToolError> {
        let banner = run(self.convert_program(), ["--version"]).await?;
        Ok(first_line(&banner))
    }
}

/// Parse the first line of `identify` output.
pub fn parse_identify(program: &str, output: &str) -> Result<Identified, ToolError> {
    let unrecognized = || ToolError::UnrecognizedOutput {
        program: program.to_string(),
        output: output.to_string(),
    };

    let line = output.lines().next().ok_or_else(unrecognized)?;
    let mut fields = line.split(' ').skip(1);
    let format = fields.next().filter(|f| !f.is_empty()).ok_or_else(unrecognized)?;
    let (width, height) = fields
        .next()
        .and_then(Identified::parse_dimensions)
        .ok_or_else(unrecognized)?;

    Ok(Identified {
        format: format.to_string(),
        width,
        height,
    })
}

/// Look a format up in `-list format` output (`  WEBP* WEBP  rw+  ...`).
pub fn format_supported(list: &str, format: &str, mode: AccessMode) -> bool {
    let pattern = format!(r"(?m)^\s+{}\*?\s+\w+\s+([r-])([w-])[+-]", regex::escape(format));
    let Ok(re) = Regex::new(&pattern) else {
        return false;
    };
    let Some(caps) = re.captures(list) else {
        return false;
    };
    match mode {
        AccessMode::Read => caps.get(1).is_some_and(|m| m.as_str() == "r"),
        AccessMode::Write => caps.get(2).is_some_and(|m| m.as_str() == "w"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const FORMAT_LIST: &str = "   Format  Module    Mode  Description
-------------------------------------------------------------------------------
      AVIF  HEIC      r--   AV1 Image File Format (1.12.0)
      GIF*  GIF       rw+   CompuServe graphics interchange format
     JPEG*  JPEG      rw-   Joint Photographic Experts Group JFIF format (80)
       PNG* PNG       rw-   Portable Network Graphics (libpng 1.6.37)
       SVG  SVG       rw+   Scalable Vector Graphics (RSVG 2.52.5)
      WEBP* WEBP      rw+   WebP Image Format (libwebp 1.2.4 [020F])
";

    #[rstest]
    #[case::webp_write("WEBP", AccessMode::Write, true)]
    #[case::avif_read_only("AVIF", AccessMode::Write, false)]
    #[case::avif_read("AVIF", AccessMode::Read, true)]
    #[case::svg_read("SVG", AccessMode::Read, true)]
    #[case::missing("HEIC", AccessMode::Read, false)]
    fn format_list_lookup(#[case] format: &str, #[case] mode: AccessMode, #[case] expected: bool) {
        assert_eq!(format_supported(FORMAT_LIST, format, mode), expected);
    }

    #[test]
    fn identify_output_parses() {
        let output = "/tmp/upload.jpg JPEG 1151x551 1151x551+0+0 8-bit sRGB 89.5KB 0.000u 0:00.000\n";
        let identified = parse_identify("magick", output).unwrap();
        assert_eq!(
            identified,
            Identified {
                format: "JPEG".to_string(),
                width: 1151,
                height: 551,
            }
        );
    }

    #[test]
    fn animated_gifs_report_the_first_frame() {
        let output = "a.gif[0] GIF 20x10 20x10+0+0 8-bit sRGB 256c\na.gif[1] GIF 20x10 20x10+0+0 8-bit\n";
        let identified = parse_identify("identify", output).unwrap();
        assert_eq!(identified.format, "GIF");
        assert_eq!((identified.width, identified.height), (20, 10));
    }

    #[rstest]
    #[case::empty("")]
    #[case::no_dimensions("/tmp/x JPEG")]
    #[case::garbage("identify: no decode delegate")]
    fn unrecognized_identify_output(#[case] output: &str) {
        assert!(matches!(
            parse_identify("identify", output),
            Err(ToolError::UnrecognizedOutput { .. })
        ));
    }
}
