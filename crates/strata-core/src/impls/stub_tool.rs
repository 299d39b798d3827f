//! StubImageTool / StubRasterizer - 開発・テスト用の実装
//!
//! ImageMagick をインストールせずにパイプライン全体を動かすための実装です。
//! 画像は 1 行のテキスト `<FORMAT> <W>x<H>` で表現し、
//! `-rotate` / `-resize` / `-extent` だけを解釈します。
//!
//! # テスト容易性
//! - 任意の出力拡張子を失敗させられる（`failing_on`）
//! - modern format（webp / avif）の生成に遅延を入れられる（`with_modern_delay`）
//! - 実行された変換の引数を記録する（`transforms`）

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{Capabilities, ModernFormat, ToolError};
use crate::ports::{AccessMode, Identified, ImageTool, Rasterizer};

const STUB: &str = "stub";

/// One decoded stub image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StubImage<'a> {
    pub format: &'a str,
    pub width: u32,
    pub height: u32,
}

impl<'a> StubImage<'a> {
    pub fn parse(text: &'a str) -> Option<Self> {
        let (format, dims) = text.trim().split_once(' ')?;
        let (width, height) = Identified::parse_dimensions(dims)?;
        Some(Self {
            format,
            width,
            height,
        })
    }

    pub fn render(format: &str, width: u32, height: u32) -> String {
        format!("{format} {width}x{height}")
    }
}

fn format_for_path(path: &Path) -> Option<&'static str> {
    match path.extension()?.to_str()? {
        "jpg" | "jpeg" => Some("JPEG"),
        "png" => Some("PNG"),
        "gif" => Some("GIF"),
        "svg" => Some("SVG"),
        "webp" => Some("WEBP"),
        "avif" => Some("AVIF"),
        _ => None,
    }
}

fn is_modern(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()).is_some_and(|ext| {
        ModernFormat::ALL
            .into_iter()
            .any(|format| format.extension() == ext)
    })
}

/// Parse `WxH` followed by an optional ImageMagick geometry flag.
fn parse_geometry(geometry: &str) -> Option<(u32, u32, Option<char>)> {
    let flag = geometry
        .chars()
        .last()
        .filter(|c| !c.is_ascii_digit());
    let dims = match flag {
        Some(_) => &geometry[..geometry.len() - 1],
        None => geometry,
    };
    let (w, h) = Identified::parse_dimensions(dims)?;
    Some((w, h, flag))
}

fn resize(width: u32, height: u32, geometry: &str) -> Option<(u32, u32)> {
    let (box_w, box_h, flag) = parse_geometry(geometry)?;
    if flag == Some('>') && width <= box_w && height <= box_h {
        return Some((width, height));
    }
    let scale_w = box_w as f64 / width as f64;
    let scale_h = box_h as f64 / height as f64;
    let scale = if flag == Some('^') {
        scale_w.max(scale_h)
    } else {
        scale_w.min(scale_h)
    };
    let scaled = |v: u32| ((v as f64 * scale).round() as u32).max(1);
    Some((scaled(width), scaled(height)))
}

fn bad_args(args: &[String]) -> ToolError {
    ToolError::Failed {
        program: STUB.to_string(),
        status: "exit status: 1".to_string(),
        stderr: format!("unsupported arguments {args:?}"),
    }
}

async fn read_image(path: &Path) -> Result<String, ToolError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ToolError::Io {
            path: path.to_path_buf(),
            source,
        })
}

async fn write_image(path: &Path, contents: String) -> Result<(), ToolError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| ToolError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[derive(Debug, Default)]
pub struct StubImageTool {
    capabilities: Capabilities,
    failing_extensions: HashSet<String>,
    modern_delay: Option<Duration>,
    transforms: Mutex<Vec<(PathBuf, Vec<String>)>>,
}

impl StubImageTool {
    /// Every format readable and writable.
    pub fn new() -> Self {
        Self {
            capabilities: Capabilities::all(),
            ..Default::default()
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Make every transform writing this extension exit non-zero.
    pub fn failing_on(mut self, extension: &str) -> Self {
        self.failing_extensions.insert(extension.to_string());
        self
    }

    /// Delay every transform writing a modern format.
    pub fn with_modern_delay(mut self, delay: Duration) -> Self {
        self.modern_delay = Some(delay);
        self
    }

    /// `(destination, args)` of every transform run so far.
    pub fn transforms(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.transforms
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn fails_on(&self, dst: &Path) -> bool {
        dst.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.failing_extensions.contains(ext))
    }

    fn apply(&self, image: StubImage<'_>, args: &[String]) -> Result<(u32, u32), ToolError> {
        let (mut width, mut height) = (image.width, image.height);
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-rotate" => {
                    let degrees: i32 = iter
                        .next()
                        .and_then(|d| d.parse().ok())
                        .ok_or_else(|| bad_args(args))?;
                    if degrees.rem_euclid(180) == 90 {
                        std::mem::swap(&mut width, &mut height);
                    }
                }
                "-resize" => {
                    let geometry = iter.next().ok_or_else(|| bad_args(args))?;
                    (width, height) =
                        resize(width, height, geometry).ok_or_else(|| bad_args(args))?;
                }
                "-extent" => {
                    let geometry = iter.next().ok_or_else(|| bad_args(args))?;
                    let (w, h, _) = parse_geometry(geometry).ok_or_else(|| bad_args(args))?;
                    (width, height) = (w, h);
                }
                "-quality" | "-gravity" | "-background" => {
                    iter.next().ok_or_else(|| bad_args(args))?;
                }
                "-strip" | "-auto-orient" => {}
                _ => return Err(bad_args(args)),
            }
        }
        Ok((width, height))
    }
}

#[async_trait]
impl ImageTool for StubImageTool {
    async fn transform(&self, src: &Path, dst: &Path, args: &[String]) -> Result<(), ToolError> {
        if let Ok(mut calls) = self.transforms.lock() {
            calls.push((dst.to_path_buf(), args.to_vec()));
        }
        if let Some(delay) = self.modern_delay
            && is_modern(dst)
        {
            tokio::time::sleep(delay).await;
        }
        if self.fails_on(dst) {
            return Err(ToolError::Failed {
                program: STUB.to_string(),
                status: "exit status: 1".to_string(),
                stderr: format!("no encode delegate for {}", dst.display()),
            });
        }

        let text = read_image(src).await?;
        let image = StubImage::parse(&text).ok_or_else(|| ToolError::UnrecognizedOutput {
            program: STUB.to_string(),
            output: text.clone(),
        })?;
        let (width, height) = self.apply(image, args)?;
        let format = format_for_path(dst).unwrap_or(image.format);
        write_image(dst, StubImage::render(format, width, height)).await
    }

    async fn identify(&self, path: &Path) -> Result<Identified, ToolError> {
        let text = read_image(path).await?;
        let image = StubImage::parse(&text).ok_or_else(|| ToolError::UnrecognizedOutput {
            program: STUB.to_string(),
            output: text.clone(),
        })?;
        // without SVG read support the decoder falls back to PNG
        let format = if image.format == "SVG" && !self.capabilities.svg_read {
            "PNG"
        } else {
            image.format
        };
        Ok(Identified {
            format: format.to_string(),
            width: image.width,
            height: image.height,
        })
    }

    async fn is_format_supported(&self, format: &str, mode: AccessMode) -> Result<bool, ToolError> {
        let caps = &self.capabilities;
        Ok(match (format, mode) {
            ("WEBP", AccessMode::Write) => caps.webp_write,
            ("AVIF", AccessMode::Write) => caps.avif_write,
            ("SVG", AccessMode::Read) => caps.svg_read,
            _ => true,
        })
    }

    async fn version(&self) -> Result<String, ToolError> {
        Ok("Version: stub image tool".to_string())
    }
}

/// Converts `SVG WxH` into `PNG WxH`.
#[derive(Debug, Default)]
pub struct StubRasterizer {
    failing: bool,
}

impl StubRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { failing: true }
    }
}

#[async_trait]
impl Rasterizer for StubRasterizer {
    async fn rasterize(&self, svg: &Path, png: &Path) -> Result<(), ToolError> {
        if self.failing {
            return Err(ToolError::Failed {
                program: STUB.to_string(),
                status: "exit status: 1".to_string(),
                stderr: format!("cannot rasterize {}", svg.display()),
            });
        }
        let text = read_image(svg).await?;
        let image = StubImage::parse(&text).ok_or_else(|| ToolError::UnrecognizedOutput {
            program: STUB.to_string(),
            output: text.clone(),
        })?;
        write_image(png, StubImage::render("PNG", image.width, image.height)).await
    }

    async fn version(&self) -> Result<String, ToolError> {
        Ok("rsvg-convert stub".to_string())
    }
}
