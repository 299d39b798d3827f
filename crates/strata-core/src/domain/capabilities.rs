//! Capabilities of the external transform tool.
//!
//! 起動時に一度だけ検出し、以降はプロセス寿命の間イミュータブル。

use serde::{Deserialize, Serialize};

use super::format::ModernFormat;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub webp_write: bool,
    pub avif_write: bool,
    pub svg_read: bool,
}

impl Capabilities {
    /// Everything supported (tests and stub tools).
    pub fn all() -> Self {
        Self {
            webp_write: true,
            avif_write: true,
            svg_read: true,
        }
    }

    pub fn supports_write(&self, format: ModernFormat) -> bool {
        match format {
            ModernFormat::Avif => self.avif_write,
            ModernFormat::Webp => self.webp_write,
        }
    }
}
