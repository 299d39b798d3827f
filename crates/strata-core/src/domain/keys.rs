//! Key derivation - base key から artifact set のキーを導出
//!
//! 純粋関数のみ（I/O なし、決定的）。
//!
//! # 命名規則
//! - original: `<prefix>.<ext>`
//! - base derivative: `<prefix><suffix>.<ext>`（svg の場合は常に `.jpg`）
//! - modern derivative: `<prefix><suffix>.<avif|webp>`

use std::sync::Arc;

use super::capabilities::Capabilities;
use super::errors::ImageError;
use super::format::{ImageFormat, ModernFormat};
use super::profile::ResizeProfile;

/// Split a key into `(name, extension)`; the extension is empty when absent.
pub fn split_key(key: &str) -> (&str, &str) {
    key.rsplit_once('.').unwrap_or((key, ""))
}

/// Derivative key for one profile and optional modern format.
pub fn thumbnail_key(key: &str, suffix: &str, format: Option<ModernFormat>) -> String {
    let (name, ext) = split_key(key);
    let ext = match format {
        Some(format) => format.extension(),
        None if ImageFormat::from_extension(ext).is_some_and(ImageFormat::is_vector) => {
            ImageFormat::Jpg.extension()
        }
        None => ext,
    };
    if ext.is_empty() {
        format!("{name}{suffix}")
    } else {
        format!("{name}{suffix}.{ext}")
    }
}

/// Check a caller-provided key and return the format of its extension.
///
/// A key is a single path segment with a non-empty name and a known
/// original-image extension.
pub fn validate_key(key: &str) -> Result<ImageFormat, ImageError> {
    let invalid = || ImageError::InvalidKey(key.to_string());

    if key.is_empty() || key.len() > 255 {
        return Err(invalid());
    }
    if key
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return Err(invalid());
    }

    let (name, ext) = split_key(key);
    if name.is_empty() || name.ends_with('.') {
        return Err(invalid());
    }
    ImageFormat::from_extension(ext).ok_or_else(invalid)
}

/// KeyDeriver は profile 集合と有効な modern format からキー集合を導出
///
/// modern format は「設定で有効」かつ「ツールが書き込み可能」なものだけ。
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    profiles: Arc<[ResizeProfile]>,
    modern_formats: Arc<[ModernFormat]>,
}

impl KeyDeriver {
    pub fn new(profiles: Vec<ResizeProfile>, modern_formats: Vec<ModernFormat>) -> Self {
        Self {
            profiles: profiles.into(),
            modern_formats: modern_formats.into(),
        }
    }

    /// Keep only the modern formats that are both enabled and writable.
    pub fn with_capabilities(
        profiles: Vec<ResizeProfile>,
        enabled: &[ModernFormat],
        capabilities: &Capabilities,
    ) -> Self {
        let modern_formats = ModernFormat::ALL
            .into_iter()
            .filter(|f| enabled.contains(f) && capabilities.supports_write(*f))
            .collect();
        Self::new(profiles, modern_formats)
    }

    pub fn profiles(&self) -> &[ResizeProfile] {
        &self.profiles
    }

    pub fn modern_formats(&self) -> &[ModernFormat] {
        &self.modern_formats
    }

    /// One key per profile, in profile order.
    pub fn base_thumbnail_keys(&self, key: &str) -> Vec<String> {
        self.profiles
            .iter()
            .map(|profile| thumbnail_key(key, &profile.suffix, None))
            .collect()
    }

    pub fn modern_thumbnail_keys(&self, key: &str) -> Vec<String> {
        self.profiles
            .iter()
            .flat_map(|profile| {
                self.modern_formats
                    .iter()
                    .map(move |format| thumbnail_key(key, &profile.suffix, Some(*format)))
            })
            .collect()
    }

    pub fn all_thumbnail_keys(&self, key: &str) -> Vec<String> {
        let mut keys = self.base_thumbnail_keys(key);
        keys.extend(self.modern_thumbnail_keys(key));
        keys
    }

    /// Original plus every derivative.
    pub fn artifact_set(&self, key: &str) -> Vec<String> {
        let mut keys = vec![key.to_string()];
        keys.extend(self.all_thumbnail_keys(key));
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    fn deriver(modern: Vec<ModernFormat>) -> KeyDeriver {
        KeyDeriver::new(ResizeProfile::defaults(), modern)
    }

    #[test]
    fn base_keys_have_one_entry_per_profile() {
        let d = deriver(vec![]);
        assert_eq!(
            d.base_thumbnail_keys("abc.jpg"),
            vec!["abcBI.jpg", "abcMI.jpg", "abcSI.jpg"]
        );
    }

    #[test]
    fn no_modern_formats_means_no_modern_keys() {
        let d = deriver(vec![]);
        assert!(d.modern_thumbnail_keys("abc.png").is_empty());
        assert_eq!(d.all_thumbnail_keys("abc.png"), d.base_thumbnail_keys("abc.png"));
    }

    #[test]
    fn all_keys_are_base_union_modern() {
        let d = deriver(vec![ModernFormat::Avif, ModernFormat::Webp]);
        let all: HashSet<_> = d.all_thumbnail_keys("abc.gif").into_iter().collect();
        let mut expected: HashSet<_> = d.base_thumbnail_keys("abc.gif").into_iter().collect();
        expected.extend(d.modern_thumbnail_keys("abc.gif"));

        assert_eq!(all, expected);
        assert_eq!(all.len(), 9);
        assert!(all.contains("abcSI.webp"));
        assert!(all.contains("abcBI.avif"));
    }

    #[test]
    fn vector_keys_derive_raster_extensions_only() {
        let d = deriver(vec![ModernFormat::Webp]);
        for key in d.all_thumbnail_keys("abc.svg") {
            assert!(!key.ends_with(".svg"), "{key} kept the vector extension");
        }
        assert_eq!(d.base_thumbnail_keys("abc.svg")[0], "abcBI.jpg");
        assert_eq!(d.modern_thumbnail_keys("abc.svg")[0], "abcBI.webp");
    }

    #[test]
    fn capabilities_filter_enabled_formats() {
        let caps = Capabilities {
            webp_write: true,
            avif_write: false,
            svg_read: true,
        };
        let d = KeyDeriver::with_capabilities(
            ResizeProfile::defaults(),
            &[ModernFormat::Avif, ModernFormat::Webp],
            &caps,
        );
        assert_eq!(d.modern_formats(), &[ModernFormat::Webp]);

        let d = KeyDeriver::with_capabilities(ResizeProfile::defaults(), &[], &Capabilities::all());
        assert!(d.modern_formats().is_empty());
    }

    #[test]
    fn artifact_set_starts_with_original() {
        let d = deriver(vec![]);
        let set = d.artifact_set("abc.jpg");
        assert_eq!(set[0], "abc.jpg");
        assert_eq!(set.len(), 4);
    }

    #[rstest]
    #[case("01j9z3k8p6q1x2v3w4y5z6a7b8.jpg", ImageFormat::Jpg)]
    #[case("photo.final.png", ImageFormat::Png)]
    #[case("abcBI.gif", ImageFormat::Gif)]
    #[case("logo.svg", ImageFormat::Svg)]
    fn valid_keys_report_their_format(#[case] key: &str, #[case] expected: ImageFormat) {
        assert_eq!(validate_key(key).unwrap(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::no_extension("foo")]
    #[case::unknown_extension("foo.tiff")]
    #[case::modern_extension("fooBI.webp")]
    #[case::traversal("../foo.jpg")]
    #[case::nested("a/b.jpg")]
    #[case::backslash("a\\b.jpg")]
    #[case::no_name(".jpg")]
    #[case::dot_dot("...jpg")]
    fn invalid_keys_are_rejected(#[case] key: &str) {
        assert!(matches!(validate_key(key), Err(ImageError::InvalidKey(_))));
    }
}
