//! Image formats handled by the pipeline.
//!
//! - `ImageFormat`: accepted upload formats (= extension of an original key)
//! - `ModernFormat`: optional, more efficient encodings generated asynchronously

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::ImageError;

/// Format of an uploaded original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpg,
    Png,
    Gif,
    Svg,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 4] = [
        ImageFormat::Jpg,
        ImageFormat::Png,
        ImageFormat::Gif,
        ImageFormat::Svg,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Svg => "svg",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.extension() == ext)
    }

    /// Vector sources have no native raster decode; their derivatives are jpg.
    pub fn is_vector(self) -> bool {
        matches!(self, ImageFormat::Svg)
    }

    /// Only jpeg carries EXIF orientation worth normalizing.
    pub fn is_auto_orientable(self) -> bool {
        matches!(self, ImageFormat::Jpg)
    }

    /// Map the format token printed by `identify` to an accepted format.
    ///
    /// Depending on how the transform tool was built, it may answer `PNG` for
    /// an SVG file it cannot read; the path extension disambiguates that case.
    pub fn from_identify(format: &str, path: &Path, svg_read: bool) -> Result<Self, ImageError> {
        match format {
            "JPEG" => Ok(ImageFormat::Jpg),
            "PNG" => {
                let is_svg_path = path.extension().is_some_and(|ext| ext == "svg");
                if !svg_read && is_svg_path {
                    Ok(ImageFormat::Svg)
                } else {
                    Ok(ImageFormat::Png)
                }
            }
            "GIF" => Ok(ImageFormat::Gif),
            "SVG" => Ok(ImageFormat::Svg),
            other => Err(ImageError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Modern derivative encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModernFormat {
    Avif,
    Webp,
}

impl ModernFormat {
    pub const ALL: [ModernFormat; 2] = [ModernFormat::Avif, ModernFormat::Webp];

    pub fn extension(self) -> &'static str {
        match self {
            ModernFormat::Avif => "avif",
            ModernFormat::Webp => "webp",
        }
    }

    /// Name used by the transform tool's `-list format` output.
    pub fn tool_name(self) -> &'static str {
        match self {
            ModernFormat::Avif => "AVIF",
            ModernFormat::Webp => "WEBP",
        }
    }
}

impl fmt::Display for ModernFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Content type derived from a key's extension (originals and derivatives).
pub fn content_type_for_key(key: &str) -> Option<&'static str> {
    let ext = Path::new(key).extension()?.to_str()?;
    match ext {
        "jpg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        "webp" => Some("image/webp"),
        "avif" => Some("image/avif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::jpeg("JPEG", "upload.tmp", true, ImageFormat::Jpg)]
    #[case::png("PNG", "upload.png", true, ImageFormat::Png)]
    #[case::gif("GIF", "upload", false, ImageFormat::Gif)]
    #[case::svg("SVG", "upload.svg", true, ImageFormat::Svg)]
    #[case::svg_reported_as_png("PNG", "upload.svg", false, ImageFormat::Svg)]
    #[case::svg_readable_png("PNG", "upload.svg", true, ImageFormat::Png)]
    fn identify_tokens_map_to_formats(
        #[case] token: &str,
        #[case] path: &str,
        #[case] svg_read: bool,
        #[case] expected: ImageFormat,
    ) {
        let format = ImageFormat::from_identify(token, Path::new(path), svg_read).unwrap();
        assert_eq!(format, expected);
    }

    #[test]
    fn unknown_identify_token_is_unsupported() {
        let err = ImageFormat::from_identify("TIFF", Path::new("a.tiff"), true).unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedFormat(f) if f == "TIFF"));
    }

    #[rstest]
    #[case("abcBI.jpg", Some("image/jpeg"))]
    #[case("abc.svg", Some("image/svg+xml"))]
    #[case("abcMI.webp", Some("image/webp"))]
    #[case("abcSI.avif", Some("image/avif"))]
    #[case("abc.tiff", None)]
    #[case("abc", None)]
    fn content_types_follow_extension(#[case] key: &str, #[case] expected: Option<&str>) {
        assert_eq!(content_type_for_key(key), expected);
    }

    #[test]
    fn extension_round_trips_for_all_formats() {
        for format in ImageFormat::ALL {
            assert_eq!(ImageFormat::from_extension(format.extension()), Some(format));
        }
        assert_eq!(ImageFormat::from_extension("webp"), None);
    }

    #[test]
    fn only_svg_is_vector() {
        let vector: Vec<_> = ImageFormat::ALL.into_iter().filter(|f| f.is_vector()).collect();
        assert_eq!(vector, vec![ImageFormat::Svg]);
    }
}
