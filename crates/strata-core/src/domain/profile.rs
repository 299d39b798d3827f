//! Resize profiles: one derivative per profile.
//!
//! The argument list is handed verbatim to the transform tool, see
//! <http://www.imagemagick.org/Usage/resize> for the default set.

use serde::{Deserialize, Serialize};

/// A named resize recipe.
///
/// `suffix` is appended to the key prefix of the original (`<prefix><suffix>.<ext>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeProfile {
    pub suffix: String,

    #[serde(rename = "convert")]
    pub transform_args: Vec<String>,
}

impl ResizeProfile {
    pub fn new<I, S>(suffix: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suffix: suffix.into(),
            transform_args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// BI (big), MI (medium), SI (small, square crop).
    pub fn defaults() -> Vec<ResizeProfile> {
        vec![
            ResizeProfile::new("BI", ["-resize", "1500x1500>", "-quality", "90"]),
            ResizeProfile::new("MI", ["-resize", "400x400>", "-quality", "90"]),
            ResizeProfile::new(
                "SI",
                [
                    "-resize",
                    "200x200^",
                    "-gravity",
                    "center",
                    "-extent",
                    "200x200",
                    "-quality",
                    "90",
                ],
            ),
        ]
    }
}
