//! Outcome model: results handed back to the HTTP layer.
//!
//! These types only describe the "shape" of a response; they do not know about
//! routing or status codes. Failures travel as `ImageError` and are classified
//! with `ImageError::kind()`.

use serde::{Deserialize, Serialize};

use super::format::ImageFormat;

/// Result of an upload: the key the UI must remember.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub key: String,
    pub format: ImageFormat,
}

/// Result of a publish request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// Moved incoming → active. `deferred` lists derivatives that were not
    /// rendered yet and will be re-checked after the grace period.
    Published {
        key: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        deferred: Vec<String>,
    },

    /// The key was already active; nothing was written.
    AlreadyPublished { key: String },
}

impl PublishOutcome {
    pub fn key(&self) -> &str {
        match self {
            PublishOutcome::Published { key, .. } | PublishOutcome::AlreadyPublished { key } => key,
        }
    }
}

/// Result of a rotation. `previous` is no longer resolvable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotateResult {
    pub key: String,
    pub previous: String,
}

/// Result of a delete request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub keys: Vec<String>,

    /// Artifacts whose deletion failed (logged, not fatal).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<String>,
}

/// Result of an incoming-tier cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanReport {
    pub scanned: usize,
    pub deleted: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_outcome_is_tagged_by_status() {
        let o = PublishOutcome::AlreadyPublished {
            key: "abc.jpg".to_string(),
        };
        let v = serde_json::to_value(&o).unwrap();
        assert_eq!(v["status"], "already_published");
        assert_eq!(v["key"], "abc.jpg");
    }

    #[test]
    fn empty_deferred_list_is_omitted() {
        let o = PublishOutcome::Published {
            key: "abc.jpg".to_string(),
            deferred: vec![],
        };
        let v = serde_json::to_value(&o).unwrap();
        assert_eq!(v["status"], "published");
        assert!(v.get("deferred").is_none());
        assert_eq!(o.key(), "abc.jpg");
    }

    #[test]
    fn upload_result_serializes_format_as_extension() {
        let r = UploadResult {
            key: "abc.png".to_string(),
            format: ImageFormat::Png,
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["format"], "png");
    }
}
