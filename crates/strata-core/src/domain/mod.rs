//! Domain model (formats, profiles, keys, outcomes, errors).
//!
//! I/O を一切持たない層です。ports / app はここに依存しますが、
//! 逆方向の依存はありません。

pub mod capabilities;
pub mod errors;
pub mod format;
pub mod ids;
pub mod keys;
pub mod outcome;
pub mod profile;
pub mod rotation;

pub use capabilities::Capabilities;
pub use errors::{ErrorKind, ImageError, StorageError, ToolError};
pub use format::{ImageFormat, ModernFormat, content_type_for_key};
pub use ids::KeyPrefix;
pub use keys::{KeyDeriver, split_key, thumbnail_key, validate_key};
pub use outcome::{CleanReport, DeleteReport, PublishOutcome, RotateResult, UploadResult};
pub use profile::ResizeProfile;
pub use rotation::Rotation;
