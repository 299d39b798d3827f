//! Impls - ports の実装
//!
//! # 本番用実装
//! - **LocalStorage**: ディレクトリをルートとする tier（temp は常にこれ）
//! - **RemoteStorage**: object_store（S3 互換）をバックエンドとする tier
//! - **ImageMagick**: `magick` / `convert` + `identify`
//! - **RsvgConvert**: `rsvg-convert`
//!
//! # 開発・テスト用実装
//! - **StubImageTool** / **StubRasterizer**: テキスト表現の疑似画像を扱う

mod command;
pub mod imagemagick;
pub mod local_storage;
pub mod remote_storage;
pub mod rsvg;
pub mod stub_tool;

// 主要な型を再エクスポート
pub use self::imagemagick::ImageMagick;
pub use self::local_storage::LocalStorage;
pub use self::remote_storage::{CannedAcl, RemoteStorage, WritePolicy};
pub use self::rsvg::RsvgConvert;
pub use self::stub_tool::{StubImageTool, StubRasterizer};
