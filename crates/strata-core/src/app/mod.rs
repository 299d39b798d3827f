//! App - アプリケーション層
//!
//! ports を組み合わせて画像のライフサイクルを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder / App**: 構築とワイヤリング、操作の入口
//! - **ThumbnailGenerator**: 派生画像の生成（base は同期、modern は背景）
//! - **upload / publish / rotate / delete / clean**: `App` の各操作
//! - **batch**: tier 間のまとめ移動とベストエフォート削除
//! - **status**: 処理件数のカウンタ

pub mod batch;
pub mod builder;
mod clean;
mod delete;
mod publish;
pub mod render;
mod rotate;
pub mod status;
pub mod thumbnails;
mod upload;

#[cfg(test)]
pub(crate) mod testing;

// 主要な型を再エクスポート
pub use self::builder::{App, AppBuilder, BuildError, ToolVersions};
pub use self::render::{RenderFailure, RenderHandle, RenderReport};
pub use self::status::ServiceCounts;
pub use self::thumbnails::ThumbnailGenerator;
