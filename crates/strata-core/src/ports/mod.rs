//! Ports - 抽象化レイヤー
//!
//! 外部システム（ストレージ、画像変換ツール、時計）へのインターフェースを定義し、
//! 実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - 画像処理は外部プロセスに委譲（`ImageTool`, `Rasterizer`）
//! - ストレージ backend は閉じた enum（`Storage`）
//! - 時刻とキー生成は差し替え可能（テスト容易性）

pub mod clock;
pub mod image_tool;
pub mod key_generator;
pub mod storage;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::image_tool::{AccessMode, Identified, ImageTool, Rasterizer, detect_capabilities};
pub use self::key_generator::{KeyGenerator, UlidKeyGenerator};
pub use self::storage::{Storage, StoredObject, Tiers};
