//! strata-core
//!
//! Image thumbnail lifecycle across three storage tiers:
//! temp（作業領域）→ incoming（未公開）→ active（公開）。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（format, profile, keys, ids, outcome, errors）
//! - **ports**: 抽象化レイヤー（Storage, ImageTool, Rasterizer, Clock, KeyGenerator）
//! - **impls**: 実装（LocalStorage, RemoteStorage, ImageMagick, RsvgConvert, テスト用 stub）
//! - **app**: アプリケーションロジック（builder, upload, publish, rotate, delete, clean）
//! - **config**: 環境変数からの設定
//! - **observability**: tracing の初期化

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;

pub use app::{App, AppBuilder, BuildError};
pub use config::{Config, ConfigError};
pub use domain::{ErrorKind, ImageError};
