//! # Encore 共有ユーティリティ
//!
//! ゲートウェイとライブラリ群で共通して使う横断的な部品を提供する。
//!
//! ## モジュール構成
//!
//! - [`error_response`] - RFC 9457 準拠のエラーレスポンス本体
//! - [`observability`] - トレーシング初期化、Request ID 生成、パニックフック
//! - [`access_log`] - リクエスト完了時に 1 行のアクセスログを出力する tower Layer
//!
//! このクレートは axum に依存しない。`IntoResponse` への変換は
//! アプリケーション側（`encore-api`）の責務とする。

pub mod access_log;
pub mod error_response;
pub mod observability;

pub use access_log::{AccessLogLayer, ClientAddr};
pub use error_response::ErrorResponse;
