//! # Encore API ゲートウェイ
//!
//! ブッキング管理アプリケーションの HTTP 入口。
//! 全リクエストに共通のポリシー（セキュリティヘッダー、CORS、JSON 検証、
//! アクセスログ、レート制限）を適用し、リソースごとのハンドラへ振り分ける。
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────────┐     ┌──────────────────┐
//! │   Browser   │────▶│  gateway (port 5000) │────▶│ resource routers │
//! └─────────────┘     └──────────────────────┘     └──────────────────┘
//!                                │
//!                                ▼
//!                       ┌────────────────┐
//!                       │ Redis（任意）  │  レート制限カウンター
//!                       └────────────────┘
//! ```
//!
//! ## モジュール構成
//!
//! - [`app_builder`] - ミドルウェアとルーティングの組み立て
//! - [`config`] - アプリケーション設定（環境変数からの読み込み）
//! - [`error`] - API エラー定義と HTTP レスポンスへの変換
//! - [`handler`] - ゲートウェイ自身が応答するハンドラ
//! - [`middleware`] - 横断的な処理
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use encore_api::{app_builder::{ApiRoutes, build_app}, config::AppConfig};
//!
//! let config = AppConfig::from_env()?;
//! let app = build_app(&config, deps, ApiRoutes::new().resource(ApiResource::Venues, venues));
//! ```

pub mod app_builder;
pub mod config;
pub mod error;
pub mod handler;
pub mod middleware;
