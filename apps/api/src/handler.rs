//! # HTTP リクエストハンドラ
//!
//! ゲートウェイ自身が応答するエンドポイントを定義する。
//! リソースごとのハンドラは外部から [`crate::app_builder::ApiRoutes`] に登録される。
//!
//! ```text
//! handler.rs
//! └── handler/
//!     ├── health.rs     # GET /api/health
//!     └── fallback.rs   # 未定義パスと未登録リソース
//! ```

pub mod fallback;
pub mod health;

pub use fallback::{not_found, resource_not_mounted};
pub use health::{HealthResponse, health_check};
