//! # Encore インフラ層
//!
//! 外部システムとの接続や、プロセスをまたいで共有される状態を扱う。
//!
//! ## 責務
//!
//! - **レート制限ストア**: クライアントごとのリクエスト数を保持するカウンター
//! - **キャッシュ接続**: Redis への接続管理（複数プロセスでカウンターを共有する場合）
//! - **JWT**: トークンの発行と検証
//!
//! ## モジュール構成
//!
//! - [`rate_limit`] - レート制限ポリシーとストア（メモリ / Redis）
//! - [`redis`] - Redis 接続管理
//! - [`jwt`] - HS256 による JWT の発行・検証
//! - [`error`] - インフラ層エラー定義

pub mod error;
pub mod jwt;
pub mod rate_limit;
pub mod redis;

pub use error::InfraError;
pub use jwt::{HmacJwtCodec, TokenError, TokenVerifier};
pub use rate_limit::{
   InMemoryRateLimitStore,
   RateLimitDecision,
   RateLimitPolicy,
   RateLimitStore,
   RedisRateLimitStore,
   WindowHit,
};
