//! # ミドルウェア
//!
//! ゲートウェイの横断的な処理を提供する。適用順は [`crate::app_builder`] が決める。

pub mod client_addr;
pub mod cors;
pub mod json_body;
pub mod jwt_auth;
pub mod rate_limit;
pub mod security_headers;

pub use client_addr::resolve_client_addr;
pub use cors::cors_layer;
pub use json_body::{JsonBodyLimit, parse_json_body};
pub use jwt_auth::{CurrentUser, JwtState, require_jwt};
pub use rate_limit::{RATE_LIMIT_MESSAGE, RateLimitState, rate_limit};
pub use security_headers::security_headers;
