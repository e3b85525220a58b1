//! # CORS
//!
//! クロスオリジンからの API 呼び出しを許可する `CorsLayer` を組み立てる。
//!
//! ```bash
//! # 全オリジンを許可（デフォルト）
//! export CORS_ALLOWED_ORIGINS="*"
//!
//! # 列挙したオリジンのみ許可
//! export CORS_ALLOWED_ORIGINS="https://app.example.com,https://admin.example.com"
//! ```

use std::time::Duration;

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsConfig;

/// プリフライト結果のキャッシュ期間
const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// 設定から `CorsLayer` を作成する
///
/// 列挙されたオリジンのうちヘッダー値として不正なものは警告を出して除外する。
/// 1 つも残らなければ全許可に戻す。
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
   let allow_origin = match config {
      CorsConfig::AnyOrigin => AllowOrigin::any(),
      CorsConfig::Origins(origins) => {
         let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
               Ok(value) => Some(value),
               Err(_) => {
                  tracing::warn!(origin = %origin, "CORS オリジンが不正なため無視します");
                  None
               }
            })
            .collect();

         if values.is_empty() {
            AllowOrigin::any()
         } else {
            AllowOrigin::list(values)
         }
      }
   };

   CorsLayer::new()
      .allow_origin(allow_origin)
      .allow_methods([
         Method::GET,
         Method::HEAD,
         Method::POST,
         Method::PUT,
         Method::PATCH,
         Method::DELETE,
         Method::OPTIONS,
      ])
      .allow_headers([
         header::AUTHORIZATION,
         header::CONTENT_TYPE,
         header::ACCEPT,
         header::ORIGIN,
         header::HeaderName::from_static("x-requested-with"),
         header::HeaderName::from_static("x-request-id"),
      ])
      .expose_headers([
         header::HeaderName::from_static("x-request-id"),
         header::HeaderName::from_static("x-ratelimit-limit"),
         header::HeaderName::from_static("x-ratelimit-remaining"),
         header::HeaderName::from_static("x-ratelimit-reset"),
         header::RETRY_AFTER,
      ])
      .max_age(PREFLIGHT_MAX_AGE)
}
