//! # セキュリティヘッダーミドルウェア
//!
//! 全レスポンスにブラウザ向けの防御的ヘッダーを付与する。
//! 値は helmet のデフォルトと同じ。
//!
//! 内側のハンドラが同名のヘッダーを設定している場合はそちらを優先する。

use axum::{
   extract::Request,
   http::{HeaderName, HeaderValue, header},
   middleware::Next,
   response::Response,
};

const CONTENT_SECURITY_POLICY: &str = "default-src 'self';base-uri 'self';font-src 'self' https: \
                                       data:;form-action 'self';frame-ancestors 'self';img-src \
                                       'self' data:;object-src 'none';script-src \
                                       'self';script-src-attr 'none';style-src 'self' https: \
                                       'unsafe-inline';upgrade-insecure-requests";

/// 付与するヘッダーの一覧
pub const SECURITY_HEADERS: [(HeaderName, &str); 12] = [
   (header::CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY),
   (
      HeaderName::from_static("cross-origin-opener-policy"),
      "same-origin",
   ),
   (
      HeaderName::from_static("cross-origin-resource-policy"),
      "same-origin",
   ),
   (HeaderName::from_static("origin-agent-cluster"), "?1"),
   (header::REFERRER_POLICY, "no-referrer"),
   (
      header::STRICT_TRANSPORT_SECURITY,
      "max-age=31536000; includeSubDomains",
   ),
   (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
   (header::X_DNS_PREFETCH_CONTROL, "off"),
   (HeaderName::from_static("x-download-options"), "noopen"),
   (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
   (
      HeaderName::from_static("x-permitted-cross-domain-policies"),
      "none",
   ),
   (header::X_XSS_PROTECTION, "0"),
];

/// レスポンスにセキュリティヘッダーを付与する
pub async fn security_headers(request: Request, next: Next) -> Response {
   let mut response = next.run(request).await;
   let headers = response.headers_mut();
   for (name, value) in SECURITY_HEADERS {
      if !headers.contains_key(&name) {
         headers.insert(name, HeaderValue::from_static(value));
      }
   }
   response
}
