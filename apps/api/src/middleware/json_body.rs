//! # JSON ボディの検証
//!
//! `Content-Type` が JSON のリクエストについて、ハンドラに渡す前にボディを読み込み、
//! 構文とサイズを検証する。
//!
//! - 対象: `application/json` と `application/*+json`（パラメータは無視）
//! - 空ボディはそのまま通す
//! - 上限超過は 413、構文エラーとトップレベルがオブジェクト・配列以外は 400
//!
//! 検証済みのボディは同じバイト列で組み立て直して次に渡すため、
//! ハンドラ側は通常どおり `Json<T>` で取り出せる。

use axum::{
   body::{Body, to_bytes},
   extract::{Request, State},
   http::{HeaderMap, header},
   middleware::Next,
   response::{IntoResponse, Response},
};

use crate::error::ApiError;

/// JSON ボディの最大バイト数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonBodyLimit(pub usize);

impl Default for JsonBodyLimit {
   /// 100 KiB
   fn default() -> Self {
      Self(100 * 1024)
   }
}

/// JSON ボディを検証するミドルウェア
pub async fn parse_json_body(
   State(JsonBodyLimit(limit)): State<JsonBodyLimit>,
   request: Request,
   next: Next,
) -> Response {
   if !is_json_content_type(request.headers()) {
      return next.run(request).await;
   }

   if declared_length(request.headers()).is_some_and(|len| len > limit) {
      return ApiError::PayloadTooLarge { limit }.into_response();
   }

   let (parts, body) = request.into_parts();
   let bytes = match to_bytes(body, limit).await {
      Ok(bytes) => bytes,
      Err(e) => {
         tracing::debug!(error = %e, "JSON ボディの読み込みを打ち切りました");
         return ApiError::PayloadTooLarge { limit }.into_response();
      }
   };

   if !bytes.is_empty() {
      match serde_json::from_slice::<serde_json::Value>(&bytes) {
         Ok(value) if value.is_object() || value.is_array() => {}
         Ok(_) => {
            return ApiError::MalformedJson(
               "トップレベルはオブジェクトか配列である必要があります".to_string(),
            )
            .into_response();
         }
         Err(e) => return ApiError::MalformedJson(e.to_string()).into_response(),
      }
   }

   next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// `Content-Type` が JSON を示しているか
fn is_json_content_type(headers: &HeaderMap) -> bool {
   let Some(content_type) = headers
      .get(header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
   else {
      return false;
   };

   let mime = content_type
      .split(';')
      .next()
      .unwrap_or_default()
      .trim()
      .to_ascii_lowercase();

   match mime.split_once('/') {
      Some(("application", subtype)) => subtype == "json" || subtype.ends_with("+json"),
      _ => false,
   }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
   headers
      .get(header::CONTENT_LENGTH)
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.parse().ok())
}
