//! # API エラーハンドリング
//!
//! ゲートウェイのエラー定義と、axum レスポンスへの変換を行う。
//!
//! ミドルウェアはそれぞれ終端レスポンスで処理を打ち切れるが、
//! JSON のエラーボディはすべてこのモジュールの [`ApiError`] を経由して組み立てる。
//! ボディは RFC 9457 形式の [`ErrorResponse`]。
//!
//! ## マッピング
//!
//! | ApiError | HTTP Status |
//! |----------|-------------|
//! | MalformedJson | 400 |
//! | Unauthorized | 401 |
//! | InvalidToken | 403 |
//! | NotFound | 404 |
//! | PayloadTooLarge | 413 |
//! | Internal | 500 |
//! | NotImplemented | 501 |
//!
//! レート制限超過（429）だけは固定文言のプレーンテキストを返すため、
//! `middleware::rate_limit` が直接レスポンスを組み立てる。

use std::any::Any;

use axum::{
   Json,
   body::Body,
   http::{Response as HttpResponse, StatusCode},
   response::{IntoResponse, Response},
};
use encore_shared::ErrorResponse;
use thiserror::Error;

/// API 層で発生するエラー
#[derive(Debug, Error)]
pub enum ApiError {
   /// `/api` 配下に該当するルートが無い
   #[error("リソースが見つかりません")]
   NotFound,

   /// JSON ボディの構文が不正、またはトップレベルがオブジェクト・配列でない
   #[error("JSON の形式が不正です: {0}")]
   MalformedJson(String),

   /// JSON ボディが上限を超えている
   #[error("リクエストボディが大きすぎます（上限 {limit} バイト）")]
   PayloadTooLarge { limit: usize },

   /// Bearer 資格情報が無い
   #[error("認証が必要です")]
   Unauthorized,

   /// トークンが不正または期限切れ
   ///
   /// 理由はログにのみ出し、クライアントには返さない。
   #[error("トークンが無効です: {0}")]
   InvalidToken(String),

   /// リソースルーターがまだ登録されていない
   #[error("{0} は未実装です")]
   NotImplemented(String),

   /// 予期しないエラー
   ///
   /// 内部エラーの詳細はクライアントに返さない。
   #[error("内部サーバーエラー")]
   Internal(#[from] anyhow::Error),
}

impl ApiError {
   pub fn status(&self) -> StatusCode {
      match self {
         Self::NotFound => StatusCode::NOT_FOUND,
         Self::MalformedJson(_) => StatusCode::BAD_REQUEST,
         Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
         Self::Unauthorized => StatusCode::UNAUTHORIZED,
         Self::InvalidToken(_) => StatusCode::FORBIDDEN,
         Self::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
         Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
      }
   }

   fn body(&self) -> ErrorResponse {
      match self {
         Self::NotFound => ErrorResponse::not_found(self.to_string()),
         Self::MalformedJson(_) => ErrorResponse::malformed_json(self.to_string()),
         Self::PayloadTooLarge { .. } => ErrorResponse::payload_too_large(self.to_string()),
         Self::Unauthorized => ErrorResponse::unauthorized(self.to_string()),
         Self::InvalidToken(_) => ErrorResponse::forbidden("トークンが無効または期限切れです"),
         Self::NotImplemented(_) => ErrorResponse::not_implemented(self.to_string()),
         Self::Internal(_) => ErrorResponse::internal_error(),
      }
   }
}

impl IntoResponse for ApiError {
   fn into_response(self) -> Response {
      match &self {
         Self::Internal(err) => tracing::error!(error = ?err, "内部エラー"),
         Self::InvalidToken(reason) => {
            tracing::debug!(reason = %reason, "トークンを拒否しました");
         }
         _ => {}
      }

      (self.status(), Json(self.body())).into_response()
   }
}

/// `CatchPanicLayer` から呼ばれるパニックハンドラ
///
/// パニックの内容はログにのみ出力し、クライアントには固定の 500 を返す。
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> HttpResponse<Body> {
   let message = payload
      .downcast_ref::<&str>()
      .map(|s| (*s).to_string())
      .or_else(|| payload.downcast_ref::<String>().cloned())
      .unwrap_or_else(|| "non-string panic payload".to_string());

   tracing::error!(panic.message = %message, "ハンドラがパニックしました");

   ApiError::Internal(anyhow::anyhow!("handler panicked")).into_response()
}
