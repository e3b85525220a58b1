//! # ヘルスチェックハンドラ
//!
//! ロードバランサーや監視からの死活確認に使う。認証は不要。
//!
//! ```text
//! GET /api/health
//! {"status":"OK","message":"Server is running"}
//! ```

use axum::Json;
use serde::{Deserialize, Serialize};

/// ヘルスチェックレスポンス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
   pub status:  String,
   pub message: String,
}

/// ヘルスチェックエンドポイント
///
/// Redis などの依存先は確認せず、プロセスが応答できることだけを返す。
pub async fn health_check() -> Json<HealthResponse> {
   Json(HealthResponse {
      status:  "OK".to_string(),
      message: "Server is running".to_string(),
   })
}

#[cfg(test)]
mod tests {
   use axum::{Router, body::Body, http::Request, routing::get};
   use pretty_assertions::assert_eq;
   use tower::ServiceExt;

   use super::*;

   #[tokio::test]
   async fn test_固定のペイロードを200で返す() {
      let app = Router::new().route("/health", get(health_check));

      let response = app
         .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
         .await
         .unwrap();

      assert_eq!(response.status(), 200);
      let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
         .await
         .unwrap();
      let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
      assert_eq!(
         body,
         serde_json::json!({"status": "OK", "message": "Server is running"})
      );
   }
}
