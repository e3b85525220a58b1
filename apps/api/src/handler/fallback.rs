//! # フォールバックハンドラ
//!
//! どのルートにも一致しなかったリクエストへの応答。

use axum::extract::OriginalUri;

use crate::error::ApiError;

/// 未定義のパス
pub async fn not_found(OriginalUri(uri): OriginalUri) -> ApiError {
   tracing::debug!(path = %uri.path(), "未定義のパスです");
   ApiError::NotFound
}

/// リソースルーターが登録されていないプレフィックス
///
/// JWT ゲートの内側に置かれるため、未認証のリクエストはここに到達しない。
pub async fn resource_not_mounted(OriginalUri(uri): OriginalUri) -> ApiError {
   ApiError::NotImplemented(uri.path().to_string())
}
