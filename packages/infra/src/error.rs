//! # インフラ層エラー定義
//!
//! Redis との通信などで発生するエラーを表現する。
//! API 層はこのエラーをログに出力し、クライアントには詳細を返さない。

use thiserror::Error;

/// インフラ層で発生するエラー
#[derive(Debug, Error)]
pub enum InfraError {
   /// Redis への接続失敗、コマンド実行エラーなど
   #[error("Redis エラー: {0}")]
   Redis(#[from] redis::RedisError),

   /// 設定値や計算結果が想定外の範囲にある
   #[error("予期しないエラー: {0}")]
   Unexpected(String),
}

impl InfraError {
   pub fn unexpected(message: impl Into<String>) -> Self {
      Self::Unexpected(message.into())
   }
}
