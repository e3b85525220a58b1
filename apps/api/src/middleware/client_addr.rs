//! # 送信元アドレスの解決
//!
//! 接続情報（`ConnectInfo<SocketAddr>`）から送信元 IP を取り出し、
//! [`ClientAddr`] としてリクエスト extensions に格納する。
//!
//! `X-Forwarded-For` などのプロキシヘッダーは信用しない。
//! クライアントが自由に書き換えられるため、レート制限の識別子には使えない。

use std::net::SocketAddr;

use axum::{extract::ConnectInfo, extract::Request, middleware::Next, response::Response};
use encore_shared::ClientAddr;

/// 送信元アドレスを extensions に格納する
///
/// 接続情報が無い場合（テストで Router を直接呼ぶ場合など）は何もしない。
pub async fn resolve_client_addr(mut request: Request, next: Next) -> Response {
   let addr = request
      .extensions()
      .get::<ConnectInfo<SocketAddr>>()
      .map(|ConnectInfo(addr)| ClientAddr(addr.ip()));

   if let Some(addr) = addr {
      request.extensions_mut().insert(addr);
   }

   next.run(request).await
}
