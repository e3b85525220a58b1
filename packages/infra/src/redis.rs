//! # Redis 接続管理
//!
//! `REDIS_URL` が設定されている場合、レート制限のカウンターを Redis に置く。
//! 複数のゲートウェイプロセスが同じクライアントのウィンドウを共有できる。
//!
//! ## ConnectionManager
//!
//! 接続が切断された場合に自動で再接続する。`Clone` が安価なため、
//! 各リクエストでクローンしてコマンドを発行する。

use redis::{Client, aio::ConnectionManager};

use crate::InfraError;

/// Redis 接続マネージャを作成する
///
/// アプリケーション起動時に一度だけ呼び出し、作成したマネージャを共有する。
///
/// # 引数
///
/// * `redis_url` - `redis://[[username:]password@]host[:port][/database]`
///   （TLS は `rediss://`）
///
/// # エラー
///
/// URL が不正な場合、またはサーバーに接続できない場合。
pub async fn create_connection_manager(redis_url: &str) -> Result<ConnectionManager, InfraError> {
   let client = Client::open(redis_url)?;
   let manager = ConnectionManager::new(client).await?;
   tracing::info!("Redis に接続しました");
   Ok(manager)
}
