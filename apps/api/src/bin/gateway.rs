//! # ゲートウェイサーバー
//!
//! 設定の読み込み、トレーシング初期化、インフラ接続を行い、
//! [`build_app`] で組み立てたルーターを起動する。
//!
//! ## 起動方法
//!
//! ```bash
//! # 開発環境（.env を読み込む）
//! cargo run --bin gateway
//!
//! # 本番環境
//! NODE_ENV=production LOG_FORMAT=json cargo run --bin gateway --release
//! ```
//!
//! リソースルーターは別クレートで実装し、[`ApiRoutes`] に登録する。
//! 未登録のリソースは JWT ゲートの内側で 501 を返す。

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context as _;
use encore_api::{
   app_builder::{ApiRoutes, GatewayDeps, build_app},
   config::AppConfig,
};
use encore_domain::clock::SystemClock;
use encore_infra::{
   HmacJwtCodec,
   InMemoryRateLimitStore,
   RateLimitStore,
   RedisRateLimitStore,
   redis::create_connection_manager,
};
use encore_shared::observability::{TracingConfig, init_tracing, install_panic_hook};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
   // .env ファイルを読み込む（存在する場合）
   dotenvy::dotenv().ok();

   let config = AppConfig::from_env().context("設定の読み込みに失敗しました")?;

   let mut tracing_config = TracingConfig::new("gateway", config.log_format)
      .with_default_directive(config.environment.default_log_directive());
   if let Some(dir) = &config.log_dir {
      tracing_config = tracing_config.with_log_dir(dir);
   }
   // ファイル出力のライターはプロセス終了まで保持する
   let _log_guard = init_tracing(&tracing_config).context("ログファイルを開けません")?;
   install_panic_hook();
   let _tracing_guard = tracing::info_span!("app", service = "gateway").entered();

   tracing::info!(
      environment = config.environment.as_str(),
      "ゲートウェイを起動します: {}:{}",
      config.server.host,
      config.server.port
   );

   let rate_limit_store: Arc<dyn RateLimitStore> = match &config.redis {
      Some(redis) => {
         let conn = create_connection_manager(&redis.url)
            .await
            .context("Redis への接続に失敗しました")?;
         Arc::new(RedisRateLimitStore::new(conn))
      }
      None => {
         tracing::info!("REDIS_URL が未設定のため、レート制限はプロセス内で数えます");
         Arc::new(InMemoryRateLimitStore::new())
      }
   };

   let deps = GatewayDeps {
      verifier: Arc::new(HmacJwtCodec::new(config.jwt.secret.as_bytes())),
      rate_limit_store,
      clock: Arc::new(SystemClock),
   };
   let app = build_app(&config, deps, ApiRoutes::new());

   let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
      .parse()
      .context("バインドアドレスが不正です")?;
   let listener = TcpListener::bind(addr)
      .await
      .with_context(|| format!("{addr} をリッスンできません"))?;
   tracing::info!("ゲートウェイが起動しました: {}", addr);

   axum::serve(
      listener,
      app.into_make_service_with_connect_info::<SocketAddr>(),
   )
   .with_graceful_shutdown(shutdown_signal())
   .await?;

   tracing::info!("ゲートウェイを停止しました");
   Ok(())
}

/// Ctrl-C または SIGTERM を待つ
async fn shutdown_signal() {
   let ctrl_c = async {
      if let Err(e) = tokio::signal::ctrl_c().await {
         tracing::error!(error = %e, "Ctrl-C ハンドラを登録できませんでした");
         std::future::pending::<()>().await;
      }
   };

   #[cfg(unix)]
   let terminate = async {
      match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
         Ok(mut signal) => {
            signal.recv().await;
         }
         Err(e) => {
            tracing::error!(error = %e, "SIGTERM ハンドラを登録できませんでした");
            std::future::pending::<()>().await;
         }
      }
   };

   #[cfg(not(unix))]
   let terminate = std::future::pending::<()>();

   tokio::select! {
      () = ctrl_c => {},
      () = terminate => {},
   }

   tracing::info!("シャットダウンシグナルを受信しました");
}
