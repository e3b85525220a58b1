//! # ゲートウェイのアプリケーション構築
//!
//! 依存（トークン検証器・レート制限ストア・時計）とリソースルーターを受け取り、
//! ミドルウェアを組み込んだ `Router` を組み立てる。
//! `bin/gateway.rs` はインフラ初期化とサーバー起動に集中する。
//!
//! ## リクエストの流れ
//!
//! ```text
//! SetRequestId → Trace → 送信元解決 → AccessLog → PropagateRequestId
//!   → セキュリティヘッダー → CORS → JSON 検証 → CatchPanic
//!   → /api ─┬─ レート制限 ─┬─ /health
//!           │              ├─ /auth/*            （ゲート無し）
//!           │              ├─ /<resource>/*      （JWT ゲート）
//!           │              └─ その他 → 404
//!   → その他 → 404
//! ```

use std::{collections::HashMap, sync::Arc};

use axum::{
   Router,
   middleware::{from_fn, from_fn_with_state},
   routing::get,
};
use encore_domain::{clock::Clock, resource::ApiResource};
use encore_infra::{RateLimitStore, TokenVerifier};
use encore_shared::{
   AccessLogLayer,
   observability::{MakeRequestUuidV7, make_request_span},
};
use tower_http::{
   catch_panic::CatchPanicLayer,
   request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
   trace::TraceLayer,
};

use crate::{
   config::AppConfig,
   error::handle_panic,
   handler::{health_check, not_found, resource_not_mounted},
   middleware::{
      JsonBodyLimit,
      JwtState,
      RateLimitState,
      cors_layer,
      parse_json_body,
      rate_limit,
      require_jwt,
      resolve_client_addr,
      security_headers,
   },
};

/// インフラ初期化済みの依存
#[derive(Clone)]
pub struct GatewayDeps {
   pub verifier:         Arc<dyn TokenVerifier>,
   pub rate_limit_store: Arc<dyn RateLimitStore>,
   pub clock:            Arc<dyn Clock>,
}

/// `/api` 配下に取り付けるルーター
///
/// 認証ルートとリソースルーターは外部で定義し、ここに登録する。
/// 登録されなかったプレフィックスは 501 を返す。
#[derive(Default)]
pub struct ApiRoutes {
   auth:      Option<Router>,
   resources: HashMap<ApiResource, Router>,
}

impl ApiRoutes {
   pub fn new() -> Self {
      Self::default()
   }

   /// `/api/auth` に取り付ける認証ルーター（JWT ゲート無し）
   pub fn auth(mut self, router: Router) -> Self {
      self.auth = Some(router);
      self
   }

   /// `/api/<resource>` に取り付けるリソースルーター（JWT ゲート付き）
   ///
   /// 同じリソースを 2 回登録した場合は後のものが使われる。
   pub fn resource(mut self, resource: ApiResource, router: Router) -> Self {
      if self.resources.insert(resource, router).is_some() {
         tracing::warn!(resource = %resource, "リソースルーターを上書きしました");
      }
      self
   }
}

/// ゲートウェイの `Router` を組み立てる
pub fn build_app(config: &AppConfig, deps: GatewayDeps, routes: ApiRoutes) -> Router {
   let ApiRoutes {
      auth,
      mut resources,
   } = routes;

   let jwt_state = JwtState {
      verifier: deps.verifier,
   };
   let rate_limit_state = RateLimitState {
      store:  deps.rate_limit_store,
      policy: config.rate_limit.policy(),
      clock:  deps.clock,
   };

   let mut api = Router::new()
      .route("/health", get(health_check))
      .nest_service("/auth", mounted_or_placeholder(auth));

   // ゲートはプレフィックス配下の全パスにかかる（リソースルーターが定義していないパスも含む）
   for resource in ApiResource::ALL {
      let gated = mounted_or_placeholder(resources.remove(&resource))
         .layer(from_fn_with_state(jwt_state.clone(), require_jwt));
      api = api.nest_service(&resource.mount_path(), gated);
   }

   let api = api
      .fallback(not_found)
      .layer(from_fn_with_state(rate_limit_state, rate_limit));

   // layer は後に追加したものほど外側になる
   Router::new()
      .nest_service("/api", api)
      .fallback(not_found)
      .layer(CatchPanicLayer::custom(handle_panic))
      .layer(from_fn_with_state(
         JsonBodyLimit(config.json_body_limit),
         parse_json_body,
      ))
      .layer(cors_layer(&config.cors))
      .layer(from_fn(security_headers))
      .layer(PropagateRequestIdLayer::x_request_id())
      .layer(AccessLogLayer)
      .layer(from_fn(resolve_client_addr))
      .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
      .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
}

/// 登録済みならフォールバックを 404 にして返し、未登録なら 501 を返すルーターにする
fn mounted_or_placeholder(router: Option<Router>) -> Router {
   match router {
      Some(router) => router.fallback(not_found),
      None => Router::new().fallback(resource_not_mounted),
   }
}
