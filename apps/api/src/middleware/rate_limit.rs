//! # レート制限ミドルウェア
//!
//! `/api` 配下のリクエストを送信元アドレスごとに数え、
//! ウィンドウあたりの上限を超えたリクエストを 429 で打ち切る。
//!
//! ## レスポンスヘッダー
//!
//! | ヘッダー | 内容 |
//! |----------|------|
//! | `X-RateLimit-Limit` | ウィンドウあたりの上限 |
//! | `X-RateLimit-Remaining` | 残り回数 |
//! | `X-RateLimit-Reset` | ウィンドウが明ける時刻（UNIX 秒） |
//! | `Retry-After` | 拒否時のみ。明けるまでの秒数 |
//!
//! ストアが失敗した場合はリクエストを通し、エラーログを出す。

use std::sync::Arc;

use axum::{
   extract::{Request, State},
   http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
   middleware::Next,
   response::{IntoResponse, Response},
};
use encore_domain::clock::Clock;
use encore_infra::{RateLimitDecision, RateLimitPolicy, RateLimitStore};
use encore_shared::ClientAddr;

/// 上限超過時のレスポンスボディ
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again later";

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// 送信元アドレスが分からないリクエストの識別子
const UNKNOWN_CLIENT: &str = "unknown";

/// レート制限ミドルウェアの状態
#[derive(Clone)]
pub struct RateLimitState {
   pub store:  Arc<dyn RateLimitStore>,
   pub policy: RateLimitPolicy,
   pub clock:  Arc<dyn Clock>,
}

/// レート制限ミドルウェア
///
/// 拒否したリクエストは後続のミドルウェアにもハンドラにも渡さない。
pub async fn rate_limit(State(state): State<RateLimitState>, request: Request, next: Next) -> Response {
   let key = request
      .extensions()
      .get::<ClientAddr>()
      .map(|ClientAddr(ip)| ip.to_string())
      .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());
   let now = state.clock.now();

   let decision = match state.store.hit(&key, state.policy.window, now).await {
      Ok(hit) => state.policy.evaluate(hit),
      Err(e) => {
         tracing::error!(error = %e, client = %key, "レート制限ストアの呼び出しに失敗しました");
         return next.run(request).await;
      }
   };

   if !decision.allowed {
      tracing::warn!(client = %key, limit = decision.limit, "レート制限を超過しました");

      let mut response = (StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_MESSAGE).into_response();
      insert_rate_limit_headers(response.headers_mut(), &decision);
      response.headers_mut().insert(
         header::RETRY_AFTER,
         HeaderValue::from(decision.retry_after_secs(now)),
      );
      return response;
   }

   let mut response = next.run(request).await;
   insert_rate_limit_headers(response.headers_mut(), &decision);
   response
}

fn insert_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
   headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
   headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
   headers.insert(
      X_RATELIMIT_RESET,
      HeaderValue::from(decision.reset_at.timestamp()),
   );
}

#[cfg(test)]
mod tests {
   use std::{
      net::{IpAddr, Ipv4Addr},
      sync::atomic::{AtomicUsize, Ordering},
      time::Duration,
   };

   use async_trait::async_trait;
   use axum::{Router, body::Body, middleware::from_fn_with_state, routing::get};
   use chrono::{DateTime, TimeZone, Utc};
   use encore_domain::clock::ManualClock;
   use encore_infra::{InMemoryRateLimitStore, InfraError, WindowHit};
   use pretty_assertions::assert_eq;
   use tower::ServiceExt;

   use super::*;

   /// 常に失敗するストア
   struct FailingStore;

   #[async_trait]
   impl RateLimitStore for FailingStore {
      async fn hit(
         &self,
         _key: &str,
         _window: Duration,
         _now: DateTime<Utc>,
      ) -> Result<WindowHit, InfraError> {
         Err(InfraError::unexpected("connection refused"))
      }
   }

   fn start() -> DateTime<Utc> {
      Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
   }

   fn app(state: RateLimitState, calls: Arc<AtomicUsize>) -> Router {
      Router::new()
         .route(
            "/api/venues",
            get(move || {
               let calls = calls.clone();
               async move {
                  calls.fetch_add(1, Ordering::SeqCst);
                  StatusCode::OK
               }
            }),
         )
         .layer(from_fn_with_state(state, rate_limit))
   }

   fn request_from(ip: Ipv4Addr) -> Request {
      let mut request = Request::builder()
         .uri("/api/venues")
         .body(Body::empty())
         .unwrap();
      request
         .extensions_mut()
         .insert(ClientAddr(IpAddr::V4(ip)));
      request
   }

   fn state(max: u32, clock: Arc<ManualClock>) -> RateLimitState {
      RateLimitState {
         store: Arc::new(InMemoryRateLimitStore::new()),
         policy: RateLimitPolicy::new(max, Duration::from_secs(15 * 60)),
         clock,
      }
   }

   #[tokio::test]
   async fn test_上限を超えたリクエストは固定文言の429になりハンドラを通らない() {
      let calls = Arc::new(AtomicUsize::new(0));
      let app = app(state(3, Arc::new(ManualClock::new(start()))), calls.clone());
      let client = Ipv4Addr::new(10, 0, 0, 1);

      for _ in 0..3 {
         let response = app.clone().oneshot(request_from(client)).await.unwrap();
         assert_eq!(response.status(), StatusCode::OK);
      }
      let response = app.oneshot(request_from(client)).await.unwrap();

      assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
      assert_eq!(calls.load(Ordering::SeqCst), 3);
      assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "900");
      assert_eq!(response.headers().get(X_RATELIMIT_REMAINING).unwrap(), "0");
      let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
         .await
         .unwrap();
      assert_eq!(&bytes[..], RATE_LIMIT_MESSAGE.as_bytes());
   }

   #[tokio::test]
   async fn test_許可したレスポンスに残り回数が付く() {
      let app = app(
         state(5, Arc::new(ManualClock::new(start()))),
         Arc::new(AtomicUsize::new(0)),
      );

      let response = app
         .clone()
         .oneshot(request_from(Ipv4Addr::new(10, 0, 0, 1)))
         .await
         .unwrap();

      assert_eq!(response.headers().get(X_RATELIMIT_LIMIT).unwrap(), "5");
      assert_eq!(response.headers().get(X_RATELIMIT_REMAINING).unwrap(), "4");
      let reset = (start() + chrono::Duration::minutes(15)).timestamp();
      assert_eq!(
         response.headers().get(X_RATELIMIT_RESET).unwrap(),
         reset.to_string().as_str()
      );
      assert!(response.headers().get(header::RETRY_AFTER).is_none());
   }

   #[tokio::test]
   async fn test_クライアントごとに独立して数える() {
      let app = app(
         state(1, Arc::new(ManualClock::new(start()))),
         Arc::new(AtomicUsize::new(0)),
      );

      let first = app
         .clone()
         .oneshot(request_from(Ipv4Addr::new(10, 0, 0, 1)))
         .await
         .unwrap();
      let other = app
         .clone()
         .oneshot(request_from(Ipv4Addr::new(10, 0, 0, 2)))
         .await
         .unwrap();
      let blocked = app
         .oneshot(request_from(Ipv4Addr::new(10, 0, 0, 1)))
         .await
         .unwrap();

      assert_eq!(first.status(), StatusCode::OK);
      assert_eq!(other.status(), StatusCode::OK);
      assert_eq!(blocked.status(), StatusCode::TOO_MANY_REQUESTS);
   }

   #[tokio::test]
   async fn test_ウィンドウが明けると再び許可される() {
      let clock = Arc::new(ManualClock::new(start()));
      let app = app(state(1, clock.clone()), Arc::new(AtomicUsize::new(0)));
      let client = Ipv4Addr::new(10, 0, 0, 1);

      app.clone().oneshot(request_from(client)).await.unwrap();
      let blocked = app.clone().oneshot(request_from(client)).await.unwrap();
      clock.advance(chrono::Duration::minutes(15));
      let after = app.oneshot(request_from(client)).await.unwrap();

      assert_eq!(blocked.status(), StatusCode::TOO_MANY_REQUESTS);
      assert_eq!(after.status(), StatusCode::OK);
   }

   #[tokio::test]
   async fn test_ストア障害時はリクエストを通す() {
      let calls = Arc::new(AtomicUsize::new(0));
      let state = RateLimitState {
         store:  Arc::new(FailingStore),
         policy: RateLimitPolicy::default(),
         clock:  Arc::new(ManualClock::new(start())),
      };

      let response = app(state, calls.clone())
         .oneshot(request_from(Ipv4Addr::new(10, 0, 0, 1)))
         .await
         .unwrap();

      assert_eq!(response.status(), StatusCode::OK);
      assert_eq!(calls.load(Ordering::SeqCst), 1);
      assert!(response.headers().get(X_RATELIMIT_LIMIT).is_none());
   }
}
