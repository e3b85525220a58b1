//! # アクセスログ Layer
//!
//! HTTP リクエスト完了時に、method / path / status / latency / client を
//! 1 行にまとめた構造化ログを出力する tower Layer。
//!
//! ## TraceLayer との責務分離
//!
//! - TraceLayer: スパン作成（request_id, method, path）。リクエストスコープのコンテキスト管理
//! - AccessLogLayer: リクエスト完了サマリ。1 行で全体像を提供
//!
//! TraceLayer の内側に配置することで、スパンフィールドが JSON ログに自動で含まれる。

use std::{
   future::Future,
   net::IpAddr,
   pin::Pin,
   task::{Context, Poll},
   time::{Duration, Instant},
};

use http::{Request, Response, header};
use tower::{Layer, Service};

/// リクエスト送信元のアドレス
///
/// ゲートウェイが接続情報から解決し、リクエスト extensions に格納する。
/// アクセスログとレート制限の両方がこの値をクライアント識別子として使う。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientAddr(pub IpAddr);

/// アクセスログを出力する Layer
///
/// ```text
/// TraceLayer → AccessLogLayer → [他のミドルウェア] → handler
/// ```
#[derive(Clone, Debug, Default)]
pub struct AccessLogLayer;

impl<S> Layer<S> for AccessLogLayer {
   type Service = AccessLogService<S>;

   fn layer(&self, inner: S) -> Self::Service {
      AccessLogService { inner }
   }
}

/// [`AccessLogLayer`] が生成する Service
#[derive(Clone, Debug)]
pub struct AccessLogService<S> {
   inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for AccessLogService<S>
where
   S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
   S::Future: Send + 'static,
   S::Error: std::fmt::Display + 'static,
   ReqBody: Send + 'static,
   ResBody: Send + 'static,
{
   type Error = S::Error;
   type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;
   type Response = S::Response;

   fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
      self.inner.poll_ready(cx)
   }

   fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
      // clone-swap パターン: poll_ready で得た readiness を保持する inner を使う
      let clone = self.inner.clone();
      let mut inner = std::mem::replace(&mut self.inner, clone);

      let method = req.method().to_string();
      let path = req.uri().path().to_owned();
      let client = req
         .extensions()
         .get::<ClientAddr>()
         .map(|addr| addr.0.to_string())
         .unwrap_or_else(|| "-".to_string());
      let user_agent = req
         .headers()
         .get(header::USER_AGENT)
         .and_then(|v| v.to_str().ok())
         .unwrap_or("-")
         .to_owned();

      let start = Instant::now();

      Box::pin(async move {
         let result = inner.call(req).await;
         let latency_ms = elapsed_millis(start.elapsed());

         match &result {
            Ok(response) => {
               tracing::info!(
                  log.r#type = "access",
                  http.method = %method,
                  http.path = %path,
                  http.status_code = response.status().as_u16(),
                  http.latency_ms = latency_ms,
                  http.user_agent = %user_agent,
                  client.addr = %client,
                  "リクエスト完了"
               );
            }
            Err(err) => {
               tracing::error!(
                  log.r#type = "access",
                  http.method = %method,
                  http.path = %path,
                  http.latency_ms = latency_ms,
                  client.addr = %client,
                  error.message = %err,
                  "リクエスト処理エラー"
               );
            }
         }

         result
      })
   }
}

/// 経過時間をミリ秒に変換する（u64 に収まらない場合は飽和させる）
fn elapsed_millis(elapsed: Duration) -> u64 {
   u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
   use std::{
      convert::Infallible,
      net::Ipv4Addr,
      sync::{Arc, Mutex},
   };

   use tower::ServiceExt;
   use tracing_subscriber::layer::SubscriberExt;

   use super::*;

   #[derive(Clone)]
   struct DummyService {
      status: http::StatusCode,
   }

   impl Service<Request<()>> for DummyService {
      type Error = Infallible;
      type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;
      type Response = Response<()>;

      fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
         Poll::Ready(Ok(()))
      }

      fn call(&mut self, _req: Request<()>) -> Self::Future {
         let status = self.status;
         Box::pin(async move { Ok(Response::builder().status(status).body(()).unwrap()) })
      }
   }

   #[derive(Clone)]
   struct ErrorService;

   impl Service<Request<()>> for ErrorService {
      type Error = String;
      type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;
      type Response = Response<()>;

      fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
         Poll::Ready(Ok(()))
      }

      fn call(&mut self, _req: Request<()>) -> Self::Future {
         Box::pin(async { Err("upstream exploded".to_string()) })
      }
   }

   /// ログイベントをキャプチャする Layer
   #[derive(Clone)]
   struct CaptureLayer {
      events: Arc<Mutex<Vec<CapturedEvent>>>,
   }

   #[derive(Debug, Clone)]
   struct CapturedEvent {
      level:  tracing::Level,
      fields: Vec<(String, String)>,
   }

   impl CapturedEvent {
      fn field(&self, name: &str) -> Option<&str> {
         self
            .fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
      }
   }

   impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CaptureLayer {
      fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
         let mut visitor = FieldVisitor::default();
         event.record(&mut visitor);
         self.events.lock().unwrap().push(CapturedEvent {
            level:  *event.metadata().level(),
            fields: visitor.fields,
         });
      }
   }

   #[derive(Default)]
   struct FieldVisitor {
      fields: Vec<(String, String)>,
   }

   impl tracing::field::Visit for FieldVisitor {
      fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
         self
            .fields
            .push((field.name().to_string(), format!("{:?}", value)));
      }

      fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
         self.fields.push((field.name().to_string(), value.to_string()));
      }

      fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
         self.fields.push((field.name().to_string(), value.to_string()));
      }
   }

   fn setup_capture() -> (
      tracing::subscriber::DefaultGuard,
      Arc<Mutex<Vec<CapturedEvent>>>,
   ) {
      let events = Arc::new(Mutex::new(Vec::new()));
      let capture = CaptureLayer {
         events: events.clone(),
      };
      let subscriber = tracing_subscriber::registry().with(capture);
      let guard = tracing::subscriber::set_default(subscriber);
      (guard, events)
   }

   #[tokio::test]
   async fn test_成功レスポンスでinfoのアクセスログを出力する() {
      let (_guard, events) = setup_capture();
      let service = AccessLogLayer.layer(DummyService {
         status: http::StatusCode::CREATED,
      });

      let mut request = Request::builder()
         .method("POST")
         .uri("/api/venues")
         .header("user-agent", "curl/8.0")
         .body(())
         .unwrap();
      request
         .extensions_mut()
         .insert(ClientAddr(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7))));

      service.oneshot(request).await.unwrap();

      let events = events.lock().unwrap();
      assert_eq!(events.len(), 1);
      let event = &events[0];
      assert_eq!(event.level, tracing::Level::INFO);
      assert_eq!(event.field("http.status_code"), Some("201"));
      assert_eq!(event.field("http.method"), Some("POST"));
      assert_eq!(event.field("http.path"), Some("/api/venues"));
      assert_eq!(event.field("client.addr"), Some("10.0.0.7"));
      assert_eq!(event.field("http.user_agent"), Some("curl/8.0"));
   }

   #[tokio::test]
   async fn test_クライアント情報がない場合はハイフンを記録する() {
      let (_guard, events) = setup_capture();
      let service = AccessLogLayer.layer(DummyService {
         status: http::StatusCode::OK,
      });

      service
         .oneshot(Request::builder().uri("/api/health").body(()).unwrap())
         .await
         .unwrap();

      let events = events.lock().unwrap();
      assert_eq!(events[0].field("client.addr"), Some("-"));
   }

   #[tokio::test]
   async fn test_サービスエラー時にerrorのアクセスログを出力する() {
      let (_guard, events) = setup_capture();
      let service = AccessLogLayer.layer(ErrorService);

      let result = service
         .oneshot(Request::builder().uri("/api/venues").body(()).unwrap())
         .await;

      assert!(result.is_err());
      let events = events.lock().unwrap();
      assert_eq!(events[0].level, tracing::Level::ERROR);
      assert_eq!(events[0].field("error.message"), Some("upstream exploded"));
   }

   #[test]
   fn test_経過時間はミリ秒で記録しu64を超える値は飽和する() {
      assert_eq!(elapsed_millis(Duration::from_micros(1_999)), 1);
      assert_eq!(elapsed_millis(Duration::from_secs(3)), 3_000);
      assert_eq!(elapsed_millis(Duration::MAX), u64::MAX);
   }
}
