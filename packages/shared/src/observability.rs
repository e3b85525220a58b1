//! # Observability 基盤
//!
//! トレーシング初期化、ログ出力形式の切り替え、Request ID の生成、
//! プロセス境界でのパニック記録を提供する。
//!
//! ログの出力先（subscriber）はプロセス起動時にバイナリが一度だけ初期化する。
//! ライブラリ側のコードは `tracing` マクロを呼ぶだけで、独自のロガーを保持しない。

use std::path::{Path, PathBuf};

use http::{HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::Subscriber;
use tracing_appender::{
   non_blocking::WorkerGuard,
   rolling::{InitError, RollingFileAppender, Rotation},
};
use tracing_subscriber::{
   Layer,
   filter::LevelFilter,
   layer::SubscriberExt,
   registry::LookupSpan,
};
use uuid::Uuid;

/// Request ID を運ぶ HTTP ヘッダー名
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// ログ出力形式
///
/// 環境変数 `LOG_FORMAT` で切り替える。
/// 値が未設定または不正な場合は [`Pretty`](LogFormat::Pretty) にフォールバックする。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
   /// JSON 形式（本番環境向け）
   Json,
   /// 人間が読みやすい形式（開発環境向け）
   #[default]
   Pretty,
}

impl LogFormat {
   /// 文字列からログ形式をパースする
   ///
   /// 不正な値の場合は [`Pretty`](LogFormat::Pretty) にフォールバックし、
   /// stderr に警告を出力する（subscriber 初期化前に呼ばれるため）。
   pub fn parse(s: &str) -> Self {
      match s {
         "json" => Self::Json,
         "pretty" => Self::Pretty,
         other => {
            eprintln!("WARNING: unknown LOG_FORMAT={other:?}, falling back to pretty");
            Self::Pretty
         }
      }
   }
}

/// トレーシング初期化設定
#[derive(Debug, Clone)]
pub struct TracingConfig {
   /// サービス名（起動ログとルートスパンに出力）
   pub service_name:      String,
   /// ログ出力形式
   pub log_format:        LogFormat,
   /// `RUST_LOG` 未設定時に使うフィルタ（例: `"info"`, `"debug"`）
   pub default_directive: String,
   /// 設定時はコンソールに加えて `combined.log` と `error.log` に書き出す
   pub log_dir:           Option<PathBuf>,
}

impl TracingConfig {
   /// 新しい設定を作成する
   ///
   /// デフォルトのフィルタは `"info"`。ファイル出力は無効。
   pub fn new(service_name: impl Into<String>, log_format: LogFormat) -> Self {
      Self {
         service_name: service_name.into(),
         log_format,
         default_directive: "info".to_string(),
         log_dir: None,
      }
   }

   /// `RUST_LOG` 未設定時のフィルタを差し替える
   pub fn with_default_directive(mut self, directive: impl Into<String>) -> Self {
      self.default_directive = directive.into();
      self
   }

   /// ログファイルの出力先ディレクトリを設定する
   pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
      self.log_dir = Some(dir.into());
      self
   }
}

/// 全レベルを書き出すファイル名
pub const COMBINED_LOG_FILE: &str = "combined.log";
/// ERROR のみを書き出すファイル名
pub const ERROR_LOG_FILE: &str = "error.log";

/// ファイル出力のバックグラウンドライターを保持するガード
///
/// ドロップ時に未書き込みのログをフラッシュする。プロセス終了まで保持すること。
#[must_use = "ドロップするとファイルへのログ出力が止まる"]
#[derive(Debug, Default)]
pub struct TracingGuard {
   _file_guards: Vec<WorkerGuard>,
}

/// トレーシングを初期化する
///
/// `RUST_LOG` 環境変数が設定されていればそれを優先し、
/// 未設定の場合は [`TracingConfig::default_directive`] を使う。
///
/// JSON モードでは `timestamp`, `level`, `target`, `message` がトップレベルに出力される。
/// [`TracingConfig::log_dir`] が設定されていれば、ファイルには常に JSON で書き出す。
///
/// # エラー
///
/// ログディレクトリやファイルを作成できない場合。
pub fn init_tracing(config: &TracingConfig) -> Result<TracingGuard, InitError> {
   use tracing_subscriber::util::SubscriberInitExt;

   let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
      .unwrap_or_else(|_| config.default_directive.as_str().into());

   let fmt_layer = match config.log_format {
      LogFormat::Json => tracing_subscriber::fmt::layer()
         .json()
         .flatten_event(true)
         .with_target(true)
         .with_current_span(true)
         .with_span_list(false)
         .boxed(),
      LogFormat::Pretty => tracing_subscriber::fmt::layer().boxed(),
   };

   let (file_layer, guard) = match &config.log_dir {
      Some(dir) => {
         let (layer, guard) = file_layers(dir)?;
         (Some(layer), guard)
      }
      None => (None, TracingGuard::default()),
   };

   tracing_subscriber::registry()
      .with(env_filter)
      .with(fmt_layer)
      .with(file_layer)
      .init();

   Ok(guard)
}

/// `combined.log`（全レベル）と `error.log`（ERROR のみ）に書き出すレイヤーを作成する
///
/// 書き込みはノンブロッキングライター経由で行い、リクエスト処理をファイル I/O で待たせない。
pub fn file_layers<S>(dir: &Path) -> Result<(impl Layer<S> + Send + Sync, TracingGuard), InitError>
where
   S: Subscriber + for<'span> LookupSpan<'span>,
{
   let (combined_writer, combined_guard) = tracing_appender::non_blocking(log_file(dir, COMBINED_LOG_FILE)?);
   let (error_writer, error_guard) = tracing_appender::non_blocking(log_file(dir, ERROR_LOG_FILE)?);

   let combined = tracing_subscriber::fmt::layer()
      .json()
      .flatten_event(true)
      .with_ansi(false)
      .with_writer(combined_writer);
   let errors = tracing_subscriber::fmt::layer()
      .json()
      .flatten_event(true)
      .with_ansi(false)
      .with_writer(error_writer)
      .with_filter(LevelFilter::ERROR);

   Ok((
      combined.and_then(errors),
      TracingGuard {
         _file_guards: vec![combined_guard, error_guard],
      },
   ))
}

/// 追記モードのログファイル（ローテーション無し）
fn log_file(dir: &Path, file_name: &str) -> Result<RollingFileAppender, InitError> {
   let (prefix, suffix) = file_name.split_once('.').unwrap_or((file_name, ""));
   RollingFileAppender::builder()
      .rotation(Rotation::NEVER)
      .filename_prefix(prefix)
      .filename_suffix(suffix)
      .build(dir)
}

/// 未処理のパニックを `tracing` に記録するフックを登録する
///
/// tokio はタスク内のパニックをそのタスクに閉じ込めるため、プロセスは停止しない。
/// このフックはその事実をログに残すためのもので、再起動は行わない。
pub fn install_panic_hook() {
   std::panic::set_hook(Box::new(|info| {
      let location = info
         .location()
         .map(|l| format!("{}:{}", l.file(), l.line()))
         .unwrap_or_else(|| "unknown".to_string());
      let payload = info
         .payload()
         .downcast_ref::<&str>()
         .map(|s| (*s).to_string())
         .or_else(|| info.payload().downcast_ref::<String>().cloned())
         .unwrap_or_else(|| "non-string panic payload".to_string());

      tracing::error!(
         panic.location = %location,
         panic.message = %payload,
         "未処理のパニックを検出しました（プロセスは継続します）"
      );
   }));
}

/// UUID v7 で Request ID を生成する
///
/// クライアントが `X-Request-Id` を付与している場合は `SetRequestIdLayer` が
/// その値を優先するため、このジェネレータは呼ばれない。
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
   fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
      let id = Uuid::now_v7().to_string();
      HeaderValue::from_str(&id).ok().map(RequestId::new)
   }
}

/// リクエストごとのトレーシングスパンを作成する
///
/// `TraceLayer::make_span_with` に渡す。スパン内で出力されるログには
/// `request_id`, `http.method`, `http.path` が自動的に含まれる。
/// `user_id` は JWT ゲートが検証後に記録する。
pub fn make_request_span<B>(request: &Request<B>) -> tracing::Span {
   let request_id = request
      .headers()
      .get(REQUEST_ID_HEADER)
      .and_then(|v| v.to_str().ok())
      .unwrap_or("-");

   tracing::info_span!(
      "request",
      request_id = %request_id,
      http.method = %request.method(),
      http.path = %request.uri().path(),
      user_id = tracing::field::Empty,
   )
}
