//! # アプリケーション設定
//!
//! 環境変数からゲートウェイの設定を読み込む。
//!
//! ## 環境変数一覧
//!
//! | 変数名 | 必須 | デフォルト | 説明 |
//! |--------|------|------------|------|
//! | `HOST` | No | `0.0.0.0` | バインドアドレス |
//! | `PORT` | No | `5000` | ポート番号 |
//! | `NODE_ENV` | No | `development` | 実行環境。`production` のときログレベルを `info` にする |
//! | `JWT_SECRET` | **Yes** | - | HS256 の署名シークレット |
//! | `RATE_LIMIT_MAX` | No | `100` | ウィンドウあたりの最大リクエスト数 |
//! | `RATE_LIMIT_WINDOW_SECS` | No | `900` | ウィンドウの長さ（秒） |
//! | `JSON_BODY_LIMIT` | No | `102400` | JSON ボディの最大バイト数 |
//! | `CORS_ALLOWED_ORIGINS` | No | `*` | 許可するオリジン（カンマ区切り） |
//! | `REDIS_URL` | No | - | 設定時はレート制限カウンターを Redis に置く |
//! | `LOG_FORMAT` | No | `pretty` | `json` または `pretty` |
//! | `LOG_DIR` | No | - | 設定時は `combined.log` と `error.log` にも書き出す |
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use encore_api::config::AppConfig;
//!
//! dotenvy::dotenv().ok();
//! let config = AppConfig::from_env()?;
//! println!("サーバー: {}:{}", config.server.host, config.server.port);
//! ```

use std::{env, fmt, path::PathBuf, str::FromStr, time::Duration};

use encore_infra::RateLimitPolicy;
use encore_shared::observability::LogFormat;
use thiserror::Error;

/// 設定読み込みエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
   #[error("環境変数 {0} が設定されていません")]
   Missing(&'static str),

   #[error("環境変数 {var} の値が不正です: {value:?}")]
   Invalid { var: &'static str, value: String },
}

/// 実行環境
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
   #[default]
   Development,
   Test,
   Production,
}

impl Environment {
   /// `NODE_ENV` の値を解釈する
   ///
   /// `production` と `test` 以外はすべて開発環境として扱う。
   pub fn parse(s: &str) -> Self {
      match s {
         "production" => Self::Production,
         "test" => Self::Test,
         _ => Self::Development,
      }
   }

   pub fn is_production(self) -> bool {
      self == Self::Production
   }

   /// `RUST_LOG` 未設定時のログフィルタ
   pub fn default_log_directive(self) -> &'static str {
      if self.is_production() { "info" } else { "debug" }
   }

   pub fn as_str(self) -> &'static str {
      match self {
         Self::Development => "development",
         Self::Test => "test",
         Self::Production => "production",
      }
   }
}

/// HTTP サーバー設定
#[derive(Debug, Clone)]
pub struct ServerConfig {
   pub host: String,
   pub port: u16,
}

/// JWT 設定
#[derive(Clone)]
pub struct JwtConfig {
   pub secret: String,
}

impl fmt::Debug for JwtConfig {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      // シークレットはログに出さない
      f.debug_struct("JwtConfig")
         .field("secret", &"[REDACTED]")
         .finish()
   }
}

/// レート制限設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
   pub max_requests: u32,
   pub window_secs:  u64,
}

impl RateLimitConfig {
   pub fn policy(&self) -> RateLimitPolicy {
      RateLimitPolicy::new(self.max_requests, Duration::from_secs(self.window_secs))
   }
}

/// CORS 設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsConfig {
   /// すべてのオリジンを許可する
   AnyOrigin,
   /// 列挙したオリジンのみ許可する
   Origins(Vec<String>),
}

impl CorsConfig {
   /// `CORS_ALLOWED_ORIGINS` の値を解釈する
   ///
   /// 空、`*`、または有効な要素が 1 つも無い場合は全許可。
   pub fn parse(s: &str) -> Self {
      let origins: Vec<String> = s
         .split(',')
         .map(str::trim)
         .filter(|o| !o.is_empty())
         .map(String::from)
         .collect();

      if origins.is_empty() || origins.iter().any(|o| o == "*") {
         Self::AnyOrigin
      } else {
         Self::Origins(origins)
      }
   }
}

/// Redis 接続設定
#[derive(Debug, Clone)]
pub struct RedisConfig {
   pub url: String,
}

/// アプリケーション全体の設定
///
/// 起動時に一度だけ構築し、各コンポーネントに渡す。
#[derive(Debug, Clone)]
pub struct AppConfig {
   pub server:          ServerConfig,
   pub environment:     Environment,
   pub jwt:             JwtConfig,
   pub rate_limit:      RateLimitConfig,
   pub cors:            CorsConfig,
   /// JSON ボディの最大バイト数
   pub json_body_limit: usize,
   /// 未設定ならプロセス内メモリでカウントする
   pub redis:           Option<RedisConfig>,
   pub log_format:      LogFormat,
   /// 未設定ならコンソールのみ
   pub log_dir:         Option<PathBuf>,
}

impl AppConfig {
   /// 環境変数から設定を読み込む
   pub fn from_env() -> Result<Self, ConfigError> {
      Self::from_lookup(|key| env::var(key).ok())
   }

   /// 任意の参照関数から設定を読み込む
   ///
   /// テストではプロセス環境変数を汚さずに設定を組み立てるために使う。
   pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
      let secret = lookup("JWT_SECRET")
         .filter(|s| !s.is_empty())
         .ok_or(ConfigError::Missing("JWT_SECRET"))?;

      let max_requests: u32 = parse_or(&lookup, "RATE_LIMIT_MAX", 100)?;
      let window_secs: u64 = parse_or(&lookup, "RATE_LIMIT_WINDOW_SECS", 15 * 60)?;
      ensure_positive("RATE_LIMIT_MAX", u64::from(max_requests))?;
      ensure_positive("RATE_LIMIT_WINDOW_SECS", window_secs)?;

      Ok(Self {
         server:          ServerConfig {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 5000)?,
         },
         environment:     lookup("NODE_ENV")
            .map(|v| Environment::parse(&v))
            .unwrap_or_default(),
         jwt:             JwtConfig { secret },
         rate_limit:      RateLimitConfig {
            max_requests,
            window_secs,
         },
         cors:            lookup("CORS_ALLOWED_ORIGINS")
            .map(|v| CorsConfig::parse(&v))
            .unwrap_or(CorsConfig::AnyOrigin),
         json_body_limit: parse_or(&lookup, "JSON_BODY_LIMIT", 100 * 1024)?,
         redis:           lookup("REDIS_URL")
            .filter(|s| !s.is_empty())
            .map(|url| RedisConfig { url }),
         log_format:      lookup("LOG_FORMAT")
            .map(|v| LogFormat::parse(&v))
            .unwrap_or_default(),
         log_dir:         lookup("LOG_DIR")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from),
      })
   }
}

fn parse_or<T: FromStr>(
   lookup: &impl Fn(&str) -> Option<String>,
   var: &'static str,
   default: T,
) -> Result<T, ConfigError> {
   match lookup(var) {
      None => Ok(default),
      Some(value) => value
         .trim()
         .parse()
         .map_err(|_| ConfigError::Invalid { var, value }),
   }
}

fn ensure_positive(var: &'static str, value: u64) -> Result<(), ConfigError> {
   if value == 0 {
      return Err(ConfigError::Invalid {
         var,
         value: value.to_string(),
      });
   }
   Ok(())
}
