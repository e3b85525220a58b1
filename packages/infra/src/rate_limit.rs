//! # レート制限
//!
//! クライアント識別子ごとに、固定長ウィンドウ内のリクエスト数を数える。
//!
//! ## アルゴリズム
//!
//! ```text
//! hit(key, now):
//!   エントリが無い、または reset_at <= now なら { count: 0, reset_at: now + window } で開始
//!   count += 1
//!   count > max_requests なら拒否
//! ```
//!
//! 拒否されたリクエストもカウントに含める。ウィンドウが明けるまで拒否が続く。
//!
//! ## ストア
//!
//! | 実装 | 共有範囲 | 排他制御 |
//! |------|----------|----------|
//! | [`InMemoryRateLimitStore`] | プロセス内 | `Mutex<HashMap>` |
//! | [`RedisRateLimitStore`] | 複数プロセス | `SET NX PX` + `INCR` + `PTTL` の atomic パイプライン |

use std::{
   collections::HashMap,
   sync::{Mutex, PoisonError},
   time::Duration,
};

use ::redis::aio::ConnectionManager;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::InfraError;

/// この件数を超えたら期限切れエントリを掃除する
const PRUNE_THRESHOLD: usize = 10_000;

/// Redis キーの接頭辞
const REDIS_KEY_PREFIX: &str = "rate_limit";

/// レート制限ポリシー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
   /// ウィンドウあたりの最大リクエスト数
   pub max_requests: u32,
   /// ウィンドウの長さ
   pub window:       Duration,
}

impl RateLimitPolicy {
   pub const fn new(max_requests: u32, window: Duration) -> Self {
      Self {
         max_requests,
         window,
      }
   }

   /// ストアが返したカウントから可否を判定する
   pub fn evaluate(&self, hit: WindowHit) -> RateLimitDecision {
      RateLimitDecision {
         allowed:   hit.count <= self.max_requests,
         limit:     self.max_requests,
         remaining: self.max_requests.saturating_sub(hit.count),
         reset_at:  hit.reset_at,
      }
   }
}

impl Default for RateLimitPolicy {
   /// 15 分あたり 100 リクエスト
   fn default() -> Self {
      Self::new(100, Duration::from_secs(15 * 60))
   }
}

/// 1 回のカウント結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
   /// 今回を含むウィンドウ内のリクエスト数
   pub count:    u32,
   /// ウィンドウが明ける時刻
   pub reset_at: DateTime<Utc>,
}

/// レート制限の判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
   pub allowed:   bool,
   pub limit:     u32,
   pub remaining: u32,
   pub reset_at:  DateTime<Utc>,
}

impl RateLimitDecision {
   /// ウィンドウが明けるまでの秒数（切り上げ、最小 0）
   pub fn retry_after_secs(&self, now: DateTime<Utc>) -> i64 {
      let millis = (self.reset_at - now).num_milliseconds().max(0);
      (millis + 999) / 1000
   }
}

/// リクエスト数を保持するストア
#[async_trait]
pub trait RateLimitStore: Send + Sync {
   /// `key` のカウントを 1 増やし、ウィンドウ内の累計を返す
   async fn hit(
      &self,
      key: &str,
      window: Duration,
      now: DateTime<Utc>,
   ) -> Result<WindowHit, InfraError>;
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
   count:    u32,
   reset_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Windows {
   entries:       HashMap<String, WindowEntry>,
   /// これより前には掃除しない（`None` は一度も掃除していない）
   next_prune_at: Option<DateTime<Utc>>,
}

impl Windows {
   /// 件数が閾値を超え、前回の掃除から 1 ウィンドウ経過しているか
   fn prune_due(&self, now: DateTime<Utc>) -> bool {
      self.entries.len() > PRUNE_THRESHOLD && self.next_prune_at.is_none_or(|at| now >= at)
   }

   /// 期限切れのエントリを削除し、削除件数を返す
   fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
      let before = self.entries.len();
      self.entries.retain(|_, entry| entry.reset_at > now);
      before - self.entries.len()
   }
}

/// プロセス内メモリのストア
///
/// 期限切れエントリの掃除は件数が閾値を超えたときだけ、1 ウィンドウに 1 回まで行う。
/// 生きているクライアントが多くても、毎リクエストで全件を走査しない。
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
   windows: Mutex<Windows>,
}

impl InMemoryRateLimitStore {
   pub fn new() -> Self {
      Self::default()
   }

   fn lock(&self) -> std::sync::MutexGuard<'_, Windows> {
      // カウンターは単純な数値なので、パニック後の値もそのまま使える
      self.windows.lock().unwrap_or_else(PoisonError::into_inner)
   }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
   async fn hit(
      &self,
      key: &str,
      window: Duration,
      now: DateTime<Utc>,
   ) -> Result<WindowHit, InfraError> {
      let window = chrono::Duration::from_std(window)
         .map_err(|e| InfraError::unexpected(format!("ウィンドウ長が不正です: {e}")))?;

      let mut windows = self.lock();
      let entry = windows
         .entries
         .entry(key.to_string())
         .or_insert(WindowEntry {
            count:    0,
            reset_at: now + window,
         });
      if entry.reset_at <= now {
         *entry = WindowEntry {
            count:    0,
            reset_at: now + window,
         };
      }
      entry.count = entry.count.saturating_add(1);
      let hit = WindowHit {
         count:    entry.count,
         reset_at: entry.reset_at,
      };

      if windows.prune_due(now) {
         let removed = windows.prune_expired(now);
         windows.next_prune_at = Some(now + window);
         tracing::debug!(
            removed,
            remaining = windows.entries.len(),
            "期限切れのレート制限エントリを削除しました"
         );
      }

      Ok(hit)
   }
}

/// Redis のストア
pub struct RedisRateLimitStore {
   conn: ConnectionManager,
}

impl RedisRateLimitStore {
   pub fn new(conn: ConnectionManager) -> Self {
      Self { conn }
   }

   fn key(client_key: &str) -> String {
      format!("{REDIS_KEY_PREFIX}:{client_key}")
   }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
   async fn hit(
      &self,
      key: &str,
      window: Duration,
      now: DateTime<Utc>,
   ) -> Result<WindowHit, InfraError> {
      let redis_key = Self::key(key);
      let window_ms = i64::try_from(window.as_millis())
         .map_err(|_| InfraError::unexpected("ウィンドウ長が大きすぎます"))?;

      // ウィンドウ開始時だけ TTL 付きでキーを作り、以後は INCR のみ
      let mut conn = self.conn.clone();
      let (count, ttl_ms): (u32, i64) = ::redis::pipe()
         .atomic()
         .cmd("SET")
         .arg(&redis_key)
         .arg(0)
         .arg("NX")
         .arg("PX")
         .arg(window_ms)
         .ignore()
         .incr(&redis_key, 1)
         .pttl(&redis_key)
         .query_async(&mut conn)
         .await?;

      // PTTL が負（TTL 無し）になるのは想定外だが、ウィンドウ長で補う
      let ttl_ms = if ttl_ms > 0 { ttl_ms } else { window_ms };

      Ok(WindowHit {
         count,
         reset_at: now + chrono::Duration::milliseconds(ttl_ms),
      })
   }
}
