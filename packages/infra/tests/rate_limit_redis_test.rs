//! RedisRateLimitStore 統合テスト
//!
//! Redis を使用したテスト。テストごとにランダムなクライアントキーを使い、
//! 終了時にカウンターを削除する。
//!
//! 実行方法:
//! ```bash
//! docker run --rm -p 16379:6379 redis:7
//! cargo test -p encore-infra --test rate_limit_redis_test
//! ```

use std::time::Duration;

use chrono::Utc;
use encore_infra::{RateLimitStore, RedisRateLimitStore, redis::create_connection_manager};
use pretty_assertions::assert_eq;
use redis::aio::ConnectionManager;
use uuid::Uuid;

const WINDOW: Duration = Duration::from_secs(60);

/// テスト用の Redis URL
fn redis_url() -> String {
   std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:16379".to_string())
}

/// 他のテストと衝突しないクライアントキー
fn unique_key() -> String {
   format!("test-{}", Uuid::now_v7())
}

async fn setup() -> (RedisRateLimitStore, ConnectionManager) {
   let conn = create_connection_manager(&redis_url()).await.unwrap();
   (RedisRateLimitStore::new(conn.clone()), conn)
}

/// テスト後にカウンターをクリーンアップ
async fn cleanup(conn: &mut ConnectionManager, key: &str) {
   let _: Result<(), _> = redis::cmd("DEL")
      .arg(format!("rate_limit:{key}"))
      .query_async(conn)
      .await;
}

#[tokio::test]
async fn test_最初のリクエストはカウント1でttlはウィンドウ長になる() {
   let (store, mut conn) = setup().await;
   let key = unique_key();
   let now = Utc::now();

   let hit = store.hit(&key, WINDOW, now).await.unwrap();

   assert_eq!(hit.count, 1);
   let remaining = hit.reset_at - now;
   assert!(remaining <= chrono::Duration::seconds(60));
   assert!(remaining > chrono::Duration::seconds(58));

   let ttl_ms: i64 = redis::cmd("PTTL")
      .arg(format!("rate_limit:{key}"))
      .query_async(&mut conn)
      .await
      .unwrap();
   assert!(ttl_ms > 58_000 && ttl_ms <= 60_000);

   cleanup(&mut conn, &key).await;
}

#[tokio::test]
async fn test_後続のリクエストは加算されttlは延長されない() {
   let (store, mut conn) = setup().await;
   let key = unique_key();

   let first = store.hit(&key, WINDOW, Utc::now()).await.unwrap();
   tokio::time::sleep(Duration::from_millis(500)).await;
   let second = store.hit(&key, WINDOW, Utc::now()).await.unwrap();
   let third = store.hit(&key, WINDOW, Utc::now()).await.unwrap();

   assert_eq!(second.count, 2);
   assert_eq!(third.count, 3);
   // リセット時刻はウィンドウ開始時に決まり、後続のリクエストで後ろにずれない
   let drift = (second.reset_at - first.reset_at).num_milliseconds().abs();
   assert!(drift < 200, "reset_at drifted by {drift}ms");

   cleanup(&mut conn, &key).await;
}

#[tokio::test]
async fn test_異なるクライアントキーは独立して数える() {
   let (store, mut conn) = setup().await;
   let key_a = unique_key();
   let key_b = unique_key();
   let now = Utc::now();

   for _ in 0..3 {
      store.hit(&key_a, WINDOW, now).await.unwrap();
   }
   let other = store.hit(&key_b, WINDOW, now).await.unwrap();
   let fourth = store.hit(&key_a, WINDOW, now).await.unwrap();

   assert_eq!(other.count, 1);
   assert_eq!(fourth.count, 4);

   cleanup(&mut conn, &key_a).await;
   cleanup(&mut conn, &key_b).await;
}
