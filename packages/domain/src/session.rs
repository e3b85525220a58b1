//! # セッション（サーバー側）
//!
//! JWT に埋め込むクレームと、検証済みトークンから得られる認証済みユーザーを定義する。
//!
//! ## トークンのライフサイクル
//!
//! 1. 認証ルート（`/api/auth`）がログイン成功時に発行する
//! 2. クライアントは以後のリクエストで `Authorization: Bearer <token>` として提示する
//! 3. ゲートウェイの JWT ゲートがリクエストごとに署名と `exp` を検証する
//! 4. トークンは変更されず、`exp` で失効する
//!
//! 署名と検証の実装は `encore-infra::jwt` にある。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// JWT クレーム
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
   /// ユーザー ID
   pub sub:   String,
   /// 発行時刻（UNIX 秒）
   pub iat:   i64,
   /// 有効期限（UNIX 秒）
   pub exp:   i64,
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub email: Option<String>,
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub role:  Option<String>,
}

impl Claims {
   /// `issued_at` から `ttl` 後に失効するクレームを作成する
   pub fn new(sub: impl Into<String>, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
      Self {
         sub:   sub.into(),
         iat:   issued_at.timestamp(),
         exp:   (issued_at + ttl).timestamp(),
         email: None,
         role:  None,
      }
   }

   pub fn with_email(mut self, email: impl Into<String>) -> Self {
      self.email = Some(email.into());
      self
   }

   pub fn with_role(mut self, role: impl Into<String>) -> Self {
      self.role = Some(role.into());
      self
   }
}

/// JWT ゲートを通過したリクエストの主体
///
/// ゲートウェイはこの値をリクエスト extensions に格納し、
/// リソースハンドラへ引き渡す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
   pub user_id: String,
   pub email:   Option<String>,
   pub role:    Option<String>,
}

impl From<Claims> for AuthenticatedUser {
   fn from(claims: Claims) -> Self {
      Self {
         user_id: claims.sub,
         email:   claims.email,
         role:    claims.role,
      }
   }
}

/// `Authorization` ヘッダー値から Bearer トークンを取り出す
///
/// スキーム名は大文字小文字を区別しない（RFC 7235）。
/// スキームが Bearer でない場合やトークンが空の場合は `None`。
pub fn parse_bearer(header_value: &str) -> Option<&str> {
   let (scheme, token) = header_value.trim().split_once(' ')?;
   if !scheme.eq_ignore_ascii_case("bearer") {
      return None;
   }
   let token = token.trim();
   if token.is_empty() { None } else { Some(token) }
}

#[cfg(test)]
mod tests {
   use chrono::TimeZone;
   use pretty_assertions::assert_eq;
   use rstest::rstest;

   use super::*;

   fn issued_at() -> DateTime<Utc> {
      Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
   }

   #[test]
   fn test_newはiatとexpをttlから計算する() {
      let claims = Claims::new("user-1", issued_at(), Duration::hours(1));

      assert_eq!(claims.iat, issued_at().timestamp());
      assert_eq!(claims.exp, issued_at().timestamp() + 3600);
   }

   #[test]
   fn test_任意クレームが無いjsonもデシリアライズできる() {
      let json = r#"{"sub":"user-1","iat":1,"exp":2}"#;
      let claims: Claims = serde_json::from_str(json).unwrap();

      assert_eq!(claims.email, None);
      assert_eq!(claims.role, None);
   }

   #[test]
   fn test_認証済みユーザーはクレームから作られる() {
      let claims = Claims::new("user-1", issued_at(), Duration::hours(1))
         .with_email("booker@example.com")
         .with_role("admin");

      let user = AuthenticatedUser::from(claims);

      assert_eq!(user.user_id, "user-1");
      assert_eq!(user.email.as_deref(), Some("booker@example.com"));
      assert_eq!(user.role.as_deref(), Some("admin"));
   }

   #[rstest]
   #[case("Bearer abc.def.ghi", Some("abc.def.ghi"))]
   #[case("bearer abc", Some("abc"))]
   #[case("BEARER   abc  ", Some("abc"))]
   #[case("Basic dXNlcjpwYXNz", None)]
   #[case("Bearer", None)]
   #[case("Bearer    ", None)]
   #[case("", None)]
   fn test_parse_bearer(#[case] header: &str, #[case] expected: Option<&str>) {
      assert_eq!(parse_bearer(header), expected);
   }
}
