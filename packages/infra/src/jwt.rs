//! # JWT の発行と検証
//!
//! HS256（共有シークレット）で署名した JWT を扱う。
//! 検証はシグネチャと `exp` のみで完結し、リクエストごとのストア参照は行わない。
//!
//! ゲートウェイは [`TokenVerifier`] トレイト越しに検証器を受け取るため、
//! 鍵の配布方式が変わっても（RS256 + JWKS など）ゲート側の変更は不要。

use encore_domain::session::Claims;
use jsonwebtoken::{
   Algorithm,
   DecodingKey,
   EncodingKey,
   Header,
   Validation,
   decode,
   encode,
   errors::ErrorKind,
};
use thiserror::Error;

/// トークン検証・発行のエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
   #[error("トークンの有効期限が切れています")]
   Expired,

   #[error("トークンの署名が不正です")]
   InvalidSignature,

   #[error("トークンの形式が不正です: {0}")]
   Malformed(String),

   #[error("トークンが無効です: {0}")]
   Invalid(String),

   #[error("トークンの発行に失敗しました: {0}")]
   Encoding(String),
}

/// Bearer トークンの検証器
pub trait TokenVerifier: Send + Sync {
   fn verify(&self, token: &str) -> Result<Claims, TokenError>;
}

/// HS256 の JWT コーデック
pub struct HmacJwtCodec {
   encoding_key: EncodingKey,
   decoding_key: DecodingKey,
   validation:   Validation,
}

impl HmacJwtCodec {
   pub fn new(secret: &[u8]) -> Self {
      let mut validation = Validation::new(Algorithm::HS256);
      // exp は秒単位で厳密に扱う
      validation.leeway = 0;

      Self {
         encoding_key: EncodingKey::from_secret(secret),
         decoding_key: DecodingKey::from_secret(secret),
         validation,
      }
   }

   /// クレームに署名してトークン文字列を返す
   pub fn issue(&self, claims: &Claims) -> Result<String, TokenError> {
      encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
         .map_err(|e| TokenError::Encoding(e.to_string()))
   }
}

impl TokenVerifier for HmacJwtCodec {
   fn verify(&self, token: &str) -> Result<Claims, TokenError> {
      decode::<Claims>(token, &self.decoding_key, &self.validation)
         .map(|data| data.claims)
         .map_err(|e| convert_jwt_error(&e))
   }
}

fn convert_jwt_error(e: &jsonwebtoken::errors::Error) -> TokenError {
   tracing::debug!(error = %e, "JWT の検証に失敗しました");

   match e.kind() {
      ErrorKind::ExpiredSignature => TokenError::Expired,
      ErrorKind::InvalidSignature => TokenError::InvalidSignature,
      ErrorKind::InvalidToken => TokenError::Malformed("セグメント構成が不正です".to_string()),
      ErrorKind::Base64(err) => TokenError::Malformed(format!("base64 が不正です: {err}")),
      ErrorKind::Json(err) => TokenError::Malformed(format!("JSON が不正です: {err}")),
      ErrorKind::Utf8(err) => TokenError::Malformed(format!("UTF-8 が不正です: {err}")),
      _ => TokenError::Invalid(e.to_string()),
   }
}

#[cfg(test)]
mod tests {
   use chrono::{Duration, Utc};
   use pretty_assertions::assert_eq;

   use super::*;

   const SECRET: &[u8] = b"test-secret-for-encore";

   fn valid_claims() -> Claims {
      Claims::new("user-1", Utc::now(), Duration::hours(1)).with_email("booker@example.com")
   }

   #[test]
   fn test_発行したトークンを検証するとクレームが得られる() {
      let codec = HmacJwtCodec::new(SECRET);
      let claims = valid_claims();

      let token = codec.issue(&claims).unwrap();
      let verified = codec.verify(&token).unwrap();

      assert_eq!(verified, claims);
   }

   #[test]
   fn test_期限切れのトークンはexpiredになる() {
      let codec = HmacJwtCodec::new(SECRET);
      let claims = Claims::new("user-1", Utc::now() - Duration::hours(2), Duration::hours(1));

      let token = codec.issue(&claims).unwrap();

      assert_eq!(codec.verify(&token), Err(TokenError::Expired));
   }

   #[test]
   fn test_別のシークレットで署名されたトークンは署名エラーになる() {
      let issuer = HmacJwtCodec::new(b"another-secret");
      let verifier = HmacJwtCodec::new(SECRET);

      let token = issuer.issue(&valid_claims()).unwrap();

      assert_eq!(verifier.verify(&token), Err(TokenError::InvalidSignature));
   }

   #[test]
   fn test_jwtでない文字列は形式エラーになる() {
      let codec = HmacJwtCodec::new(SECRET);

      assert!(matches!(
         codec.verify("not-a-jwt"),
         Err(TokenError::Malformed(_))
      ));
   }

   #[test]
   fn test_改ざんされたペイロードは拒否される() {
      let codec = HmacJwtCodec::new(SECRET);
      let token = codec.issue(&valid_claims()).unwrap();
      let forged = codec
         .issue(&Claims::new("admin", Utc::now(), Duration::hours(1)))
         .unwrap();

      // 元のヘッダーと署名に別のペイロードを差し込む
      let parts: Vec<&str> = token.split('.').collect();
      let forged_payload = forged.split('.').nth(1).unwrap();
      let tampered = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

      assert_eq!(codec.verify(&tampered), Err(TokenError::InvalidSignature));
   }
}
