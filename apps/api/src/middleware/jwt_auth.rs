//! # JWT ゲート
//!
//! 保護されたリソースルーターの手前で Bearer トークンを検証する。
//!
//! | 状況 | 結果 |
//! |------|------|
//! | `Authorization` が無い、または Bearer でない | 401 |
//! | トークンの署名不正・形式不正・期限切れ | 403 |
//! | 検証成功 | [`AuthenticatedUser`] を extensions に格納して次へ |
//!
//! ## 使い方
//!
//! ```rust,ignore
//! use axum::middleware::from_fn_with_state;
//!
//! let jwt_state = JwtState { verifier: verifier.clone() };
//!
//! Router::new()
//!     .route("/", post(create_venue))
//!     .layer(from_fn_with_state(jwt_state, require_jwt))
//! ```

use std::sync::Arc;

use axum::{
   extract::{FromRequestParts, Request, State},
   http::{header, request::Parts},
   middleware::Next,
   response::{IntoResponse, Response},
};
use encore_domain::session::{AuthenticatedUser, parse_bearer};
use encore_infra::TokenVerifier;

use crate::error::ApiError;

/// JWT ゲートの状態
#[derive(Clone)]
pub struct JwtState {
   pub verifier: Arc<dyn TokenVerifier>,
}

/// Bearer トークンを検証するミドルウェア
pub async fn require_jwt(State(state): State<JwtState>, mut request: Request, next: Next) -> Response {
   let token = request
      .headers()
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .and_then(parse_bearer);

   let Some(token) = token else {
      return ApiError::Unauthorized.into_response();
   };

   let claims = match state.verifier.verify(token) {
      Ok(claims) => claims,
      Err(e) => return ApiError::InvalidToken(e.to_string()).into_response(),
   };

   let user = AuthenticatedUser::from(claims);
   tracing::Span::current().record("user_id", user.user_id.as_str());
   tracing::debug!(user_id = %user.user_id, "トークンを検証しました");
   request.extensions_mut().insert(user);

   next.run(request).await
}

/// JWT ゲートを通過したユーザーを取り出す抽出子
///
/// ゲートの外側のルートで使うと 401 を返す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for CurrentUser
where
   S: Send + Sync,
{
   type Rejection = ApiError;

   async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
      parts
         .extensions
         .get::<AuthenticatedUser>()
         .cloned()
         .map(CurrentUser)
         .ok_or(ApiError::Unauthorized)
   }
}
