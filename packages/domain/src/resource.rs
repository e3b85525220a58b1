//! # API リソース
//!
//! ゲートウェイが `/api` 配下に公開するリソースの一覧。
//!
//! ## 認証要否
//!
//! | パス | 認証 |
//! |------|------|
//! | `/api/auth` | 不要（ログイン・登録・パスワード再設定） |
//! | `/api/health` | 不要 |
//! | 下表の各リソース | Bearer JWT 必須 |
//!
//! 認証不要のパスは [`ApiResource`] に含めない。ここに列挙されるものは
//! すべて JWT ゲートの内側にマウントされる。

use std::fmt;

/// JWT ゲートの内側に置かれる API リソース
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApiResource {
   Users,
   Venues,
   Contacts,
   Performances,
   Communications,
   Contracts,
   Payments,
   Media,
   Reminders,
   Analytics,
}

impl ApiResource {
   /// 全リソース（マウント順）
   pub const ALL: [ApiResource; 10] = [
      ApiResource::Users,
      ApiResource::Venues,
      ApiResource::Contacts,
      ApiResource::Performances,
      ApiResource::Communications,
      ApiResource::Contracts,
      ApiResource::Payments,
      ApiResource::Media,
      ApiResource::Reminders,
      ApiResource::Analytics,
   ];

   /// URL 上のセグメント名
   pub fn segment(self) -> &'static str {
      match self {
         ApiResource::Users => "users",
         ApiResource::Venues => "venues",
         ApiResource::Contacts => "contacts",
         ApiResource::Performances => "performances",
         ApiResource::Communications => "communications",
         ApiResource::Contracts => "contracts",
         ApiResource::Payments => "payments",
         ApiResource::Media => "media",
         ApiResource::Reminders => "reminders",
         ApiResource::Analytics => "analytics",
      }
   }

   /// `/api` からの相対マウントパス（例: `/venues`）
   pub fn mount_path(self) -> String {
      format!("/{}", self.segment())
   }
}

impl fmt::Display for ApiResource {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(self.segment())
   }
}
