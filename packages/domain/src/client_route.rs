//! # クライアントルーター
//!
//! SPA の URL パスから描画するページを決定する。
//!
//! ## ルート構成
//!
//! ```text
//! /login, /register, /forgot-password, /reset-password   公開（レイアウトなし）
//! /                                                       レイアウト（要トークン）
//! ├── (index)                  Dashboard
//! ├── {section}                {Section}List
//! ├── {section}/new            {Section}Form
//! ├── {section}/:id            {Section}Detail
//! ├── {section}/:id/edit       {Section}Form
//! ├── analytics                Analytics
//! ├── settings                 Settings
//! └── profile                  Profile
//! ```
//!
//! `{section}` は venues / contacts / performances / communications / contracts / payments。
//!
//! ## ガード
//!
//! 公開ルート以外はトークンの存在を確認し、無ければ `/login` へ履歴を置き換えて
//! リダイレクトする。判定はローカル状態と URL だけで行い、サーバーへ問い合わせない。
//! どのルートにも一致しないパスは [`RouteDecision::NotFound`] になる。
//!
//! ## パスの正規化
//!
//! - クエリ文字列とフラグメントは無視する
//! - 空セグメント（`//`、末尾の `/`）は無視する
//! - 静的セグメントは大文字小文字を区別しない
//! - `new` は `:id` より優先される
//! - `:id` はパーセントデコードし、大文字小文字を保持する

use std::fmt;

use crate::token_store::{TOKEN_STORAGE_KEY, TokenStore, has_session_token};

/// ログインページのパス（ガードのリダイレクト先）
pub const LOGIN_PATH: &str = "/login";

/// レイアウト配下のリソースセクション
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
   Venues,
   Contacts,
   Performances,
   Communications,
   Contracts,
   Payments,
}

impl Section {
   pub const ALL: [Section; 6] = [
      Section::Venues,
      Section::Contacts,
      Section::Performances,
      Section::Communications,
      Section::Contracts,
      Section::Payments,
   ];

   /// URL セグメント
   pub fn slug(self) -> &'static str {
      match self {
         Section::Venues => "venues",
         Section::Contacts => "contacts",
         Section::Performances => "performances",
         Section::Communications => "communications",
         Section::Contracts => "contracts",
         Section::Payments => "payments",
      }
   }

   /// コンポーネント名の接頭辞（例: `Venue` → `VenueList`）
   pub fn component_prefix(self) -> &'static str {
      match self {
         Section::Venues => "Venue",
         Section::Contacts => "Contact",
         Section::Performances => "Performance",
         Section::Communications => "Communication",
         Section::Contracts => "Contract",
         Section::Payments => "Payment",
      }
   }

   fn from_slug(slug: &str) -> Option<Self> {
      Self::ALL.into_iter().find(|s| s.slug() == slug)
   }
}

/// 認証前に表示するページ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthPage {
   Login,
   Register,
   ForgotPassword,
   ResetPassword,
}

impl AuthPage {
   pub const ALL: [AuthPage; 4] = [
      AuthPage::Login,
      AuthPage::Register,
      AuthPage::ForgotPassword,
      AuthPage::ResetPassword,
   ];

   pub fn path(self) -> &'static str {
      match self {
         AuthPage::Login => LOGIN_PATH,
         AuthPage::Register => "/register",
         AuthPage::ForgotPassword => "/forgot-password",
         AuthPage::ResetPassword => "/reset-password",
      }
   }
}

/// 描画対象のページ
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
   Auth(AuthPage),
   Dashboard,
   SectionList(Section),
   SectionNew(Section),
   SectionDetail { section: Section, id: String },
   SectionEdit { section: Section, id: String },
   Analytics,
   Settings,
   Profile,
}

impl Page {
   /// トークン無しで描画できるページか
   pub fn is_public(&self) -> bool {
      matches!(self, Page::Auth(_))
   }

   /// 描画するコンポーネント名
   ///
   /// 作成と編集は同じフォームコンポーネントを共有する。
   pub fn component_name(&self) -> String {
      match self {
         Page::Auth(AuthPage::Login) => "Login".to_string(),
         Page::Auth(AuthPage::Register) => "Register".to_string(),
         Page::Auth(AuthPage::ForgotPassword) => "ForgotPassword".to_string(),
         Page::Auth(AuthPage::ResetPassword) => "ResetPassword".to_string(),
         Page::Dashboard => "Dashboard".to_string(),
         Page::SectionList(section) => format!("{}List", section.component_prefix()),
         Page::SectionNew(section) | Page::SectionEdit { section, .. } => {
            format!("{}Form", section.component_prefix())
         }
         Page::SectionDetail { section, .. } => format!("{}Detail", section.component_prefix()),
         Page::Analytics => "Analytics".to_string(),
         Page::Settings => "Settings".to_string(),
         Page::Profile => "Profile".to_string(),
      }
   }
}

impl fmt::Display for Page {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(&self.component_name())
   }
}

/// ページを包む外枠
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
   /// 外枠なし（公開ページ、Not Found）
   Bare,
   /// ナビゲーション付きの共有レイアウト
   Layout,
}

/// ルーティング判定の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
   Render { page: Page, shell: Shell },
   /// `replace` が true の場合は履歴を積まずに置き換える
   Redirect { to: &'static str, replace: bool },
   NotFound,
}

/// パスに一致するページを返す（ガードは適用しない）
pub fn match_path(path: &str) -> Option<Page> {
   let path = path.split(['?', '#']).next().unwrap_or_default();
   let raw: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
   let lowered: Vec<String> = raw.iter().map(|s| s.to_ascii_lowercase()).collect();
   let segments: Vec<&str> = lowered.iter().map(String::as_str).collect();

   match segments.as_slice() {
      [] => Some(Page::Dashboard),
      ["login"] => Some(Page::Auth(AuthPage::Login)),
      ["register"] => Some(Page::Auth(AuthPage::Register)),
      ["forgot-password"] => Some(Page::Auth(AuthPage::ForgotPassword)),
      ["reset-password"] => Some(Page::Auth(AuthPage::ResetPassword)),
      ["analytics"] => Some(Page::Analytics),
      ["settings"] => Some(Page::Settings),
      ["profile"] => Some(Page::Profile),
      [slug] => Section::from_slug(slug).map(Page::SectionList),
      [slug, "new"] => Section::from_slug(slug).map(Page::SectionNew),
      [slug, _] => Section::from_slug(slug).map(|section| Page::SectionDetail {
         section,
         id: decode_param(raw[1]),
      }),
      [slug, _, "edit"] => Section::from_slug(slug).map(|section| Page::SectionEdit {
         section,
         id: decode_param(raw[1]),
      }),
      _ => None,
   }
}

/// パスとトークンの有無から描画内容を決定する
pub fn resolve(path: &str, token_present: bool) -> RouteDecision {
   match match_path(path) {
      None => RouteDecision::NotFound,
      Some(page) if page.is_public() => RouteDecision::Render {
         page,
         shell: Shell::Bare,
      },
      Some(_) if !token_present => RouteDecision::Redirect {
         to:      LOGIN_PATH,
         replace: true,
      },
      Some(page) => RouteDecision::Render {
         page,
         shell: Shell::Layout,
      },
   }
}

/// ルートテーブルに定義されたパスパターン（定義順）
pub fn route_patterns() -> Vec<String> {
   let mut patterns: Vec<String> = AuthPage::ALL
      .into_iter()
      .map(|p| p.path().to_string())
      .collect();
   patterns.push("/".to_string());
   for section in Section::ALL {
      let slug = section.slug();
      patterns.push(format!("/{slug}"));
      patterns.push(format!("/{slug}/new"));
      patterns.push(format!("/{slug}/:id"));
      patterns.push(format!("/{slug}/:id/edit"));
   }
   patterns.extend(["/analytics", "/settings", "/profile"].map(String::from));
   patterns
}

fn decode_param(raw: &str) -> String {
   urlencoding::decode(raw)
      .map(|s| s.into_owned())
      .unwrap_or_else(|_| raw.to_string())
}

/// トークンストアを伴うクライアントセッション
///
/// ログインでトークンを保存し、ログアウトで削除する。
/// ルーティング判定はストア内のトークンの有無だけを参照する。
#[derive(Debug, Default)]
pub struct ClientSession<S: TokenStore> {
   store: S,
}

impl<S: TokenStore> ClientSession<S> {
   pub fn new(store: S) -> Self {
      Self { store }
   }

   /// ログイン成功時に受け取ったトークンを保存する
   pub fn login(&mut self, token: impl Into<String>) {
      self.store.set_item(TOKEN_STORAGE_KEY, token.into());
   }

   pub fn logout(&mut self) {
      self.store.remove_item(TOKEN_STORAGE_KEY);
   }

   pub fn has_token(&self) -> bool {
      has_session_token(&self.store)
   }

   pub fn resolve(&self, path: &str) -> RouteDecision {
      resolve(path, self.has_token())
   }
}
