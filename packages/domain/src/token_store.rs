//! # クライアント側トークンストア
//!
//! ブラウザの永続ストレージ（localStorage 相当）に保存されるセッショントークンを扱う。
//!
//! ## 存在チェックと検証の分離
//!
//! クライアントはトークンの「存在」だけを見て保護ページを描画するか決める。
//! 有効性の検証は一切行わない。これは描画の最適化であり、
//! アクセス制御はゲートウェイの JWT ゲートがリクエストごとに行う。

use std::collections::HashMap;

/// トークンを保存するキー
pub const TOKEN_STORAGE_KEY: &str = "token";

/// 文字列キー・文字列値の永続ストレージ
pub trait TokenStore {
   fn get_item(&self, key: &str) -> Option<String>;
   fn set_item(&mut self, key: &str, value: String);
   fn remove_item(&mut self, key: &str);
}

/// メモリ上の [`TokenStore`] 実装
#[derive(Debug, Default, Clone)]
pub struct MemoryTokenStore {
   items: HashMap<String, String>,
}

impl MemoryTokenStore {
   pub fn new() -> Self {
      Self::default()
   }
}

impl TokenStore for MemoryTokenStore {
   fn get_item(&self, key: &str) -> Option<String> {
      self.items.get(key).cloned()
   }

   fn set_item(&mut self, key: &str, value: String) {
      self.items.insert(key.to_string(), value);
   }

   fn remove_item(&mut self, key: &str) {
      self.items.remove(key);
   }
}

/// セッショントークンが存在するか
///
/// 空文字列は存在しないものとして扱う（ブラウザ側では falsy になるため）。
pub fn has_session_token(store: &dyn TokenStore) -> bool {
   store
      .get_item(TOKEN_STORAGE_KEY)
      .is_some_and(|token| !token.is_empty())
}
