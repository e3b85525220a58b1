//! # Encore ドメイン層
//!
//! フロントエンドとゲートウェイが共有する、I/O を持たない純粋なモデルを定義する。
//!
//! ## モジュール構成
//!
//! - [`client_route`] - URL パスから描画するページを決めるクライアントルーター
//! - [`token_store`] - クライアント側に永続化されるセッショントークン
//! - [`resource`] - ゲートウェイが公開する API リソースの一覧
//! - [`session`] - JWT クレームと認証済みユーザー、Bearer ヘッダーの解釈
//! - [`clock`] - 時刻プロバイダ（テストで固定時刻を注入するため）
//!
//! ## 依存関係
//!
//! ```text
//! api → infra → domain
//!   ↘           ↗
//!      shared
//! ```
//!
//! ドメイン層はインフラ層に依存しない。

pub mod client_route;
pub mod clock;
pub mod resource;
pub mod session;
pub mod token_store;
