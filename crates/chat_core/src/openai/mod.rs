//! 言語モデルサービス連携
//!
//! - `tools`: ツール宣言とカタログ
//! - `history`: 会話メッセージを async-openai のリクエスト形式に変換
//! - `client`: [`ChatModel`] トレイトと async-openai 実装
//! - `call`: リクエスト組み立て、ツール解決、ディスパッチャ
//! - `mock`: テスト用のスクリプト化モデル

pub mod call;
pub mod client;
pub mod history;
pub mod mock;
pub mod tools;

pub use client::{ChatModel, GeneratedImage, OpenAIChatModel};
pub use history::ConversationHistory;
pub use tools::{ToolCatalogue, ToolDeclaration};
