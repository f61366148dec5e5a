//! chat_core
//!
//! チャットメッセージをモデルの応答に変換するコアクレート。
//! ツール呼び出し (Webサイト読み取り / 画像生成) のディスパッチ、テキスト抽出、
//! blob 保存のリトライ、SQLite による保存と記録を提供する。Web層から利用される。

pub mod blob;
pub mod config;
pub mod error;
pub mod extract; // HTML -> flattened text
pub mod message;
pub mod openai;
pub mod services;
pub mod sqlite;

// 主要な型を再エクスポート
pub use config::{AppConfig, DispatchPolicy, OpenAIConfig, StorageConfig, WebsiteFailureMode};
pub use error::DispatchError;
pub use message::{ConversationMessage, RawMessage, Role};
pub use openai::call::ToolDispatcher;
pub use services::ChatService;
pub use sqlite::Db;

// Ensure .env is loaded for tests before anything else runs in the test process.
#[cfg(test)]
#[ctor::ctor]
fn load_dotenv_for_tests() {
    let _ = dotenvy::dotenv();
}
