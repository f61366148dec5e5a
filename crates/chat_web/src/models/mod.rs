use chat_core::RawMessage;
use serde::{Deserialize, Serialize};

/// POST / のリクエストボディ
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<RawMessage>,
    /// `messages` が空のときだけ単一の user メッセージとして使う
    #[serde(default)]
    pub prompt: Option<String>,
}

impl ChatRequest {
    /// ディスパッチに渡すメッセージ列。どちらも無ければ None。
    pub fn into_messages(self) -> Option<Vec<RawMessage>> {
        if !self.messages.is_empty() {
            return Some(self.messages);
        }
        self.prompt.filter(|p| !p.is_empty()).map(|prompt| {
            vec![RawMessage {
                content: Some(serde_json::Value::String(prompt)),
                role: Some(serde_json::Value::String("user".into())),
            }]
        })
    }
}

/// GET /?key=
#[derive(Debug, Default, Deserialize)]
pub struct ImageQuery {
    pub key: Option<String>,
}

/// エラーレスポンス
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}
