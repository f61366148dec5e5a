//! 会話メッセージの型と正規化
//!
//! リクエストから来る `{content?, role?}` は検証されていない JSON なので、
//! モデルへ渡す前に必ず [`normalize`] を通す。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display};

/// `content` が欠けていたときの置き換え文字列
pub const MISSING_MESSAGE: &str = "MISSING MESSAGE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Function,
}

impl Role {
    /// 未知のロール名は `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "function" => Some(Role::Function),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Function => "function",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 呼び出し元から受け取ったままのメッセージ
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawMessage {
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub role: Option<Value>,
}

impl RawMessage {
    /// ロールが文字列 "user" と一致するか
    pub fn is_user(&self) -> bool {
        matches!(&self.role, Some(Value::String(r)) if r == "user")
    }
}

/// モデル呼び出しに渡せる状態になったメッセージ。一度作ったら変更しない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), name: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// ツール結果を運ぶ function ロールのメッセージ
    pub fn function(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: Role::Function, content: content.into(), name: Some(name.into()) }
    }
}

/// 生メッセージ列を正規化する。失敗しない。順序は保持。
/// - content が無い/null/空文字/`false`/`0` → [`MISSING_MESSAGE`]
/// - それ以外の文字列でない値 (数値・`true`・配列・オブジェクト) は JSON 表記の文字列にする
/// - role が無い/空/未知 → assistant
pub fn normalize(raw: &[RawMessage]) -> Vec<ConversationMessage> {
    raw.iter().map(normalize_one).collect()
}

fn normalize_one(raw: &RawMessage) -> ConversationMessage {
    let content = match &raw.content {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        None | Some(Value::Null) | Some(Value::String(_)) | Some(Value::Bool(false)) => MISSING_MESSAGE.to_string(),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => MISSING_MESSAGE.to_string(),
        Some(other) => other.to_string(),
    };
    let role = match &raw.role {
        Some(Value::String(r)) => Role::parse(r).unwrap_or_else(|| {
            if !r.is_empty() {
                tracing::debug!(target: "chat_service", role = %r, "unknown role; defaulting to assistant");
            }
            Role::Assistant
        }),
        _ => Role::Assistant,
    };
    ConversationMessage { role, content, name: None }
}

/// 生メッセージの中で最後の user メッセージの本文 (ログ用)
pub fn latest_user_prompt(raw: &[RawMessage]) -> Option<String> {
    raw.iter()
        .rev()
        .find(|m| m.is_user())
        .map(|m| match &m.content {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        })
}
