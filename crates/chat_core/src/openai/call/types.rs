use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use crate::message::ConversationMessage;

/// モデルが出してきたツール呼び出し要求。引数は未検証の JSON 文字列。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocationRequest {
    pub name: String,
    pub arguments: String,
}

/// 1回の ChatCompletion で得た候補 (常に1件だけ要求する)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompletionChoice {
    pub content: Option<String>,
    pub tool_call: Option<ToolInvocationRequest>,
}

impl CompletionChoice {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), tool_call: None }
    }

    pub fn tool_call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            content: None,
            tool_call: Some(ToolInvocationRequest { name: name.into(), arguments: arguments.into() }),
        }
    }

    /// ツール呼び出しと一緒に返ってきたテキストを付ける
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReadWebsiteArgs {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerateImageArgs {
    pub prompt: String,
    /// 受け取るだけで画像生成には渡していない
    #[serde(default)]
    pub size: Option<String>,
}

/// 引数のパースまで済んだ、実行可能なツール呼び出し
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    ReadWebsite(ReadWebsiteArgs),
    GenerateImage(GenerateImageArgs),
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::ReadWebsite(_) => crate::openai::tools::READ_WEBSITE_CONTENT,
            ToolCall::GenerateImage(_) => crate::openai::tools::GENERATE_IMAGE,
        }
    }
}

/// ツール呼び出し要求を解決した結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResolution {
    Resolved(ToolCall),
    ToolNotFound { requested: String },
    ArgumentsParseError { name: String, raw: String, error: String },
}

/// ツール実行の結果。2回目の ChatCompletion か本文への差し込みで一度だけ消費する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResult {
    Website { url: String, extracted_text: String },
    Image { stored_url: String },
}

/// function メッセージとしてモデルに渡す Webサイト内容 (キー順は固定)
#[derive(Debug, Serialize)]
struct WebsiteContent<'a> {
    website_body: &'a str,
    url: &'a str,
}

impl ToolResult {
    /// Webサイト結果を function ロールのメッセージに変換する。画像結果は None。
    pub fn into_function_message(self) -> Option<ConversationMessage> {
        match self {
            ToolResult::Website { url, extracted_text } => {
                let payload = WebsiteContent { website_body: &extracted_text, url: &url };
                // &str のみの構造体なのでシリアライズは失敗しない
                let json = serde_json::to_string(&payload).unwrap_or_default();
                Some(ConversationMessage::function(crate::openai::tools::READ_WEBSITE_CONTENT, json))
            }
            ToolResult::Image { .. } => None,
        }
    }

    /// 画像結果を既存のアシスタント本文の前に差し込む告知文に変換する。Webサイト結果は None。
    pub fn into_announcement(self, prompt: &str, existing: &str) -> Option<String> {
        match self {
            ToolResult::Image { stored_url } => Some(format!(
                "Prompt: {prompt}\n\n\nHere is your image:\n\n<p style=\"display: block; margin-bottom: 0.75rem\"><img src=\"{stored_url}\" alt=\"prompt generated image\" /></p>\n\n{existing}"
            )),
            ToolResult::Website { .. } => None,
        }
    }
}

/// ディスパッチャの状態。`Errored` は遷移関数が `Err` を返すことで表す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchState {
    AwaitingFirstCompletion,
    NoTool { content: String },
    ToolRequested { content: Option<String>, request: ToolInvocationRequest },
    ToolExecuting { content: Option<String>, call: ToolCall },
    AwaitingSecondCompletion { function_message: ConversationMessage },
    Done(String),
}

// ----- Display 実装 (ログで %display を使い、本文は長さだけ出す) -----
impl Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchState::AwaitingFirstCompletion => write!(f, "AwaitingFirstCompletion"),
            DispatchState::NoTool { content } => write!(f, "NoTool(len={})", content.len()),
            DispatchState::ToolRequested { request, .. } => {
                write!(f, "ToolRequested name={} args_len={}", request.name, request.arguments.len())
            }
            DispatchState::ToolExecuting { call, .. } => write!(f, "ToolExecuting name={}", call.name()),
            DispatchState::AwaitingSecondCompletion { function_message } => {
                write!(f, "AwaitingSecondCompletion payload_len={}", function_message.content.len())
            }
            DispatchState::Done(text) => write!(f, "Done(len={})", text.len()),
        }
    }
}

impl Display for ToolResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolResolution::Resolved(call) => write!(f, "Resolved name={}", call.name()),
            ToolResolution::ToolNotFound { requested } => write!(f, "ToolNotFound requested={}", requested),
            ToolResolution::ArgumentsParseError { name, raw, error } => {
                write!(f, "ArgumentsParseError name={} error={} raw_len={}", name, error, raw.len())
            }
        }
    }
}
