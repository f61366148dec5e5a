//! ツール呼び出しオーケストレーションのエラー分類

use async_openai::error::OpenAIError;
use thiserror::Error;

/// ディスパッチ処理で発生しうるエラー。
/// 画像ツールの実行中に起きたものはプレースホルダ文言に落とされ、
/// それ以外はリクエスト単位の失敗としてそのまま呼び出し元へ返る。
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Invalid arguments for tool {tool}: {reason}")]
    InvalidToolArguments { tool: String, reason: String },

    #[error("No message returned from the model")]
    NoCompletion,

    #[error("Failed to upload after {attempts} attempts: {last_error}")]
    UploadExhausted { attempts: u32, last_error: String },

    #[error("Tool {tool} failed: {reason}")]
    ToolExecutionFailed { tool: String, reason: String },

    #[error("Image generation failed: {0}")]
    ImageGenerationFailed(String),

    #[error("Unknown tool requested: {0}")]
    UnknownTool(String),

    #[error("Chat completion request failed: {0}")]
    Completion(#[from] OpenAIError),
}

impl DispatchError {
    pub fn tool_failed(tool: &str, reason: impl ToString) -> Self {
        Self::ToolExecutionFailed { tool: tool.to_string(), reason: reason.to_string() }
    }
}
