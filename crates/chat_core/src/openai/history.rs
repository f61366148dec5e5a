use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestFunctionMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs,
};

use crate::message::{ConversationMessage, Role};

/// function メッセージに名前が無いときに使う名前
const FALLBACK_FUNCTION_NAME: &str = "function";

/// Builds the request-side message list for one ChatCompletion call.
/// Wraps a `Vec<ChatCompletionRequestMessage>`; push order == send order.
#[derive(Debug, Default, Clone)]
pub struct ConversationHistory {
    messages: Vec<ChatCompletionRequestMessage>,
}

impl ConversationHistory {
    /// Create empty history.
    pub fn new() -> Self { Self { messages: Vec::new() } }

    /// Convert normalized messages in order.
    pub fn from_messages(messages: &[ConversationMessage]) -> Result<Self, OpenAIError> {
        let mut history = Self::new();
        for m in messages {
            history.push_message(m)?;
        }
        Ok(history)
    }

    /// Current length.
    pub fn len(&self) -> usize { self.messages.len() }
    /// Is empty.
    pub fn is_empty(&self) -> bool { self.messages.is_empty() }

    pub fn as_slice(&self) -> &[ChatCompletionRequestMessage] { &self.messages }

    /// Consume and return inner vector.
    pub fn into_vec(self) -> Vec<ChatCompletionRequestMessage> { self.messages }

    /// Convert one normalized message and append it.
    pub fn push_message(&mut self, m: &ConversationMessage) -> Result<&mut Self, OpenAIError> {
        let msg: ChatCompletionRequestMessage = match m.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(m.content.as_str())
                .build()?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(m.content.as_str())
                .build()?
                .into(),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(m.content.as_str())
                .build()?
                .into(),
            Role::Function => ChatCompletionRequestFunctionMessageArgs::default()
                .name(m.name.as_deref().unwrap_or(FALLBACK_FUNCTION_NAME))
                .content(m.content.as_str())
                .build()?
                .into(),
        };
        self.messages.push(msg);
        Ok(self)
    }
}
