use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::DispatchError;
use crate::message::ConversationMessage;
use crate::openai::call::types::CompletionChoice;
use crate::openai::client::{ChatModel, GeneratedImage};
use crate::openai::tools::ToolDeclaration;

/// `complete` に渡された内容の記録
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCompletion {
    pub messages: Vec<ConversationMessage>,
    pub tool_names: Vec<String>,
}

/// A mock model that returns pre-configured responses for testing.
/// Responses are consumed front to back; running out yields `NoCompletion`.
#[derive(Default)]
pub struct MockChatModel {
    completions: Mutex<VecDeque<Result<CompletionChoice, DispatchError>>>,
    images: Mutex<VecDeque<Result<Vec<GeneratedImage>, DispatchError>>>,
    calls: Mutex<Vec<RecordedCompletion>>,
    image_prompts: Mutex<Vec<String>>,
}

impl MockChatModel {
    pub fn new(completions: Vec<CompletionChoice>) -> Self {
        let mock = Self::default();
        mock.push_completions(completions.into_iter().map(Ok));
        mock
    }

    pub fn push_completions(&self, items: impl IntoIterator<Item = Result<CompletionChoice, DispatchError>>) {
        if let Ok(mut q) = self.completions.lock() {
            q.extend(items);
        }
    }

    pub fn with_images(self, images: Vec<GeneratedImage>) -> Self {
        if let Ok(mut q) = self.images.lock() {
            q.push_back(Ok(images));
        }
        self
    }

    pub fn with_image_error(self, err: DispatchError) -> Self {
        if let Ok(mut q) = self.images.lock() {
            q.push_back(Err(err));
        }
        self
    }

    pub fn calls(&self) -> Vec<RecordedCompletion> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn image_prompts(&self) -> Vec<String> {
        self.image_prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn complete(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolDeclaration],
    ) -> Result<CompletionChoice, DispatchError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCompletion {
                messages: messages.to_vec(),
                tool_names: tools.iter().map(|t| t.name.to_string()).collect(),
            });
        }
        self.completions
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or(Err(DispatchError::NoCompletion))
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<GeneratedImage>, DispatchError> {
        if let Ok(mut p) = self.image_prompts.lock() {
            p.push(prompt.to_string());
        }
        self.images
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| Err(DispatchError::ImageGenerationFailed("no scripted image".into())))
    }
}
