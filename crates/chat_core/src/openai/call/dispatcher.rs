//! ツール呼び出しの2段階プロトコルを状態機械として実行する
//!
//! 1回目の ChatCompletion → ツール要求の解決 → ツール実行 →
//! (Webサイトなら) 2回目の ChatCompletion → 最終テキスト、の順に
//! [`DispatchState`] を1つずつ進める。遷移関数は状態ごとに1つ。

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::blob::BlobUploader;
use crate::config::{DispatchPolicy, WebsiteFailureMode};
use crate::error::DispatchError;
use crate::extract::extract_text;
use crate::message::ConversationMessage;
use crate::openai::client::ChatModel;
use crate::openai::tools::{ToolCatalogue, GENERATE_IMAGE, READ_WEBSITE_CONTENT};

use super::resolver::resolve_tool_call;
use super::types::{
    CompletionChoice, DispatchState, GenerateImageArgs, ReadWebsiteArgs, ToolCall, ToolInvocationRequest,
    ToolResolution, ToolResult,
};

/// 画像パイプラインが失敗したときに返す文言
pub const IMAGE_FALLBACK: &str = "Error generating image. Please try again.";
/// `WebsiteFailureMode::Degrade` のときに返す文言
pub const WEBSITE_FALLBACK: &str = "Error reading website content. Please try again.";
/// 生成画像を保存するときの content-type
pub const IMAGE_CONTENT_TYPE: &str = "image/png";

pub struct ToolDispatcher {
    model: Arc<dyn ChatModel>,
    http: reqwest::Client,
    uploader: BlobUploader,
    catalogue: Arc<ToolCatalogue>,
    policy: DispatchPolicy,
}

impl ToolDispatcher {
    pub fn new(model: Arc<dyn ChatModel>, uploader: BlobUploader) -> Self {
        Self {
            model,
            http: reqwest::Client::new(),
            uploader,
            catalogue: Arc::new(ToolCatalogue::standard()),
            policy: DispatchPolicy::default(),
        }
    }

    pub fn with_http(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_catalogue(mut self, catalogue: Arc<ToolCatalogue>) -> Self {
        self.catalogue = catalogue;
        self
    }

    pub fn with_policy(mut self, policy: DispatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 正規化済みの会話を受け取り、最終テキストを返す
    #[instrument(name = "dispatch", skip(self, conversation), fields(messages = conversation.len()))]
    pub async fn dispatch(&self, conversation: &[ConversationMessage]) -> Result<String, DispatchError> {
        let mut state = DispatchState::AwaitingFirstCompletion;
        loop {
            state = match self.step(conversation, state).await? {
                DispatchState::Done(text) => {
                    info!(target: "dispatch", output_len = text.len(), "dispatch finished");
                    return Ok(text);
                }
                next => next,
            };
        }
    }

    /// 状態を1つ進める。`Done` はそのまま返す。
    pub async fn step(
        &self,
        conversation: &[ConversationMessage],
        state: DispatchState,
    ) -> Result<DispatchState, DispatchError> {
        debug!(target: "dispatch", state = %state, "step");
        let label = state.to_string();
        let next = match state {
            DispatchState::AwaitingFirstCompletion => self.first_completion(conversation).await,
            DispatchState::NoTool { content } => Ok(DispatchState::Done(content)),
            DispatchState::ToolRequested { content, request } => self.resolve(content, request),
            DispatchState::ToolExecuting { content, call } => self.execute(content, call).await,
            DispatchState::AwaitingSecondCompletion { function_message } => {
                self.second_completion(conversation, function_message).await
            }
            DispatchState::Done(text) => Ok(DispatchState::Done(text)),
        };
        if let Err(e) = &next {
            error!(target: "dispatch", from = %label, error = %e, "dispatch errored");
        }
        next
    }

    async fn first_completion(&self, conversation: &[ConversationMessage]) -> Result<DispatchState, DispatchError> {
        let choice = self.model.complete(conversation, self.catalogue.as_slice()).await?;
        match choice {
            CompletionChoice { tool_call: Some(request), content } => {
                Ok(DispatchState::ToolRequested { content, request })
            }
            CompletionChoice { tool_call: None, content: Some(content) } => Ok(DispatchState::NoTool { content }),
            CompletionChoice { tool_call: None, content: None } => Err(DispatchError::NoCompletion),
        }
    }

    fn resolve(&self, content: Option<String>, request: ToolInvocationRequest) -> Result<DispatchState, DispatchError> {
        let resolution = resolve_tool_call(&request, &self.catalogue);
        debug!(target: "dispatch", resolution = %resolution, "tool call resolved");
        match resolution {
            ToolResolution::Resolved(call) => Ok(DispatchState::ToolExecuting { content, call }),
            ToolResolution::ArgumentsParseError { name, error, .. } => {
                Err(DispatchError::InvalidToolArguments { tool: name, reason: error })
            }
            ToolResolution::ToolNotFound { requested } => {
                if self.policy.reject_unknown_tools {
                    return Err(DispatchError::UnknownTool(requested));
                }
                warn!(target: "dispatch", tool = %requested, "unknown tool ignored, returning message content");
                Ok(DispatchState::Done(content.unwrap_or_default()))
            }
        }
    }

    async fn execute(&self, content: Option<String>, call: ToolCall) -> Result<DispatchState, DispatchError> {
        match call {
            ToolCall::ReadWebsite(args) => self.read_website(args).await,
            ToolCall::GenerateImage(args) => Ok(DispatchState::Done(self.generate_image(content, args).await)),
        }
    }

    async fn read_website(&self, args: ReadWebsiteArgs) -> Result<DispatchState, DispatchError> {
        let message = self.fetch_website(&args.url).await.and_then(|result| {
            result
                .into_function_message()
                .ok_or_else(|| DispatchError::tool_failed(READ_WEBSITE_CONTENT, "no function message produced"))
        });
        match (message, self.policy.website_failure) {
            (Ok(function_message), _) => Ok(DispatchState::AwaitingSecondCompletion { function_message }),
            (Err(e), WebsiteFailureMode::Fail) => Err(e),
            (Err(e), WebsiteFailureMode::Degrade) => {
                warn!(target: "dispatch", url = %args.url, error = %e, "website read failed, degrading");
                Ok(DispatchState::Done(WEBSITE_FALLBACK.to_string()))
            }
        }
    }

    #[instrument(name = "fetch_website", skip(self))]
    async fn fetch_website(&self, url: &str) -> Result<ToolResult, DispatchError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| DispatchError::tool_failed(READ_WEBSITE_CONTENT, e))?;
        let status = resp.status();
        if !status.is_success() {
            // エラーページも本文として読む
            warn!(target: "dispatch", %status, "website returned non-success status");
        }
        let body = resp.text().await.map_err(|e| DispatchError::tool_failed(READ_WEBSITE_CONTENT, e))?;
        let extracted_text = extract_text(&body);
        info!(target: "dispatch", body_len = body.len(), text_len = extracted_text.len(), "website read");
        Ok(ToolResult::Website { url: url.to_string(), extracted_text })
    }

    /// 画像パイプラインを実行し、最終テキストを返す。失敗は常に [`IMAGE_FALLBACK`] に落とす。
    async fn generate_image(&self, content: Option<String>, args: GenerateImageArgs) -> String {
        let existing = content.unwrap_or_default();
        let announced = self
            .image_pipeline(&args.prompt)
            .await
            .map(|result| result.into_announcement(&args.prompt, &existing));
        match announced {
            Ok(Some(text)) => text,
            Ok(None) => IMAGE_FALLBACK.to_string(),
            Err(e) => {
                warn!(target: "dispatch", error = %e, "image pipeline failed, returning fallback");
                IMAGE_FALLBACK.to_string()
            }
        }
    }

    #[instrument(name = "image_pipeline", skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn image_pipeline(&self, prompt: &str) -> Result<ToolResult, DispatchError> {
        let images = self.model.generate_image(prompt).await?;
        let source_url = images
            .into_iter()
            .filter_map(|img| img.url)
            .find(|url| !url.is_empty())
            .ok_or_else(|| DispatchError::ImageGenerationFailed("no image url returned".to_string()))?;

        let bytes = self
            .http
            .get(&source_url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| DispatchError::tool_failed(GENERATE_IMAGE, e))?
            .bytes()
            .await
            .map_err(|e| DispatchError::tool_failed(GENERATE_IMAGE, e))?;
        debug!(target: "dispatch", %source_url, bytes = bytes.len(), "generated image fetched");

        let outcome = self.uploader.store(&bytes, IMAGE_CONTENT_TYPE).await?;
        Ok(ToolResult::Image { stored_url: outcome.url })
    }

    /// 元の会話 + function メッセージで、ツール宣言なしの2回目を呼ぶ
    async fn second_completion(
        &self,
        conversation: &[ConversationMessage],
        function_message: ConversationMessage,
    ) -> Result<DispatchState, DispatchError> {
        let mut messages = conversation.to_vec();
        messages.push(function_message);
        let choice = self.model.complete(&messages, &[]).await?;
        choice.content.map(DispatchState::Done).ok_or(DispatchError::NoCompletion)
    }
}
