//! 言語モデルサービスとの境界
//!
//! ディスパッチャは [`ChatModel`] トレイト越しにしかモデルを呼ばないので、
//! テストではスクリプト化したモックに差し替えられる。

use async_openai::config::OpenAIConfig as ApiConfig;
use async_openai::types::{CreateImageRequestArgs, Image, ImageModel};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::config::OpenAIConfig;
use crate::error::DispatchError;
use crate::message::ConversationMessage;
use crate::openai::call::request::{build_chat_request, parse_first_choice};
use crate::openai::call::types::CompletionChoice;
use crate::openai::tools::ToolDeclaration;
use crate::openai::ConversationHistory;

/// 画像生成APIが返した候補1件
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeneratedImage {
    /// プロバイダ側でホストされる期限付きURL
    pub url: Option<String>,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// 会話とツール宣言を送り、候補を1件受け取る。
    /// 候補が無い/本文もツール呼び出しも無い場合は `NoCompletion`。
    async fn complete(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolDeclaration],
    ) -> Result<CompletionChoice, DispatchError>;

    /// プロンプトから画像を1枚生成する
    async fn generate_image(&self, prompt: &str) -> Result<Vec<GeneratedImage>, DispatchError>;
}

/// async-openai を使った本番用の実装
pub struct OpenAIChatModel {
    client: Client<ApiConfig>,
    config: OpenAIConfig,
}

impl OpenAIChatModel {
    pub fn new(config: OpenAIConfig) -> Self {
        let mut api = ApiConfig::new();
        if let Some(key) = &config.api_key {
            api = api.with_api_key(key.as_str());
        }
        if let Some(base) = &config.api_base {
            api = api.with_api_base(base.as_str());
        }
        Self { client: Client::with_config(api), config }
    }

    fn image_model(&self) -> ImageModel {
        match self.config.image_model.as_str() {
            "dall-e-2" => ImageModel::DallE2,
            "dall-e-3" => ImageModel::DallE3,
            other => ImageModel::Other(other.to_string()),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    #[instrument(name = "chat_complete", skip(self, messages, tools), fields(messages = messages.len(), tools = tools.len()))]
    async fn complete(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolDeclaration],
    ) -> Result<CompletionChoice, DispatchError> {
        let history = ConversationHistory::from_messages(messages)?;
        let req = build_chat_request(history, tools, &self.config)?;

        info!(target: "openai", "chat_completion_request: model={}, tools={}", self.config.model, tools.len());
        let resp = self.client.chat().create(req).await?;
        parse_first_choice(resp)
    }

    #[instrument(name = "generate_image", skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn generate_image(&self, prompt: &str) -> Result<Vec<GeneratedImage>, DispatchError> {
        let req = CreateImageRequestArgs::default()
            .prompt(prompt)
            .model(self.image_model())
            .n(1)
            .build()?;

        info!(target: "openai", "image_request: model={}", self.config.image_model);
        let resp = self.client.images().create(req).await?;
        debug!(target: "openai", candidates = resp.data.len(), "image_response");

        let images = resp
            .data
            .iter()
            .map(|img| match img.as_ref() {
                Image::Url { url, .. } => GeneratedImage { url: Some(url.clone()) },
                // URL 形式以外は後段で扱えないので url なしとして返す
                Image::B64Json { .. } => GeneratedImage { url: None },
            })
            .collect();
        Ok(images)
    }
}
