//! ChatService
//!
//! 1リクエスト分の処理: 受け取ったメッセージの正規化 → ディスパッチ → やり取りの記録。
//! Web層からはこの型だけを呼ぶ。

use std::sync::Arc;

use tracing::{info, instrument};

use crate::blob::BlobUploader;
use crate::config::AppConfig;
use crate::error::DispatchError;
use crate::message::{latest_user_prompt, normalize, RawMessage};
use crate::openai::call::ToolDispatcher;
use crate::openai::tools::ToolCatalogue;
use crate::openai::OpenAIChatModel;
use crate::sqlite::{MessageLog, SharedDb, SqliteBlobStore};

/// 最終テキストが空のときにログへ残す値
pub const NO_OUTPUT: &str = "NO OUTPUT";

/// チャットサービス
pub struct ChatService {
    dispatcher: ToolDispatcher,
    log: Option<MessageLog>,
}

impl ChatService {
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self { dispatcher, log: None }
    }

    /// やり取りの記録先を付ける
    pub fn with_log(mut self, log: MessageLog) -> Self {
        self.log = Some(log);
        self
    }

    /// 設定と共有DBから本番用の構成を組み立てる
    pub fn from_config(config: &AppConfig, db: SharedDb) -> Self {
        let model = Arc::new(OpenAIChatModel::new(config.openai.clone()));
        let store = Arc::new(SqliteBlobStore::new(db.clone()));
        let uploader = BlobUploader::from_config(store, &config.storage);
        let dispatcher = ToolDispatcher::new(model, uploader)
            .with_catalogue(Arc::new(ToolCatalogue::standard()))
            .with_policy(config.policy);
        Self::new(dispatcher).with_log(MessageLog::new(db))
    }

    /// 生のメッセージ列から最終テキストを得る。
    /// 成功時のみ、最新の user メッセージと結果を記録する (記録の失敗は無視)。
    ///
    /// # Arguments
    /// * `raw` - リクエストで受け取った未検証のメッセージ列
    /// * `client_ip` - 記録用のクライアントIP
    #[instrument(name = "chat_service_respond", skip(self, raw), fields(messages = raw.len()))]
    pub async fn respond(&self, raw: &[RawMessage], client_ip: Option<&str>) -> Result<String, DispatchError> {
        let conversation = normalize(raw);
        let output = self.dispatcher.dispatch(&conversation).await?;
        info!(target: "chat_service", output_len = output.len(), "response ready");

        if let Some(log) = &self.log {
            let prompt = latest_user_prompt(raw).unwrap_or_default();
            let result = if output.is_empty() { NO_OUTPUT } else { output.as_str() };
            log.record(client_ip.unwrap_or_default(), &prompt, result).await;
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::call::CompletionChoice;
    use crate::openai::mock::MockChatModel;
    use crate::sqlite::Db;
    use serde_json::json;

    fn raw(v: serde_json::Value) -> Vec<RawMessage> {
        serde_json::from_value(v).unwrap()
    }

    fn service(model: MockChatModel) -> (ChatService, MessageLog) {
        let db = Db::in_memory().unwrap().into_shared();
        let uploader = BlobUploader::new(Arc::new(SqliteBlobStore::new(db.clone())), "http://localhost:3000/?key=");
        let log = MessageLog::new(db);
        (ChatService::new(ToolDispatcher::new(Arc::new(model), uploader)).with_log(log.clone()), log)
    }

    #[tokio::test]
    async fn records_latest_user_prompt_and_result() {
        let (svc, log) = service(MockChatModel::new(vec![CompletionChoice::text("Paris")]));
        let msgs = raw(json!([
            {"role": "user", "content": "hello"},
            {"role": "assistant", "content": "hi"},
            {"role": "user", "content": "capital of France?"}
        ]));
        let out = svc.respond(&msgs, Some("198.51.100.4")).await.unwrap();
        assert_eq!(out, "Paris");
        let rows = log.recent(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].ip.as_str(), rows[0].prompt.as_str(), rows[0].result.as_str()), ("198.51.100.4", "capital of France?", "Paris"));
    }

    #[tokio::test]
    async fn empty_output_is_logged_as_no_output() {
        let (svc, log) = service(MockChatModel::new(vec![CompletionChoice::text("")]));
        let out = svc.respond(&raw(json!([{"role": "user", "content": "?"}])), None).await.unwrap();
        assert_eq!(out, "");
        assert_eq!(log.recent(1).await.unwrap()[0].result, NO_OUTPUT);
    }

    #[tokio::test]
    async fn failures_are_not_logged() {
        let (svc, log) = service(MockChatModel::default());
        let err = svc.respond(&raw(json!([{"content": "x"}])), None).await.unwrap_err();
        assert!(matches!(err, DispatchError::NoCompletion));
        assert!(log.recent(10).await.unwrap().is_empty());
    }
}
