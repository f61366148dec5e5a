//! ルーター共有の状態とサーバ設定

use std::path::PathBuf;
use std::sync::Arc;

use chat_core::blob::BlobStore;
use chat_core::ChatService;
use color_eyre::Result;

/// ハンドラ間で共有する状態
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub blobs: Arc<dyn BlobStore>,
    /// 設定されていれば POST / で要求する
    pub api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(chat: Arc<ChatService>, blobs: Arc<dyn BlobStore>, api_key: Option<String>) -> Self {
        Self { chat, blobs, api_key: api_key.map(Arc::from) }
    }
}

/// HTTP サーバの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub api_key: Option<String>,
    /// 指定時は日次ローテーションのログファイルも出す
    pub log_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_addr: "0.0.0.0:3000".to_string(), api_key: None, log_dir: None }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = Self::default();
        if let Some(v) = get("BIND_ADDR") { cfg.bind_addr = v; }
        cfg.api_key = get("API_KEY");
        cfg.log_dir = get("LOG_DIR").map(PathBuf::from);
        Ok(cfg)
    }
}
