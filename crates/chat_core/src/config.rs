//! アプリケーション設定と定数
//!
//! 起動時に一度だけ環境変数から組み立て、以降は不変値として共有する。

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use color_eyre::eyre::{eyre, Result, WrapErr};

/// ChatCompletion 用のデフォルトモデル
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4-1106-preview";
/// 画像生成用のデフォルトモデル
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";

/// OpenAI 関連の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAIConfig {
    /// ChatCompletion モデル名
    pub model: String,
    /// 画像生成モデル名
    pub image_model: String,
    /// 未指定なら async-openai が `OPENAI_API_KEY` を読む
    pub api_key: Option<String>,
    /// OpenAI 互換 API のベース URL (テスト用サーバなど)
    pub api_base: Option<String>,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_CHAT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            api_key: None,
            api_base: None,
        }
    }
}

/// 画像の保存先と公開URLに関する設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// SQLite ファイルのパス
    pub database_path: PathBuf,
    /// 保存キーを後ろに連結して公開URLにする
    pub public_base_url: String,
    /// アップロードの総試行回数
    pub upload_max_attempts: u32,
    /// 試行間の固定待ち時間
    pub upload_retry_delay: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("chat_worker.sqlite"),
            public_base_url: "http://localhost:3000/?key=".to_string(),
            upload_max_attempts: 3,
            upload_retry_delay: Duration::from_millis(1000),
        }
    }
}

/// Webサイト読み込みツールが失敗したときの扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WebsiteFailureMode {
    /// リクエスト全体を失敗させる
    #[default]
    Fail,
    /// プレースホルダ文言を返して完了させる
    Degrade,
}

impl FromStr for WebsiteFailureMode {
    type Err = color_eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "degrade" => Ok(Self::Degrade),
            other => Err(eyre!("unknown website failure mode: {other} (expected fail|degrade)")),
        }
    }
}

/// ディスパッチ時の失敗ポリシー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchPolicy {
    pub website_failure: WebsiteFailureMode,
    /// true なら未知のツール呼び出しを `UnknownTool` エラーにする
    pub reject_unknown_tools: bool,
}

/// アプリケーション設定
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub openai: OpenAIConfig,
    pub storage: StorageConfig,
    pub policy: DispatchPolicy,
}

impl AppConfig {
    /// 環境変数から設定を構築 (未設定の項目はデフォルト)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意のキー参照関数から設定を構築する。テストでは HashMap を渡す。
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut cfg = AppConfig::default();

        if let Some(v) = get("CHAT_MODEL") { cfg.openai.model = v; }
        if let Some(v) = get("IMAGE_MODEL") { cfg.openai.image_model = v; }
        cfg.openai.api_key = get("OPENAI_API_KEY");
        cfg.openai.api_base = get("OPENAI_API_BASE");

        if let Some(v) = get("DATABASE_PATH") { cfg.storage.database_path = PathBuf::from(v); }
        if let Some(v) = get("PUBLIC_BASE_URL") { cfg.storage.public_base_url = v; }
        if let Some(v) = get("UPLOAD_MAX_ATTEMPTS") {
            let attempts: u32 = v.trim().parse().wrap_err("parsing UPLOAD_MAX_ATTEMPTS")?;
            if attempts == 0 {
                return Err(eyre!("UPLOAD_MAX_ATTEMPTS must be at least 1"));
            }
            cfg.storage.upload_max_attempts = attempts;
        }
        if let Some(v) = get("UPLOAD_RETRY_DELAY_MS") {
            let ms: u64 = v.trim().parse().wrap_err("parsing UPLOAD_RETRY_DELAY_MS")?;
            cfg.storage.upload_retry_delay = Duration::from_millis(ms);
        }

        if let Some(v) = get("WEBSITE_FAILURE_MODE") {
            cfg.policy.website_failure = v.parse()?;
        }
        if let Some(v) = get("REJECT_UNKNOWN_TOOLS") {
            cfg.policy.reject_unknown_tools = parse_flag(&v)
                .ok_or_else(|| eyre!("REJECT_UNKNOWN_TOOLS must be a boolean, got {v}"))?;
        }

        Ok(cfg)
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
