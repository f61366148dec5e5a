//! Blob ストアへのアップロード
//!
//! ストア本体は `put`/`get` だけの狭いインターフェース ([`BlobStore`]) として扱い、
//! リトライ方針とキー生成・公開URLの組み立ては [`BlobUploader`] が持つ。

use async_trait::async_trait;
use color_eyre::Result;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, instrument, warn};

use crate::config::StorageConfig;
use crate::error::DispatchError;

/// 保存したオブジェクトに付ける cache-control
pub const CACHE_CONTROL: &str = "public, max-age=31536000";

/// `put` 時のメタデータ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: String,
    pub cache_control: String,
}

/// `get` で取り出したオブジェクト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub data: Vec<u8>,
    pub content_type: String,
    pub cache_control: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// 同じキーへの再 put は上書き
    async fn put(&self, key: &str, data: &[u8], options: &PutOptions) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<StoredBlob>>;
}

/// リトライ間の待機。テストでは実時間を使わない実装に差し替える。
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// tokio のタイマーで待つ本番用実装
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// 固定間隔のリトライ方針 (指数バックオフ・ジッターなし)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 総試行回数 (1以上)
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), delay }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// アップロード成功時の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub key: String,
    pub url: String,
}

/// content-type に対応する拡張子
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type.split(';').next().unwrap_or("").trim() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// 時刻ベースの一意なキー。同一ミリ秒の衝突を避けるため短い乱数を足す。
pub fn generate_key(content_type: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let suffix: u16 = rand::thread_rng().gen();
    format!("image-{millis}-{suffix:04x}.{}", extension_for(content_type))
}

/// リトライ付きのアップロードクライアント
#[derive(Clone)]
pub struct BlobUploader {
    store: Arc<dyn BlobStore>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    public_base_url: String,
}

impl BlobUploader {
    pub fn new(store: Arc<dyn BlobStore>, public_base_url: impl Into<String>) -> Self {
        Self {
            store,
            sleeper: Arc::new(TokioSleeper),
            policy: RetryPolicy::default(),
            public_base_url: public_base_url.into(),
        }
    }

    /// 設定値からリトライ方針と公開URLを決める
    pub fn from_config(store: Arc<dyn BlobStore>, config: &StorageConfig) -> Self {
        Self::new(store, config.public_base_url.clone())
            .with_policy(RetryPolicy::new(config.upload_max_attempts, config.upload_retry_delay))
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// 公開URL = ベースURL + キー。存在確認はしない。
    pub fn public_url(&self, key: &str) -> String {
        format!("{}{}", self.public_base_url, key)
    }

    /// バイト列を保存して公開URLを返す。
    /// キーは呼び出しごとに1つだけ作り、リトライでは同じキーに上書きする。
    /// 全試行が失敗したら `UploadExhausted`。
    #[instrument(name = "blob_store", skip(self, data), fields(bytes = data.len()))]
    pub async fn store(&self, data: &[u8], content_type: &str) -> Result<UploadOutcome, DispatchError> {
        let key = generate_key(content_type);
        let options = PutOptions {
            content_type: content_type.to_string(),
            cache_control: CACHE_CONTROL.to_string(),
        };

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.store.put(&key, data, &options).await {
                Ok(()) => {
                    let url = self.public_url(&key);
                    info!(target: "blob", attempt, key = %key, url = %url, "uploaded");
                    return Ok(UploadOutcome { key, url });
                }
                Err(e) => {
                    warn!(target: "blob", attempt, key = %key, error = %e, "upload failed");
                    if attempt >= self.policy.max_attempts {
                        return Err(DispatchError::UploadExhausted { attempts: attempt, last_error: e.to_string() });
                    }
                    info!(target: "blob", delay_ms = self.policy.delay.as_millis() as u64, "retrying upload");
                    self.sleeper.sleep(self.policy.delay).await;
                }
            }
        }
    }
}
