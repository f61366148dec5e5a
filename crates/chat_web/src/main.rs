use std::path::Path;
use std::sync::Arc;

use chat_core::sqlite::SqliteBlobStore;
use chat_core::{AppConfig, ChatService, Db};
use chat_web::{build_router, AppState, ServerConfig};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // エラーハンドリングの初期化
    color_eyre::install()?;

    // 環境変数のロード
    dotenvy::dotenv().ok();

    let server = ServerConfig::from_env()?;
    // guard はプロセス終了までファイル出力を保持する
    let _guard = init_tracing(server.log_dir.as_deref());

    let config = AppConfig::from_env()?;
    tracing::info!(
        target: "chat_web",
        model = %config.openai.model,
        image_model = %config.openai.image_model,
        db = %config.storage.database_path.display(),
        "Starting chat worker..."
    );

    let db = Db::open_or_create(&config.storage.database_path)
        .wrap_err_with(|| format!("opening {}", config.storage.database_path.display()))?
        .into_shared();
    let chat = Arc::new(ChatService::from_config(&config, db.clone()));
    let blobs = Arc::new(SqliteBlobStore::new(db));
    let app = build_router(AppState::new(chat, blobs, server.api_key.clone()));

    let listener = tokio::net::TcpListener::bind(&server.bind_addr)
        .await
        .wrap_err_with(|| format!("binding {}", server.bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!(target: "chat_web", auth = server.api_key.is_some(), "Server running on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// 標準出力 + (LOG_DIR 指定時) 日次ローテーションのファイル
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,chat_web=debug"));
    let stdout_layer = fmt::layer().with_target(true);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let (nb, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "chat_worker.log"));
            (Some(fmt::layer().with_ansi(false).with_target(true).with_writer(nb)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
    guard
}
