#![allow(dead_code)]

use once_cell::sync::Lazy;
use std::sync::{Mutex, Once};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static START: Once = Once::new();
static GUARD: Lazy<Mutex<Option<WorkerGuard>>> = Lazy::new(|| Mutex::new(None));

/// テスト共通の初期化: .env 読み込みと tracing (stderr + 日次ローテーションのファイル)。
/// 何度呼んでもよい。
pub fn init() {
    START.call_once(|| {
        let _ = dotenvy::dotenv();
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new("info,chat_core=debug"))
            .expect("env filter");

        let file_appender = rolling::daily("logs", "chat_core_tests.log");
        let (file_nb, guard) = tracing_appender::non_blocking(file_appender);
        *GUARD.lock().unwrap() = Some(guard);

        let stderr_layer = fmt::layer().with_target(true).with_test_writer();
        let file_layer = fmt::layer().with_ansi(false).with_target(true).with_writer(file_nb);

        // 他のテストバイナリ側で初期化済みでも落ちないように try_init
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .with(file_layer)
            .try_init();

        tracing::info!(target: "test_init", "chat_core test tracing initialized");
    });
}

/// OPENAI_API_KEY が無ければ live テストをスキップする
pub fn skip_if_no_api_key() -> bool {
    if std::env::var("OPENAI_API_KEY").map(|v| v.trim().is_empty()).unwrap_or(true) {
        eprintln!("[SKIP] OPENAI_API_KEY not set");
        return true;
    }
    false
}
