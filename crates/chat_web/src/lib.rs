//! chat_web
//!
//! chat_core の ChatService を HTTP で公開する薄いラッパー。
//! `POST /` でチャット、`GET /?key=` で保存済み画像を返す。

pub mod handlers;
pub mod models;
pub mod state;

pub use state::{AppState, ServerConfig};

use axum::{routing::get, Router};

/// ルーティング設定。それ以外のメソッドは 405。
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::image).post(handlers::chat))
        .with_state(state)
}
