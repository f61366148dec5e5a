use axum::{
    extract::{Json, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::models::{ChatRequest, ErrorResponse};
use crate::state::AppState;

/// POST / - 会話を受け取り、最終テキストを JSON 文字列で返す
pub async fn chat(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    if let Some(expected) = state.api_key.as_deref() {
        if !is_authorized(&headers, expected) {
            tracing::warn!(target: "web::chat", "rejected request without valid api key");
            return (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new("Unauthorized"))).into_response();
        }
    }

    // Json エクストラクタの拒否レスポンスではなく、常に {"error": ...} を返す
    let req: ChatRequest = match serde_json::from_str(&body) {
        Ok(req) => req,
        Err(e) => {
            tracing::warn!(target: "web::chat", error = %e, "malformed request body");
            return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(format!("Invalid request body: {e}")))).into_response();
        }
    };
    let Some(messages) = req.into_messages() else {
        return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new("No messages provided"))).into_response();
    };

    let ip = client_ip(&headers);
    tracing::info!(target: "web::chat", messages = messages.len(), ip = ip.as_deref().unwrap_or(""), "Received chat request");

    match state.chat.respond(&messages, ip.as_deref()).await {
        Ok(text) => {
            tracing::info!(target: "web::chat", "Chat response successful");
            Json(text).into_response()
        }
        Err(e) => {
            tracing::error!(target: "web::chat", error = %e, "Chat request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::new(e.to_string()))).into_response()
        }
    }
}

/// `x-api-key` か `Authorization: Bearer` のどちらかが一致すればよい
fn is_authorized(headers: &HeaderMap, expected: &str) -> bool {
    let api_key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    api_key == Some(expected) || bearer.map(str::trim) == Some(expected)
}

/// 記録用のクライアントIP。X-Forwarded-For は先頭のアドレスだけ使う。
fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let cf = headers
        .get("cf-connecting-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    forwarded.or(cf).map(str::to_string)
}
