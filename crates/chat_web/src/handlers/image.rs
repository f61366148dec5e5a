use axum::{
    extract::{Json, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::models::{ErrorResponse, ImageQuery};
use crate::state::AppState;

/// GET /?key= - 保存済みの画像を返す
pub async fn image(State(state): State<AppState>, Query(query): Query<ImageQuery>) -> Response {
    let Some(key) = query.key.filter(|k| !k.is_empty()) else {
        return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new("No key provided"))).into_response();
    };

    match state.blobs.get(&key).await {
        Ok(Some(blob)) => {
            tracing::debug!(target: "web::image", key = %key, bytes = blob.data.len(), "serving image");
            (
                [(header::CONTENT_TYPE, blob.content_type), (header::CACHE_CONTROL, blob.cache_control)],
                blob.data,
            )
                .into_response()
        }
        Ok(None) => {
            tracing::info!(target: "web::image", key = %key, "image not found");
            (StatusCode::NOT_FOUND, Json(ErrorResponse::new("No image found"))).into_response()
        }
        Err(e) => {
            tracing::error!(target: "web::image", key = %key, error = %e, "blob lookup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::new(e.to_string()))).into_response()
        }
    }
}
