use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
};

use crate::http_server::http_routes::QueryParams;
use crate::http_server::state::AppState;
use crate::services::relay::StreamRequest;

/// Proxy (or decrypt) the audio of one track, honoring the caller's Range.
pub async fn stream_music(
    State(app_state): State<Arc<AppState>>,
    params: QueryParams,
    headers: HeaderMap,
) -> Response {
    let request = StreamRequest {
        id: params.get_or("id", ""),
        source: params.get_or("source", ""),
        name: params.get_or("name", "Unknown"),
        artist: params.get_or("artist", "Unknown"),
    };

    match app_state.relay.stream(&request, &headers).await {
        Ok(response) => response,
        Err(e) => {
            log::warn!(
                "Stream of {}/{} failed: {}",
                request.source,
                request.id,
                e
            );
            e.into_response()
        }
    }
}
