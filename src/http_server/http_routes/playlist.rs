use std::sync::Arc;

use axum::extract::State;

use crate::http_server::error::{ApiError, ApiResponse};
use crate::http_server::http_routes::QueryParams;
use crate::http_server::state::AppState;
use crate::ports::provider::{Capability, Playlist, SourceStamped, Track};

pub async fn playlist_detail(
    State(app_state): State<Arc<AppState>>,
    params: QueryParams,
) -> Result<ApiResponse<Vec<Track>>, ApiError> {
    let (Some(id), Some(source)) = (params.get("id"), params.get("source")) else {
        return Err(ApiError::bad_request("Missing params"));
    };

    let provider = app_state
        .registry
        .lookup(source, Capability::PlaylistTracks)
        .ok_or_else(|| ApiError::bad_request(format!("Playlists are not supported for {}", source)))?;

    let mut tracks = provider.playlist_tracks(id).await.map_err(|e| {
        log::warn!("Failed to load playlist {}/{}: {:#}", source, id, e);
        ApiError::internal(e.to_string())
    })?;
    for track in tracks.iter_mut() {
        track.stamp_source(source);
    }

    Ok(ApiResponse::success(tracks))
}

pub async fn recommend_playlists(
    State(app_state): State<Arc<AppState>>,
    params: QueryParams,
) -> ApiResponse<Vec<Playlist>> {
    let playlists = app_state
        .fan_out
        .recommend_playlists(&params.list("sources"))
        .await;
    ApiResponse::success(playlists)
}
