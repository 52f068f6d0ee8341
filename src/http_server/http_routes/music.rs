use std::sync::Arc;

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::http_server::error::{ApiError, ApiResponse};
use crate::http_server::http_routes::QueryParams;
use crate::http_server::state::AppState;
use crate::ports::provider::{Capability, Playlist, SourceStamped, Track};
use crate::services::fallback::{FallbackMatch, SwitchRequest};
use crate::services::link::{classify_link, looks_like_link};
use crate::services::prober::InspectReport;
use crate::services::upstream::{UA_DESKTOP, content_disposition, download_filename};

const NO_LYRIC_PLACEHOLDER: &str = "[00:00.00] No lyrics available";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchKind {
    Song,
    Playlist,
}

impl SearchKind {
    fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("playlist") => SearchKind::Playlist,
            _ => SearchKind::Song,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            SearchKind::Song => "song",
            SearchKind::Playlist => "playlist",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub songs: Vec<Track>,
    pub playlists: Vec<Playlist>,
}

impl SearchResults {
    fn new(kind: SearchKind) -> Self {
        Self {
            kind: kind.as_str(),
            songs: Vec::new(),
            playlists: Vec::new(),
        }
    }
}

/// Keyword search across sources, or resolution of a pasted share link.
pub async fn search(
    State(app_state): State<Arc<AppState>>,
    params: QueryParams,
) -> Result<ApiResponse<SearchResults>, ApiError> {
    let Some(keyword) = params.get("q").or_else(|| params.get("keyword")) else {
        return Err(ApiError::bad_request("Missing keyword"));
    };
    let kind = SearchKind::from_param(params.get("type"));

    if looks_like_link(keyword) {
        let source = classify_link(keyword)
            .ok_or_else(|| ApiError::bad_request("Unsupported link or unrecognized source"))?;
        return resolve_link(&app_state, source, keyword, kind)
            .await
            .map(ApiResponse::success);
    }

    let sources = params.list("sources");
    let mut results = SearchResults::new(kind);
    match kind {
        SearchKind::Song => {
            results.songs = app_state.fan_out.search_tracks(keyword, &sources).await;
        }
        SearchKind::Playlist => {
            results.playlists = app_state.fan_out.search_playlists(keyword, &sources).await;
        }
    }
    log::debug!(
        "Search {:?} found {} songs and {} playlists",
        keyword,
        results.songs.len(),
        results.playlists.len()
    );
    Ok(ApiResponse::success(results))
}

/// A link is tried as a single track first, then as a playlist. A playlist
/// link searched as songs yields its tracks.
async fn resolve_link(
    app_state: &AppState,
    source: &str,
    link: &str,
    kind: SearchKind,
) -> Result<SearchResults, ApiError> {
    if let Some(provider) = app_state.registry.lookup(source, Capability::ParseTrack) {
        match provider.parse_track(link).await {
            Ok(mut track) => {
                track.stamp_source(source);
                let mut results = SearchResults::new(SearchKind::Song);
                results.songs.push(track);
                return Ok(results);
            }
            Err(e) => log::debug!("{} could not parse {} as a track: {:#}", source, link, e),
        }
    }

    if let Some(provider) = app_state.registry.lookup(source, Capability::ParsePlaylist) {
        match provider.parse_playlist(link).await {
            Ok((mut playlist, mut tracks)) => {
                let mut results = SearchResults::new(kind);
                if kind == SearchKind::Playlist {
                    playlist.stamp_source(source);
                    results.playlists.push(playlist);
                } else {
                    for track in tracks.iter_mut() {
                        track.stamp_source(source);
                    }
                    results.songs = tracks;
                }
                return Ok(results);
            }
            Err(e) => log::debug!("{} could not parse {} as a playlist: {:#}", source, link, e),
        }
    }

    Err(ApiError::internal(format!(
        "Failed to parse link: {} does not support this link type",
        source
    )))
}

fn reference_track(params: &QueryParams) -> Option<Track> {
    let id = params.get("id")?;
    let source = params.get("source")?;
    Some(Track::reference(id, source, "", ""))
}

pub async fn music_url(
    State(app_state): State<Arc<AppState>>,
    params: QueryParams,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    let track = reference_track(&params).ok_or_else(|| ApiError::bad_request("Missing params"))?;
    let provider = app_state
        .registry
        .lookup(&track.source, Capability::DownloadUrl)
        .ok_or_else(|| ApiError::bad_request(format!("Unsupported source: {}", track.source)))?;

    let url = provider
        .resolve_download_url(&track)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(ApiResponse::success(json!({ "url": url })))
}

pub async fn inspect(
    State(app_state): State<Arc<AppState>>,
    params: QueryParams,
) -> ApiResponse<InspectReport> {
    let track = Track::reference(
        params.get("id").unwrap_or_default(),
        params.get("source").unwrap_or_default(),
        "",
        "",
    );
    let report = app_state
        .prober
        .inspect(&track, params.number("duration"))
        .await;
    ApiResponse::success(report)
}

pub async fn switch_source(
    State(app_state): State<Arc<AppState>>,
    params: QueryParams,
) -> Result<ApiResponse<FallbackMatch>, ApiError> {
    let request = SwitchRequest {
        name: params.get_or("name", ""),
        artist: params.get_or("artist", ""),
        source: params.get_or("source", ""),
        target: params.get_or("target", ""),
        duration: params.number("duration"),
    };

    let found = app_state.matcher.switch_source(&request).await?;
    Ok(ApiResponse::success(found))
}

/// Lyrics of a track, empty when the source fails to produce them.
async fn fetch_lyrics(app_state: &AppState, track: &Track) -> Option<String> {
    let provider = app_state
        .registry
        .lookup(&track.source, Capability::Lyrics)?;
    match provider.lyrics(track).await {
        Ok(lyric) => Some(lyric),
        Err(e) => {
            log::debug!("Lyrics for {}/{} failed: {:#}", track.source, track.id, e);
            Some(String::new())
        }
    }
}

pub async fn lyric(
    State(app_state): State<Arc<AppState>>,
    params: QueryParams,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    let track = reference_track(&params).ok_or_else(|| ApiError::bad_request("Missing params"))?;
    let lyric = fetch_lyrics(&app_state, &track)
        .await
        .ok_or_else(|| ApiError::bad_request(format!("No lyric support for {}", track.source)))?;
    Ok(ApiResponse::success(json!({ "lyric": lyric })))
}

/// Plain-text lyrics with a placeholder instead of errors.
pub async fn lyric_text(State(app_state): State<Arc<AppState>>, params: QueryParams) -> String {
    let lyric = match reference_track(&params) {
        Some(track) => fetch_lyrics(&app_state, &track).await.unwrap_or_default(),
        None => String::new(),
    };
    if lyric.is_empty() {
        NO_LYRIC_PLACEHOLDER.to_string()
    } else {
        lyric
    }
}

pub async fn lyric_file(State(app_state): State<Arc<AppState>>, params: QueryParams) -> Response {
    let Some(track) = reference_track(&params) else {
        return (StatusCode::BAD_REQUEST, "Missing params").into_response();
    };
    let Some(lyric) = fetch_lyrics(&app_state, &track).await else {
        return (StatusCode::NOT_FOUND, "No support").into_response();
    };
    if lyric.is_empty() {
        return (StatusCode::NOT_FOUND, "Lyric not found").into_response();
    }

    let filename = download_filename(
        &params.get_or("name", "Unknown"),
        &params.get_or("artist", "Unknown"),
        "lrc",
    );
    (
        [(header::CONTENT_DISPOSITION, content_disposition(&filename))],
        lyric,
    )
        .into_response()
}

/// Fetch a cover image server side so hotlink protection does not apply.
pub async fn cover(State(app_state): State<Arc<AppState>>, params: QueryParams) -> Response {
    let Some(url) = params.get("url") else {
        return (StatusCode::BAD_REQUEST, "Missing url").into_response();
    };

    let image = app_state
        .relay
        .client()
        .get(url)
        .header(header::USER_AGENT, UA_DESKTOP)
        .send()
        .await
        .and_then(|response| response.error_for_status());
    let bytes = match image {
        Ok(response) => response.bytes().await,
        Err(e) => Err(e),
    };

    match bytes {
        Ok(bytes) => {
            let filename = download_filename(
                params.get("name").unwrap_or_default(),
                params.get("artist").unwrap_or_default(),
                "jpg",
            );
            (
                [
                    (header::CONTENT_TYPE, header::HeaderValue::from_static("image/jpeg")),
                    (header::CONTENT_DISPOSITION, content_disposition(&filename)),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => {
            log::warn!("Failed to fetch cover {}: {}", url, e);
            (StatusCode::BAD_GATEWAY, "Failed to fetch cover").into_response()
        }
    }
}
