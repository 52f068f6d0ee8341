use std::sync::Arc;

use axum::{
    Router,
    http::header,
    routing::get,
};
use color_eyre::eyre::{Context, eyre};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::http_server::{
    http_routes::{music, playlist, stream, system},
    state::AppState,
};

async fn root() -> &'static str {
    "music-aggregator"
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            header::CONTENT_LENGTH,
            header::CONTENT_RANGE,
            header::CONTENT_DISPOSITION,
            header::ACCEPT_RANGES,
        ])
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/system/cookies",
            get(system::get_cookies).post(system::set_cookies),
        )
        .route("/music/search", get(music::search))
        .route("/music/url", get(music::music_url))
        .route("/music/stream", get(stream::stream_music))
        .route("/music/inspect", get(music::inspect))
        .route("/music/switch", get(music::switch_source))
        .route("/music/lyric", get(music::lyric))
        .route("/music/lyric/file", get(music::lyric_file))
        .route("/music/cover", get(music::cover))
        .route("/playlist/detail", get(playlist::playlist_detail))
        .route("/playlist/recommend", get(playlist::recommend_playlists))
}

/// Legacy paths still used by older web front ends.
fn compat_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/cookies",
            get(system::get_cookies).post(system::set_cookies),
        )
        .route("/search", get(music::search))
        .route("/playlist", get(playlist::playlist_detail))
        .route("/recommend", get(playlist::recommend_playlists))
        .route("/inspect", get(music::inspect))
        .route("/switch_source", get(music::switch_source))
        .route("/download", get(stream::stream_music))
        .route("/download_lrc", get(music::lyric_file))
        .route("/download_cover", get(music::cover))
        .route("/lyric", get(music::lyric_text))
}

pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .nest("/api/v1", api_routes())
        .nest("/music", compat_routes())
        .layer(ServiceBuilder::new().layer(cors_layer()))
        .with_state(app_state)
}

pub async fn start(port: u16, app_state: Arc<AppState>) -> color_eyre::Result<()> {
    let app = router(app_state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .wrap_err_with(|| eyre!("Failed to bind to port {}", port))?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .await
        .wrap_err("Failed to start HTTP server")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ports::provider::{Capabilities, MockMusicProvider, MusicProvider, Playlist, Track};
    use crate::services::credentials::CredentialStore;
    use crate::services::registry::CapabilityRegistry;
    use crate::test_utils::{failing_provider, search_provider, spawn_upstream, test_registry, track};
    use axum::{
        body::Body,
        http::{Request, Response, StatusCode},
    };
    use color_eyre::eyre::eyre;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn app(registry: CapabilityRegistry) -> Router {
        let state = AppState::new(
            registry,
            reqwest::Client::new(),
            Duration::from_secs(5),
            Duration::from_secs(5),
        );
        router(Arc::new(state))
    }

    async fn get(app: Router, uri: &str) -> Response<Body> {
        app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response<Body>) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    fn link_provider() -> impl Fn(&str) -> Arc<dyn MusicProvider> + Send + Sync {
        |_: &str| -> Arc<dyn MusicProvider> {
            let mut provider = MockMusicProvider::new();
            provider
                .expect_parse_track()
                .returning(|_| Err(eyre!("not a song link")));
            provider.expect_parse_playlist().returning(|_| {
                Ok((
                    Playlist {
                        id: "p1".to_string(),
                        name: "Mix".to_string(),
                        ..Default::default()
                    },
                    vec![track("t1", "Song", "Artist", 200), track("t2", "Other", "Artist", 180)],
                ))
            });
            Arc::new(provider)
        }
    }

    fn lyric_provider(lyric: Option<&'static str>) -> impl Fn(&str) -> Arc<dyn MusicProvider> + Send + Sync {
        move |_: &str| -> Arc<dyn MusicProvider> {
            let mut provider = MockMusicProvider::new();
            provider.expect_lyrics().returning(move |_| match lyric {
                Some(lyric) => Ok(lyric.to_string()),
                None => Err(eyre!("lyric service down")),
            });
            Arc::new(provider)
        }
    }

    #[tokio::test]
    async fn test_search_fans_out_with_repeated_and_comma_sources() {
        let mut registry = test_registry();
        registry.register("netease", Capabilities::SEARCH, search_provider(vec![track("1", "Song", "A", 200)]));
        registry.register("qq", Capabilities::SEARCH, search_provider(vec![track("2", "Song", "B", 200)]));
        registry.register("kugou", Capabilities::SEARCH, search_provider(vec![track("3", "Song", "C", 200)]));

        let response = get(app(registry), "/api/v1/music/search?q=Song&sources=netease&sources=qq,kuwo").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["code"], 200);
        assert_eq!(body["data"]["type"], "song");
        let mut sources: Vec<&str> = body["data"]["songs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|song| song["source"].as_str().unwrap())
            .collect();
        sources.sort();
        assert_eq!(sources, ["netease", "qq"]);
    }

    #[tokio::test]
    async fn test_search_all_failing_is_empty_success() {
        let mut registry = test_registry();
        registry.register("netease", Capabilities::SEARCH, failing_provider());

        let response = get(app(registry), "/music/search?keyword=Song&sources=netease").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["songs"], json!([]));
    }

    #[tokio::test]
    async fn test_search_with_unknown_link_is_bad_request() {
        let response = get(app(test_registry()), "/api/v1/music/search?q=https://example.com/song/1").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], 400);
    }

    #[tokio::test]
    async fn test_search_with_playlist_link() {
        let mut registry = test_registry();
        registry.register(
            "netease",
            Capabilities::PARSE_TRACK | Capabilities::PARSE_PLAYLIST,
            link_provider(),
        );
        let app = app(registry);

        let link = "https://music.163.com/playlist?id=1";
        let response = get(app.clone(), &format!("/api/v1/music/search?q={}", link)).await;
        let body = body_json(response).await;
        assert_eq!(body["data"]["type"], "song");
        assert_eq!(body["data"]["songs"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"]["songs"][0]["source"], "netease");

        let response = get(app, &format!("/api/v1/music/search?type=playlist&q={}", link)).await;
        let body = body_json(response).await;
        assert_eq!(body["data"]["type"], "playlist");
        assert_eq!(body["data"]["playlists"][0]["id"], "p1");
        assert_eq!(body["data"]["playlists"][0]["source"], "netease");
    }

    #[tokio::test]
    async fn test_search_with_unparseable_link_is_internal_error() {
        let mut registry = test_registry();
        registry.register("qq", Capabilities::SEARCH, search_provider(Vec::new()));

        let response = get(app(registry), "/api/v1/music/search?q=https://y.qq.com/n/song/1").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_playlist_detail_stamps_source() {
        let mut registry = test_registry();
        registry.register("kugou", Capabilities::PLAYLIST_TRACKS, |_: &str| -> Arc<dyn MusicProvider> {
            let mut provider = MockMusicProvider::new();
            provider
                .expect_playlist_tracks()
                .returning(|_| Ok(vec![track("1", "Song", "Artist", 200)]));
            Arc::new(provider)
        });
        registry.register("kuwo", Capabilities::PLAYLIST_TRACKS, |_: &str| -> Arc<dyn MusicProvider> {
            let mut provider = MockMusicProvider::new();
            provider
                .expect_playlist_tracks()
                .returning(|_| Err(eyre!("private playlist")));
            Arc::new(provider)
        });
        let app = app(registry);

        let body = body_json(get(app.clone(), "/api/v1/playlist/detail?id=9&source=kugou").await).await;
        assert_eq!(body["data"][0]["source"], "kugou");

        let response = get(app.clone(), "/music/playlist?id=9&source=kuwo").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["message"], "private playlist");

        let response = get(app.clone(), "/api/v1/playlist/detail?id=9&source=qq").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = get(app, "/api/v1/playlist/detail?source=kugou").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_lyric_endpoints() {
        let mut registry = test_registry();
        registry.register("netease", Capabilities::LYRICS, lyric_provider(Some("[00:01.00] la")));
        registry.register("qq", Capabilities::LYRICS, lyric_provider(None));
        let app = app(registry);

        let body = body_json(get(app.clone(), "/api/v1/music/lyric?id=1&source=netease").await).await;
        assert_eq!(body["data"]["lyric"], "[00:01.00] la");

        // Provider errors degrade to an empty lyric
        let body = body_json(get(app.clone(), "/api/v1/music/lyric?id=1&source=qq").await).await;
        assert_eq!(body["data"]["lyric"], "");

        let response = get(app.clone(), "/api/v1/music/lyric?id=1&source=kugou").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let text = body_text(get(app.clone(), "/music/lyric?id=1&source=qq").await).await;
        assert_eq!(text, NO_LYRIC);

        let response = get(app.clone(), "/api/v1/music/lyric/file?id=1&source=netease&name=Song").await;
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert!(disposition.contains("Song%20-%20Unknown.lrc"));
        assert_eq!(body_text(response).await, "[00:01.00] la");

        let response = get(app.clone(), "/music/download_lrc?id=1&source=qq").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = get(app, "/api/v1/music/lyric/file?id=1&source=kugou").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    const NO_LYRIC: &str = "[00:00.00] No lyrics available";

    #[tokio::test]
    async fn test_url_endpoint() {
        let mut registry = test_registry();
        registry.register("netease", Capabilities::DOWNLOAD_URL, |_: &str| -> Arc<dyn MusicProvider> {
            let mut provider = MockMusicProvider::new();
            provider
                .expect_resolve_download_url()
                .returning(|track: &Track| Ok(format!("http://cdn.example.com/{}.mp3", track.id)));
            Arc::new(provider)
        });
        registry.register("qq", Capabilities::DOWNLOAD_URL, failing_provider());
        let app = app(registry);

        let body = body_json(get(app.clone(), "/api/v1/music/url?id=5&source=netease").await).await;
        assert_eq!(body["data"]["url"], "http://cdn.example.com/5.mp3");

        let response = get(app.clone(), "/api/v1/music/url?id=5&source=qq").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = get(app, "/api/v1/music/url?id=5&source=kuwo").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_inspect_endpoint_never_errors() {
        let response = get(app(test_registry()), "/api/v1/music/inspect?id=1&source=netease&duration=200").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["data"]["valid"], false);
        assert_eq!(body["data"]["bitrate"], "-");
    }

    #[tokio::test]
    async fn test_switch_endpoint() {
        let base = spawn_upstream(Router::new().route(
            "/audio",
            axum::routing::get(|| async { (StatusCode::PARTIAL_CONTENT, "ab") }),
        ))
        .await;

        let mut registry = test_registry();
        registry.register(
            "kugou",
            Capabilities::SEARCH | Capabilities::DOWNLOAD_URL,
            move |_: &str| -> Arc<dyn MusicProvider> {
                let url = format!("{}/audio", base);
                let mut provider = MockMusicProvider::new();
                provider
                    .expect_search()
                    .returning(|_| Ok(vec![track("k1", "Song", "Artist", 201)]));
                provider
                    .expect_resolve_download_url()
                    .returning(move |_| Ok(url.clone()));
                Arc::new(provider)
            },
        );
        let app = app(registry);

        let response = get(app.clone(), "/api/v1/music/switch?name=Song&artist=Artist&source=qq&duration=200").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["id"], "k1");
        assert_eq!(body["data"]["source"], "kugou");
        assert!(body["data"]["score"].as_f64().unwrap() > 0.99);

        let response = get(app.clone(), "/music/switch_source?artist=Artist&source=qq").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = get(app, "/api/v1/music/switch?name=Song&source=kugou").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["message"], "no match found");
    }

    #[tokio::test]
    async fn test_stream_missing_params_is_plain_400() {
        let response = get(app(test_registry()), "/music/download?source=netease").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "Missing params");
    }

    #[tokio::test]
    async fn test_cookies_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        let registry = CapabilityRegistry::new(Arc::new(CredentialStore::new(&path)));
        let app = app(registry);

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/v1/system/cookies")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"netease": "os=pc;"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(path.exists());

        let body = body_json(get(app.clone(), "/music/cookies").await).await;
        assert_eq!(body, json!({ "netease": "os=pc;" }));

        let response = app
            .oneshot(
                Request::post("/api/v1/system/cookies")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cors_exposes_range_headers() {
        let response = app(test_registry())
            .oneshot(
                Request::get("/")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let exposed = response.headers()[header::ACCESS_CONTROL_EXPOSE_HEADERS]
            .to_str()
            .unwrap()
            .to_lowercase();
        assert!(exposed.contains("content-range"));
        assert!(exposed.contains("content-disposition"));
    }
}
