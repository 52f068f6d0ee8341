use std::sync::Arc;

use axum::Router;
use color_eyre::eyre::eyre;

use crate::ports::provider::{MockMusicProvider, MusicProvider, ProviderFactory, Track};
use crate::services::credentials::CredentialStore;
use crate::services::registry::CapabilityRegistry;

pub fn test_registry() -> CapabilityRegistry {
    CapabilityRegistry::new(Arc::new(CredentialStore::new("cookies.json")))
}

pub fn track(id: &str, name: &str, artist: &str, duration: u32) -> Track {
    Track {
        id: id.to_string(),
        name: name.to_string(),
        artist: artist.to_string(),
        duration,
        ..Default::default()
    }
}

/// Provider whose search always answers with `tracks`.
pub fn search_provider(tracks: Vec<Track>) -> impl ProviderFactory + 'static {
    move |_: &str| -> Arc<dyn MusicProvider> {
        let tracks = tracks.clone();
        let mut provider = MockMusicProvider::new();
        provider
            .expect_search()
            .returning(move |_| Ok(tracks.clone()));
        Arc::new(provider)
    }
}

/// Provider that is down: every listing and resolving call errors.
pub fn failing_provider() -> impl ProviderFactory + 'static {
    |_: &str| -> Arc<dyn MusicProvider> {
        let mut provider = MockMusicProvider::new();
        provider
            .expect_search()
            .returning(|_| Err(eyre!("upstream unavailable")));
        provider
            .expect_search_playlists()
            .returning(|_| Err(eyre!("upstream unavailable")));
        provider
            .expect_recommended_playlists()
            .returning(|| Err(eyre!("upstream unavailable")));
        provider
            .expect_resolve_download_url()
            .returning(|_| Err(eyre!("upstream unavailable")));
        provider
            .expect_lyrics()
            .returning(|_| Err(eyre!("upstream unavailable")));
        Arc::new(provider)
    }
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
