use std::collections::HashMap;
use std::sync::Arc;

use bitflags::bitflags;
use color_eyre::eyre::Result;
use serde::{Deserialize, Serialize};

/// A single playable item. Identity is the `(source, id)` pair; the rest of the
/// metadata may differ between two calls for the same item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub album: String,
    /// Duration in seconds, 0 when unknown
    pub duration: u32,
    pub cover: String,
    pub source: String,
    pub link: String,
    /// Source specific fields needed to resolve playback (e.g. an internal sub-id)
    pub extra: HashMap<String, String>,
}

impl Track {
    /// Bare track carrying only the identity pair plus display fields.
    pub fn reference(id: &str, source: &str, name: &str, artist: &str) -> Self {
        Self {
            id: id.to_string(),
            source: source.to_string(),
            name: name.to_string(),
            artist: artist.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub cover: String,
    pub source: String,
    pub creator: String,
    pub track_count: u32,
    pub description: String,
    pub link: String,
}

/// Where to fetch an encrypted payload and the token needed to decrypt it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedDownload {
    pub url: String,
    pub auth_token: String,
}

/// Items returned by a provider get their `source` overwritten by the caller,
/// providers do not reliably set it themselves.
pub trait SourceStamped {
    fn stamp_source(&mut self, source: &str);
}

impl SourceStamped for Track {
    fn stamp_source(&mut self, source: &str) {
        self.source = source.to_string();
    }
}

impl SourceStamped for Playlist {
    fn stamp_source(&mut self, source: &str) {
        self.source = source.to_string();
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u16 {
        const SEARCH = 1;
        const DOWNLOAD_URL = 1 << 1;
        const LYRICS = 1 << 2;
        const PARSE_TRACK = 1 << 3;
        const SEARCH_PLAYLISTS = 1 << 4;
        const PLAYLIST_TRACKS = 1 << 5;
        const RECOMMEND = 1 << 6;
        const PARSE_PLAYLIST = 1 << 7;
        const ENCRYPTED_DOWNLOAD = 1 << 8;
    }
}

/// One capability kind, as named in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Search,
    DownloadUrl,
    Lyrics,
    ParseTrack,
    SearchPlaylists,
    PlaylistTracks,
    Recommend,
    ParsePlaylist,
    EncryptedDownload,
}

impl Capability {
    pub fn flag(self) -> Capabilities {
        match self {
            Capability::Search => Capabilities::SEARCH,
            Capability::DownloadUrl => Capabilities::DOWNLOAD_URL,
            Capability::Lyrics => Capabilities::LYRICS,
            Capability::ParseTrack => Capabilities::PARSE_TRACK,
            Capability::SearchPlaylists => Capabilities::SEARCH_PLAYLISTS,
            Capability::PlaylistTracks => Capabilities::PLAYLIST_TRACKS,
            Capability::Recommend => Capabilities::RECOMMEND,
            Capability::ParsePlaylist => Capabilities::PARSE_PLAYLIST,
            Capability::EncryptedDownload => Capabilities::ENCRYPTED_DOWNLOAD,
        }
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Capabilities::empty(), |acc, capability| acc | capability.flag())
    }
}

/// Port trait for one platform's capability implementation.
///
/// Only the methods matching the capabilities a source was registered with are
/// ever called; the registry filters lookups on them. Implementations live in `providers`
/// (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MusicProvider: Send + Sync {
    async fn search(&self, keyword: &str) -> Result<Vec<Track>>;
    async fn resolve_download_url(&self, track: &Track) -> Result<String>;
    async fn lyrics(&self, track: &Track) -> Result<String>;
    async fn parse_track(&self, link: &str) -> Result<Track>;
    async fn search_playlists(&self, keyword: &str) -> Result<Vec<Playlist>>;
    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>>;
    async fn recommended_playlists(&self) -> Result<Vec<Playlist>>;
    async fn parse_playlist(&self, link: &str) -> Result<(Playlist, Vec<Track>)>;
    async fn resolve_encrypted_download(&self, track: &Track) -> Result<EncryptedDownload>;
    async fn decrypt(&self, ciphertext: &[u8], auth_token: &str) -> Result<Vec<u8>>;
}

/// Builds a provider bound to one credential. Called on every lookup so a
/// credential update is visible to the very next request.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, credential: &str) -> Arc<dyn MusicProvider>;
}

impl<F> ProviderFactory for F
where
    F: Fn(&str) -> Arc<dyn MusicProvider> + Send + Sync,
{
    fn create(&self, credential: &str) -> Arc<dyn MusicProvider> {
        self(credential)
    }
}
