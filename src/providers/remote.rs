use std::sync::Arc;

use async_trait::async_trait;
use color_eyre::eyre::{Result, WrapErr, bail};
use reqwest::{Client, header};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use url::Url;

use crate::ports::provider::{EncryptedDownload, MusicProvider, Playlist, ProviderFactory, Track};

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/* ---------- Wire types ---------- */

#[derive(Debug, Deserialize)]
struct UrlResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
struct LyricResponse {
    #[serde(default)]
    lyric: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistResponse {
    playlist: Playlist,
    #[serde(default)]
    tracks: Vec<Track>,
}

#[derive(Debug, Serialize)]
struct TrackRequest<'a> {
    track: &'a Track,
}

/* ---------- Provider ---------- */

/// Provider backed by an HTTP service that implements one platform.
///
/// Every operation is `POST {endpoint}/{operation}` with a JSON body; the
/// stored credential travels as the `Cookie` header.
pub struct RemoteProvider {
    client: Client,
    endpoint: Url,
    credential: String,
}

/// Parse an endpoint so that operations join below it rather than beside it.
pub fn endpoint_url(raw: &str) -> Result<Url> {
    let mut endpoint =
        Url::parse(raw).wrap_err_with(|| format!("Invalid source endpoint: {}", raw))?;
    if !endpoint.path().ends_with('/') {
        let path = format!("{}/", endpoint.path());
        endpoint.set_path(&path);
    }
    Ok(endpoint)
}

pub fn remote_factory(client: Client, endpoint: Url) -> impl ProviderFactory + 'static {
    move |credential: &str| -> Arc<dyn MusicProvider> {
        Arc::new(RemoteProvider::new(client.clone(), endpoint.clone(), credential))
    }
}

impl RemoteProvider {
    pub fn new(client: Client, endpoint: Url, credential: &str) -> Self {
        Self {
            client,
            endpoint,
            credential: credential.to_string(),
        }
    }

    fn request(&self, operation: &str) -> Result<reqwest::RequestBuilder> {
        let url = self.endpoint.join(operation)?;
        let mut request = self.client.post(url);
        if !self.credential.is_empty() {
            request = request.header(header::COOKIE, &self.credential);
        }
        Ok(request)
    }

    async fn call<B, R>(&self, operation: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        log::debug!("Calling {}{}", self.endpoint, operation);
        self.request(operation)?
            .json(body)
            .send()
            .await
            .wrap_err_with(|| format!("Request to {} failed", operation))?
            .error_for_status()?
            .json::<R>()
            .await
            .wrap_err_with(|| format!("Failed to deserialize {} response", operation))
    }
}

#[async_trait]
impl MusicProvider for RemoteProvider {
    async fn search(&self, keyword: &str) -> Result<Vec<Track>> {
        self.call("search", &json!({ "keyword": keyword })).await
    }

    async fn resolve_download_url(&self, track: &Track) -> Result<String> {
        let response: UrlResponse = self.call("download_url", &TrackRequest { track }).await?;
        Ok(response.url)
    }

    async fn lyrics(&self, track: &Track) -> Result<String> {
        let response: LyricResponse = self.call("lyrics", &TrackRequest { track }).await?;
        Ok(response.lyric)
    }

    async fn parse_track(&self, link: &str) -> Result<Track> {
        self.call("parse_track", &json!({ "url": link })).await
    }

    async fn search_playlists(&self, keyword: &str) -> Result<Vec<Playlist>> {
        self.call("search_playlists", &json!({ "keyword": keyword }))
            .await
    }

    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>> {
        self.call("playlist_tracks", &json!({ "id": playlist_id }))
            .await
    }

    async fn recommended_playlists(&self) -> Result<Vec<Playlist>> {
        self.call("recommend", &json!({})).await
    }

    async fn parse_playlist(&self, link: &str) -> Result<(Playlist, Vec<Track>)> {
        let response: PlaylistResponse = self.call("parse_playlist", &json!({ "url": link })).await?;
        Ok((response.playlist, response.tracks))
    }

    async fn resolve_encrypted_download(&self, track: &Track) -> Result<EncryptedDownload> {
        self.call("encrypted_download", &TrackRequest { track })
            .await
    }

    async fn decrypt(&self, ciphertext: &[u8], auth_token: &str) -> Result<Vec<u8>> {
        if auth_token.is_empty() {
            bail!("Missing auth token for decryption");
        }
        let plaintext = self
            .request("decrypt")?
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(AUTH_TOKEN_HEADER, auth_token)
            .body(ciphertext.to_vec())
            .send()
            .await
            .wrap_err("Decrypt request failed")?
            .error_for_status()?
            .bytes()
            .await
            .wrap_err("Failed to read decrypted payload")?;
        Ok(plaintext.to_vec())
    }
}
