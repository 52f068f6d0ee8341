use std::io::Cursor;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Response, StatusCode, header},
    response::IntoResponse,
};
use axum_extra::headers::{HeaderMapExt, Range};
use axum_range::{KnownSize, Ranged};
use reqwest::Client;

use crate::ports::provider::{Capability, MusicProvider, Track};
use crate::services::registry::CapabilityRegistry;
use crate::services::upstream::{
    content_disposition, download_filename, forwarded_headers, media_request,
};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Missing params")]
    MissingParams,
    #[error("Unknown source or no download support: {0}")]
    Unsupported(String),
    #[error("Failed to get URL")]
    UrlNotFound,
    #[error("Upstream stream error: {0}")]
    Upstream(String),
    #[error("Decrypt failed: {0}")]
    Decrypt(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingParams | RelayError::Unsupported(_) => StatusCode::BAD_REQUEST,
            RelayError::UrlNotFound => StatusCode::NOT_FOUND,
            RelayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            RelayError::Decrypt(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response<Body> {
        (self.status(), self.to_string()).into_response()
    }
}

/// What the caller asked to stream. Name and artist only shape the filename.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub id: String,
    pub source: String,
    pub name: String,
    pub artist: String,
}

impl StreamRequest {
    fn track(&self) -> Track {
        Track::reference(&self.id, &self.source, &self.name, &self.artist)
    }
}

/// Where the bytes for a track live.
pub enum ResolvedMedia {
    Direct {
        url: String,
    },
    /// Encrypted at rest: fetched whole and decrypted with `auth_token`
    Encrypted {
        url: String,
        auth_token: String,
        provider: Arc<dyn MusicProvider>,
    },
}

impl ResolvedMedia {
    pub fn url(&self) -> &str {
        match self {
            ResolvedMedia::Direct { url } | ResolvedMedia::Encrypted { url, .. } => url,
        }
    }
}

pub struct StreamRelay {
    registry: Arc<CapabilityRegistry>,
    client: Client,
}

impl StreamRelay {
    pub fn new(registry: Arc<CapabilityRegistry>, client: Client) -> Self {
        Self { registry, client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn credential(&self, source: &str) -> Option<String> {
        self.registry.credentials().get(source)
    }

    /// Resolve the media location for a track. Sources that can hand out an
    /// encrypted download always go through it.
    pub async fn resolve(&self, track: &Track) -> Result<ResolvedMedia, RelayError> {
        if let Some(provider) = self
            .registry
            .lookup(&track.source, Capability::EncryptedDownload)
        {
            let download = provider
                .resolve_encrypted_download(track)
                .await
                .map_err(|e| {
                    log::warn!(
                        "Failed to resolve encrypted download for {}/{}: {:#}",
                        track.source,
                        track.id,
                        e
                    );
                    RelayError::UrlNotFound
                })?;
            if download.url.is_empty() {
                return Err(RelayError::UrlNotFound);
            }
            return Ok(ResolvedMedia::Encrypted {
                url: download.url,
                auth_token: download.auth_token,
                provider,
            });
        }

        let provider = self
            .registry
            .lookup(&track.source, Capability::DownloadUrl)
            .ok_or_else(|| RelayError::Unsupported(track.source.clone()))?;

        match provider.resolve_download_url(track).await {
            Ok(url) if !url.is_empty() => Ok(ResolvedMedia::Direct { url }),
            Ok(_) => Err(RelayError::UrlNotFound),
            Err(e) => {
                log::warn!(
                    "Failed to resolve download URL for {}/{}: {:#}",
                    track.source,
                    track.id,
                    e
                );
                Err(RelayError::UrlNotFound)
            }
        }
    }

    pub async fn resolve_url(&self, track: &Track) -> Result<String, RelayError> {
        Ok(self.resolve(track).await?.url().to_string())
    }

    /// Serve the audio for `request`. `inbound` are the caller's request
    /// headers, only `Range` is looked at.
    pub async fn stream(
        &self,
        request: &StreamRequest,
        inbound: &HeaderMap,
    ) -> Result<Response<Body>, RelayError> {
        if request.id.is_empty() || request.source.is_empty() {
            return Err(RelayError::MissingParams);
        }
        if !self.registry.contains(&request.source) {
            return Err(RelayError::Unsupported(request.source.clone()));
        }

        let filename = download_filename(&request.name, &request.artist, "mp3");
        match self.resolve(&request.track()).await? {
            ResolvedMedia::Direct { url } => {
                let range = inbound
                    .get(header::RANGE)
                    .and_then(|value| value.to_str().ok());
                self.passthrough(&url, &request.source, range, &filename)
                    .await
            }
            ResolvedMedia::Encrypted {
                url,
                auth_token,
                provider,
            } => {
                let plaintext = self
                    .fetch_and_decrypt(&url, &request.source, &auth_token, provider.as_ref())
                    .await?;
                Ok(serve_bytes(plaintext, inbound.typed_get::<Range>(), &filename))
            }
        }
    }

    async fn passthrough(
        &self,
        url: &str,
        source: &str,
        range: Option<&str>,
        filename: &str,
    ) -> Result<Response<Body>, RelayError> {
        let credential = self.credential(source);
        let upstream = media_request(&self.client, url, source, range, credential.as_deref())
            .send()
            .await
            .map_err(|e| {
                log::warn!("Upstream request to {} failed: {}", source, e);
                RelayError::Upstream(e.to_string())
            })?;

        log::debug!(
            "Relaying {} from {} (range: {:?})",
            upstream.status(),
            source,
            range
        );

        let status = upstream.status();
        let mut headers = forwarded_headers(upstream.headers());
        headers.insert(header::CONTENT_DISPOSITION, content_disposition(filename));

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }

    /// The whole ciphertext is needed before decryption, so the caller's Range
    /// is never sent upstream on this path.
    async fn fetch_and_decrypt(
        &self,
        url: &str,
        source: &str,
        auth_token: &str,
        provider: &dyn MusicProvider,
    ) -> Result<Vec<u8>, RelayError> {
        let credential = self.credential(source);
        let ciphertext = media_request(&self.client, url, source, None, credential.as_deref())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| RelayError::Upstream(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| RelayError::Upstream(e.to_string()))?;

        log::debug!(
            "Decrypting {} bytes from {}",
            ciphertext.len(),
            source
        );

        provider
            .decrypt(&ciphertext, auth_token)
            .await
            .map_err(|e| {
                log::error!("Failed to decrypt {} payload: {:#}", source, e);
                RelayError::Decrypt(e.to_string())
            })
    }
}

/// Serve an in-memory body with Range support, stamped as modified now.
fn serve_bytes(bytes: Vec<u8>, range: Option<Range>, filename: &str) -> Response<Body> {
    let content_type = infer::get(&bytes)
        .map(|kind| kind.mime_type())
        .unwrap_or("audio/mpeg");
    let last_modified = chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();

    let size = bytes.len() as u64;
    let body = KnownSize::sized(Cursor::new(bytes), size);
    let mut response = Ranged::new(range, body).into_response();

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Ok(last_modified) = HeaderValue::from_str(&last_modified) {
        headers.insert(header::LAST_MODIFIED, last_modified);
    }
    headers.insert(header::CONTENT_DISPOSITION, content_disposition(filename));
    response
}
