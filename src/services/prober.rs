use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode, header};
use serde::Serialize;

use crate::ports::provider::Track;
use crate::services::relay::StreamRelay;
use crate::services::upstream::media_request;

const PROBE_RANGE: &str = "bytes=0-1";

/// Answers whether a track can actually be played right now.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaybackProber: Send + Sync {
    async fn is_playable(&self, track: &Track) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectReport {
    pub valid: bool,
    pub url: String,
    pub size_bytes: u64,
    pub size: String,
    pub bitrate_kbps: Option<u64>,
    pub bitrate: String,
}

impl InspectReport {
    fn invalid(url: String) -> Self {
        Self {
            valid: false,
            url,
            size_bytes: 0,
            size: format_size(0),
            bitrate_kbps: None,
            bitrate: format_bitrate(None),
        }
    }
}

/// Probes by resolving the media URL and requesting its first two bytes.
pub struct HttpProber {
    relay: Arc<StreamRelay>,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(relay: Arc<StreamRelay>, timeout: Duration) -> Self {
        Self { relay, timeout }
    }

    async fn probe(&self, url: &str, source: &str) -> reqwest::Result<Response> {
        let credential = self.relay.credential(source);
        media_request(
            self.relay.client(),
            url,
            source,
            Some(PROBE_RANGE),
            credential.as_deref(),
        )
        .timeout(self.timeout)
        .send()
        .await
    }

    /// Playability, size and estimated bitrate of a track. Never fails: any
    /// problem along the way yields `valid = false`.
    pub async fn inspect(&self, track: &Track, duration_hint: u32) -> InspectReport {
        if track.id.is_empty() || track.source.is_empty() {
            return InspectReport::invalid(String::new());
        }
        let url = match self.relay.resolve_url(track).await {
            Ok(url) => url,
            Err(e) => {
                log::debug!("Inspect of {}/{} unresolved: {}", track.source, track.id, e);
                return InspectReport::invalid(String::new());
            }
        };

        let response = match self.probe(&url, &track.source).await {
            Ok(response) => response,
            Err(e) => {
                log::debug!("Inspect probe of {} failed: {}", url, e);
                return InspectReport::invalid(url);
            }
        };

        if !is_servable(response.status()) {
            log::debug!("Inspect probe of {} answered {}", url, response.status());
            return InspectReport::invalid(url);
        }
        let content_range = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|value| value.to_str().ok());
        let size_bytes = total_size(content_range, response.content_length());
        let bitrate_kbps = estimate_bitrate_kbps(size_bytes, duration_hint);

        InspectReport {
            valid: true,
            url,
            size_bytes,
            size: format_size(size_bytes),
            bitrate_kbps,
            bitrate: format_bitrate(bitrate_kbps),
        }
    }
}

#[async_trait]
impl PlaybackProber for HttpProber {
    async fn is_playable(&self, track: &Track) -> bool {
        if track.id.is_empty() || track.source.is_empty() {
            return false;
        }
        let Ok(url) = self.relay.resolve_url(track).await else {
            return false;
        };
        match self.probe(&url, &track.source).await {
            Ok(response) => is_servable(response.status()),
            Err(e) => {
                log::debug!("Liveness probe of {}/{} failed: {}", track.source, track.id, e);
                false
            }
        }
    }
}

fn is_servable(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::PARTIAL_CONTENT
}

/// Total resource size: the `/total` of a Content-Range when present,
/// otherwise the declared body length.
pub fn total_size(content_range: Option<&str>, content_length: Option<u64>) -> u64 {
    if let Some((_, total)) = content_range.and_then(|range| range.split_once('/')) {
        return total.trim().parse().unwrap_or(0);
    }
    content_length.unwrap_or(0)
}

pub fn estimate_bitrate_kbps(size_bytes: u64, duration_secs: u32) -> Option<u64> {
    if size_bytes == 0 || duration_secs == 0 {
        return None;
    }
    Some(size_bytes * 8 / u64::from(duration_secs) / 1000)
}

pub fn format_size(size_bytes: u64) -> String {
    format!("{:.1} MB", size_bytes as f64 / 1024.0 / 1024.0)
}

pub fn format_bitrate(bitrate_kbps: Option<u64>) -> String {
    match bitrate_kbps {
        Some(kbps) => format!("{} kbps", kbps),
        None => "-".to_string(),
    }
}
