use std::cmp::Ordering;
use std::sync::Arc;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::ports::provider::{Capability, SourceStamped, Track};
use crate::services::aggregator::FanOut;
use crate::services::prober::PlaybackProber;
use crate::services::similarity::{is_duration_close, song_similarity};

pub const DEFAULT_CANDIDATE_SOURCES: &[&str] =
    &["netease", "qq", "kugou", "kuwo", "migu", "bilibili"];
/// Never offered as replacements.
pub const EXCLUDED_SOURCES: &[&str] = &["soda", "fivesing"];
pub const MAX_HITS_PER_SOURCE: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    #[error("name is required")]
    MissingName,
    #[error("no match found")]
    NoMatch,
    #[error("no playable match found")]
    NoPlayableMatch,
}

impl FallbackError {
    pub fn status(&self) -> StatusCode {
        match self {
            FallbackError::MissingName => StatusCode::BAD_REQUEST,
            FallbackError::NoMatch | FallbackError::NoPlayableMatch => StatusCode::NOT_FOUND,
        }
    }
}

/// A track that stopped playing on `source` and needs a stand-in.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SwitchRequest {
    pub name: String,
    pub artist: String,
    /// The source the track is broken on
    pub source: String,
    /// Restrict the search to this one source
    pub target: String,
    pub duration: u32,
}

impl SwitchRequest {
    fn query(&self) -> String {
        if self.artist.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.artist)
        }
    }

    fn candidate_sources(&self) -> Vec<String> {
        let pool: Vec<&str> = if self.target.is_empty() {
            DEFAULT_CANDIDATE_SOURCES.to_vec()
        } else {
            vec![self.target.as_str()]
        };
        pool.into_iter()
            .filter(|source| *source != self.source && !EXCLUDED_SOURCES.contains(source))
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub track: Track,
    pub score: f64,
    /// Seconds between the candidate and the original, 0 when not comparable
    pub duration_diff: u32,
}

impl SourceStamped for Candidate {
    fn stamp_source(&mut self, source: &str) {
        self.track.stamp_source(source);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackMatch {
    #[serde(flatten)]
    pub track: Track,
    pub score: f64,
}

/// Scores the first hits of one source against the request, keeping only
/// plausible ones.
pub fn score_hits(request: &SwitchRequest, hits: Vec<Track>) -> Vec<Candidate> {
    hits.into_iter()
        .take(MAX_HITS_PER_SOURCE)
        .filter_map(|track| {
            let score = song_similarity(&request.name, &request.artist, &track.name, &track.artist);
            if score <= 0.0 {
                return None;
            }

            let mut duration_diff = 0;
            if request.duration > 0 && track.duration > 0 {
                if !is_duration_close(request.duration, track.duration) {
                    return None;
                }
                duration_diff = request.duration.abs_diff(track.duration);
            }

            Some(Candidate {
                track,
                score,
                duration_diff,
            })
        })
        .collect()
}

/// Best first: higher score, then smaller duration difference. Stable, so
/// full ties keep arrival order.
pub fn rank_candidates(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => a.duration_diff.cmp(&b.duration_diff),
        other => other,
    });
    candidates
}

pub struct FallbackMatcher {
    fan_out: Arc<FanOut>,
    prober: Arc<dyn PlaybackProber>,
}

impl FallbackMatcher {
    pub fn new(fan_out: Arc<FanOut>, prober: Arc<dyn PlaybackProber>) -> Self {
        Self { fan_out, prober }
    }

    /// Find the most similar playable track on another source.
    ///
    /// Candidates are probed one at a time in rank order and the first one
    /// that plays wins, so a good match costs a single probe.
    pub async fn switch_source(&self, request: &SwitchRequest) -> Result<FallbackMatch, FallbackError> {
        if request.name.trim().is_empty() {
            return Err(FallbackError::MissingName);
        }

        let sources = request.candidate_sources();
        let query = request.query();
        log::debug!("Looking for {:?} on {:?}", query, sources);

        let candidates = self
            .fan_out
            .fan_out(Capability::Search, &sources, |provider| {
                let request = request.clone();
                let query = query.clone();
                async move {
                    let mut hits = match provider.search(&query).await {
                        Ok(hits) => hits,
                        Err(e) => {
                            log::debug!("Search for {:?} failed: {:#}", query, e);
                            Vec::new()
                        }
                    };
                    if hits.is_empty() && !request.artist.is_empty() {
                        hits = provider.search(&request.name).await?;
                    }
                    Result::<Vec<Candidate>, color_eyre::Report>::Ok(score_hits(&request, hits))
                }
            })
            .await;

        if candidates.is_empty() {
            log::info!("No candidates for {:?} (broken on {})", query, request.source);
            return Err(FallbackError::NoMatch);
        }

        let ranked = rank_candidates(candidates);
        let total = ranked.len();
        for candidate in ranked {
            if self.prober.is_playable(&candidate.track).await {
                log::info!(
                    "Switched {:?} from {} to {}/{} (score {:.2})",
                    query,
                    request.source,
                    candidate.track.source,
                    candidate.track.id,
                    candidate.score
                );
                return Ok(FallbackMatch {
                    track: candidate.track,
                    score: candidate.score,
                });
            }
        }

        log::info!("None of {} candidates for {:?} is playable", total, query);
        Err(FallbackError::NoPlayableMatch)
    }
}
