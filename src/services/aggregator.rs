use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::Result;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::ports::provider::{Capability, MusicProvider, Playlist, SourceStamped, Track};
use crate::services::registry::CapabilityRegistry;

pub const DEFAULT_SONG_SOURCES: &[&str] = &[
    "netease", "qq", "kugou", "kuwo", "bilibili", "migu", "soda", "fivesing",
];
pub const DEFAULT_PLAYLIST_SOURCES: &[&str] =
    &["netease", "qq", "kugou", "kuwo", "bilibili", "soda", "fivesing"];
pub const DEFAULT_RECOMMEND_SOURCES: &[&str] = &["netease", "qq", "kugou", "kuwo"];

/// The requested sources, or `defaults` when none were requested.
pub fn sources_or_default(requested: &[String], defaults: &[&str]) -> Vec<String> {
    if requested.is_empty() {
        defaults.iter().map(|source| source.to_string()).collect()
    } else {
        requested.to_vec()
    }
}

/// Runs one capability against many sources at once and merges whatever
/// comes back.
///
/// A source that lacks the capability is skipped. A source that errors, times
/// out or panics contributes nothing and never affects the others. Merge order
/// follows completion order.
pub struct FanOut {
    registry: Arc<CapabilityRegistry>,
    task_deadline: Duration,
}

impl FanOut {
    pub fn new(registry: Arc<CapabilityRegistry>, task_deadline: Duration) -> Self {
        Self {
            registry,
            task_deadline,
        }
    }

    pub async fn fan_out<T, F, Fut>(&self, capability: Capability, sources: &[String], call: F) -> Vec<T>
    where
        T: SourceStamped + Send + 'static,
        F: Fn(Arc<dyn MusicProvider>) -> Fut,
        Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<T>>();
        // Dropping the set aborts any task still running
        let mut tasks = JoinSet::new();

        for source in sources {
            let Some(provider) = self.registry.lookup(source, capability) else {
                log::debug!("Skipping {}: no {:?} capability", source, capability);
                continue;
            };

            let request = call(provider);
            let tx = tx.clone();
            let source = source.clone();
            let deadline = self.task_deadline;

            tasks.spawn(async move {
                match tokio::time::timeout(deadline, request).await {
                    Ok(Ok(mut items)) => {
                        log::debug!("{} returned {} items for {:?}", source, items.len(), capability);
                        for item in items.iter_mut() {
                            item.stamp_source(&source);
                        }
                        let _ = tx.send(items);
                    }
                    Ok(Err(e)) => {
                        log::debug!("{} failed for {:?}: {:#}", source, capability, e);
                    }
                    Err(_) => {
                        log::warn!(
                            "{} did not answer {:?} within {:?}",
                            source,
                            capability,
                            deadline
                        );
                    }
                }
            });
        }
        drop(tx);

        let mut merged = Vec::new();
        while let Some(batch) = rx.recv().await {
            merged.extend(batch);
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                log::warn!("Fan-out task for {:?} ended abnormally: {}", capability, e);
            }
        }

        merged
    }

    pub async fn search_tracks(&self, keyword: &str, sources: &[String]) -> Vec<Track> {
        let sources = sources_or_default(sources, DEFAULT_SONG_SOURCES);
        let keyword = keyword.to_string();
        self.fan_out(Capability::Search, &sources, move |provider| {
            let keyword = keyword.clone();
            async move { provider.search(&keyword).await }
        })
        .await
    }

    pub async fn search_playlists(&self, keyword: &str, sources: &[String]) -> Vec<Playlist> {
        let sources = sources_or_default(sources, DEFAULT_PLAYLIST_SOURCES);
        let keyword = keyword.to_string();
        self.fan_out(Capability::SearchPlaylists, &sources, move |provider| {
            let keyword = keyword.clone();
            async move { provider.search_playlists(&keyword).await }
        })
        .await
    }

    pub async fn recommend_playlists(&self, sources: &[String]) -> Vec<Playlist> {
        let sources = sources_or_default(sources, DEFAULT_RECOMMEND_SOURCES);
        self.fan_out(Capability::Recommend, &sources, |provider| async move {
            provider.recommended_playlists().await
        })
        .await
    }
}
