//! Episode publication: persist feed items and regenerate the user's
//! RSS document.
//!
//! Publication is idempotent (deterministic episode ids, insert-or-
//! ignore) and feed regeneration is serialized per user so concurrent
//! runs cannot interleave partial writes.

pub mod rss;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::FeedSettings;
use crate::domain::{
    episode_id, module_rank, publish_timestamp, AudioAsset, Document, Episode, ModuleKind, User,
};
use crate::error::{PipelineError, Result};
use crate::store::Repository;

pub struct EpisodePublisher {
    repo: Repository,
    feeds_dir: PathBuf,
    settings: FeedSettings,
    feed_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl EpisodePublisher {
    pub fn new(repo: Repository, feeds_dir: PathBuf, settings: FeedSettings) -> Self {
        Self {
            repo,
            feeds_dir,
            settings,
            feed_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Persist one episode and regenerate the user's feed.
    ///
    /// Returns false when the episode already existed; the feed is
    /// regenerated either way, so a re-run converges the XML with the
    /// stored set.
    #[instrument(skip_all, fields(user = %user.id, episode = %episode.id))]
    pub async fn publish(&self, user: &User, episode: Episode) -> Result<bool> {
        let inserted = self.repo.insert_episode(&episode).await?;
        if !inserted {
            debug!("Episode already published, skipping insert");
        }
        self.regenerate_feed(user).await?;
        Ok(inserted)
    }

    /// Rewrite the user's feed XML from the full stored episode set.
    ///
    /// The write is atomic (temp file then rename) and serialized per
    /// user, so readers always see a complete document.
    #[instrument(skip_all, fields(user = %user.id))]
    pub async fn regenerate_feed(&self, user: &User) -> Result<PathBuf> {
        let lock = self.user_lock(user.id).await;
        let _guard = lock.lock().await;

        let episodes = self.repo.episodes_for_user(user.id).await?;
        let xml = rss::render_feed(user, &episodes, &self.settings);

        tokio::fs::create_dir_all(&self.feeds_dir).await?;
        let path = self.feed_path(user);
        let tmp = tempfile::NamedTempFile::new_in(&self.feeds_dir)?;
        std::io::Write::write_all(&mut tmp.as_file(), xml.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path)
            .map_err(|e| PipelineError::PublishConflict(e.to_string()))?;

        info!(episodes = episodes.len(), path = %path.display(), "Feed regenerated");
        Ok(path)
    }

    pub fn feed_path(&self, user: &User) -> PathBuf {
        self.feeds_dir.join(format!("{}.xml", user.feed_token))
    }

    async fn user_lock(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.feed_locks.lock().await;
        locks.entry(user_id).or_default().clone()
    }
}

/// Assemble a feed item for a completed module.
pub fn build_episode(
    user: &User,
    date: NaiveDate,
    kind: ModuleKind,
    document: Option<&Document>,
    deepdive_index: usize,
    asset: &AudioAsset,
    source_data: Option<String>,
) -> Episode {
    let document_id = document.map(|d| d.id.clone());
    let (title, description) = episode_text(user, date, kind, document);

    Episode {
        id: episode_id(user.id, date, kind, document_id.as_deref()),
        user_id: user.id,
        date,
        kind,
        document_id,
        title,
        description,
        audio_url: asset.url.clone(),
        audio_path: asset.path.clone(),
        duration_seconds: asset.duration_seconds,
        file_size_bytes: asset.file_size_bytes,
        published_at: publish_timestamp(date),
        rank: module_rank(kind, deepdive_index),
        source_data,
        created_at: Utc::now(),
    }
}

fn episode_text(
    user: &User,
    date: NaiveDate,
    kind: ModuleKind,
    document: Option<&Document>,
) -> (String, String) {
    let date_str = date.format("%B %-d, %Y");
    match kind {
        ModuleKind::Welcome => (
            "Welcome to Briefcast!".to_string(),
            format!(
                "Welcome aboard, {}! A quick introduction to your personalized daily podcast.",
                user.display_name()
            ),
        ),
        ModuleKind::CalendarDigest => (
            format!("Daily Briefing - {date_str}"),
            format!("Your schedule briefing for {date_str}."),
        ),
        ModuleKind::DocumentOverview => (
            format!("Document Overview - {date_str}"),
            format!("What changed in your documents as of {date_str}."),
        ),
        ModuleKind::DocumentDeepDive => {
            let name = document.map(|d| d.name.as_str()).unwrap_or("a document");
            (
                format!("Document Review: {name}"),
                format!("A closer look at {name}."),
            )
        }
    }
}
