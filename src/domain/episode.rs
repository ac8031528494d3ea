//! Published episodes and deterministic episode identity.
//!
//! An episode id is derived from the user, requested date, and module,
//! so replaying a previously succeeded module is an idempotent no-op
//! rather than a duplicate feed item.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::run::ModuleKind;

/// A synthesized, persisted audio asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioAsset {
    /// Path of the persisted file under the audio directory.
    pub path: std::path::PathBuf,

    /// Public URL feed readers download from.
    pub url: String,

    pub file_size_bytes: u64,

    /// Playable length; must match the persisted asset.
    pub duration_seconds: u32,
}

/// A published feed item. Immutable once created; corrective republish
/// creates a new episode instead of mutating this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    /// Deterministic identifier, also the feed GUID.
    pub id: String,

    pub user_id: Uuid,

    /// The run date this episode was generated for.
    pub date: NaiveDate,

    pub kind: ModuleKind,

    pub document_id: Option<String>,

    pub title: String,

    pub description: String,

    pub audio_url: String,

    pub audio_path: std::path::PathBuf,

    pub duration_seconds: u32,

    pub file_size_bytes: u64,

    /// Derived deterministically from the run date so feed output is a
    /// pure function of the episode set.
    pub published_at: DateTime<Utc>,

    /// Intra-day ordering: welcome, digest, overview, deep dives.
    pub rank: u32,

    /// JSON snapshot of the aggregate inputs, for dashboard display.
    pub source_data: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Derive the stable episode identifier.
///
/// Hashes user id, date, module discriminator, and (for deep dives) the
/// document id; truncated hex keeps GUIDs readable in feed XML.
pub fn episode_id(
    user_id: Uuid,
    date: NaiveDate,
    kind: ModuleKind,
    document_id: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(date.to_string().as_bytes());
    hasher.update(kind.as_str().as_bytes());
    if let Some(doc) = document_id {
        hasher.update(b":");
        hasher.update(doc.as_bytes());
    }
    hex::encode(&hasher.finalize()[..16])
}

/// Intra-run playback order for a module.
///
/// Deep dives are ranked by their position in the priority ordering.
pub fn module_rank(kind: ModuleKind, deepdive_index: usize) -> u32 {
    match kind {
        ModuleKind::Welcome => 0,
        ModuleKind::CalendarDigest => 1,
        ModuleKind::DocumentOverview => 2,
        ModuleKind::DocumentDeepDive => 3 + deepdive_index as u32,
    }
}

/// Deterministic publish timestamp for a run date: midnight UTC.
///
/// Feed consumers sort by pubDate; keeping it a function of the date
/// (not the wall clock at publish time) keeps feed regeneration pure.
pub fn publish_timestamp(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_id_deterministic() {
        let user = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();

        let a = episode_id(user, date, ModuleKind::CalendarDigest, None);
        let b = episode_id(user, date, ModuleKind::CalendarDigest, None);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_episode_id_distinguishes_modules_and_documents() {
        let user = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();

        let digest = episode_id(user, date, ModuleKind::CalendarDigest, None);
        let overview = episode_id(user, date, ModuleKind::DocumentOverview, None);
        assert_ne!(digest, overview);

        let dive_a = episode_id(user, date, ModuleKind::DocumentDeepDive, Some("doc-a"));
        let dive_b = episode_id(user, date, ModuleKind::DocumentDeepDive, Some("doc-b"));
        assert_ne!(dive_a, dive_b);
    }

    #[test]
    fn test_module_rank_order() {
        assert!(module_rank(ModuleKind::Welcome, 0) < module_rank(ModuleKind::CalendarDigest, 0));
        assert!(
            module_rank(ModuleKind::DocumentOverview, 0)
                < module_rank(ModuleKind::DocumentDeepDive, 0)
        );
        assert!(
            module_rank(ModuleKind::DocumentDeepDive, 0)
                < module_rank(ModuleKind::DocumentDeepDive, 1)
        );
    }
}
