//! Feed Regeneration Integration Tests
//!
//! The feed must be a pure function of the stored episode set: publish
//! order, replays, and regeneration never change the XML.

use chrono::NaiveDate;
use tempfile::TempDir;

use briefcast::config::FeedSettings;
use briefcast::domain::AudioAsset;
use briefcast::publish::{build_episode, EpisodePublisher};
use briefcast::{Episode, ModuleKind, Repository, User};

fn asset(name: &str) -> AudioAsset {
    AudioAsset {
        path: format!("/tmp/{name}.mp3").into(),
        url: format!("https://briefcast.example.com/audio/{name}.mp3"),
        file_size_bytes: 100_000,
        duration_seconds: 150,
    }
}

fn day_episodes(user: &User, date: NaiveDate) -> Vec<Episode> {
    vec![
        build_episode(user, date, ModuleKind::CalendarDigest, None, 0, &asset("a"), None),
        build_episode(user, date, ModuleKind::DocumentOverview, None, 0, &asset("b"), None),
    ]
}

async fn publish_all(
    dir: &TempDir,
    user: &User,
    episodes: Vec<Episode>,
) -> (EpisodePublisher, String) {
    let repo = Repository::open_in_memory().await.unwrap();
    repo.insert_user(user).await.unwrap();
    let publisher =
        EpisodePublisher::new(repo, dir.path().to_path_buf(), FeedSettings::default());

    for episode in episodes {
        publisher.publish(user, episode).await.unwrap();
    }
    let xml = std::fs::read_to_string(publisher.feed_path(user)).unwrap();
    (publisher, xml)
}

#[tokio::test]
async fn test_feed_identical_across_publish_orders() {
    let user = User::new("casey@example.com", chrono_tz::UTC);
    let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
    let episodes = day_episodes(&user, date);

    let dir_a = TempDir::new().unwrap();
    let (_, xml_forward) = publish_all(&dir_a, &user, episodes.clone()).await;

    let dir_b = TempDir::new().unwrap();
    let mut reversed = episodes;
    reversed.reverse();
    let (_, xml_reversed) = publish_all(&dir_b, &user, reversed).await;

    assert_eq!(xml_forward, xml_reversed);
}

#[tokio::test]
async fn test_feed_unchanged_by_idempotent_replay() {
    let user = User::new("casey@example.com", chrono_tz::UTC);
    let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
    let episodes = day_episodes(&user, date);

    let dir = TempDir::new().unwrap();
    let (publisher, xml_first) = publish_all(&dir, &user, episodes.clone()).await;

    // Replaying the same episodes must not alter the document.
    for episode in episodes {
        assert!(!publisher.publish(&user, episode).await.unwrap());
    }
    let xml_second = std::fs::read_to_string(publisher.feed_path(&user)).unwrap();
    assert_eq!(xml_first, xml_second);
}

#[tokio::test]
async fn test_items_ordered_by_date_then_rank() {
    let user = User::new("casey@example.com", chrono_tz::UTC);
    let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
    let tuesday = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();

    let dir = TempDir::new().unwrap();
    let mut episodes = day_episodes(&user, monday);
    episodes.extend(day_episodes(&user, tuesday));
    let (_, xml) = publish_all(&dir, &user, episodes).await;

    // Newest date first; within a date, digest (rank 1) precedes
    // overview (rank 2).
    let tue_digest = xml.find("Daily Briefing - June 3, 2025").unwrap();
    let tue_overview = xml.find("Document Overview - June 3, 2025").unwrap();
    let mon_digest = xml.find("Daily Briefing - June 2, 2025").unwrap();
    assert!(tue_digest < tue_overview);
    assert!(tue_overview < mon_digest);
}

#[tokio::test]
async fn test_guid_and_enclosure_fields() {
    let user = User::new("casey@example.com", chrono_tz::UTC);
    let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
    let episode = build_episode(
        &user,
        date,
        ModuleKind::CalendarDigest,
        None,
        0,
        &asset("a"),
        None,
    );
    let guid = episode.id.clone();

    let dir = TempDir::new().unwrap();
    let (_, xml) = publish_all(&dir, &user, vec![episode]).await;

    assert!(xml.contains(&format!("<guid isPermaLink=\"false\">{guid}</guid>")));
    assert!(xml.contains(
        "enclosure url=\"https://briefcast.example.com/audio/a.mp3\" length=\"100000\" type=\"audio/mpeg\""
    ));
    assert!(xml.contains("<itunes:duration>2:30</itunes:duration>"));
}
