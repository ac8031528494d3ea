//! Generation Run Integration Tests
//!
//! End-to-end runs over in-memory fakes: module planning, failure
//! isolation, idempotent re-runs, and terminal status resolution.

mod common;

use std::collections::HashMap;

use tempfile::TempDir;
use tokio::sync::watch;

use briefcast::{ModuleKind, ModuleStatus, Provider, RunStatus, TriggerKind};

use common::{document, event, insert_user, orchestrator, run_date, Fixtures};

fn cancel_token() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    // Keep the sender alive for the test's duration.
    std::mem::forget(tx);
    rx
}

#[tokio::test]
async fn test_signup_run_generates_welcome_only() {
    let dir = TempDir::new().unwrap();
    let orchestrator = orchestrator(&dir, Fixtures::default()).await;
    let user = insert_user(&orchestrator).await;

    let run = orchestrator
        .run(user.id, run_date(), TriggerKind::Signup, cancel_token())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Succeeded);
    assert_eq!(run.modules.len(), 1);
    assert_eq!(run.modules[0].kind, ModuleKind::Welcome);
    assert_eq!(run.episodes_generated, 1);

    let episodes = orchestrator
        .repository()
        .episodes_for_user(user.id)
        .await
        .unwrap();
    assert_eq!(episodes.len(), 1);
    assert_eq!(episodes[0].title, "Welcome to Briefcast!");

    // Feed exists at the token path and carries the episode.
    let feed_path = dir
        .path()
        .join("feeds")
        .join(format!("{}.xml", user.feed_token));
    let xml = std::fs::read_to_string(feed_path).unwrap();
    assert!(xml.contains("Welcome to Briefcast!"));
}

#[tokio::test]
async fn test_scheduled_run_produces_all_modules() {
    let dir = TempDir::new().unwrap();
    let mut contents = HashMap::new();
    contents.insert("doc-a".to_string(), "Quarterly planning notes".to_string());
    contents.insert("doc-b".to_string(), "Launch checklist draft".to_string());

    let fixtures = Fixtures {
        events: vec![
            event("ev1", "Standup", (13, 0), (13, 30)),
            event("ev2", "Design review", (15, 0), (16, 0)),
        ],
        documents: vec![
            document("doc-a", "Q3 Plan", 20),
            document("doc-b", "Launch Checklist", 18),
        ],
        contents,
        ..Fixtures::default()
    };
    let orchestrator = orchestrator(&dir, fixtures).await;
    let user = insert_user(&orchestrator).await;

    let run = orchestrator
        .run(user.id, run_date(), TriggerKind::Scheduled, cancel_token())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Succeeded);
    // Digest, overview, and one deep dive per extractable document.
    let kinds: Vec<ModuleKind> = run.modules.iter().map(|m| m.kind).collect();
    assert_eq!(kinds[0], ModuleKind::CalendarDigest);
    assert_eq!(kinds[1], ModuleKind::DocumentOverview);
    assert_eq!(
        kinds.iter().filter(|k| **k == ModuleKind::DocumentDeepDive).count(),
        2
    );
    assert_eq!(run.episodes_generated, 4);

    for module in &run.modules {
        assert_eq!(module.status, ModuleStatus::Succeeded);
        assert!(module.episode_id.is_some());
        assert!(module.duration_seconds.is_some());
    }

    // Audio assets persisted under the audio directory.
    let audio_files = std::fs::read_dir(dir.path().join("audio")).unwrap().count();
    assert_eq!(audio_files, 4);
}

#[tokio::test]
async fn test_rerun_returns_existing_succeeded_run() {
    let dir = TempDir::new().unwrap();
    let fixtures = Fixtures {
        events: vec![event("ev1", "Standup", (13, 0), (13, 30))],
        ..Fixtures::default()
    };
    let orchestrator = orchestrator(&dir, fixtures).await;
    let user = insert_user(&orchestrator).await;

    let first = orchestrator
        .run(user.id, run_date(), TriggerKind::Scheduled, cancel_token())
        .await
        .unwrap();
    assert_eq!(first.status, RunStatus::Succeeded);

    let second = orchestrator
        .run(user.id, run_date(), TriggerKind::Manual, cancel_token())
        .await
        .unwrap();
    assert_eq!(second.id, first.id);

    // No duplicate episodes.
    let episodes = orchestrator
        .repository()
        .episodes_for_user(user.id)
        .await
        .unwrap();
    assert_eq!(episodes.len(), first.episodes_generated as usize);
}

#[tokio::test]
async fn test_document_credential_failure_is_isolated() {
    let dir = TempDir::new().unwrap();
    let fixtures = Fixtures {
        events: vec![event("ev1", "Standup", (13, 0), (13, 30))],
        documents: vec![document("doc-a", "Q3 Plan", 20)],
        deny: vec![Provider::Documents],
        ..Fixtures::default()
    };
    let orchestrator = orchestrator(&dir, fixtures).await;
    let user = insert_user(&orchestrator).await;

    let run = orchestrator
        .run(user.id, run_date(), TriggerKind::Scheduled, cancel_token())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::PartiallyFailed);

    let digest = run
        .modules
        .iter()
        .find(|m| m.kind == ModuleKind::CalendarDigest)
        .unwrap();
    assert_eq!(digest.status, ModuleStatus::Succeeded);

    let overview = run
        .modules
        .iter()
        .find(|m| m.kind == ModuleKind::DocumentOverview)
        .unwrap();
    assert_eq!(overview.status, ModuleStatus::Skipped);
    assert_eq!(
        overview.error_kind,
        Some(briefcast::ErrorKind::CredentialExpired)
    );
    assert!(overview.error.is_some());

    // Only the calendar episode published.
    let episodes = orchestrator
        .repository()
        .episodes_for_user(user.id)
        .await
        .unwrap();
    assert_eq!(episodes.len(), 1);
    assert_eq!(episodes[0].kind, ModuleKind::CalendarDigest);
}

#[tokio::test]
async fn test_run_with_zero_successes_fails() {
    let dir = TempDir::new().unwrap();
    let fixtures = Fixtures {
        deny: vec![Provider::Calendar, Provider::Documents],
        ..Fixtures::default()
    };
    let orchestrator = orchestrator(&dir, fixtures).await;
    let user = insert_user(&orchestrator).await;

    let run = orchestrator
        .run(user.id, run_date(), TriggerKind::Scheduled, cancel_token())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.episodes_generated, 0);
    assert!(orchestrator
        .repository()
        .episodes_for_user(user.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_calendar_fetch_failure_fails_only_digest() {
    let dir = TempDir::new().unwrap();
    let mut contents = HashMap::new();
    contents.insert("doc-a".to_string(), "Quarterly planning notes".to_string());
    let fixtures = Fixtures {
        documents: vec![document("doc-a", "Q3 Plan", 20)],
        contents,
        fail_calendar_fetch: true,
        ..Fixtures::default()
    };
    let orchestrator = orchestrator(&dir, fixtures).await;
    let user = insert_user(&orchestrator).await;

    let run = orchestrator
        .run(user.id, run_date(), TriggerKind::Scheduled, cancel_token())
        .await
        .unwrap();

    // The per-calendar failure is recorded on the aggregate, so the
    // digest still composes (mentioning the unreadable calendar) and
    // the run succeeds end to end.
    assert_eq!(run.status, RunStatus::Succeeded);
    let digest = run
        .modules
        .iter()
        .find(|m| m.kind == ModuleKind::CalendarDigest)
        .unwrap();
    assert_eq!(digest.status, ModuleStatus::Succeeded);
}

#[tokio::test]
async fn test_unknown_user_is_rejected() {
    let dir = TempDir::new().unwrap();
    let orchestrator = orchestrator(&dir, Fixtures::default()).await;

    let err = orchestrator
        .run(
            uuid::Uuid::new_v4(),
            run_date(),
            TriggerKind::Manual,
            cancel_token(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, briefcast::PipelineError::UnknownUser(_)));
}

#[tokio::test]
async fn test_disabled_user_is_rejected() {
    let dir = TempDir::new().unwrap();
    let orchestrator = orchestrator(&dir, Fixtures::default()).await;
    let user = insert_user(&orchestrator).await;
    orchestrator
        .repository()
        .set_user_active(user.id, false)
        .await
        .unwrap();

    let err = orchestrator
        .run(user.id, run_date(), TriggerKind::Scheduled, cancel_token())
        .await
        .unwrap_err();
    assert!(matches!(err, briefcast::PipelineError::UnknownUser(_)));
}

#[tokio::test]
async fn test_cancellation_before_start_produces_failed_run() {
    let dir = TempDir::new().unwrap();
    let fixtures = Fixtures {
        events: vec![event("ev1", "Standup", (13, 0), (13, 30))],
        ..Fixtures::default()
    };
    let orchestrator = orchestrator(&dir, fixtures).await;
    let user = insert_user(&orchestrator).await;

    let (tx, rx) = watch::channel(true);
    let run = orchestrator
        .run(user.id, run_date(), TriggerKind::Scheduled, rx)
        .await
        .unwrap();
    drop(tx);

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.is_some());
    assert_eq!(run.episodes_generated, 0);
}

#[tokio::test]
async fn test_concurrent_triggers_share_one_run() {
    let dir = TempDir::new().unwrap();
    let fixtures = Fixtures {
        events: vec![event("ev1", "Standup", (13, 0), (13, 30))],
        model_delay_ms: 200,
        ..Fixtures::default()
    };
    let orchestrator = orchestrator(&dir, fixtures).await;
    let user = insert_user(&orchestrator).await;

    // Scheduled and manual triggers race for the same (user, date);
    // exactly one run may execute, the other gets the same record.
    let (first, second) = tokio::join!(
        orchestrator.run(user.id, run_date(), TriggerKind::Scheduled, cancel_token()),
        orchestrator.run(user.id, run_date(), TriggerKind::Manual, cancel_token()),
    );
    let first = first.unwrap();
    let second = second.unwrap();
    assert_eq!(first.id, second.id);

    let episodes = orchestrator
        .repository()
        .episodes_for_user(user.id)
        .await
        .unwrap();
    assert_eq!(episodes.len(), 1);
}

#[tokio::test]
async fn test_zero_concurrency_bound_still_completes() {
    let dir = TempDir::new().unwrap();
    let fixtures = Fixtures {
        events: vec![event("ev1", "Standup", (13, 0), (13, 30))],
        max_concurrent_modules: Some(0),
        ..Fixtures::default()
    };
    let orchestrator = orchestrator(&dir, fixtures).await;
    let user = insert_user(&orchestrator).await;

    let run = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        orchestrator.run(user.id, run_date(), TriggerKind::Scheduled, cancel_token()),
    )
    .await
    .expect("run must not hang on a zero concurrency bound")
    .unwrap();
    assert_eq!(run.status, RunStatus::Succeeded);
}

#[tokio::test]
async fn test_run_all_scheduled_isolates_users() {
    let dir = TempDir::new().unwrap();
    let fixtures = Fixtures {
        events: vec![event("ev1", "Standup", (13, 0), (13, 30))],
        ..Fixtures::default()
    };
    let orchestrator = orchestrator(&dir, fixtures).await;

    let alice = briefcast::User::new("alice@example.com", chrono_tz::UTC);
    let bob = briefcast::User::new("bob@example.com", chrono_tz::UTC);
    orchestrator.repository().insert_user(&alice).await.unwrap();
    orchestrator.repository().insert_user(&bob).await.unwrap();

    let outcomes = orchestrator
        .run_all_scheduled(run_date(), cancel_token())
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 2);
    for outcome in &outcomes {
        assert_eq!(*outcome.outcome.as_ref().unwrap(), RunStatus::Succeeded);
    }
}
