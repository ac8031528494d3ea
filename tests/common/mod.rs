//! Shared test harness: in-memory fakes for every external service and
//! a fully wired orchestrator over a temporary data directory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tempfile::TempDir;

use briefcast::adapters::{
    AuthenticatedClient, CalendarInfo, CalendarSource, DocumentSource, ScriptModel,
    SpeechSynthesizer,
};
use briefcast::aggregate::{CalendarAggregator, DocumentAggregator};
use briefcast::audio::AudioRenderer;
use briefcast::auth::CredentialGateway;
use briefcast::compose::ScriptComposer;
use briefcast::config::Settings;
use briefcast::domain::{CalendarEvent, Document, DocumentContent};
use briefcast::publish::EpisodePublisher;
use briefcast::{
    GenerationOrchestrator, PipelineError, Provider, Repository, Result, RetryPolicy, User,
};

pub const RUN_DATE: &str = "2025-06-02";

pub fn run_date() -> NaiveDate {
    NaiveDate::parse_from_str(RUN_DATE, "%Y-%m-%d").unwrap()
}

#[derive(Default)]
pub struct Fixtures {
    pub events: Vec<CalendarEvent>,
    pub documents: Vec<Document>,
    pub contents: HashMap<String, String>,
    /// Providers whose credential acquisition fails.
    pub deny: Vec<Provider>,
    /// Make every per-calendar event fetch fail.
    pub fail_calendar_fetch: bool,
    /// Delay per model invocation, to let runs overlap.
    pub model_delay_ms: u64,
    /// Override the module concurrency bound.
    pub max_concurrent_modules: Option<usize>,
}

pub fn event(id: &str, title: &str, start_hm: (u32, u32), end_hm: (u32, u32)) -> CalendarEvent {
    let date = run_date();
    CalendarEvent {
        id: id.to_string(),
        title: title.to_string(),
        start: date.and_hms_opt(start_hm.0, start_hm.1, 0).unwrap().and_utc(),
        end: date.and_hms_opt(end_hm.0, end_hm.1, 0).unwrap().and_utc(),
        is_all_day: false,
        location: None,
        calendar_id: "primary".to_string(),
        calendar_name: "Primary".to_string(),
        attachments: vec![],
        attendee_count: 2,
    }
}

/// A document modified within the default lookback window; a larger
/// `recency` means modified more recently.
pub fn document(id: &str, name: &str, recency: u32) -> Document {
    Document {
        id: id.to_string(),
        name: name.to_string(),
        modified: Utc::now() - chrono::Duration::hours(i64::from(24 - recency.min(23))),
        shared: false,
        linked_event: None,
        extractable: true,
        web_link: None,
        content: None,
    }
}

struct FakeGateway {
    deny: Vec<Provider>,
}

#[async_trait]
impl CredentialGateway for FakeGateway {
    async fn client(&self, _user: &User, provider: Provider) -> Result<AuthenticatedClient> {
        if self.deny.contains(&provider) {
            return Err(PipelineError::CredentialExpired(provider));
        }
        Ok(AuthenticatedClient::new(
            provider,
            "test-token".to_string(),
            reqwest::Client::new(),
        ))
    }
}

struct FakeCalendar {
    events: Vec<CalendarEvent>,
    fail_fetch: bool,
}

#[async_trait]
impl CalendarSource for FakeCalendar {
    async fn calendars(&self, _client: &AuthenticatedClient) -> Result<Vec<CalendarInfo>> {
        Ok(vec![CalendarInfo {
            id: "primary".to_string(),
            name: "Primary".to_string(),
        }])
    }

    async fn events(
        &self,
        _client: &AuthenticatedClient,
        _calendar: &CalendarInfo,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        if self.fail_fetch {
            return Err(PipelineError::SourceFetchFailed("simulated outage".into()));
        }
        Ok(self
            .events
            .iter()
            .filter(|e| e.start >= start && e.start < end)
            .cloned()
            .collect())
    }
}

struct FakeDrive {
    documents: Vec<Document>,
    contents: HashMap<String, String>,
}

#[async_trait]
impl DocumentSource for FakeDrive {
    async fn changed_since(
        &self,
        _client: &AuthenticatedClient,
        since: DateTime<Utc>,
    ) -> Result<Vec<Document>> {
        Ok(self
            .documents
            .iter()
            .filter(|d| d.modified >= since)
            .cloned()
            .collect())
    }

    async fn content(
        &self,
        _client: &AuthenticatedClient,
        document_id: &str,
    ) -> Result<Option<DocumentContent>> {
        Ok(self.contents.get(document_id).map(|text| DocumentContent {
            preview: text.clone(),
            word_count: text.split_whitespace().count(),
        }))
    }
}

struct FakeModel {
    delay: Duration,
}

#[async_trait]
impl ScriptModel for FakeModel {
    async fn generate(&self, _system: &str, prompt: &str) -> Result<String> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        // Echo enough of the prompt that tests can verify routing.
        let head: String = prompt.chars().take(60).collect();
        Ok(format!("Good morning! {head}"))
    }
}

struct FakeSpeech;

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        Ok(text.as_bytes().to_vec())
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        initial_delay_ms: 1,
        max_delay_ms: 2,
        backoff_multiplier: 1.0,
    }
}

/// Wire an orchestrator over fakes and an in-memory database, with all
/// file output under `dir`.
pub async fn orchestrator(dir: &TempDir, fixtures: Fixtures) -> GenerationOrchestrator {
    let repo = Repository::open_in_memory().await.unwrap();

    let mut settings = Settings::default();
    settings.data_dir = dir.path().to_path_buf();
    settings.retry = fast_retry();
    if let Some(bound) = fixtures.max_concurrent_modules {
        settings.compose.max_concurrent_modules = bound;
    }

    let gateway = Arc::new(FakeGateway {
        deny: fixtures.deny,
    });
    let calendar = CalendarAggregator::new(
        Arc::new(FakeCalendar {
            events: fixtures.events,
            fail_fetch: fixtures.fail_calendar_fetch,
        }),
        Duration::from_secs(5),
    );
    let documents = DocumentAggregator::new(
        Arc::new(FakeDrive {
            documents: fixtures.documents,
            contents: fixtures.contents,
        }),
        Duration::from_secs(5),
    );
    let composer = ScriptComposer::new(
        Arc::new(FakeModel {
            delay: Duration::from_millis(fixtures.model_delay_ms),
        }),
        fast_retry(),
        Duration::from_secs(5),
        settings.compose.max_script_chars,
    );
    let renderer = AudioRenderer::new(
        Arc::new(FakeSpeech),
        fast_retry(),
        Duration::from_secs(5),
        settings.audio_dir(),
        settings.audio.base_url.clone(),
        settings.audio.words_per_minute,
        settings.audio.max_chunk_chars,
    );
    let publisher = EpisodePublisher::new(repo.clone(), settings.feeds_dir(), settings.feed.clone());

    GenerationOrchestrator::new(
        repo,
        gateway,
        calendar,
        documents,
        composer,
        renderer,
        publisher,
        settings,
    )
}

pub async fn insert_user(orchestrator: &GenerationOrchestrator) -> User {
    let user = User::new("casey@example.com", chrono_tz::America::New_York);
    orchestrator.repository().insert_user(&user).await.unwrap();
    user
}
