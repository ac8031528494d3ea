//! Adapter interfaces for external services.
//!
//! The pipeline talks to calendars, document stores, the language
//! model, and the speech service exclusively through these traits, so
//! tests can substitute in-memory fakes for every suspension point.

pub mod google;
pub mod openai;

use chrono::{DateTime, Utc};

use async_trait::async_trait;

use crate::domain::{CalendarEvent, Document, DocumentContent, Provider};
use crate::error::Result;

pub use google::{GoogleCalendarSource, GoogleDriveSource};
pub use openai::{OpenAiScriptModel, OpenAiSpeech};

/// An authenticated handle to one provider.
///
/// Produced only by the credential gateway; holds the bearer token so
/// downstream components never see raw credentials in their own state.
#[derive(Clone)]
pub struct AuthenticatedClient {
    provider: Provider,
    token: String,
    http: reqwest::Client,
}

impl AuthenticatedClient {
    pub fn new(provider: Provider, token: String, http: reqwest::Client) -> Self {
        Self {
            provider,
            token,
            http,
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Bearer token for Authorization headers. Crate-private so raw
    /// tokens stay inside the adapter layer.
    pub(crate) fn bearer(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Token deliberately omitted.
        f.debug_struct("AuthenticatedClient")
            .field("provider", &self.provider)
            .finish()
    }
}

/// A calendar the credential can read.
#[derive(Debug, Clone)]
pub struct CalendarInfo {
    pub id: String,
    pub name: String,
}

/// Calendar events source.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// All calendars visible to the credential.
    async fn calendars(&self, client: &AuthenticatedClient) -> Result<Vec<CalendarInfo>>;

    /// Events in `[start, end)` for one calendar, unnormalized.
    async fn events(
        &self,
        client: &AuthenticatedClient,
        calendar: &CalendarInfo,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>>;
}

/// Recently modified/shared documents source.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Documents modified or shared since `since`, possibly with
    /// duplicates across the two queries.
    async fn changed_since(
        &self,
        client: &AuthenticatedClient,
        since: DateTime<Utc>,
    ) -> Result<Vec<Document>>;

    /// Extracted text for one document, `None` when unreadable.
    async fn content(
        &self,
        client: &AuthenticatedClient,
        document_id: &str,
    ) -> Result<Option<DocumentContent>>;
}

/// Language model invocation for script generation.
#[async_trait]
pub trait ScriptModel: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Text-to-speech synthesis for one script chunk.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}
