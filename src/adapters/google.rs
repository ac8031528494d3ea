//! Google Calendar and Drive/Docs adapters.
//!
//! REST calls via reqwest with bearer auth from the gateway-issued
//! client handle. Response shapes are the subset of the v3 APIs the
//! pipeline reads.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::domain::{CalendarEvent, Document, DocumentContent};
use crate::error::{PipelineError, Result};

use super::{AuthenticatedClient, CalendarInfo, CalendarSource, DocumentSource};

const CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";
const DRIVE_API: &str = "https://www.googleapis.com/drive/v3";
const DOCS_API: &str = "https://docs.googleapis.com/v1";

const DOCUMENT_MIME: &str = "application/vnd.google-apps.document";

/// Google Calendar events source.
#[derive(Debug, Default)]
pub struct GoogleCalendarSource;

#[derive(Debug, Deserialize)]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListEntry {
    id: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    selected: Option<bool>,
    #[serde(default)]
    hidden: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<EventEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    location: Option<String>,
    start: Option<EventTime>,
    end: Option<EventTime>,
    #[serde(default)]
    attachments: Vec<EventAttachment>,
    #[serde(default)]
    attendees: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: Option<DateTime<Utc>>,
    date: Option<chrono::NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventAttachment {
    #[serde(default)]
    file_url: String,
}

#[async_trait]
impl CalendarSource for GoogleCalendarSource {
    async fn calendars(&self, client: &AuthenticatedClient) -> Result<Vec<CalendarInfo>> {
        let response = client
            .http()
            .get(format!("{CALENDAR_API}/users/me/calendarList"))
            .bearer_auth(client.bearer())
            .send()
            .await
            .map_err(|e| PipelineError::SourceFetchFailed(format!("calendar list: {e}")))?
            .error_for_status()
            .map_err(|e| PipelineError::SourceFetchFailed(format!("calendar list: {e}")))?;

        let list: CalendarListResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::SourceFetchFailed(format!("calendar list body: {e}")))?;

        let calendars: Vec<CalendarInfo> = list
            .items
            .into_iter()
            .filter(|c| c.selected.unwrap_or(true) && !c.hidden.unwrap_or(false))
            .map(|c| CalendarInfo {
                id: c.id,
                name: c.summary,
            })
            .collect();

        debug!(count = calendars.len(), "Fetched calendar list");
        Ok(calendars)
    }

    async fn events(
        &self,
        client: &AuthenticatedClient,
        calendar: &CalendarInfo,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let response = client
            .http()
            .get(format!(
                "{CALENDAR_API}/calendars/{}/events",
                urlencode(&calendar.id)
            ))
            .bearer_auth(client.bearer())
            .query(&[
                ("timeMin", start.to_rfc3339()),
                ("timeMax", end.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("maxResults", "100".to_string()),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::SourceFetchFailed(format!("events: {e}")))?
            .error_for_status()
            .map_err(|e| PipelineError::SourceFetchFailed(format!("events: {e}")))?;

        let events: EventsResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::SourceFetchFailed(format!("events body: {e}")))?;

        Ok(events
            .items
            .into_iter()
            .filter_map(|e| normalize_event(e, calendar))
            .collect())
    }
}

/// Convert one API event into the normalized domain shape.
///
/// Cancelled events and events without a usable start are dropped.
fn normalize_event(entry: EventEntry, calendar: &CalendarInfo) -> Option<CalendarEvent> {
    if entry.status.as_deref() == Some("cancelled") {
        return None;
    }

    let start_field = entry.start?;
    let (start, is_all_day) = match (start_field.date_time, start_field.date) {
        (Some(dt), _) => (dt, false),
        (None, Some(date)) => (date.and_hms_opt(0, 0, 0)?.and_utc(), true),
        (None, None) => return None,
    };

    let end = entry
        .end
        .and_then(|t| match (t.date_time, t.date) {
            (Some(dt), _) => Some(dt),
            (None, Some(date)) => Some(date.and_hms_opt(23, 59, 59)?.and_utc()),
            (None, None) => None,
        })
        .unwrap_or(start + chrono::Duration::hours(1));

    Some(CalendarEvent {
        id: entry.id,
        title: entry
            .summary
            .unwrap_or_else(|| "Untitled Event".to_string()),
        start,
        end,
        is_all_day,
        location: entry.location.filter(|l| !l.trim().is_empty()),
        calendar_id: calendar.id.clone(),
        calendar_name: calendar.name.clone(),
        attachments: entry
            .attachments
            .into_iter()
            .map(|a| a.file_url)
            .filter(|u| !u.is_empty())
            .collect(),
        attendee_count: entry.attendees.len(),
    })
}

/// Google Drive/Docs documents source.
#[derive(Debug, Default)]
pub struct GoogleDriveSource;

#[derive(Debug, Deserialize)]
struct FileListResponse {
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileEntry {
    id: String,
    name: String,
    modified_time: DateTime<Utc>,
    #[serde(default)]
    web_view_link: Option<String>,
    #[serde(default)]
    shared: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct DocsDocument {
    #[serde(default)]
    body: Option<DocsBody>,
}

#[derive(Debug, Deserialize)]
struct DocsBody {
    #[serde(default)]
    content: Vec<DocsElement>,
}

#[derive(Debug, Deserialize)]
struct DocsElement {
    #[serde(default)]
    paragraph: Option<DocsParagraph>,
}

#[derive(Debug, Deserialize)]
struct DocsParagraph {
    #[serde(default)]
    elements: Vec<DocsParagraphElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocsParagraphElement {
    #[serde(default)]
    text_run: Option<DocsTextRun>,
}

#[derive(Debug, Deserialize)]
struct DocsTextRun {
    #[serde(default)]
    content: String,
}

impl GoogleDriveSource {
    async fn files_query(
        &self,
        client: &AuthenticatedClient,
        query: &str,
    ) -> Result<Vec<FileEntry>> {
        let response = client
            .http()
            .get(format!("{DRIVE_API}/files"))
            .bearer_auth(client.bearer())
            .query(&[
                ("q", query),
                ("orderBy", "modifiedTime desc"),
                ("fields", "files(id,name,modifiedTime,webViewLink,shared)"),
                ("pageSize", "50"),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::SourceFetchFailed(format!("drive files: {e}")))?
            .error_for_status()
            .map_err(|e| PipelineError::SourceFetchFailed(format!("drive files: {e}")))?;

        let list: FileListResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::SourceFetchFailed(format!("drive files body: {e}")))?;

        Ok(list.files)
    }
}

#[async_trait]
impl DocumentSource for GoogleDriveSource {
    async fn changed_since(
        &self,
        client: &AuthenticatedClient,
        since: DateTime<Utc>,
    ) -> Result<Vec<Document>> {
        let since_str = since.to_rfc3339();
        let recent_q = format!("mimeType='{DOCUMENT_MIME}' and modifiedTime > '{since_str}'");
        let shared_q =
            format!("mimeType='{DOCUMENT_MIME}' and sharedWithMe and modifiedTime > '{since_str}'");

        let recent = self.files_query(client, &recent_q).await?;
        let shared = self.files_query(client, &shared_q).await?;

        let mut documents = Vec::with_capacity(recent.len() + shared.len());
        for (entries, is_shared) in [(recent, false), (shared, true)] {
            for file in entries {
                documents.push(Document {
                    id: file.id,
                    name: file.name,
                    modified: file.modified_time,
                    shared: is_shared || file.shared.unwrap_or(false),
                    linked_event: None,
                    extractable: true,
                    web_link: file.web_view_link,
                    content: None,
                });
            }
        }

        debug!(count = documents.len(), "Fetched changed documents");
        Ok(documents)
    }

    async fn content(
        &self,
        client: &AuthenticatedClient,
        document_id: &str,
    ) -> Result<Option<DocumentContent>> {
        let response = client
            .http()
            .get(format!("{DOCS_API}/documents/{document_id}"))
            .bearer_auth(client.bearer())
            .send()
            .await
            .map_err(|e| PipelineError::SourceFetchFailed(format!("docs get: {e}")))?;

        // Permission and type errors mean "unreadable", not a fetch
        // failure for the whole aggregate.
        if !response.status().is_success() {
            debug!(document_id, status = %response.status(), "Document not readable");
            return Ok(None);
        }

        let doc: DocsDocument = response
            .json()
            .await
            .map_err(|e| PipelineError::SourceFetchFailed(format!("docs body: {e}")))?;

        let mut text = String::new();
        for element in doc.body.map(|b| b.content).unwrap_or_default() {
            if let Some(paragraph) = element.paragraph {
                for elem in paragraph.elements {
                    if let Some(run) = elem.text_run {
                        text.push_str(&run.content);
                    }
                }
            }
        }

        let text = text.trim().to_string();
        if text.is_empty() {
            return Ok(None);
        }

        let word_count = text.split_whitespace().count();
        Ok(Some(DocumentContent {
            preview: text,
            word_count,
        }))
    }
}

fn urlencode(s: &str) -> String {
    // Calendar ids are email-like; '@' and ':' are the characters that
    // actually occur.
    s.replace('%', "%25")
        .replace('@', "%40")
        .replace(':', "%3A")
        .replace('#', "%23")
}
