//! Ephemeral per-run content: calendar events, documents, and the
//! aggregates computed over them.
//!
//! Nothing in this module is persisted beyond a run except as a JSON
//! snapshot for dashboard previews.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// A normalized calendar event for the target day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,

    pub title: String,

    /// Start in UTC; display normalization happens at prompt time using
    /// the aggregate's timezone.
    pub start: DateTime<Utc>,

    pub end: DateTime<Utc>,

    pub is_all_day: bool,

    pub location: Option<String>,

    pub calendar_id: String,

    pub calendar_name: String,

    /// Attachment references: document identifiers or links.
    pub attachments: Vec<String>,

    pub attendee_count: usize,
}

impl CalendarEvent {
    /// Busy time contributed by this event. All-day events do not count.
    pub fn busy_minutes(&self) -> i64 {
        if self.is_all_day {
            0
        } else {
            (self.end - self.start).num_minutes().max(0)
        }
    }
}

/// A per-calendar fetch failure, attached to the aggregate so the digest
/// can mention the gap without failing the whole module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarError {
    pub calendar_id: String,
    pub calendar_name: String,
    pub message: String,
}

/// How densely scheduled the target day is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Density {
    Light,
    Moderate,
    Heavy,
}

/// Metrics derived from the day's events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleMetrics {
    pub event_count: usize,

    pub busy_minutes: i64,

    pub density: Density,

    /// Set on travel days, gap-free meeting runs, or back-to-back
    /// meetings in different locations.
    pub notable: bool,

    /// Consecutive meeting pairs with at most the configured gap.
    pub back_to_back: usize,

    /// Length of the longest single event, for narrative summaries.
    pub longest_event_minutes: i64,

    /// Distinct physical locations appearing on the day.
    pub locations: Vec<String>,
}

impl ScheduleMetrics {
    pub fn empty() -> Self {
        Self {
            event_count: 0,
            busy_minutes: 0,
            density: Density::Light,
            notable: false,
            back_to_back: 0,
            longest_event_minutes: 0,
            locations: Vec::new(),
        }
    }
}

/// Everything the calendar aggregator produces for one day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarAggregate {
    pub date: NaiveDate,

    pub timezone: Tz,

    /// Events sorted by start time.
    pub events: Vec<CalendarEvent>,

    /// Calendars that could not be read; never silently dropped.
    pub errors: Vec<CalendarError>,

    pub metrics: ScheduleMetrics,
}

/// Linkage between a document and the calendar event that references it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLink {
    pub event_id: String,
    pub event_title: String,
    pub event_start: DateTime<Utc>,
}

/// Extracted document text for prompt assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentContent {
    pub preview: String,
    pub word_count: usize,
}

/// A recently modified or shared document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,

    pub name: String,

    pub modified: DateTime<Utc>,

    /// Set when the document was shared with the user (as opposed to
    /// merely modified in their own drive).
    pub shared: bool,

    /// The calendar event that attaches or links this document, if any.
    pub linked_event: Option<EventLink>,

    /// Whether text content can be extracted. Unreadable documents stay
    /// in the overview with a "summary unavailable" marker but are
    /// excluded from deep dives.
    pub extractable: bool,

    pub web_link: Option<String>,

    /// Populated for top-priority extractable documents only.
    pub content: Option<DocumentContent>,
}

/// Prioritized document set for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentAggregate {
    /// Start of the lookback window.
    pub since: DateTime<Utc>,

    /// Documents in priority order: calendar-linked first (by linking
    /// event start), then remaining by modified time descending.
    pub documents: Vec<Document>,

    /// Per-source fetch errors that did not abort aggregation.
    pub errors: Vec<String>,
}

impl DocumentAggregate {
    /// Documents eligible for deep-dive generation, in priority order.
    pub fn deepdive_candidates(&self, top_k: usize) -> Vec<&Document> {
        self.documents
            .iter()
            .filter(|d| d.extractable)
            .take(top_k)
            .collect()
    }
}
