//! Document aggregation: recent and shared documents, cross-referenced
//! against the day's calendar to compute the priority ordering.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::adapters::{AuthenticatedClient, DocumentSource};
use crate::config::DocumentSettings;
use crate::domain::{CalendarAggregate, Document, DocumentAggregate, EventLink};
use crate::error::{PipelineError, Result};

pub struct DocumentAggregator {
    source: Arc<dyn DocumentSource>,
    fetch_timeout: Duration,
}

impl DocumentAggregator {
    pub fn new(source: Arc<dyn DocumentSource>, fetch_timeout: Duration) -> Self {
        Self {
            source,
            fetch_timeout,
        }
    }

    /// Fetch documents changed since `since` and order them by priority.
    ///
    /// Calendar-linked documents rank first, ordered by the start time
    /// of the referencing event; the rest follow, most recently
    /// modified first. Unreadable documents stay in the enumeration
    /// (marked non-extractable) but are never deep-dive candidates.
    pub async fn fetch_recent(
        &self,
        client: &AuthenticatedClient,
        since: DateTime<Utc>,
        calendar: Option<&CalendarAggregate>,
        settings: &DocumentSettings,
    ) -> Result<DocumentAggregate> {
        let documents = self.list_changed(client, since).await?;
        Ok(self
            .assemble(client, documents, since, calendar, settings)
            .await)
    }

    /// The provider-facing half of the fetch: enumerate changed
    /// documents, deduplicated. Runs concurrently with the calendar
    /// fetch; linking and extraction wait for the calendar aggregate.
    #[instrument(skip_all, fields(%since))]
    pub async fn list_changed(
        &self,
        client: &AuthenticatedClient,
        since: DateTime<Utc>,
    ) -> Result<Vec<Document>> {
        let fetch = self.source.changed_since(client, since);
        let fetched = tokio::time::timeout(self.fetch_timeout, fetch)
            .await
            .map_err(|_| PipelineError::SourceFetchFailed("document fetch timed out".into()))??;
        Ok(dedupe(fetched))
    }

    /// Link, prioritize, and extract content for deep-dive candidates.
    ///
    /// Extraction failures are recorded on the aggregate rather than
    /// propagated, so assembly itself cannot fail.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn assemble(
        &self,
        client: &AuthenticatedClient,
        mut documents: Vec<Document>,
        since: DateTime<Utc>,
        calendar: Option<&CalendarAggregate>,
        settings: &DocumentSettings,
    ) -> DocumentAggregate {
        if let Some(calendar) = calendar {
            link_to_events(&mut documents, calendar);
        }
        sort_by_priority(&mut documents);

        let mut errors = Vec::new();

        // Extract content for deep-dive candidates only; a failed
        // extraction demotes the document to "summary unavailable"
        // instead of dropping it.
        let mut remaining = settings.deepdive_top_k;
        for doc in documents.iter_mut() {
            if remaining == 0 {
                break;
            }
            if !doc.extractable {
                continue;
            }
            let fetch = self.source.content(client, &doc.id);
            match tokio::time::timeout(self.fetch_timeout, fetch).await {
                Ok(Ok(Some(mut content))) => {
                    content.preview = truncate_preview(&content.preview, settings.preview_chars);
                    doc.content = Some(content);
                    remaining -= 1;
                }
                Ok(Ok(None)) => {
                    debug!(document = %doc.name, "Content not extractable");
                    doc.extractable = false;
                }
                Ok(Err(e)) => {
                    warn!(document = %doc.name, error = %e, "Content extraction failed");
                    doc.extractable = false;
                    errors.push(format!("{}: {e}", doc.name));
                }
                Err(_) => {
                    warn!(document = %doc.name, "Content extraction timed out");
                    doc.extractable = false;
                    errors.push(format!("{}: extraction timed out", doc.name));
                }
            }
        }

        DocumentAggregate {
            since,
            documents,
            errors,
        }
    }
}

/// Deduplicate by document id, merging the shared flag.
fn dedupe(fetched: Vec<Document>) -> Vec<Document> {
    let mut by_id: HashMap<String, Document> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for doc in fetched {
        match by_id.get_mut(&doc.id) {
            Some(existing) => {
                existing.shared = existing.shared || doc.shared;
            }
            None => {
                order.push(doc.id.clone());
                by_id.insert(doc.id.clone(), doc);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|id| by_id.remove(&id))
        .collect()
}

/// Attach event linkage for documents referenced by the day's events.
///
/// The earliest referencing event wins when a document is attached to
/// several meetings.
fn link_to_events(documents: &mut [Document], calendar: &CalendarAggregate) {
    let mut links: HashMap<String, EventLink> = HashMap::new();

    for event in &calendar.events {
        for attachment in &event.attachments {
            let Some(doc_id) = extract_document_id(attachment) else {
                continue;
            };
            let link = EventLink {
                event_id: event.id.clone(),
                event_title: event.title.clone(),
                event_start: event.start,
            };
            links
                .entry(doc_id)
                .and_modify(|existing| {
                    if link.event_start < existing.event_start {
                        *existing = link.clone();
                    }
                })
                .or_insert(link);
        }
    }

    for doc in documents.iter_mut() {
        if let Some(link) = links.get(&doc.id) {
            doc.linked_event = Some(link.clone());
        }
    }
}

/// Priority order: linked documents first by referencing-event start,
/// then unlinked by modified time descending; id breaks exact ties so
/// the ordering is total.
fn sort_by_priority(documents: &mut [Document]) {
    documents.sort_by(|a, b| match (&a.linked_event, &b.linked_event) {
        (Some(la), Some(lb)) => la
            .event_start
            .cmp(&lb.event_start)
            .then_with(|| a.id.cmp(&b.id)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => b.modified.cmp(&a.modified).then_with(|| a.id.cmp(&b.id)),
    });
}

/// Document id from an attachment reference: either a bare id or a
/// docs link of the form `.../document/d/<id>/...`.
fn extract_document_id(reference: &str) -> Option<String> {
    if !reference.contains('/') {
        return Some(reference.to_string());
    }
    let (_, rest) = reference.split_once("/document/d/")?;
    let id = rest.split('/').next()?;
    (!id.is_empty()).then(|| id.to_string())
}

fn truncate_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}
