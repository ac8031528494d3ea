//! Calendar aggregation: fetch the target day across all calendars and
//! compute schedule-density metrics.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{instrument, warn};

use crate::adapters::{AuthenticatedClient, CalendarSource};
use crate::config::ScheduleThresholds;
use crate::domain::{
    CalendarAggregate, CalendarError, CalendarEvent, Density, ScheduleMetrics,
};
use crate::error::{PipelineError, Result};

pub struct CalendarAggregator {
    source: Arc<dyn CalendarSource>,
    fetch_timeout: Duration,
}

impl CalendarAggregator {
    pub fn new(source: Arc<dyn CalendarSource>, fetch_timeout: Duration) -> Self {
        Self {
            source,
            fetch_timeout,
        }
    }

    /// Fetch and aggregate one day of events.
    ///
    /// A provider error for one calendar is recorded on the aggregate
    /// and does not abort the others; only a failure to list calendars
    /// at all fails the aggregate.
    #[instrument(skip(self, client, thresholds), fields(%date))]
    pub async fn fetch_day(
        &self,
        client: &AuthenticatedClient,
        date: NaiveDate,
        timezone: Tz,
        thresholds: &ScheduleThresholds,
    ) -> Result<CalendarAggregate> {
        let (start, end) = day_window(date, timezone);

        let calendars = tokio::time::timeout(self.fetch_timeout, self.source.calendars(client))
            .await
            .map_err(|_| PipelineError::SourceFetchFailed("calendar list timed out".into()))??;

        let mut events: Vec<CalendarEvent> = Vec::new();
        let mut errors = Vec::new();

        for calendar in &calendars {
            let fetch = self.source.events(client, calendar, start, end);
            match tokio::time::timeout(self.fetch_timeout, fetch).await {
                Ok(Ok(batch)) => events.extend(batch),
                Ok(Err(e)) => {
                    warn!(calendar = %calendar.name, error = %e, "Calendar fetch failed");
                    errors.push(CalendarError {
                        calendar_id: calendar.id.clone(),
                        calendar_name: calendar.name.clone(),
                        message: e.to_string(),
                    });
                }
                Err(_) => {
                    warn!(calendar = %calendar.name, "Calendar fetch timed out");
                    errors.push(CalendarError {
                        calendar_id: calendar.id.clone(),
                        calendar_name: calendar.name.clone(),
                        message: "fetch timed out".to_string(),
                    });
                }
            }
        }

        events.sort_by_key(|e| e.start);
        let metrics = analyze(&events, thresholds);

        Ok(CalendarAggregate {
            date,
            timezone,
            events,
            errors,
            metrics,
        })
    }
}

/// UTC window covering the local day in the user's timezone.
fn day_window(date: NaiveDate, timezone: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start_local = timezone
        .from_local_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
        .earliest()
        .unwrap_or_else(|| timezone.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default()));
    let end_local = start_local + chrono::Duration::days(1);
    (
        start_local.with_timezone(&Utc),
        end_local.with_timezone(&Utc),
    )
}

/// Compute schedule metrics over a day's (sorted) events.
pub fn analyze(events: &[CalendarEvent], thresholds: &ScheduleThresholds) -> ScheduleMetrics {
    if events.is_empty() {
        return ScheduleMetrics::empty();
    }

    let event_count = events.len();
    let busy_minutes: i64 = events.iter().map(CalendarEvent::busy_minutes).sum();

    let mut locations: Vec<String> = events
        .iter()
        .filter_map(|e| e.location.clone())
        .collect();
    locations.sort();
    locations.dedup();

    let timed: Vec<&CalendarEvent> = events.iter().filter(|e| !e.is_all_day).collect();

    let mut back_to_back = 0usize;
    let mut location_switch_back_to_back = false;
    let mut longest_gap_free_run: i64 = 0;
    let mut run_start: Option<DateTime<Utc>> = None;
    let mut run_end: Option<DateTime<Utc>> = None;

    for pair in timed.windows(2) {
        let gap = (pair[1].start - pair[0].end).num_minutes();
        if gap <= thresholds.back_to_back_gap_minutes {
            back_to_back += 1;
            if let (Some(a), Some(b)) = (&pair[0].location, &pair[1].location) {
                if a != b {
                    location_switch_back_to_back = true;
                }
            }
            // Extend or start the gap-free run.
            if run_start.is_none() {
                run_start = Some(pair[0].start);
            }
            run_end = Some(pair[1].end.max(run_end.unwrap_or(pair[1].end)));
        } else {
            if let (Some(s), Some(e)) = (run_start, run_end) {
                longest_gap_free_run = longest_gap_free_run.max((e - s).num_minutes());
            }
            run_start = None;
            run_end = None;
        }
    }
    if let (Some(s), Some(e)) = (run_start, run_end) {
        longest_gap_free_run = longest_gap_free_run.max((e - s).num_minutes());
    }

    let longest_event_minutes = events
        .iter()
        .map(CalendarEvent::busy_minutes)
        .max()
        .unwrap_or(0);

    let notable = locations.len() > 1
        || longest_gap_free_run >= thresholds.gap_free_run_minutes
        || location_switch_back_to_back;

    ScheduleMetrics {
        event_count,
        busy_minutes,
        density: classify(event_count, busy_minutes, thresholds),
        notable,
        back_to_back,
        longest_event_minutes,
        locations,
    }
}

/// Density classification.
///
/// Count decides the tier; busy minutes break the tie at the heavy
/// boundary, where a day with exactly `heavy_min_events` events is
/// heavy only when its busy minutes also reach the heavy threshold.
pub fn classify(count: usize, busy_minutes: i64, thresholds: &ScheduleThresholds) -> Density {
    if count <= thresholds.light_max_events {
        Density::Light
    } else if count > thresholds.heavy_min_events {
        Density::Heavy
    } else if count == thresholds.heavy_min_events {
        if busy_minutes >= thresholds.heavy_min_busy_minutes {
            Density::Heavy
        } else {
            Density::Moderate
        }
    } else {
        Density::Moderate
    }
}
