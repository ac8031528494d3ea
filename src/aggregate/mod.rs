//! Aggregation of external data into per-run content.
//!
//! - `calendar`: the target day's events and schedule metrics
//! - `document`: recent/shared documents with priority ordering

pub mod calendar;
pub mod document;

pub use calendar::CalendarAggregator;
pub use document::DocumentAggregator;
