//! Domain types for the generation pipeline.
//!
//! - `user`: users, providers, credentials
//! - `content`: ephemeral calendar/document aggregates
//! - `run`: generation runs and per-module outcomes
//! - `episode`: published episodes and deterministic identity

pub mod content;
pub mod episode;
pub mod run;
pub mod user;

pub use content::{
    CalendarAggregate, CalendarError, CalendarEvent, Density, Document, DocumentAggregate,
    DocumentContent, EventLink, ScheduleMetrics,
};
pub use episode::{episode_id, module_rank, publish_timestamp, AudioAsset, Episode};
pub use run::{GenerationRun, ModuleKind, ModuleResult, ModuleStatus, RunStatus, TriggerKind};
pub use user::{Credential, Provider, User};
