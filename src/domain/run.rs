//! Generation runs and per-module outcomes.
//!
//! A run is the unit of idempotency: at most one non-terminal run may
//! exist per (user, requested date) at a time.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorKind;

/// What caused a run to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Immediately after OAuth linkage; produces a welcome-only run.
    Signup,
    /// The daily per-user scheduler.
    Scheduled,
    /// On-demand trigger from the web layer.
    Manual,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signup => "signup",
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "signup" => Some(Self::Signup),
            "scheduled" => Some(Self::Scheduled),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// Run lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    PartiallyFailed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::PartiallyFailed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::PartiallyFailed => "partially_failed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "succeeded" => Some(Self::Succeeded),
            "partially_failed" => Some(Self::PartiallyFailed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// The closed set of content modules a run can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    /// One-time signup introduction, independent of calendar/documents.
    Welcome,
    /// The day's schedule, detailed or narrative depending on density.
    CalendarDigest,
    /// One pass over the full prioritized document list.
    DocumentOverview,
    /// Longer-form narration of a single document.
    DocumentDeepDive,
}

impl ModuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::CalendarDigest => "calendar_digest",
            Self::DocumentOverview => "document_overview",
            Self::DocumentDeepDive => "document_deepdive",
        }
    }
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome states for a single module within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    Pending,
    Succeeded,
    Failed,
    /// Dependencies unavailable (e.g. credential invalid for the
    /// provider the module reads from).
    Skipped,
}

/// Per-module outcome recorded on the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleResult {
    pub kind: ModuleKind,

    /// Set for deep dives: the document narrated.
    pub document_id: Option<String>,

    pub status: ModuleStatus,

    /// Accepted script text (absent until composition succeeds).
    pub script: Option<String>,

    /// Deterministic episode id, once published.
    pub episode_id: Option<String>,

    pub duration_seconds: Option<u32>,

    pub error_kind: Option<ErrorKind>,

    pub error: Option<String>,
}

impl ModuleResult {
    pub fn pending(kind: ModuleKind, document_id: Option<String>) -> Self {
        Self {
            kind,
            document_id,
            status: ModuleStatus::Pending,
            script: None,
            episode_id: None,
            duration_seconds: None,
            error_kind: None,
            error: None,
        }
    }

    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.status = ModuleStatus::Failed;
        self.error_kind = Some(kind);
        self.error = Some(message.into());
    }

    pub fn skip(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.status = ModuleStatus::Skipped;
        self.error_kind = Some(kind);
        self.error = Some(message.into());
    }
}

/// A single generation run for one user and date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRun {
    pub id: Uuid,

    pub user_id: Uuid,

    pub trigger: TriggerKind,

    /// The date content is generated for, in the user's timezone.
    pub date: NaiveDate,

    pub status: RunStatus,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    pub modules: Vec<ModuleResult>,

    pub episodes_generated: u32,

    /// Run-level error detail, set only for fully failed runs.
    pub error: Option<String>,
}

impl GenerationRun {
    pub fn new(user_id: Uuid, trigger: TriggerKind, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            trigger,
            date,
            status: RunStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            modules: Vec::new(),
            episodes_generated: 0,
            error: None,
        }
    }

    /// Final status from the module outcomes: succeeded only if every
    /// module published, failed only if none did.
    pub fn resolve_status(&self) -> RunStatus {
        let succeeded = self
            .modules
            .iter()
            .filter(|m| m.status == ModuleStatus::Succeeded)
            .count();

        if self.modules.is_empty() || succeeded == 0 {
            RunStatus::Failed
        } else if succeeded == self.modules.len() {
            RunStatus::Succeeded
        } else {
            RunStatus::PartiallyFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_with(statuses: &[ModuleStatus]) -> GenerationRun {
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let mut run = GenerationRun::new(Uuid::new_v4(), TriggerKind::Scheduled, date);
        for status in statuses {
            let mut m = ModuleResult::pending(ModuleKind::CalendarDigest, None);
            m.status = *status;
            run.modules.push(m);
        }
        run
    }

    #[test]
    fn test_all_modules_succeeded() {
        let run = run_with(&[ModuleStatus::Succeeded, ModuleStatus::Succeeded]);
        assert_eq!(run.resolve_status(), RunStatus::Succeeded);
    }

    #[test]
    fn test_partial_failure_is_not_fatal() {
        let run = run_with(&[ModuleStatus::Succeeded, ModuleStatus::Failed]);
        assert_eq!(run.resolve_status(), RunStatus::PartiallyFailed);

        let run = run_with(&[ModuleStatus::Succeeded, ModuleStatus::Skipped]);
        assert_eq!(run.resolve_status(), RunStatus::PartiallyFailed);
    }

    #[test]
    fn test_zero_successes_fails() {
        let run = run_with(&[ModuleStatus::Failed, ModuleStatus::Skipped]);
        assert_eq!(run.resolve_status(), RunStatus::Failed);

        let run = run_with(&[]);
        assert_eq!(run.resolve_status(), RunStatus::Failed);
    }
}
