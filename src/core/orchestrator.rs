//! The generation run lifecycle.
//!
//! One orchestrator instance drives all runs: entry guard, aggregation,
//! bounded-concurrency module execution, publication, and terminal
//! status resolution. Module failures are isolated; only failures that
//! leave zero published episodes make the whole run fail.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::sync::{watch, Semaphore};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::aggregate::{CalendarAggregator, DocumentAggregator};
use crate::audio::AudioRenderer;
use crate::auth::CredentialGateway;
use crate::compose::{ComposeRequest, ScriptComposer};
use crate::config::Settings;
use crate::domain::{
    episode_id, CalendarAggregate, Document, DocumentAggregate, GenerationRun, ModuleKind,
    ModuleResult, ModuleStatus, Provider, RunStatus, TriggerKind, User,
};
use crate::error::{ErrorKind, PipelineError, Result};
use crate::publish::{build_episode, EpisodePublisher};
use crate::store::{Repository, RunEntry};

pub struct GenerationOrchestrator {
    repo: Repository,
    gateway: Arc<dyn CredentialGateway>,
    calendar: CalendarAggregator,
    documents: DocumentAggregator,
    composer: ScriptComposer,
    renderer: AudioRenderer,
    publisher: EpisodePublisher,
    settings: Settings,
}

/// Outcome of one user's run within a batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub user_id: Uuid,
    pub email: String,
    pub outcome: std::result::Result<RunStatus, String>,
}

/// What a planned module will do once executed.
enum ModulePlan<'a> {
    Ready(Job<'a>),
    /// Dependencies unavailable before the module could start.
    Skip(ErrorKind, String),
    /// The module's aggregation failed outright.
    Fail(ErrorKind, String),
}

enum Job<'a> {
    Welcome,
    CalendarDigest(&'a CalendarAggregate),
    DocumentOverview(&'a DocumentAggregate),
    DocumentDeepDive { document: &'a Document, index: usize },
}

struct PlannedModule<'a> {
    result: ModuleResult,
    plan: ModulePlan<'a>,
}

impl GenerationOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: Repository,
        gateway: Arc<dyn CredentialGateway>,
        calendar: CalendarAggregator,
        documents: DocumentAggregator,
        composer: ScriptComposer,
        renderer: AudioRenderer,
        publisher: EpisodePublisher,
        settings: Settings,
    ) -> Self {
        Self {
            repo,
            gateway,
            calendar,
            documents,
            composer,
            renderer,
            publisher,
            settings,
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Execute one generation run for a user and date.
    ///
    /// Re-invocation is safe: an existing non-terminal or succeeded run
    /// for the same (user, date) is returned as-is instead of starting
    /// a duplicate.
    #[instrument(skip(self, cancel), fields(user = %user_id, %date, trigger = trigger.as_str()))]
    pub async fn run(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        trigger: TriggerKind,
        cancel: watch::Receiver<bool>,
    ) -> Result<GenerationRun> {
        let user = self
            .repo
            .get_user(user_id)
            .await?
            .ok_or_else(|| PipelineError::UnknownUser(user_id.to_string()))?;
        if !user.is_active {
            return Err(PipelineError::UnknownUser(format!(
                "{} is disabled",
                user.email
            )));
        }

        let mut run = GenerationRun::new(user.id, trigger, date);
        if let RunEntry::Existing(existing) = self.repo.begin_run(&run).await? {
            info!(run = %existing.id, "Run already covers this date, returning existing");
            return Ok(existing);
        }
        run.status = RunStatus::Running;
        self.repo.update_run(&run).await?;

        let fatal = self.execute(&user, &mut run, trigger, &cancel).await.err();

        run.episodes_generated = run
            .modules
            .iter()
            .filter(|m| m.status == ModuleStatus::Succeeded)
            .count() as u32;
        run.status = match fatal {
            Some(e) => {
                error!(error = %e, "Run aborted by fatal error");
                run.error = Some(e.to_string());
                RunStatus::Failed
            }
            None => run.resolve_status(),
        };
        run.completed_at = Some(Utc::now());
        self.repo.update_run(&run).await?;

        info!(
            run = %run.id,
            status = run.status.as_str(),
            episodes = run.episodes_generated,
            "Run completed"
        );
        Ok(run)
    }

    /// Run every active user for the date, concurrently. One user's
    /// failure never stops the batch.
    #[instrument(skip(self, cancel), fields(%date))]
    pub async fn run_all_scheduled(
        &self,
        date: NaiveDate,
        cancel: watch::Receiver<bool>,
    ) -> Result<Vec<BatchOutcome>> {
        let users = self.repo.active_users().await?;
        info!(users = users.len(), "Starting scheduled batch");

        let tasks = users.into_iter().map(|user| {
            let cancel = cancel.clone();
            async move {
                let outcome = self
                    .run(user.id, date, TriggerKind::Scheduled, cancel)
                    .await
                    .map(|run| run.status)
                    .map_err(|e| e.to_string());
                if let Err(reason) = &outcome {
                    warn!(user = %user.email, reason, "Batch member failed");
                }
                BatchOutcome {
                    user_id: user.id,
                    email: user.email,
                    outcome,
                }
            }
        });

        Ok(futures::future::join_all(tasks).await)
    }

    /// Aggregate, compose, synthesize, and publish for one started run.
    ///
    /// Module-level failures are recorded on `run.modules`; only
    /// storage-level failures propagate as `Err` and abort the run.
    async fn execute(
        &self,
        user: &User,
        run: &mut GenerationRun,
        trigger: TriggerKind,
        cancel: &watch::Receiver<bool>,
    ) -> Result<()> {
        if *cancel.borrow() {
            run.error = Some("run cancelled before start".to_string());
            return Ok(());
        }

        // Welcome runs touch no external data source.
        if trigger == TriggerKind::Signup {
            let planned = vec![PlannedModule {
                result: ModuleResult::pending(ModuleKind::Welcome, None),
                plan: ModulePlan::Ready(Job::Welcome),
            }];
            run.modules = self.execute_modules(user, run.date, planned, cancel).await;
            return Ok(());
        }

        let calendar_client = self
            .gateway
            .client(user, Provider::Calendar)
            .await
            .map_err(|e| (e.kind(), e.to_string()));
        let documents_client = self
            .gateway
            .client(user, Provider::Documents)
            .await
            .map_err(|e| (e.kind(), e.to_string()));

        let since = match self.repo.last_successful_run_date(user.id).await? {
            Some(last) => last.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc(),
            None => {
                Utc::now() - chrono::Duration::days(self.settings.documents.default_lookback_days)
            }
        };

        // The two provider fetches overlap; document linking and
        // content extraction wait for the calendar aggregate.
        let calendar_fetch = async {
            match &calendar_client {
                Ok(client) => Some(
                    self.calendar
                        .fetch_day(client, run.date, user.timezone, &self.settings.schedule)
                        .await,
                ),
                Err(_) => None,
            }
        };
        let document_listing = async {
            match &documents_client {
                Ok(client) => Some(self.documents.list_changed(client, since).await),
                Err(_) => None,
            }
        };
        let (calendar_out, listing_out) = tokio::join!(calendar_fetch, document_listing);

        let calendar_ref = calendar_out.as_ref().and_then(|r| r.as_ref().ok());
        let documents_out = match (&documents_client, listing_out) {
            (Ok(client), Some(Ok(listed))) => Some(Ok(self
                .documents
                .assemble(client, listed, since, calendar_ref, &self.settings.documents)
                .await)),
            (_, Some(Err(e))) => Some(Err(e)),
            _ => None,
        };

        self.repo
            .save_snapshots(
                run.id,
                calendar_out
                    .as_ref()
                    .and_then(|r| r.as_ref().ok())
                    .and_then(|a| serde_json::to_string(a).ok()),
                documents_out
                    .as_ref()
                    .and_then(|r| r.as_ref().ok())
                    .and_then(|a| serde_json::to_string(a).ok()),
            )
            .await?;

        let mut planned: Vec<PlannedModule<'_>> = Vec::new();

        planned.push(PlannedModule {
            result: ModuleResult::pending(ModuleKind::CalendarDigest, None),
            plan: match (&calendar_client, &calendar_out) {
                (Err((kind, msg)), _) => ModulePlan::Skip(*kind, msg.clone()),
                (Ok(_), Some(Ok(aggregate))) => ModulePlan::Ready(Job::CalendarDigest(aggregate)),
                (Ok(_), Some(Err(e))) => ModulePlan::Fail(e.kind(), e.to_string()),
                (Ok(_), None) => {
                    ModulePlan::Fail(ErrorKind::Internal, "calendar fetch skipped".to_string())
                }
            },
        });

        match (&documents_client, &documents_out) {
            (Err((kind, msg)), _) => {
                // Deep dives share the overview's dependency, so the
                // skip is recorded once on the overview module.
                planned.push(PlannedModule {
                    result: ModuleResult::pending(ModuleKind::DocumentOverview, None),
                    plan: ModulePlan::Skip(*kind, msg.clone()),
                });
            }
            (Ok(_), Some(Ok(aggregate))) => {
                if !aggregate.documents.is_empty() {
                    planned.push(PlannedModule {
                        result: ModuleResult::pending(ModuleKind::DocumentOverview, None),
                        plan: ModulePlan::Ready(Job::DocumentOverview(aggregate)),
                    });
                    for (index, document) in aggregate
                        .deepdive_candidates(self.settings.documents.deepdive_top_k)
                        .into_iter()
                        .enumerate()
                    {
                        planned.push(PlannedModule {
                            result: ModuleResult::pending(
                                ModuleKind::DocumentDeepDive,
                                Some(document.id.clone()),
                            ),
                            plan: ModulePlan::Ready(Job::DocumentDeepDive { document, index }),
                        });
                    }
                }
            }
            (Ok(_), Some(Err(e))) => {
                planned.push(PlannedModule {
                    result: ModuleResult::pending(ModuleKind::DocumentOverview, None),
                    plan: ModulePlan::Fail(e.kind(), e.to_string()),
                });
            }
            (Ok(_), None) => {}
        }

        run.modules = self.execute_modules(user, run.date, planned, cancel).await;
        Ok(())
    }

    /// Execute planned modules under the configured concurrency bound,
    /// preserving plan order in the recorded outcomes.
    async fn execute_modules(
        &self,
        user: &User,
        date: NaiveDate,
        planned: Vec<PlannedModule<'_>>,
        cancel: &watch::Receiver<bool>,
    ) -> Vec<ModuleResult> {
        // A zero bound would park every module on acquire forever.
        let bound = self.settings.compose.max_concurrent_modules.max(1);
        let semaphore = Arc::new(Semaphore::new(bound));

        let tasks = planned.into_iter().enumerate().map(|(i, module)| {
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            async move {
                let mut result = module.result;
                match module.plan {
                    ModulePlan::Skip(kind, message) => result.skip(kind, message),
                    ModulePlan::Fail(kind, message) => result.fail(kind, message),
                    ModulePlan::Ready(job) => match semaphore.acquire().await {
                        Err(_) => {
                            result.fail(ErrorKind::Internal, "concurrency limiter closed")
                        }
                        Ok(_permit) => {
                            if *cancel.borrow() {
                                result.skip(ErrorKind::Internal, "run cancelled");
                            } else {
                                match self.execute_module(user, date, &job).await {
                                    Ok((episode, duration, script)) => {
                                        result.status = ModuleStatus::Succeeded;
                                        result.episode_id = Some(episode);
                                        result.duration_seconds = Some(duration);
                                        result.script = Some(script);
                                    }
                                    Err(e) => {
                                        warn!(
                                            module = result.kind.as_str(),
                                            error = %e,
                                            "Module failed"
                                        );
                                        result.fail(e.kind(), e.to_string());
                                    }
                                }
                            }
                        }
                    },
                }
                (i, result)
            }
        });

        let mut outcomes = futures::future::join_all(tasks).await;
        outcomes.sort_by_key(|(i, _)| *i);
        outcomes.into_iter().map(|(_, result)| result).collect()
    }

    /// Compose, synthesize, and publish one module.
    async fn execute_module(
        &self,
        user: &User,
        date: NaiveDate,
        job: &Job<'_>,
    ) -> Result<(String, u32, String)> {
        let (request, document, index, source_data) = match job {
            Job::Welcome => (ComposeRequest::Welcome { user }, None, 0, None),
            Job::CalendarDigest(aggregate) => (
                ComposeRequest::CalendarDigest {
                    calendar: aggregate,
                },
                None,
                0,
                serde_json::to_string(aggregate).ok(),
            ),
            Job::DocumentOverview(aggregate) => (
                ComposeRequest::DocumentOverview {
                    documents: aggregate,
                },
                None,
                0,
                serde_json::to_string(aggregate).ok(),
            ),
            Job::DocumentDeepDive { document, index } => (
                ComposeRequest::DocumentDeepDive { document },
                Some(*document),
                *index,
                serde_json::to_string(document).ok(),
            ),
        };
        let kind = request.kind();

        let script = self.composer.compose(request).await?;
        let id = episode_id(user.id, date, kind, document.map(|d| d.id.as_str()));
        let asset = self.renderer.render(&id, &script).await?;
        let duration = asset.duration_seconds;

        let episode = build_episode(user, date, kind, document, index, &asset, source_data);
        self.publisher.publish(user, episode).await?;

        Ok((id, duration, script))
    }
}
