//! Command-line interface for briefcast.
//!
//! Provides commands for managing users and credentials, triggering
//! generation runs, checking run status, and inspecting feeds and
//! aggregate previews.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use uuid::Uuid;

use crate::adapters::{
    GoogleCalendarSource, GoogleDriveSource, OpenAiScriptModel, OpenAiSpeech,
};
use crate::aggregate::{CalendarAggregator, DocumentAggregator};
use crate::audio::AudioRenderer;
use crate::auth::OAuthCredentialGateway;
use crate::compose::ScriptComposer;
use crate::config::Settings;
use crate::core::GenerationOrchestrator;
use crate::domain::{Credential, Provider, TriggerKind, User};
use crate::publish::EpisodePublisher;
use crate::store::Repository;

/// briefcast - personalized daily podcast generator
#[derive(Parser, Debug)]
#[command(name = "briefcast")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a new user
    UserAdd {
        /// User email address
        email: String,

        /// IANA timezone name (e.g. "America/New_York")
        #[arg(short, long, default_value = "UTC")]
        timezone: String,

        /// Generate the welcome episode immediately
        #[arg(long)]
        welcome: bool,
    },

    /// Store or rotate an OAuth credential for a user
    CredentialSet {
        /// User email address
        email: String,

        /// Provider the credential grants access to
        #[arg(value_enum)]
        provider: ProviderArg,

        /// OAuth access token
        #[arg(long)]
        access_token: String,

        /// OAuth refresh token
        #[arg(long)]
        refresh_token: Option<String>,

        /// Seconds until the access token expires
        #[arg(long, default_value = "3600")]
        expires_in: i64,
    },

    /// Run generation for one user
    Run {
        /// User email address
        email: String,

        /// Date to generate for (defaults to today, user-local)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// What kind of run this is
        #[arg(short, long, value_enum, default_value = "manual")]
        trigger: TriggerArg,
    },

    /// Run generation for every active user
    RunAll {
        /// Date to generate for (defaults to today, UTC)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Check the status of a run
    Status {
        /// Run ID (UUID)
        run_id: String,
    },

    /// Print a user's feed XML path and contents
    Feed {
        /// User email address
        email: String,
    },

    /// Show a user's latest aggregate snapshots without generating
    Preview {
        /// User email address
        email: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProviderArg {
    Calendar,
    Documents,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TriggerArg {
    Signup,
    Scheduled,
    Manual,
}

impl From<TriggerArg> for TriggerKind {
    fn from(t: TriggerArg) -> Self {
        match t {
            TriggerArg::Signup => TriggerKind::Signup,
            TriggerArg::Scheduled => TriggerKind::Scheduled,
            TriggerArg::Manual => TriggerKind::Manual,
        }
    }
}

impl From<ProviderArg> for Provider {
    fn from(p: ProviderArg) -> Self {
        match p {
            ProviderArg::Calendar => Provider::Calendar,
            ProviderArg::Documents => Provider::Documents,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let settings = Settings::load()?;

        match self.command {
            Commands::UserAdd {
                email,
                timezone,
                welcome,
            } => add_user(&settings, &email, &timezone, welcome).await,
            Commands::CredentialSet {
                email,
                provider,
                access_token,
                refresh_token,
                expires_in,
            } => {
                set_credential(
                    &settings,
                    &email,
                    provider.into(),
                    access_token,
                    refresh_token,
                    expires_in,
                )
                .await
            }
            Commands::Run {
                email,
                date,
                trigger,
            } => run_user(&settings, &email, date, trigger.into()).await,
            Commands::RunAll { date } => run_all(&settings, date).await,
            Commands::Status { run_id } => show_status(&settings, &run_id).await,
            Commands::Feed { email } => show_feed(&settings, &email).await,
            Commands::Preview { email } => show_preview(&settings, &email).await,
        }
    }
}

/// Wire the full pipeline from settings. Provider API keys come from
/// the environment (OPENAI_API_KEY, GOOGLE_CLIENT_ID/SECRET).
async fn build_orchestrator(settings: &Settings) -> Result<GenerationOrchestrator> {
    let repo = Repository::open(&settings.db_path()).await?;
    let http = reqwest::Client::new();
    let openai = async_openai::Client::new();

    let gateway = Arc::new(OAuthCredentialGateway::new(
        repo.clone(),
        http,
        settings.oauth.clone(),
        settings.timeouts.refresh(),
    ));

    let calendar = CalendarAggregator::new(
        Arc::new(GoogleCalendarSource),
        settings.timeouts.fetch(),
    );
    let documents = DocumentAggregator::new(
        Arc::new(GoogleDriveSource),
        settings.timeouts.fetch(),
    );

    let composer = ScriptComposer::new(
        Arc::new(OpenAiScriptModel::new(
            openai.clone(),
            settings.compose.model.clone(),
        )),
        settings.retry.clone(),
        settings.timeouts.model(),
        settings.compose.max_script_chars,
    );
    let renderer = AudioRenderer::new(
        Arc::new(OpenAiSpeech::new(
            openai,
            async_openai::types::audio::SpeechModel::Tts1,
            async_openai::types::audio::Voice::Nova,
        )),
        settings.retry.clone(),
        settings.timeouts.synthesis(),
        settings.audio_dir(),
        settings.audio.base_url.clone(),
        settings.audio.words_per_minute,
        settings.audio.max_chunk_chars,
    );
    let publisher = EpisodePublisher::new(repo.clone(), settings.feeds_dir(), settings.feed.clone());

    Ok(GenerationOrchestrator::new(
        repo,
        gateway,
        calendar,
        documents,
        composer,
        renderer,
        publisher,
        settings.clone(),
    ))
}

async fn lookup_user(repo: &Repository, email: &str) -> Result<User> {
    repo.get_user_by_email(email)
        .await?
        .with_context(|| format!("No user with email: {email}"))
}

async fn add_user(settings: &Settings, email: &str, timezone: &str, welcome: bool) -> Result<()> {
    let timezone: chrono_tz::Tz = timezone
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid timezone: {timezone}"))?;

    let orchestrator = build_orchestrator(settings).await?;
    let repo = orchestrator.repository();

    if repo.get_user_by_email(email).await?.is_some() {
        anyhow::bail!("User already exists: {email}");
    }

    let user = User::new(email, timezone);
    repo.insert_user(&user).await?;
    println!("Created user {} ({})", user.email, user.id);
    println!(
        "Feed URL: {}/feeds/{}.xml",
        settings.feed.base_url.trim_end_matches('/'),
        user.feed_token
    );

    if welcome {
        let (_, cancel) = watch::channel(false);
        let date = Utc::now().with_timezone(&user.timezone).date_naive();
        let run = orchestrator
            .run(user.id, date, TriggerKind::Signup, cancel)
            .await?;
        println!(
            "Welcome run {}: {} ({} episode(s))",
            run.id,
            run.status.as_str(),
            run.episodes_generated
        );
    }

    Ok(())
}

async fn set_credential(
    settings: &Settings,
    email: &str,
    provider: Provider,
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
) -> Result<()> {
    let repo = Repository::open(&settings.db_path()).await?;
    let user = lookup_user(&repo, email).await?;

    let cred = Credential {
        user_id: user.id,
        provider,
        access_token,
        refresh_token,
        expires_at: Utc::now() + chrono::Duration::seconds(expires_in),
        scopes: vec![],
        revoked: false,
    };
    repo.upsert_credential(&cred).await?;
    println!("Stored {provider} credential for {email}");
    Ok(())
}

async fn run_user(
    settings: &Settings,
    email: &str,
    date: Option<NaiveDate>,
    trigger: TriggerKind,
) -> Result<()> {
    let orchestrator = build_orchestrator(settings).await?;
    let user = lookup_user(orchestrator.repository(), email).await?;
    let date = date.unwrap_or_else(|| Utc::now().with_timezone(&user.timezone).date_naive());

    let (_, cancel) = watch::channel(false);
    let run = orchestrator.run(user.id, date, trigger, cancel).await?;

    println!("Run {}: {}", run.id, run.status.as_str());
    println!("Episodes generated: {}", run.episodes_generated);
    for module in &run.modules {
        match &module.error {
            Some(error) => println!("  {}: {:?} - {error}", module.kind, module.status),
            None => println!("  {}: {:?}", module.kind, module.status),
        }
    }
    if let Some(error) = &run.error {
        eprintln!("\n[Run {} failed: {error}]", run.id);
        std::process::exit(1);
    }
    Ok(())
}

async fn run_all(settings: &Settings, date: Option<NaiveDate>) -> Result<()> {
    let orchestrator = build_orchestrator(settings).await?;
    let date = date.unwrap_or_else(|| Utc::now().date_naive());

    let (_, cancel) = watch::channel(false);
    let outcomes = orchestrator.run_all_scheduled(date, cancel).await?;

    let mut failed = 0usize;
    for outcome in &outcomes {
        match &outcome.outcome {
            Ok(status) => println!("{}: {}", outcome.email, status.as_str()),
            Err(reason) => {
                failed += 1;
                println!("{}: error - {reason}", outcome.email);
            }
        }
    }
    println!("\n{} user(s), {} error(s)", outcomes.len(), failed);
    Ok(())
}

async fn show_status(settings: &Settings, run_id_str: &str) -> Result<()> {
    let run_id =
        Uuid::parse_str(run_id_str).with_context(|| format!("Invalid run ID: {run_id_str}"))?;

    let repo = Repository::open(&settings.db_path()).await?;
    let run = repo
        .get_run(run_id)
        .await?
        .with_context(|| format!("No run with ID: {run_id}"))?;

    println!("Run ID: {}", run.id);
    println!("User: {}", run.user_id);
    println!("Date: {}", run.date);
    println!("Trigger: {}", run.trigger.as_str());
    println!("Status: {}", run.status.as_str());
    println!("Started: {}", run.started_at);
    if let Some(completed) = run.completed_at {
        println!("Completed: {completed}");
    }
    println!("Episodes generated: {}", run.episodes_generated);
    println!("\nModules:");
    for module in &run.modules {
        match &module.error {
            Some(error) => println!("  {}: {:?} - {error}", module.kind, module.status),
            None => println!("  {}: {:?}", module.kind, module.status),
        }
    }
    Ok(())
}

async fn show_feed(settings: &Settings, email: &str) -> Result<()> {
    let repo = Repository::open(&settings.db_path()).await?;
    let user = lookup_user(&repo, email).await?;

    let path = settings.feeds_dir().join(format!("{}.xml", user.feed_token));
    if !path.exists() {
        anyhow::bail!("No feed generated yet for {email}");
    }
    eprintln!("[{}]", path.display());
    let xml = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read feed: {}", path.display()))?;
    println!("{xml}");
    Ok(())
}

async fn show_preview(settings: &Settings, email: &str) -> Result<()> {
    let repo = Repository::open(&settings.db_path()).await?;
    let user = lookup_user(&repo, email).await?;

    match repo.latest_snapshots(user.id).await? {
        None => println!("No aggregate snapshots recorded for {email}"),
        Some((calendar, documents)) => {
            println!("Calendar:");
            println!("{}", calendar.as_deref().unwrap_or("  (none)"));
            println!("\nDocuments:");
            println!("{}", documents.as_deref().unwrap_or("  (none)"));
        }
    }
    Ok(())
}
