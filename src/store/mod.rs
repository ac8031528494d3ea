//! Durable storage for users, credentials, runs, and episodes.
//!
//! SQLite behind an async connection; all writers funnel through the
//! single connection, which serializes feed-relevant mutations.

pub mod schema;

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;
use uuid::Uuid;

use crate::domain::{
    Credential, Episode, GenerationRun, ModuleKind, ModuleResult, Provider, RunStatus,
    TriggerKind, User,
};
use crate::error::Result;

use schema::SCHEMA;

#[derive(Clone)]
pub struct Repository {
    conn: Connection,
}

/// Outcome of the atomic run entry guard.
#[derive(Debug)]
pub enum RunEntry {
    /// The run row was inserted; the caller owns the run.
    Started,
    /// Another run already covers (user, date).
    Existing(GenerationRun),
}

impl Repository {
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    /// In-memory database for tests.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }

    // User operations

    pub async fn insert_user(&self, user: &User) -> Result<()> {
        let user = user.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO users (id, email, timezone, feed_token, is_active, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        user.id.to_string(),
                        user.email,
                        user.timezone.name(),
                        user.feed_token,
                        user.is_active,
                        user.created_at.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let user = self
            .conn
            .call(move |conn| {
                let user = conn
                    .query_row(
                        "SELECT id, email, timezone, feed_token, is_active, created_at
                         FROM users WHERE id = ?1",
                        params![id.to_string()],
                        user_from_row,
                    )
                    .optional()?;
                Ok(user)
            })
            .await?;
        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_string();
        let user = self
            .conn
            .call(move |conn| {
                let user = conn
                    .query_row(
                        "SELECT id, email, timezone, feed_token, is_active, created_at
                         FROM users WHERE email = ?1",
                        params![email],
                        user_from_row,
                    )
                    .optional()?;
                Ok(user)
            })
            .await?;
        Ok(user)
    }

    pub async fn active_users(&self) -> Result<Vec<User>> {
        let users = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, email, timezone, feed_token, is_active, created_at
                     FROM users WHERE is_active = 1 ORDER BY created_at",
                )?;
                let users = stmt
                    .query_map([], user_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(users)
            })
            .await?;
        Ok(users)
    }

    /// Soft-disable: halts generation, keeps published episodes.
    pub async fn set_user_active(&self, id: Uuid, active: bool) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE users SET is_active = ?2 WHERE id = ?1",
                    params![id.to_string(), active],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Credential operations (used by the credential gateway only)

    pub async fn get_credential(
        &self,
        user_id: Uuid,
        provider: Provider,
    ) -> Result<Option<Credential>> {
        let cred = self
            .conn
            .call(move |conn| {
                let cred = conn
                    .query_row(
                        "SELECT user_id, provider, access_token, refresh_token, expires_at,
                                scopes, revoked
                         FROM credentials WHERE user_id = ?1 AND provider = ?2",
                        params![user_id.to_string(), provider.as_str()],
                        credential_from_row,
                    )
                    .optional()?;
                Ok(cred)
            })
            .await?;
        Ok(cred)
    }

    /// Insert or rotate a credential after linkage/refresh.
    pub async fn upsert_credential(&self, cred: &Credential) -> Result<()> {
        let cred = cred.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO credentials
                         (user_id, provider, access_token, refresh_token, expires_at, scopes, revoked)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(user_id, provider) DO UPDATE SET
                         access_token = excluded.access_token,
                         refresh_token = excluded.refresh_token,
                         expires_at = excluded.expires_at,
                         scopes = excluded.scopes,
                         revoked = excluded.revoked",
                    params![
                        cred.user_id.to_string(),
                        cred.provider.as_str(),
                        cred.access_token,
                        cred.refresh_token,
                        cred.expires_at.to_rfc3339(),
                        serde_json::to_string(&cred.scopes).unwrap_or_else(|_| "[]".to_string()),
                        cred.revoked,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Mark a credential invalid; blocks subsequent runs for the provider.
    pub async fn mark_credential_revoked(&self, user_id: Uuid, provider: Provider) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE credentials SET revoked = 1 WHERE user_id = ?1 AND provider = ?2",
                    params![user_id.to_string(), provider.as_str()],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Run operations

    /// Entry guard and insert in one transaction. A non-terminal or
    /// succeeded run already covering (user, date) is returned instead
    /// of inserting, so two concurrent triggers can never both start.
    pub async fn begin_run(&self, run: &GenerationRun) -> Result<RunEntry> {
        let run = run.clone();
        let entry = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let existing = tx
                    .query_row(
                        &format!(
                            "{RUN_COLUMNS}
                             WHERE user_id = ?1 AND run_date = ?2
                               AND status IN ('pending', 'running', 'succeeded')
                             ORDER BY started_at DESC LIMIT 1"
                        ),
                        params![run.user_id.to_string(), run.date.to_string()],
                        run_from_row,
                    )
                    .optional()?;
                if let Some(existing) = existing {
                    tx.commit()?;
                    return Ok(RunEntry::Existing(existing));
                }
                tx.execute(
                    "INSERT INTO generation_runs
                         (id, user_id, trigger_kind, run_date, status, started_at,
                          completed_at, modules, episodes_generated, error)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        run.id.to_string(),
                        run.user_id.to_string(),
                        run.trigger.as_str(),
                        run.date.to_string(),
                        run.status.as_str(),
                        run.started_at.to_rfc3339(),
                        run.completed_at.map(|t| t.to_rfc3339()),
                        serde_json::to_string(&run.modules)
                            .unwrap_or_else(|_| "[]".to_string()),
                        run.episodes_generated,
                        run.error,
                    ],
                )?;
                tx.commit()?;
                Ok(RunEntry::Started)
            })
            .await?;
        Ok(entry)
    }

    pub async fn insert_run(&self, run: &GenerationRun) -> Result<()> {
        let run = run.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO generation_runs
                         (id, user_id, trigger_kind, run_date, status, started_at,
                          completed_at, modules, episodes_generated, error)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        run.id.to_string(),
                        run.user_id.to_string(),
                        run.trigger.as_str(),
                        run.date.to_string(),
                        run.status.as_str(),
                        run.started_at.to_rfc3339(),
                        run.completed_at.map(|t| t.to_rfc3339()),
                        serde_json::to_string(&run.modules)
                            .unwrap_or_else(|_| "[]".to_string()),
                        run.episodes_generated,
                        run.error,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn update_run(&self, run: &GenerationRun) -> Result<()> {
        let run = run.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE generation_runs SET
                         status = ?2,
                         completed_at = ?3,
                         modules = ?4,
                         episodes_generated = ?5,
                         error = ?6
                     WHERE id = ?1",
                    params![
                        run.id.to_string(),
                        run.status.as_str(),
                        run.completed_at.map(|t| t.to_rfc3339()),
                        serde_json::to_string(&run.modules)
                            .unwrap_or_else(|_| "[]".to_string()),
                        run.episodes_generated,
                        run.error,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get_run(&self, id: Uuid) -> Result<Option<GenerationRun>> {
        let run = self
            .conn
            .call(move |conn| {
                let run = conn
                    .query_row(
                        &format!("{RUN_COLUMNS} WHERE id = ?1"),
                        params![id.to_string()],
                        run_from_row,
                    )
                    .optional()?;
                Ok(run)
            })
            .await?;
        Ok(run)
    }

    /// The entry-guard query: any run for (user, date) that has not
    /// reached a terminal state.
    pub async fn non_terminal_run(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<GenerationRun>> {
        let run = self
            .conn
            .call(move |conn| {
                let run = conn
                    .query_row(
                        &format!(
                            "{RUN_COLUMNS}
                             WHERE user_id = ?1 AND run_date = ?2
                               AND status IN ('pending', 'running')"
                        ),
                        params![user_id.to_string(), date.to_string()],
                        run_from_row,
                    )
                    .optional()?;
                Ok(run)
            })
            .await?;
        Ok(run)
    }

    pub async fn succeeded_run(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<GenerationRun>> {
        let run = self
            .conn
            .call(move |conn| {
                let run = conn
                    .query_row(
                        &format!(
                            "{RUN_COLUMNS}
                             WHERE user_id = ?1 AND run_date = ?2 AND status = 'succeeded'
                             ORDER BY started_at DESC LIMIT 1"
                        ),
                        params![user_id.to_string(), date.to_string()],
                        run_from_row,
                    )
                    .optional()?;
                Ok(run)
            })
            .await?;
        Ok(run)
    }

    /// Date of the most recent successful run, used as the document
    /// lookback anchor.
    pub async fn last_successful_run_date(&self, user_id: Uuid) -> Result<Option<NaiveDate>> {
        let date = self
            .conn
            .call(move |conn| {
                let date: Option<String> = conn
                    .query_row(
                        "SELECT run_date FROM generation_runs
                         WHERE user_id = ?1 AND status IN ('succeeded', 'partially_failed')
                         ORDER BY run_date DESC LIMIT 1",
                        params![user_id.to_string()],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(date)
            })
            .await?;
        Ok(date.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()))
    }

    /// Store read-only aggregate snapshots for dashboard previews.
    pub async fn save_snapshots(
        &self,
        run_id: Uuid,
        calendar: Option<String>,
        documents: Option<String>,
    ) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE generation_runs SET calendar_snapshot = ?2, document_snapshot = ?3
                     WHERE id = ?1",
                    params![run_id.to_string(), calendar, documents],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Latest aggregate snapshots for a user, without triggering
    /// generation.
    pub async fn latest_snapshots(
        &self,
        user_id: Uuid,
    ) -> Result<Option<(Option<String>, Option<String>)>> {
        let snapshots = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT calendar_snapshot, document_snapshot FROM generation_runs
                         WHERE user_id = ?1
                           AND (calendar_snapshot IS NOT NULL OR document_snapshot IS NOT NULL)
                         ORDER BY started_at DESC LIMIT 1",
                        params![user_id.to_string()],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;
        Ok(snapshots)
    }

    // Episode operations

    /// Insert an episode if its deterministic id is not already present.
    /// Returns whether a row was inserted (false on idempotent replay).
    pub async fn insert_episode(&self, episode: &Episode) -> Result<bool> {
        let episode = episode.clone();
        let inserted = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "INSERT OR IGNORE INTO episodes
                         (id, user_id, run_date, kind, document_id, title, description,
                          audio_url, audio_path, duration_seconds, file_size_bytes,
                          published_at, rank, source_data, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                    params![
                        episode.id,
                        episode.user_id.to_string(),
                        episode.date.to_string(),
                        episode.kind.as_str(),
                        episode.document_id,
                        episode.title,
                        episode.description,
                        episode.audio_url,
                        episode.audio_path.to_string_lossy(),
                        episode.duration_seconds,
                        episode.file_size_bytes,
                        episode.published_at.to_rfc3339(),
                        episode.rank,
                        episode.source_data,
                        episode.created_at.to_rfc3339(),
                    ],
                )?;
                Ok(changed > 0)
            })
            .await?;
        Ok(inserted)
    }

    /// All of a user's episodes, newest first (feed delivery order is
    /// re-derived by the publisher; this is raw storage order).
    pub async fn episodes_for_user(&self, user_id: Uuid) -> Result<Vec<Episode>> {
        let episodes = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, run_date, kind, document_id, title, description,
                            audio_url, audio_path, duration_seconds, file_size_bytes,
                            published_at, rank, source_data, created_at
                     FROM episodes WHERE user_id = ?1
                     ORDER BY published_at DESC, rank ASC, id ASC",
                )?;
                let episodes = stmt
                    .query_map(params![user_id.to_string()], episode_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(episodes)
            })
            .await?;
        Ok(episodes)
    }
}

const RUN_COLUMNS: &str = "SELECT id, user_id, trigger_kind, run_date, status, started_at,
        completed_at, modules, episodes_generated, error FROM generation_runs";

// Row mapping

fn parse_err(e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
}

fn parse_dt(s: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(parse_err)
}

fn parse_date(s: String) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(parse_err)
}

fn parse_uuid(s: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&s).map_err(parse_err)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let timezone: String = row.get(2)?;
    Ok(User {
        id: parse_uuid(row.get(0)?)?,
        email: row.get(1)?,
        timezone: timezone.parse().map_err(|_| {
            rusqlite::Error::InvalidColumnType(2, "timezone".to_string(), rusqlite::types::Type::Text)
        })?,
        feed_token: row.get(3)?,
        is_active: row.get(4)?,
        created_at: parse_dt(row.get(5)?)?,
    })
}

fn credential_from_row(row: &Row<'_>) -> rusqlite::Result<Credential> {
    let provider: String = row.get(1)?;
    let scopes: String = row.get(5)?;
    Ok(Credential {
        user_id: parse_uuid(row.get(0)?)?,
        provider: Provider::parse(&provider).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(1, "provider".to_string(), rusqlite::types::Type::Text)
        })?,
        access_token: row.get(2)?,
        refresh_token: row.get(3)?,
        expires_at: parse_dt(row.get(4)?)?,
        scopes: serde_json::from_str(&scopes).unwrap_or_default(),
        revoked: row.get(6)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<GenerationRun> {
    let trigger: String = row.get(2)?;
    let status: String = row.get(4)?;
    let completed_at: Option<String> = row.get(6)?;
    let modules: String = row.get(7)?;
    Ok(GenerationRun {
        id: parse_uuid(row.get(0)?)?,
        user_id: parse_uuid(row.get(1)?)?,
        trigger: TriggerKind::parse(&trigger).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(2, "trigger".to_string(), rusqlite::types::Type::Text)
        })?,
        date: parse_date(row.get(3)?)?,
        status: RunStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(4, "status".to_string(), rusqlite::types::Type::Text)
        })?,
        started_at: parse_dt(row.get(5)?)?,
        completed_at: completed_at.map(parse_dt).transpose()?,
        modules: serde_json::from_str::<Vec<ModuleResult>>(&modules).map_err(parse_err)?,
        episodes_generated: row.get(8)?,
        error: row.get(9)?,
    })
}

fn episode_from_row(row: &Row<'_>) -> rusqlite::Result<Episode> {
    let kind: String = row.get(3)?;
    let kind = match kind.as_str() {
        "welcome" => ModuleKind::Welcome,
        "calendar_digest" => ModuleKind::CalendarDigest,
        "document_overview" => ModuleKind::DocumentOverview,
        "document_deepdive" => ModuleKind::DocumentDeepDive,
        _ => {
            return Err(rusqlite::Error::InvalidColumnType(
                3,
                "kind".to_string(),
                rusqlite::types::Type::Text,
            ))
        }
    };
    let audio_path: String = row.get(8)?;
    Ok(Episode {
        id: row.get(0)?,
        user_id: parse_uuid(row.get(1)?)?,
        date: parse_date(row.get(2)?)?,
        kind,
        document_id: row.get(4)?,
        title: row.get(5)?,
        description: row.get(6)?,
        audio_url: row.get(7)?,
        audio_path: audio_path.into(),
        duration_seconds: row.get(9)?,
        file_size_bytes: row.get(10)?,
        published_at: parse_dt(row.get(11)?)?,
        rank: row.get(12)?,
        source_data: row.get(13)?,
        created_at: parse_dt(row.get(14)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::episode::{episode_id, module_rank, publish_timestamp};

    fn sample_episode(user: &User, date: NaiveDate) -> Episode {
        Episode {
            id: episode_id(user.id, date, ModuleKind::CalendarDigest, None),
            user_id: user.id,
            date,
            kind: ModuleKind::CalendarDigest,
            document_id: None,
            title: "Daily Briefing".to_string(),
            description: "Test".to_string(),
            audio_url: "http://localhost/audio/a.mp3".to_string(),
            audio_path: "/tmp/a.mp3".into(),
            duration_seconds: 120,
            file_size_bytes: 4096,
            published_at: publish_timestamp(date),
            rank: module_rank(ModuleKind::CalendarDigest, 0),
            source_data: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_user_round_trip() {
        let repo = Repository::open_in_memory().await.unwrap();
        let user = User::new("casey@example.com", chrono_tz::America::New_York);

        repo.insert_user(&user).await.unwrap();
        let loaded = repo.get_user(user.id).await.unwrap().unwrap();

        assert_eq!(loaded.email, user.email);
        assert_eq!(loaded.timezone, user.timezone);
        assert_eq!(loaded.feed_token, user.feed_token);
        assert!(loaded.is_active);
    }

    #[tokio::test]
    async fn test_disabled_user_excluded_from_active() {
        let repo = Repository::open_in_memory().await.unwrap();
        let user = User::new("casey@example.com", chrono_tz::UTC);
        repo.insert_user(&user).await.unwrap();

        assert_eq!(repo.active_users().await.unwrap().len(), 1);
        repo.set_user_active(user.id, false).await.unwrap();
        assert!(repo.active_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_credential_rotation() {
        let repo = Repository::open_in_memory().await.unwrap();
        let user = User::new("casey@example.com", chrono_tz::UTC);
        repo.insert_user(&user).await.unwrap();

        let mut cred = Credential {
            user_id: user.id,
            provider: Provider::Calendar,
            access_token: "old".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: Utc::now(),
            scopes: vec!["calendar.readonly".to_string()],
            revoked: false,
        };
        repo.upsert_credential(&cred).await.unwrap();

        cred.access_token = "new".to_string();
        repo.upsert_credential(&cred).await.unwrap();

        let loaded = repo
            .get_credential(user.id, Provider::Calendar)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.access_token, "new");
        assert_eq!(loaded.scopes, vec!["calendar.readonly".to_string()]);
    }

    #[tokio::test]
    async fn test_non_terminal_run_guard() {
        let repo = Repository::open_in_memory().await.unwrap();
        let user = User::new("casey@example.com", chrono_tz::UTC);
        repo.insert_user(&user).await.unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let mut run = GenerationRun::new(user.id, TriggerKind::Scheduled, date);
        run.status = RunStatus::Running;
        repo.insert_run(&run).await.unwrap();

        let found = repo.non_terminal_run(user.id, date).await.unwrap();
        assert_eq!(found.unwrap().id, run.id);

        run.status = RunStatus::Succeeded;
        repo.update_run(&run).await.unwrap();
        assert!(repo.non_terminal_run(user.id, date).await.unwrap().is_none());
        assert!(repo.succeeded_run(user.id, date).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_begin_run_returns_existing_active_run() {
        let repo = Repository::open_in_memory().await.unwrap();
        let user = User::new("casey@example.com", chrono_tz::UTC);
        repo.insert_user(&user).await.unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let first = GenerationRun::new(user.id, TriggerKind::Scheduled, date);
        assert!(matches!(
            repo.begin_run(&first).await.unwrap(),
            RunEntry::Started
        ));

        let second = GenerationRun::new(user.id, TriggerKind::Manual, date);
        match repo.begin_run(&second).await.unwrap() {
            RunEntry::Existing(existing) => assert_eq!(existing.id, first.id),
            RunEntry::Started => panic!("second run must not start"),
        }

        // The partial unique index rejects a raw second active row too.
        assert!(repo.insert_run(&second).await.is_err());
    }

    #[tokio::test]
    async fn test_episode_insert_is_idempotent() {
        let repo = Repository::open_in_memory().await.unwrap();
        let user = User::new("casey@example.com", chrono_tz::UTC);
        repo.insert_user(&user).await.unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let episode = sample_episode(&user, date);

        assert!(repo.insert_episode(&episode).await.unwrap());
        assert!(!repo.insert_episode(&episode).await.unwrap());
        assert_eq!(repo.episodes_for_user(user.id).await.unwrap().len(), 1);
    }
}
