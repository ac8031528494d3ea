//! Error taxonomy for the generation pipeline.
//!
//! Failures at module granularity are recorded on the owning
//! `ModuleResult` and never abort sibling modules. Only failures that
//! affect every provider escalate to a failed run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Provider;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Pipeline failure taxonomy.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Access credential expired and could not be refreshed.
    #[error("credential expired for provider '{0}'")]
    CredentialExpired(Provider),

    /// Access credential was revoked by the user or provider.
    #[error("credential revoked for provider '{0}'")]
    CredentialRevoked(Provider),

    /// A calendar or document fetch failed (possibly partially).
    #[error("source fetch failed: {0}")]
    SourceFetchFailed(String),

    /// Language model invocation failed or produced invalid output.
    #[error("script generation failed: {0}")]
    GenerationFailed(String),

    /// Text-to-speech synthesis failed.
    #[error("speech synthesis failed: {0}")]
    SynthesisFailed(String),

    /// Concurrent writers raced on the feed document.
    #[error("conflicting feed write: {0}")]
    PublishConflict(String),

    /// Durable storage error.
    #[error("storage error: {0}")]
    Storage(#[from] tokio_rusqlite::Error),

    /// Filesystem error (audio assets, feed documents).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Referenced user does not exist or is disabled.
    #[error("unknown or disabled user: {0}")]
    UnknownUser(String),
}

impl PipelineError {
    /// The reportable category of this error, recorded on module outcomes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CredentialExpired(_) => ErrorKind::CredentialExpired,
            Self::CredentialRevoked(_) => ErrorKind::CredentialRevoked,
            Self::SourceFetchFailed(_) => ErrorKind::SourceFetchFailed,
            Self::GenerationFailed(_) => ErrorKind::GenerationFailed,
            Self::SynthesisFailed(_) => ErrorKind::SynthesisFailed,
            Self::PublishConflict(_) => ErrorKind::PublishConflict,
            Self::Storage(_) | Self::Io(_) | Self::UnknownUser(_) => ErrorKind::Internal,
        }
    }
}

/// Serializable failure category for per-module outcome records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CredentialExpired,
    CredentialRevoked,
    SourceFetchFailed,
    GenerationFailed,
    SynthesisFailed,
    PublishConflict,
    Internal,
}
