//! briefcast - personalized daily podcast generator
//!
//! Aggregates a user's calendar and recently changed documents, composes
//! spoken-word scripts with a language model, synthesizes audio, and
//! publishes the result as a per-user RSS feed.
//!
//! # Architecture
//!
//! Each day's content is produced by a generation run:
//! - Aggregators fetch the day's events and changed documents
//! - Each content module composes a script and synthesizes an episode
//! - Episodes have deterministic identities, so re-running a day
//!   converges instead of duplicating feed items
//! - Module failures are isolated; a run only fails outright when no
//!   module publishes
//!
//! # Modules
//!
//! - `adapters`: External service integrations (Google, OpenAI)
//! - `aggregate`: Calendar and document aggregation
//! - `auth`: Credential gateway and OAuth token refresh
//! - `compose`: Prompt assembly and script generation
//! - `audio`: Speech synthesis and asset persistence
//! - `publish`: Episode persistence and RSS rendering
//! - `core`: Run orchestration and retry primitives
//! - `store`: SQLite repository
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Register a user and print their feed URL
//! briefcast user-add casey@example.com --timezone America/New_York
//!
//! # Generate today's episodes for one user
//! briefcast run casey@example.com
//!
//! # Generate for every active user
//! briefcast run-all
//! ```

pub mod adapters;
pub mod aggregate;
pub mod audio;
pub mod auth;
pub mod cli;
pub mod compose;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod publish;
pub mod store;

// Re-export main types at crate root for convenience
pub use config::Settings;
pub use core::{GenerationOrchestrator, RetryPolicy};
pub use domain::{
    Density, Episode, GenerationRun, ModuleKind, ModuleStatus, Provider, RunStatus, TriggerKind,
    User,
};
pub use error::{ErrorKind, PipelineError, Result};
pub use store::Repository;
