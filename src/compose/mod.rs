//! Script composition: build the module prompt, invoke the language
//! model, and validate the result.

pub mod prompts;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::adapters::ScriptModel;
use crate::core::retry::{with_retry, RetryPolicy};
use crate::domain::{CalendarAggregate, Document, DocumentAggregate, ModuleKind, User};
use crate::error::{PipelineError, Result};

/// One module's composition input.
#[derive(Debug, Clone, Copy)]
pub enum ComposeRequest<'a> {
    Welcome {
        user: &'a User,
    },
    CalendarDigest {
        calendar: &'a CalendarAggregate,
    },
    DocumentOverview {
        documents: &'a DocumentAggregate,
    },
    DocumentDeepDive {
        document: &'a Document,
    },
}

impl ComposeRequest<'_> {
    pub fn kind(&self) -> ModuleKind {
        match self {
            Self::Welcome { .. } => ModuleKind::Welcome,
            Self::CalendarDigest { .. } => ModuleKind::CalendarDigest,
            Self::DocumentOverview { .. } => ModuleKind::DocumentOverview,
            Self::DocumentDeepDive { .. } => ModuleKind::DocumentDeepDive,
        }
    }
}

pub struct ScriptComposer {
    model: Arc<dyn ScriptModel>,
    retry: RetryPolicy,
    model_timeout: Duration,
    max_script_chars: usize,
}

impl ScriptComposer {
    pub fn new(
        model: Arc<dyn ScriptModel>,
        retry: RetryPolicy,
        model_timeout: Duration,
        max_script_chars: usize,
    ) -> Self {
        Self {
            model,
            retry,
            model_timeout,
            max_script_chars,
        }
    }

    /// Compose a script for one module.
    ///
    /// Provider errors, timeouts, and invalid output (empty or
    /// oversized) are retried with bounded backoff; exhaustion yields
    /// `GenerationFailed` without touching sibling modules.
    #[instrument(skip_all, fields(module = %request.kind()))]
    pub async fn compose(&self, request: ComposeRequest<'_>) -> Result<String> {
        let (system, prompt) = match request {
            ComposeRequest::Welcome { user } => prompts::welcome_prompt(user),
            ComposeRequest::CalendarDigest { calendar } => {
                prompts::calendar_digest_prompt(calendar)
            }
            ComposeRequest::DocumentOverview { documents } => {
                prompts::document_overview_prompt(documents)
            }
            ComposeRequest::DocumentDeepDive { document } => prompts::deepdive_prompt(document),
        };

        let script = with_retry(&self.retry, |attempt| {
            let system = system.clone();
            let prompt = prompt.clone();
            async move {
                debug!(attempt, "Invoking language model");
                let generate = self.model.generate(&system, &prompt);
                let output = tokio::time::timeout(self.model_timeout, generate)
                    .await
                    .map_err(|_| {
                        PipelineError::GenerationFailed("model invocation timed out".into())
                    })??;
                self.validate(output)
            }
        })
        .await?;

        Ok(script)
    }

    /// Accept only non-empty output within the configured length bound.
    fn validate(&self, output: String) -> Result<String> {
        let trimmed = output.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::GenerationFailed(
                "model returned empty script".into(),
            ));
        }
        if trimmed.chars().count() > self.max_script_chars {
            return Err(PipelineError::GenerationFailed(format!(
                "script exceeds length bound ({} chars)",
                trimmed.chars().count()
            )));
        }
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    struct FlakyModel {
        calls: AtomicU32,
        fail_first: u32,
        output: String,
    }

    #[async_trait]
    impl ScriptModel for FlakyModel {
        async fn generate(&self, _system: &str, _prompt: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_first {
                Err(PipelineError::GenerationFailed("rate limited".into()))
            } else {
                Ok(self.output.clone())
            }
        }
    }

    fn make_composer(model: Arc<dyn ScriptModel>, max_chars: usize) -> ScriptComposer {
        let retry = RetryPolicy {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            backoff_multiplier: 1.0,
        };
        ScriptComposer::new(model, retry, Duration::from_secs(5), max_chars)
    }

    #[tokio::test]
    async fn test_compose_retries_transient_failures() {
        let model = Arc::new(FlakyModel {
            calls: AtomicU32::new(0),
            fail_first: 2,
            output: "Good morning! Here's your day.".to_string(),
        });
        let composer = make_composer(model.clone(), 20_000);
        let user = User::new("casey@example.com", chrono_tz::UTC);

        let script = composer
            .compose(ComposeRequest::Welcome { user: &user })
            .await
            .unwrap();
        assert_eq!(script, "Good morning! Here's your day.");
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_compose_fails_after_exhaustion() {
        let model = Arc::new(FlakyModel {
            calls: AtomicU32::new(0),
            fail_first: 10,
            output: String::new(),
        });
        let composer = make_composer(model, 20_000);
        let user = User::new("casey@example.com", chrono_tz::UTC);

        let err = composer
            .compose(ComposeRequest::Welcome { user: &user })
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn test_empty_and_oversized_output_rejected() {
        let model = Arc::new(FlakyModel {
            calls: AtomicU32::new(0),
            fail_first: 0,
            output: "   ".to_string(),
        });
        let composer = make_composer(model, 20_000);
        let user = User::new("casey@example.com", chrono_tz::UTC);
        assert!(composer
            .compose(ComposeRequest::Welcome { user: &user })
            .await
            .is_err());

        let model = Arc::new(FlakyModel {
            calls: AtomicU32::new(0),
            fail_first: 0,
            output: "x".repeat(50),
        });
        let composer = make_composer(model, 10);
        assert!(composer
            .compose(ComposeRequest::Welcome { user: &user })
            .await
            .is_err());
    }
}
