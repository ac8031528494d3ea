//! Credential gateway.
//!
//! Sole owner of raw OAuth tokens. Downstream components receive an
//! `AuthenticatedClient` handle and never see token material.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::adapters::AuthenticatedClient;
use crate::config::OAuthSettings;
use crate::domain::{Credential, Provider, User};
use crate::error::{PipelineError, Result};
use crate::store::Repository;

/// Supplies authenticated clients, refreshing credentials as needed.
#[async_trait]
pub trait CredentialGateway: Send + Sync {
    /// A valid client for this user and provider, or
    /// `CredentialExpired` / `CredentialRevoked`.
    async fn client(&self, user: &User, provider: Provider) -> Result<AuthenticatedClient>;
}

/// Gateway backed by the provider's OAuth token endpoint.
pub struct OAuthCredentialGateway {
    repo: Repository,
    http: reqwest::Client,
    settings: OAuthSettings,
    refresh_timeout: std::time::Duration,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    refresh_token: &'a str,
    grant_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl OAuthCredentialGateway {
    pub fn new(
        repo: Repository,
        http: reqwest::Client,
        settings: OAuthSettings,
        refresh_timeout: std::time::Duration,
    ) -> Self {
        Self {
            repo,
            http,
            settings,
            refresh_timeout,
        }
    }

    fn refresh_margin(&self) -> Duration {
        Duration::seconds(self.settings.refresh_margin_secs as i64)
    }

    /// Exchange the refresh token for a fresh access token and rotate
    /// the stored credential.
    async fn refresh(&self, cred: &Credential) -> Result<Credential> {
        let provider = cred.provider;
        let refresh_token = cred.refresh_token.as_deref().ok_or_else(|| {
            warn!(%provider, "Credential has no refresh token");
            PipelineError::CredentialExpired(provider)
        })?;

        let request = RefreshRequest {
            client_id: &self.settings.client_id,
            client_secret: &self.settings.client_secret,
            refresh_token,
            grant_type: "refresh_token",
        };

        let send = self
            .http
            .post(&self.settings.token_url)
            .form(&request)
            .send();

        let response = tokio::time::timeout(self.refresh_timeout, send)
            .await
            .map_err(|_| PipelineError::CredentialExpired(provider))?
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                warn!(%provider, error = %e, "Token refresh rejected");
                PipelineError::CredentialExpired(provider)
            })?;

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|_| PipelineError::CredentialExpired(provider))?;

        let mut rotated = cred.clone();
        rotated.access_token = refreshed.access_token;
        rotated.expires_at = Utc::now() + Duration::seconds(refreshed.expires_in);
        if let Some(new_refresh) = refreshed.refresh_token {
            rotated.refresh_token = Some(new_refresh);
        }

        self.repo.upsert_credential(&rotated).await?;
        info!(%provider, user = %cred.user_id, "Rotated credential");
        Ok(rotated)
    }
}

#[async_trait]
impl CredentialGateway for OAuthCredentialGateway {
    async fn client(&self, user: &User, provider: Provider) -> Result<AuthenticatedClient> {
        let cred = self
            .repo
            .get_credential(user.id, provider)
            .await?
            .ok_or(PipelineError::CredentialRevoked(provider))?;

        if cred.revoked {
            return Err(PipelineError::CredentialRevoked(provider));
        }

        let cred = if cred.needs_refresh(self.refresh_margin()) {
            match self.refresh(&cred).await {
                Ok(rotated) => rotated,
                Err(e) => {
                    // Failed refresh invalidates the credential so
                    // subsequent runs for this provider are blocked
                    // until the user re-links.
                    self.repo
                        .mark_credential_revoked(user.id, provider)
                        .await?;
                    return Err(e);
                }
            }
        } else {
            cred
        };

        Ok(AuthenticatedClient::new(
            provider,
            cred.access_token,
            self.http.clone(),
        ))
    }
}
