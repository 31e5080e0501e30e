//! Auth-service token acquisition and background renewal.
//!
//! The provisioning API expects a service token. Credentials live in a
//! key file installed alongside the daemon; the renewer task keeps a
//! fresh token installed in the [`ProvdClient`] and retries on failure
//! instead of giving up.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::ProvdClient;

/// Requested token lifetime in seconds.
const TOKEN_EXPIRATION: u64 = 6 * 3600;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub https: bool,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default = "default_key_file")]
    pub key_file: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    9497
}

fn default_key_file() -> String {
    "/var/lib/leaserelay/key.toml".to_string()
}

impl AuthConfig {
    pub fn base_url(&self) -> String {
        let scheme = if self.https { "https" } else { "http" };
        let prefix = self.prefix.as_deref().unwrap_or("");
        format!("{}://{}:{}{}", scheme, self.host, self.port, prefix)
    }
}

/// Service credentials loaded from the key file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceKey {
    pub service_id: String,
    pub service_key: String,
}

impl ServiceKey {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read key file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse key file: {}", path.display()))
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    data: TokenData,
}

#[derive(Deserialize)]
struct TokenData {
    token: String,
}

/// Client for the auth service's token endpoint.
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
    key: ServiceKey,
}

impl AuthClient {
    pub fn new(config: &AuthConfig, key: ServiceKey) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url(),
            key,
        }
    }

    /// Obtain a fresh service token.
    pub async fn create_token(&self) -> Result<String> {
        let url = format!("{}/token", self.base_url);
        let resp = self
            .http
            .post(&url)
            .basic_auth(&self.key.service_id, Some(&self.key.service_key))
            .json(&serde_json::json!({ "expiration": TOKEN_EXPIRATION }))
            .send()
            .await
            .context("Token request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Auth service answered {}: {}", status, body);
        }

        let token: TokenResponse = resp.json().await.context("Invalid token response")?;
        Ok(token.data.token)
    }
}

/// Spawn the background task that keeps a fresh token installed in the
/// provisioning client. The first acquisition happens immediately;
/// afterwards the token is renewed well before it expires. Failures are
/// logged and retried on the next tick, never fatal.
pub fn spawn_token_renewer(auth: AuthClient, provd: ProvdClient) -> JoinHandle<()> {
    let renew_interval = Duration::from_secs(TOKEN_EXPIRATION * 8 / 10);
    let retry_interval = Duration::from_secs(30);

    tokio::spawn(async move {
        loop {
            let interval = match auth.create_token().await {
                Ok(token) => {
                    debug!("Renewed auth token");
                    provd.set_token(token);
                    renew_interval
                }
                Err(e) => {
                    warn!("Failed to renew auth token: {:#}", e);
                    retry_interval
                }
            };
            tokio::time::sleep(interval).await;
        }
    })
}
