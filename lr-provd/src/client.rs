use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use lr_wire::DhcpInfo;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvdConfig {
    /// No default: a missing host is a fatal startup condition.
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub https: bool,
    #[serde(default)]
    pub prefix: Option<String>,
}

fn default_port() -> u16 {
    8666
}

impl ProvdConfig {
    /// Base URL for the provisioning API; `host` must be resolved by the
    /// caller beforehand.
    pub fn base_url(&self, host: &str) -> String {
        let scheme = if self.https { "https" } else { "http" };
        let prefix = self.prefix.as_deref().unwrap_or("");
        format!("{}://{}:{}{}", scheme, host, self.port, prefix)
    }
}

impl Default for ProvdConfig {
    fn default() -> Self {
        serde_json::from_str("{}").unwrap()
    }
}

#[derive(Error, Debug)]
pub enum ProvdError {
    /// The provisioning server answered with a non-success status, e.g.
    /// because the device already exists. Propagated unchanged so
    /// callers can tell it apart from transport trouble.
    #[error("provisioning server answered {status}: {message}")]
    Api { status: u16, message: String },
    #[error("request to provisioning server failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Client for the provisioning server's device-manager API.
///
/// Cheap to clone; the auth token cell is shared between clones so the
/// background renewer can install fresh tokens.
#[derive(Clone)]
pub struct ProvdClient {
    http: reqwest::Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl ProvdClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Install the auth token used for subsequent requests.
    pub fn set_token(&self, token: String) {
        *self.token.write().expect("token lock poisoned") = Some(token);
    }

    /// Create (or refresh) a device record on the provisioning server
    /// from one DHCP lease event.
    pub async fn create_device_from_dhcp(&self, info: &DhcpInfo) -> Result<(), ProvdError> {
        let url = format!("{}/dev_mgr/dhcpinfo", self.base_url);
        let mut request = self.http.post(&url).json(&json!({ "dhcp_info": info }));
        if let Some(token) = self.token.read().expect("token lock poisoned").clone() {
            request = request.header("X-Auth-Token", token);
        }

        let resp = request.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(ProvdError::Api { status, message });
        }

        debug!("Device record created for {}", info.ip);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lr_wire::DhcpOp;
    use std::net::Ipv4Addr;

    fn commit_info() -> DhcpInfo {
        DhcpInfo {
            op: DhcpOp::Commit,
            ip: Ipv4Addr::new(192, 168, 1, 10),
            mac: Some("00:11:22:33:44:55".to_string()),
            options: vec!["060ABC".to_string()],
        }
    }

    #[test]
    fn test_base_url() {
        let config = ProvdConfig::default();
        assert_eq!(config.base_url("provd.example.org"), "http://provd.example.org:8666");

        let config = ProvdConfig {
            host: None,
            port: 443,
            https: true,
            prefix: Some("/api/provd".to_string()),
        };
        assert_eq!(config.base_url("provd.example.org"), "https://provd.example.org:443/api/provd");
    }

    #[tokio::test]
    async fn test_create_device_from_dhcp() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/dev_mgr/dhcpinfo")
            .match_header("X-Auth-Token", "tok-123")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "dhcp_info": { "op": "commit", "ip": "192.168.1.10" }
            })))
            .with_status(201)
            .create_async()
            .await;

        let client = ProvdClient::new(server.url());
        client.set_token("tok-123".to_string());
        client.create_device_from_dhcp(&commit_info()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_rejection_carries_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/dev_mgr/dhcpinfo")
            .with_status(409)
            .with_body("device already exists")
            .create_async()
            .await;

        let client = ProvdClient::new(server.url());
        let err = client
            .create_device_from_dhcp(&commit_info())
            .await
            .unwrap_err();
        match err {
            ProvdError::Api { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, "device already exists");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }
}
