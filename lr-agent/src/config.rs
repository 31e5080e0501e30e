use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
    #[serde(default = "default_pid_file")]
    pub pid_file: String,
    #[serde(default)]
    pub debug: bool,
    /// Append-mode log file; stdout when unset.
    #[serde(default)]
    pub log_file: Option<String>,
    /// Run-as identity; privileges are dropped right after config load.
    #[serde(default)]
    pub user: Option<String>,
}

fn default_socket_path() -> String {
    "/run/leaserelay/leaserelay.ctl".to_string()
}

fn default_pid_file() -> String {
    "/run/leaserelay/leaserelay.pid".to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        serde_json::from_str("{}").unwrap()
    }
}
