//! leaserelay: pushes DHCP lease events to a provisioning server.
//!
//! A DHCP-server hook script drops one datagram per lease event
//! (commit / expiry / release) on a local unix socket; this daemon
//! decodes each datagram and forwards it to the provisioning server's
//! device-registration API. It runs until SIGTERM.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use tokio_stream::StreamExt;
use tracing::{error, info};

use lr_agent::{Agent, DhcpInfoSink, PidFile, ProvdSink, RelayConfig, UnixSocketSource};
use lr_provd::{AuthClient, AuthConfig, ProvdClient, ProvdConfig, ServiceKey, spawn_token_renewer};

// ── Configuration ─────────────────────────────────────────────────────

/// Combined daemon config; one TOML file, every field defaulted so an
/// absent file means "all defaults".
#[derive(Debug, Default, Deserialize)]
struct AppConfig {
    #[serde(default)]
    relay: RelayConfig,
    #[serde(default)]
    prov_server: ProvdConfig,
    /// Absent table means unauthenticated pushes.
    #[serde(default)]
    auth: Option<AuthConfig>,
}

impl AppConfig {
    fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }
}

struct Cli {
    config_path: PathBuf,
    prov_host: Option<String>,
}

/// `--config PATH` plus an optional positional provisioning-host
/// override, e.g. `leaserelay provd.example.org`.
fn parse_cli() -> Cli {
    let mut cli = Cli {
        config_path: PathBuf::from("/etc/leaserelay/config.toml"),
        prov_host: None,
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--config" {
            if let Some(path) = args.get(i + 1) {
                cli.config_path = PathBuf::from(path);
                i += 2;
                continue;
            }
        } else if let Some(path) = args[i].strip_prefix("--config=") {
            cli.config_path = PathBuf::from(path);
        } else if cli.prov_host.is_none() {
            cli.prov_host = Some(args[i].clone());
        }
        i += 1;
    }
    cli
}

// ── Main ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_cli();
    let config = AppConfig::load(&cli.config_path)?;
    init_tracing(&config.relay)?;

    info!("leaserelay starting");

    let Some(host) = cli.prov_host.or_else(|| config.prov_server.host.clone()) else {
        error!("No provisioning server host configured, exiting");
        bail!("no provisioning server host configured");
    };

    if let Some(user) = &config.relay.user {
        drop_privileges(user)?;
    }

    let provd = ProvdClient::new(config.prov_server.base_url(&host));
    info!("Provisioning server: {}", config.prov_server.base_url(&host));

    // Keep a fresh auth token installed for the lifetime of the daemon.
    let renewer = match &config.auth {
        Some(auth_config) => {
            let key = ServiceKey::load(Path::new(&auth_config.key_file))?;
            let auth = AuthClient::new(auth_config, key);
            Some(spawn_token_renewer(auth, provd.clone()))
        }
        None => None,
    };

    let result = run(&config.relay, ProvdSink::new(provd)).await;

    if let Some(renewer) = renewer {
        renewer.abort();
    }
    result
}

/// Acquire the pid file guard, the control socket and the signal handler
/// in that order; loop until a termination signal; release everything in
/// reverse order. Each release step runs regardless of which layer
/// triggered the unwind.
async fn run(config: &RelayConfig, sink: ProvdSink) -> Result<()> {
    let pidfile = PidFile::create(&config.pid_file).context("Failed to create pid file")?;

    let source = match UnixSocketSource::bind(Path::new(&config.socket_path), true) {
        Ok(source) => source,
        Err(e) => {
            pidfile.close();
            return Err(e)
                .with_context(|| format!("Failed to bind control socket {}", config.socket_path));
        }
    };
    info!("Listening on {}", config.socket_path);

    let mut signals = match Signals::new([SIGTERM, SIGINT]) {
        Ok(signals) => signals,
        Err(e) => {
            source.close();
            pidfile.close();
            return Err(e).context("Failed to install signal handler");
        }
    };
    let signals_handle = signals.handle();

    let mut agent = Agent::new(source, sink);
    agent
        .run(async {
            signals.next().await;
        })
        .await;

    signals_handle.close();
    let (source, mut sink) = agent.into_parts();
    source.close();
    pidfile.close();
    sink.close();

    info!("leaserelay stopped");
    Ok(())
}

fn init_tracing(config: &RelayConfig) -> Result<()> {
    let default_level = if config.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    match &config.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Arc::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).compact().init();
        }
    }
    Ok(())
}

/// Drop root privileges to the configured run-as user. Must happen
/// before any resource is acquired; everything the daemon creates is
/// owned by that user.
fn drop_privileges(name: &str) -> Result<()> {
    let user = nix::unistd::User::from_name(name)
        .with_context(|| format!("Failed to look up user {name:?}"))?
        .with_context(|| format!("Unknown user: {name}"))?;
    nix::unistd::setgid(user.gid).context("Failed to drop group privileges")?;
    nix::unistd::setuid(user.uid).context("Failed to drop user privileges")?;
    info!("Running as user {}", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_when_file_absent() {
        let config = AppConfig::load(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.relay.socket_path, "/run/leaserelay/leaserelay.ctl");
        assert_eq!(config.prov_server.host, None);
        assert!(config.auth.is_none());
    }

    #[test]
    fn test_config_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [relay]
            socket_path = "/tmp/relay.ctl"
            debug = true

            [prov_server]
            host = "provd.example.org"
            port = 8667

            [auth]
            host = "auth.example.org"
            key_file = "/tmp/key.toml"
            "#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.relay.socket_path, "/tmp/relay.ctl");
        assert!(config.relay.debug);
        assert_eq!(config.prov_server.host.as_deref(), Some("provd.example.org"));
        assert_eq!(config.prov_server.port, 8667);
        assert_eq!(config.auth.unwrap().host, "auth.example.org");
    }

    #[test]
    fn test_config_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "relay = nonsense").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }
}
