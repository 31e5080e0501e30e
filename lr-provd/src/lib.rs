//! HTTP client for the provisioning server.
//!
//! The provisioning server consumes DHCP lease events to configure
//! network devices. Requests carry an auth token obtained from the auth
//! service and refreshed in the background by [`auth::spawn_token_renewer`].

pub mod auth;
pub mod client;

pub use auth::{AuthClient, AuthConfig, ServiceKey, spawn_token_renewer};
pub use client::{ProvdClient, ProvdConfig, ProvdError};
