//! The relay pipeline: pull lease events from a local datagram socket,
//! push them to a sink, survive anything a single record can throw.
#![allow(async_fn_in_trait)]

pub mod agent;
pub mod config;
pub mod pidfile;
pub mod sink;
pub mod source;

pub use agent::Agent;
pub use config::RelayConfig;
pub use pidfile::{PidFile, PidFileError};
pub use sink::{DhcpInfoSink, ProvdSink, SinkError, StreamSink};
pub use source::{DhcpInfoSource, SourceError, UnixSocketSource};
