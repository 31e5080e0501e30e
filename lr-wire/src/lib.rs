//! Wire protocol for DHCP lease event datagrams.
//!
//! A DHCP-server hook script sends one datagram per lease event. The
//! payload is line-delimited UTF-8 text: the operation, the leased IP,
//! and for commit events the client MAC followed by the raw DHCP
//! options the client sent.

pub mod decode;
pub mod event;

pub use decode::{DecodeError, decode};
pub use event::{DhcpInfo, DhcpOp};
