use std::fmt;
use std::net::Ipv4Addr;

use serde::Serialize;

/// Lease life-cycle operation carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DhcpOp {
    Commit,
    Expiry,
    Release,
}

impl DhcpOp {
    /// Parse the exact wire string (`commit` / `expiry` / `release`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "commit" => Some(Self::Commit),
            "expiry" => Some(Self::Expiry),
            "release" => Some(Self::Release),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Expiry => "expiry",
            Self::Release => "release",
        }
    }
}

impl fmt::Display for DhcpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded lease event, consumed immediately after decoding.
///
/// `mac` and `options` are only populated for commit events; for expiry
/// and release they are never read from the datagram, even if present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DhcpInfo {
    pub op: DhcpOp,
    pub ip: Ipv4Addr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    pub options: Vec<String>,
}
