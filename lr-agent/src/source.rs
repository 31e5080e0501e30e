//! Event source: a unix datagram socket fed by the DHCP-server hook
//! script.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::net::UnixDatagram;
use tracing::{debug, warn};

use lr_wire::{DecodeError, DhcpInfo, decode};

/// Datagrams larger than this are truncated by the kernel; the hook
/// script sends a handful of short lines.
const RECV_BUFFER_SIZE: usize = 2048;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to decode datagram: {0}")]
    Decode(#[from] DecodeError),
    #[error("socket receive failed: {0}")]
    Recv(#[from] std::io::Error),
}

/// Something lease events can be pulled from.
pub trait DhcpInfoSource {
    /// Wait for the next event. Blocks until a datagram arrives; this is
    /// the pipeline's only suspension point.
    async fn pull(&mut self) -> Result<DhcpInfo, SourceError>;
}

/// The production source: owns a datagram socket bound to a filesystem
/// path, exclusive for the lifetime of the process.
pub struct UnixSocketSource {
    socket: UnixDatagram,
    path: PathBuf,
    buf: Vec<u8>,
}

impl UnixSocketSource {
    /// Bind to `path`. With `remove_existing`, a socket file left behind
    /// by an unclean shutdown is removed first. Bind failure is fatal to
    /// startup.
    pub fn bind(path: &Path, remove_existing: bool) -> std::io::Result<Self> {
        if remove_existing {
            let _ = std::fs::remove_file(path);
        }
        let socket = UnixDatagram::bind(path)?;
        Ok(Self {
            socket,
            path: path.to_path_buf(),
            buf: vec![0u8; RECV_BUFFER_SIZE],
        })
    }

    /// Release the socket and remove its backing path. A path that is
    /// already gone is not an error.
    pub fn close(self) {
        drop(self.socket);
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove socket file {}: {}", self.path.display(), e);
            }
        }
    }
}

impl DhcpInfoSource for UnixSocketSource {
    async fn pull(&mut self) -> Result<DhcpInfo, SourceError> {
        debug!("Waiting for datagram on {}", self.path.display());
        let (len, _addr) = self.socket.recv_from(&mut self.buf).await?;
        let info = decode(&self.buf[..len])?;
        Ok(info)
    }
}
