//! The relay loop.

use std::future::Future;

use tracing::{debug, error, info};

use crate::sink::{DhcpInfoSink, SinkError};
use crate::source::{DhcpInfoSource, SourceError};

/// Pulls lease events from a source and pushes them to a sink, forever.
///
/// Per-record failures (undecodable datagrams, destination rejections,
/// transport trouble) are logged and the loop moves on to the next
/// record. The only way out is the shutdown future resolving.
pub struct Agent<S, K> {
    source: S,
    sink: K,
}

impl<S: DhcpInfoSource, K: DhcpInfoSink> Agent<S, K> {
    pub fn new(source: S, sink: K) -> Self {
        Self { source, sink }
    }

    /// Run until `shutdown` resolves. The shutdown future interrupts a
    /// pending pull; a loop iteration in flight completes its push first.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Received shutdown signal, stopping agent");
                    break;
                }
                pulled = self.source.pull() => match pulled {
                    Ok(info) => {
                        info!("Pulled DHCP info: ({}, {})", info.op, info.ip);
                        debug!(?info, "DHCP info");
                        match self.sink.push(&info).await {
                            Ok(()) => {}
                            Err(SinkError::Rejected(e)) => {
                                error!("Error while pushing info to sink: {}", e);
                            }
                            Err(SinkError::Push(e)) => {
                                error!("Error while pushing info to sink: {:#}", e);
                            }
                        }
                    }
                    Err(SourceError::Decode(e)) => {
                        error!("Error while pulling info from source: {}", e);
                    }
                    Err(SourceError::Recv(e)) => {
                        error!("Error while receiving datagram: {}", e);
                    }
                },
            }
        }
    }

    /// Hand the source and sink back for ordered teardown.
    pub fn into_parts(self) -> (S, K) {
        (self.source, self.sink)
    }
}
