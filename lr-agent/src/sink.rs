//! Event sinks: where validated lease events go.

use std::io::Write;

use thiserror::Error;
use tracing::info;

use lr_provd::{ProvdClient, ProvdError};
use lr_wire::DhcpInfo;

#[derive(Error, Debug)]
pub enum SinkError {
    /// The destination itself rejected the record, e.g. the device
    /// already exists.
    #[error("provisioning server rejected DHCP info: {0}")]
    Rejected(ProvdError),
    /// Anything else that went wrong while pushing, with its cause.
    #[error("failed to push DHCP info: {0}")]
    Push(#[source] anyhow::Error),
}

/// Something lease events can be pushed into.
pub trait DhcpInfoSink {
    async fn push(&mut self, info: &DhcpInfo) -> Result<(), SinkError>;

    /// Neither sink buffers anything, so closing is a no-op by default.
    fn close(&mut self) {}
}

/// Debug sink: appends each record as one JSON line to a writer.
pub struct StreamSink<W: Write> {
    writer: W,
}

impl<W: Write> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> DhcpInfoSink for StreamSink<W> {
    async fn push(&mut self, info: &DhcpInfo) -> Result<(), SinkError> {
        let line = serde_json::to_string(info).map_err(|e| SinkError::Push(e.into()))?;
        writeln!(self.writer, "{}", line).map_err(|e| SinkError::Push(e.into()))?;
        Ok(())
    }
}

/// Production sink: forwards each record to the provisioning server's
/// device-registration call.
pub struct ProvdSink {
    client: ProvdClient,
}

impl ProvdSink {
    pub fn new(client: ProvdClient) -> Self {
        Self { client }
    }
}

impl DhcpInfoSink for ProvdSink {
    async fn push(&mut self, info: &DhcpInfo) -> Result<(), SinkError> {
        info!("Pushing DHCP info to provisioning server");
        match self.client.create_device_from_dhcp(info).await {
            Ok(()) => Ok(()),
            Err(e @ ProvdError::Api { .. }) => Err(SinkError::Rejected(e)),
            Err(e) => Err(SinkError::Push(e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lr_wire::DhcpOp;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn test_stream_sink_appends_json_lines() {
        let mut sink = StreamSink::new(Vec::new());
        sink.push(&DhcpInfo {
            op: DhcpOp::Commit,
            ip: Ipv4Addr::new(192, 168, 1, 10),
            mac: Some("00:11:22:33:44:55".to_string()),
            options: vec!["060ABC".to_string()],
        })
        .await
        .unwrap();
        sink.push(&DhcpInfo {
            op: DhcpOp::Release,
            ip: Ipv4Addr::new(10, 0, 0, 5),
            mac: None,
            options: vec![],
        })
        .await
        .unwrap();
        sink.close();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"op\":\"commit\""));
        assert!(lines[1].contains("\"op\":\"release\""));
    }
}
