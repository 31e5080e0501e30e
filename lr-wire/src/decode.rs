//! Datagram decoder.
//!
//! Decoding is all-or-nothing: either a complete, internally consistent
//! record comes out, or an error naming the offending field. A single
//! bad option line rejects the whole record.

use std::net::Ipv4Addr;

use thiserror::Error;

use crate::event::{DhcpInfo, DhcpOp};

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("datagram is not valid UTF-8")]
    NotUtf8(#[from] std::str::Utf8Error),
    #[error("truncated datagram: no {0} line")]
    MissingLine(&'static str),
    #[error("invalid op value: {0:?}")]
    InvalidOp(String),
    #[error("invalid ip value: {0:?}")]
    InvalidIp(String),
    #[error("invalid option {0:?}: shorter than 3 characters")]
    OptionTooShort(String),
    #[error("invalid option {0:?}: code is not a decimal number")]
    OptionCodeNotNumeric(String),
    #[error("invalid option {0:?}: code {1} out of range")]
    OptionCodeOutOfRange(String, u32),
}

/// Decode one raw datagram into a lease event record.
///
/// The payload is `\n`-separated UTF-8 text; empty lines are discarded
/// before interpretation. Line 0 is the op, line 1 the IP. Commit events
/// additionally carry a MAC line (carried verbatim, not validated) and
/// zero or more option lines.
pub fn decode(data: &[u8]) -> Result<DhcpInfo, DecodeError> {
    let text = std::str::from_utf8(data)?;
    let mut lines = text.split('\n').filter(|line| !line.is_empty());

    let op_line = lines.next().ok_or(DecodeError::MissingLine("op"))?;
    let op = DhcpOp::parse(op_line).ok_or_else(|| DecodeError::InvalidOp(op_line.to_string()))?;

    let ip_line = lines.next().ok_or(DecodeError::MissingLine("ip"))?;
    let ip: Ipv4Addr = ip_line
        .parse()
        .map_err(|_| DecodeError::InvalidIp(ip_line.to_string()))?;

    match op {
        DhcpOp::Commit => {
            let mac = lines
                .next()
                .ok_or(DecodeError::MissingLine("mac"))?
                .to_string();
            let options = lines.map(check_option).collect::<Result<Vec<_>, _>>()?;
            Ok(DhcpInfo {
                op,
                ip,
                mac: Some(mac),
                options,
            })
        }
        // Expiry and release carry nothing further; trailing lines are
        // ignored even if present.
        DhcpOp::Expiry | DhcpOp::Release => Ok(DhcpInfo {
            op,
            ip,
            mac: None,
            options: Vec::new(),
        }),
    }
}

/// Validate one option line: the first three characters are a base-10
/// DHCP option code in 0..=255, the remainder is opaque payload.
fn check_option(line: &str) -> Result<String, DecodeError> {
    let code = line
        .get(..3)
        .ok_or_else(|| DecodeError::OptionTooShort(line.to_string()))?;
    let num: u32 = code
        .parse()
        .map_err(|_| DecodeError::OptionCodeNotNumeric(line.to_string()))?;
    if num > 255 {
        return Err(DecodeError::OptionCodeOutOfRange(line.to_string(), num));
    }
    Ok(line.to_string())
}
