//! The SASL line protocol D-Bus performs before switching to the binary
//! message format.
//!
//! Only the single exchange this library actually uses is implemented:
//! `EXTERNAL` authentication followed by a `NEGOTIATE_UNIX_FD` /
//! `AGREE_UNIX_FD` round-trip, pipelined with `BEGIN`. The kernel has already
//! authenticated the peer's credentials on a local socket, so a real
//! challenge-response mechanism buys nothing; the only thing worth
//! negotiating is file-descriptor passing.

#[cfg(test)]
mod tests;

use crate::error::{Error, ErrorKind, Result};
use crate::utils::{split_once, trim_end};

/// The stage of an in-progress SASL handshake, used for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslStage {
    /// Waiting to send the initial NUL byte and `AUTH` line.
    Init,
    /// Waiting for the server's `OK` response.
    Auth,
    /// Waiting for the server's `AGREE_UNIX_FD` response.
    NegotiateUnixFd,
}

/// The SASL authentication method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth<'a> {
    /// EXTERNAL authentication with a literal payload (the hex-encoded ASCII
    /// decimal UID).
    External(&'a [u8]),
}

impl<'a> Auth<'a> {
    /// Construct external authentication from the calling process' UID.
    pub(crate) fn external_from_uid(buf: &'a mut [u8; 32]) -> Auth<'a> {
        let id = unsafe { libc::getuid() };
        Self::external_from_u32_ascii_hex(buf, id)
    }

    /// Construct an external authentication from a u32.
    pub(crate) fn external_from_u32_ascii_hex(buf: &'a mut [u8; 32], mut id: u32) -> Auth<'a> {
        const HEX: [u8; 16] = *b"0123456789abcdef";

        let mut n = 0;

        if id == 0 {
            buf[0] = b'0';
            buf[1] = b'0';
            n = 2;
        } else {
            while id > 0 {
                let byte = (id % 10) as u8 + b'0';
                buf[n] = HEX[(byte & 0xf) as usize];
                n += 1;
                buf[n] = HEX[(byte >> 4) as usize];
                n += 1;
                id /= 10;
            }
        }

        buf[..n].reverse();
        Auth::External(&buf[..n])
    }
}

/// Compose the full pipelined client handshake: the initial NUL byte, the
/// `AUTH EXTERNAL` line, `NEGOTIATE_UNIX_FD`, and `BEGIN`.
pub(crate) fn encode_handshake(auth: Auth<'_>) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    out.push(0);
    out.extend_from_slice(b"AUTH EXTERNAL ");

    match auth {
        Auth::External(hex) => out.extend_from_slice(hex),
    }

    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(b"NEGOTIATE_UNIX_FD\r\n");
    out.extend_from_slice(b"BEGIN\r\n");
    out
}

/// Parse the server's response to the `AUTH` line: `OK <guid>`.
pub(crate) fn parse_ok_line(bytes: &[u8]) -> Result<()> {
    let line = trim_end(bytes);

    let Some((command, _guid)) = split_once(line, b' ') else {
        return Err(Error::new(ErrorKind::InvalidSasl));
    };

    match command {
        b"OK" => Ok(()),
        b"REJECTED" | b"ERROR" => Err(Error::new(ErrorKind::HandshakeFailed)),
        _ => Err(Error::new(ErrorKind::InvalidSaslResponse)),
    }
}

/// Parse the server's response to `NEGOTIATE_UNIX_FD`: exactly
/// `AGREE_UNIX_FD`.
pub(crate) fn parse_agree_unix_fd_line(bytes: &[u8]) -> Result<()> {
    match trim_end(bytes) {
        b"AGREE_UNIX_FD" => Ok(()),
        b"ERROR" => Err(Error::new(ErrorKind::HandshakeFailed)),
        _ => Err(Error::new(ErrorKind::InvalidSaslResponse)),
    }
}
