//! Small byte-slice helpers used while parsing line-oriented SASL traffic.

/// Trim a trailing `\r\n` or `\n` from `bytes`.
pub(crate) fn trim_end(bytes: &[u8]) -> &[u8] {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    bytes.strip_suffix(b"\r").unwrap_or(bytes)
}

/// Split `bytes` once on the first occurrence of `needle`.
pub(crate) fn split_once(bytes: &[u8], needle: u8) -> Option<(&[u8], &[u8])> {
    let at = bytes.iter().position(|&b| b == needle)?;
    Some((&bytes[..at], &bytes[at + 1..]))
}
