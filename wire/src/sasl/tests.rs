use super::{encode_handshake, parse_agree_unix_fd_line, parse_ok_line, Auth};

#[test]
fn external_from_uid_hex_encodes_decimal() {
    let mut buf = [0; 32];
    let Auth::External(hex) = Auth::external_from_u32_ascii_hex(&mut buf, 1000);
    assert_eq!(hex, b"31303030");
}

#[test]
fn external_from_zero_uid() {
    let mut buf = [0; 32];
    let Auth::External(hex) = Auth::external_from_u32_ascii_hex(&mut buf, 0);
    assert_eq!(hex, b"00");
}

#[test]
fn handshake_is_pipelined_and_negotiates_fds() {
    let out = encode_handshake(Auth::External(b"31303030"));
    assert_eq!(
        out,
        b"\0AUTH EXTERNAL 31303030\r\nNEGOTIATE_UNIX_FD\r\nBEGIN\r\n"
    );
}

#[test]
fn ok_line_accepted() {
    assert!(parse_ok_line(b"OK 1234deadbeef\r\n").is_ok());
    assert!(parse_ok_line(b"REJECTED\r\n").is_err());
    assert!(parse_ok_line(b"garbage\r\n").is_err());
}

#[test]
fn agree_unix_fd_line_accepted() {
    assert!(parse_agree_unix_fd_line(b"AGREE_UNIX_FD\r\n").is_ok());
    assert!(parse_agree_unix_fd_line(b"ERROR\r\n").is_err());
}
