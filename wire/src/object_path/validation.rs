use super::ObjectPathError;

/// Validate that `bytes` is a well-formed D-Bus object path.
///
/// See the rules documented on [`ObjectPath`][super::ObjectPath].
pub(super) fn validate(bytes: &[u8]) -> Result<(), ObjectPathError> {
    if bytes.first() != Some(&b'/') {
        return Err(ObjectPathError);
    }

    if bytes.len() == 1 {
        // The root path `/` is always valid.
        return Ok(());
    }

    if bytes.last() == Some(&b'/') {
        return Err(ObjectPathError);
    }

    let mut element_len = 0usize;

    for &b in &bytes[1..] {
        if b == b'/' {
            if element_len == 0 {
                return Err(ObjectPathError);
            }

            element_len = 0;
            continue;
        }

        if !b.is_ascii_alphanumeric() && b != b'_' {
            return Err(ObjectPathError);
        }

        element_len += 1;
    }

    if element_len == 0 {
        return Err(ObjectPathError);
    }

    Ok(())
}
