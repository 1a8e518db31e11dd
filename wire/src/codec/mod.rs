//! The wire codec: alignment-aware encoding and decoding of D-Bus values.
//!
//! This is a safe, owned-buffer redesign of the wire format handling. Values
//! are written into a growable [`BodyBuf`] and read back out of a borrowed
//! [`Body`] cursor; both carry the byte order and the running offset needed
//! to keep every primitive on its required alignment boundary.
//!
//! Splitting the codec from the mapping between application types and wire
//! shapes (see [`crate::ty`]) keeps the wire format - which never changes -
//! testable in isolation from the mapping, which is where all the
//! complexity of a real application lives.

pub use self::body::Body;
mod body;

pub use self::body_buf::BodyBuf;
mod body_buf;

#[cfg(test)]
mod tests;

/// Calculate the padding needed to align `len` to `align`, assuming `align`
/// is a power of two.
#[inline]
pub(crate) fn padding_to(align: usize, len: usize) -> usize {
    let mask = align - 1;
    (align - (len & mask)) & mask
}
