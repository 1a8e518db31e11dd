use core::fmt;
use core::str::from_utf8_unchecked;

use super::{validate, Iter, ObjectPathBuf, ObjectPathError};

/// A borrowed, validated D-Bus object path such as `/org/freedesktop/DBus`.
///
/// # Examples
///
/// ```
/// use dbus_wire::ObjectPath;
///
/// let path = ObjectPath::new("/org/freedesktop/DBus")?;
/// assert_eq!(path.as_str(), "/org/freedesktop/DBus");
/// assert!(ObjectPath::new("missing/leading/slash").is_err());
/// assert!(ObjectPath::new("/trailing/").is_err());
/// assert!(ObjectPath::new("/double//slash").is_err());
/// # Ok::<_, dbus_wire::ObjectPathError>(())
/// ```
#[derive(Hash, PartialEq, Eq)]
#[repr(transparent)]
pub struct ObjectPath([u8]);

impl ObjectPath {
    /// The root object path `/`.
    pub const ROOT: &'static ObjectPath = Self::new_const("/");

    /// Construct a new object path, validating it.
    #[inline]
    pub fn new(path: &str) -> Result<&ObjectPath, ObjectPathError> {
        validate(path.as_bytes())?;
        // SAFETY: just validated above.
        Ok(unsafe { Self::new_unchecked(path.as_bytes()) })
    }

    /// Construct a new object path in a constant context.
    ///
    /// # Panics
    ///
    /// Panics if the path is not valid.
    #[track_caller]
    pub const fn new_const(path: &'static str) -> &'static ObjectPath {
        if validate_const(path.as_bytes()).is_err() {
            panic!("Invalid D-Bus object path")
        }

        // SAFETY: just validated above.
        unsafe { &*(path.as_bytes() as *const [u8] as *const ObjectPath) }
    }

    /// Construct an object path from a byte slice without validating it.
    ///
    /// # Safety
    ///
    /// The caller must ensure `bytes` is a valid object path.
    #[inline]
    pub(super) unsafe fn new_unchecked(bytes: &[u8]) -> &Self {
        &*(bytes as *const [u8] as *const Self)
    }

    /// Coerce this path to a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        // SAFETY: construction ensures only ASCII is present.
        unsafe { from_utf8_unchecked(&self.0) }
    }

    /// Coerce this path to its underlying bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Test if this is the root path `/`.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.0 == *b"/"
    }

    /// Test if `self` is a prefix of `other`, aligned on path elements (so
    /// `/a/b` is a prefix of `/a/b/c` but not of `/a/bc`).
    pub fn is_prefix_of(&self, other: &ObjectPath) -> bool {
        if self.is_root() {
            return true;
        }

        let Some(rest) = other.0.strip_prefix(&self.0[..]) else {
            return false;
        };

        rest.is_empty() || rest.first() == Some(&b'/')
    }

    /// Iterate over the elements of this path.
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(&self.0)
    }
}

const fn validate_const(bytes: &[u8]) -> Result<(), ObjectPathError> {
    if bytes.is_empty() || bytes[0] != b'/' {
        return Err(ObjectPathError);
    }

    if bytes.len() == 1 {
        return Ok(());
    }

    if bytes[bytes.len() - 1] == b'/' {
        return Err(ObjectPathError);
    }

    let mut element_len = 0usize;
    let mut n = 1;

    while n < bytes.len() {
        let b = bytes[n];

        if b == b'/' {
            if element_len == 0 {
                return Err(ObjectPathError);
            }

            element_len = 0;
        } else if !b.is_ascii_alphanumeric() && b != b'_' {
            return Err(ObjectPathError);
        } else {
            element_len += 1;
        }

        n += 1;
    }

    if element_len == 0 {
        return Err(ObjectPathError);
    }

    Ok(())
}

impl fmt::Debug for ObjectPath {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl fmt::Display for ObjectPath {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToOwned for ObjectPath {
    type Owned = ObjectPathBuf;

    #[inline]
    fn to_owned(&self) -> Self::Owned {
        // SAFETY: `self` is already a valid object path.
        unsafe { ObjectPathBuf::from_raw_vec(self.0.to_vec()) }
    }
}

impl PartialEq<str> for ObjectPath {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<&str> for ObjectPath {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}
