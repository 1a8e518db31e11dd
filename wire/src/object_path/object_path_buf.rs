use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use super::{validate, ObjectPath, ObjectPathError};

/// An owned, validated D-Bus object path.
///
/// The following rules define a [valid object path]. Implementations must not
/// send or accept messages with invalid object paths.
///
/// [valid object path]: https://dbus.freedesktop.org/doc/dbus-specification.html#message-protocol-marshaling-object-path
///
/// * The path may be of any length.
/// * The path must begin with an ASCII '/' (integer 47) character, and must
///   consist of elements separated by slash characters.
/// * Each element must only contain the ASCII characters "[A-Z][a-z][0-9]_".
/// * No element may be the empty string.
/// * Multiple '/' characters cannot occur in sequence.
/// * A trailing '/' character is not allowed unless the path is the root path
///   (a single '/' character).
#[derive(Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct ObjectPathBuf(Vec<u8>);

impl ObjectPathBuf {
    /// Construct a new owned object path, validating it.
    ///
    /// # Examples
    ///
    /// ```
    /// use dbus_wire::ObjectPathBuf;
    ///
    /// let path = ObjectPathBuf::new("/org/freedesktop/DBus")?;
    /// assert_eq!(path.as_str(), "/org/freedesktop/DBus");
    /// # Ok::<_, dbus_wire::ObjectPathError>(())
    /// ```
    pub fn new(path: impl Into<String>) -> Result<Self, ObjectPathError> {
        let path = path.into().into_bytes();
        validate(&path)?;
        // SAFETY: just validated above.
        Ok(unsafe { Self::from_raw_vec(path) })
    }

    /// Construct an owned object path from its raw underlying vector.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the vector contains a valid object path.
    #[inline]
    pub(super) unsafe fn from_raw_vec(data: Vec<u8>) -> Self {
        Self(data)
    }

    #[inline]
    fn to_object_path(&self) -> &ObjectPath {
        // SAFETY: this type ensures during construction that the object path
        // it contains is valid.
        unsafe { ObjectPath::new_unchecked(&self.0) }
    }
}

impl fmt::Debug for ObjectPathBuf {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_object_path().fmt(f)
    }
}

impl fmt::Display for ObjectPathBuf {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_object_path().fmt(f)
    }
}

impl Deref for ObjectPathBuf {
    type Target = ObjectPath;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.to_object_path()
    }
}

impl Borrow<ObjectPath> for ObjectPathBuf {
    #[inline]
    fn borrow(&self) -> &ObjectPath {
        self
    }
}

impl AsRef<ObjectPath> for ObjectPathBuf {
    #[inline]
    fn as_ref(&self) -> &ObjectPath {
        self
    }
}

impl TryFrom<String> for ObjectPathBuf {
    type Error = ObjectPathError;

    #[inline]
    fn try_from(path: String) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}

impl TryFrom<&str> for ObjectPathBuf {
    type Error = ObjectPathError;

    #[inline]
    fn try_from(path: &str) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}
