//! Mapping between Rust types and their D-Bus wire shape.
//!
//! [`DBusType`] is the typed counterpart to [`Value`][crate::value::Value]:
//! implementors declare their signature once and get encoding and decoding
//! for free. The primitive impls below mirror the signature constants on
//! [`Signature`] one-for-one; container impls (`Vec`, tuples, `HashMap`)
//! compose them the way the wire format requires - arrays length-prefixed,
//! structs 8-byte aligned, dict keys restricted to basic types.

use std::collections::HashMap;
use std::hash::Hash;
use std::os::fd::OwnedFd;

use dbus_core::signature::{Signature, SignatureBuf, SignatureBuilder};

use crate::codec::{Body, BodyBuf};
use crate::error::{Error, ErrorKind, Result};
use crate::object_path::{ObjectPath, ObjectPathBuf};
use crate::value::Value;

/// A type that can be encoded to and decoded from a D-Bus message body.
///
/// This is implemented for every type D-Bus can represent directly. It is
/// not implemented for Rust's signed byte (`i8`) or unsigned 128-bit types,
/// since D-Bus has no wire representation for them.
pub trait DBusType: Sized {
    /// The signature a value of this type encodes as.
    fn write_signature(builder: &mut SignatureBuilder) -> Result<()>;

    /// Encode `self` into `buf`.
    fn encode(&self, buf: &mut BodyBuf) -> Result<()>;

    /// Decode a value of this type out of `body`.
    fn decode(body: &mut Body<'_>) -> Result<Self>;

    /// The signature of this type, built fresh each call.
    ///
    /// Callers that need this repeatedly (registering a method signature,
    /// say) should go through [`crate::registry`] instead, which caches the
    /// result.
    fn signature() -> Result<SignatureBuf> {
        let mut builder = SignatureBuilder::new();
        Self::write_signature(&mut builder)?;
        Ok(builder.to_signature().to_owned())
    }
}

macro_rules! impl_basic {
    ($ty:ty, $sig:expr, $store:ident, $load:ident) => {
        impl DBusType for $ty {
            fn write_signature(builder: &mut SignatureBuilder) -> Result<()> {
                if !builder.extend_from_signature($sig) {
                    return Err(Error::new(ErrorKind::SignatureMismatch));
                }

                Ok(())
            }

            fn encode(&self, buf: &mut BodyBuf) -> Result<()> {
                buf.$store(*self);
                Ok(())
            }

            fn decode(body: &mut Body<'_>) -> Result<Self> {
                body.$load()
            }
        }
    };
}

impl_basic!(u8, Signature::BYTE, store_u8, load_u8);
impl_basic!(bool, Signature::new_const(b"b"), store_bool, load_bool);
impl_basic!(i16, Signature::INT16, store_i16, load_i16);
impl_basic!(u16, Signature::UINT16, store_u16, load_u16);
impl_basic!(i32, Signature::INT32, store_i32, load_i32);
impl_basic!(u32, Signature::UINT32, store_u32, load_u32);
impl_basic!(i64, Signature::INT64, store_i64, load_i64);
impl_basic!(u64, Signature::UINT64, store_u64, load_u64);
impl_basic!(f64, Signature::DOUBLE, store_f64, load_f64);

impl DBusType for String {
    fn write_signature(builder: &mut SignatureBuilder) -> Result<()> {
        if !builder.extend_from_signature(Signature::STRING) {
            return Err(Error::new(ErrorKind::SignatureMismatch));
        }

        Ok(())
    }

    fn encode(&self, buf: &mut BodyBuf) -> Result<()> {
        buf.store_str(self);
        Ok(())
    }

    fn decode(body: &mut Body<'_>) -> Result<Self> {
        Ok(body.load_str()?.to_owned())
    }
}

impl DBusType for ObjectPathBuf {
    fn write_signature(builder: &mut SignatureBuilder) -> Result<()> {
        if !builder.extend_from_signature(Signature::OBJECT_PATH) {
            return Err(Error::new(ErrorKind::SignatureMismatch));
        }

        Ok(())
    }

    fn encode(&self, buf: &mut BodyBuf) -> Result<()> {
        buf.store_object_path(self);
        Ok(())
    }

    fn decode(body: &mut Body<'_>) -> Result<Self> {
        Ok(body.load_object_path()?.to_owned())
    }
}

impl DBusType for SignatureBuf {
    fn write_signature(builder: &mut SignatureBuilder) -> Result<()> {
        if !builder.extend_from_signature(Signature::SIGNATURE) {
            return Err(Error::new(ErrorKind::SignatureMismatch));
        }

        Ok(())
    }

    fn encode(&self, buf: &mut BodyBuf) -> Result<()> {
        buf.store_signature(self);
        Ok(())
    }

    fn decode(body: &mut Body<'_>) -> Result<Self> {
        body.load_signature()
    }
}

/// A file descriptor carried out-of-band alongside a message body.
///
/// Wraps an [`OwnedFd`] so it can implement [`DBusType`]; the index written
/// to the body is resolved against the owning message's descriptor table,
/// not embedded here.
#[derive(Debug)]
pub struct Handle(pub OwnedFd);

impl DBusType for Handle {
    fn write_signature(builder: &mut SignatureBuilder) -> Result<()> {
        if !builder.extend_from_signature(Signature::UNIX_FD) {
            return Err(Error::new(ErrorKind::SignatureMismatch));
        }

        Ok(())
    }

    fn encode(&self, buf: &mut BodyBuf) -> Result<()> {
        let owned = self.0.try_clone().map_err(Error::from)?;
        buf.store_fd(owned);
        Ok(())
    }

    /// Always fails. A [`Body`] cursor only sees the message's raw bytes, not
    /// the descriptor table an attached `UNIX_FD` index is resolved against,
    /// so a `Handle` can't be reconstructed from the body alone. Decode the
    /// index with [`Body::load_fd_index`] and look it up in
    /// [`Message::fds`][crate::Message::fds] (or
    /// [`Message::into_fds`][crate::Message::into_fds]) once the whole
    /// message carrying it is available.
    fn decode(body: &mut Body<'_>) -> Result<Self> {
        let index = body.load_fd_index()?;
        Err(Error::new(ErrorKind::MissingFd(index)))
    }
}

impl<T> DBusType for Vec<T>
where
    T: DBusType,
{
    fn write_signature(builder: &mut SignatureBuilder) -> Result<()> {
        builder.open_array()?;
        T::write_signature(builder)?;
        builder.close_array();
        Ok(())
    }

    fn encode(&self, buf: &mut BodyBuf) -> Result<()> {
        let align = element_alignment::<T>()?;

        buf.store_array(align, |buf| -> Result<()> {
            for item in self {
                item.encode(buf)?;
            }

            Ok(())
        })?;

        Ok(())
    }

    fn decode(body: &mut Body<'_>) -> Result<Self> {
        let align = element_alignment::<T>()?;
        let mut array = body.load_array(align)?;
        let mut out = Vec::new();

        while !array.is_empty() {
            out.push(T::decode(&mut array)?);
        }

        Ok(out)
    }
}

impl<K, V> DBusType for HashMap<K, V>
where
    K: DBusType + Eq + Hash,
    V: DBusType,
{
    fn write_signature(builder: &mut SignatureBuilder) -> Result<()> {
        builder.open_array()?;
        builder.open_dict_entry()?;
        K::write_signature(builder)?;
        V::write_signature(builder)?;
        builder.close_dict_entry()?;
        builder.close_array();
        Ok(())
    }

    fn encode(&self, buf: &mut BodyBuf) -> Result<()> {
        buf.store_array(8, |buf| -> Result<()> {
            for (key, value) in self {
                buf.store_dict_entry(|buf| -> Result<()> {
                    key.encode(buf)?;
                    value.encode(buf)
                })?;
            }

            Ok(())
        })?;

        Ok(())
    }

    fn decode(body: &mut Body<'_>) -> Result<Self> {
        let mut array = body.load_array(8)?;
        let mut out = HashMap::new();

        while !array.is_empty() {
            array.load_dict_entry()?;
            let key = K::decode(&mut array)?;
            let value = V::decode(&mut array)?;
            out.insert(key, value);
        }

        Ok(out)
    }
}

impl DBusType for Value {
    fn write_signature(builder: &mut SignatureBuilder) -> Result<()> {
        if !builder.extend_from_signature(Signature::VARIANT) {
            return Err(Error::new(ErrorKind::SignatureMismatch));
        }

        Ok(())
    }

    fn encode(&self, buf: &mut BodyBuf) -> Result<()> {
        let signature = self.signature();
        buf.store_variant(&signature, |buf| self.encode(buf))?;
        Ok(())
    }

    fn decode(body: &mut Body<'_>) -> Result<Self> {
        let signature = body.load_variant_signature()?;
        Value::decode(&signature, body)
    }
}

/// The wire alignment a value of this signature requires, keyed off its
/// leading type code. Used to pad an array's body to its element's
/// alignment, per the D-Bus alignment table.
pub(crate) fn signature_alignment(signature: &Signature) -> usize {
    match signature.as_bytes().first() {
        Some(b'x' | b't' | b'd' | b'(' | b'{') => 8,
        Some(b'n' | b'q') => 2,
        Some(b'y' | b'g' | b'v') => 1,
        _ => 4,
    }
}

fn element_alignment<T: DBusType>() -> Result<usize> {
    Ok(signature_alignment(&T::signature()?))
}

macro_rules! impl_tuple {
    ($($name:ident),+) => {
        impl<$($name),+> DBusType for ($($name,)+)
        where
            $($name: DBusType,)+
        {
            fn write_signature(builder: &mut SignatureBuilder) -> Result<()> {
                builder.open_struct()?;
                $($name::write_signature(builder)?;)+
                builder.close_struct()?;
                Ok(())
            }

            #[allow(non_snake_case)]
            fn encode(&self, buf: &mut BodyBuf) -> Result<()> {
                let ($($name,)+) = self;
                buf.store_struct(|buf| -> Result<()> {
                    $($name.encode(buf)?;)+
                    Ok(())
                })?;
                Ok(())
            }

            fn decode(body: &mut Body<'_>) -> Result<Self> {
                body.load_struct()?;
                Ok(($($name::decode(body)?,)+))
            }
        }
    };
}

impl_tuple!(A);
impl_tuple!(A, B);
impl_tuple!(A, B, C);
impl_tuple!(A, B, C, D);
impl_tuple!(A, B, C, D, E);
impl_tuple!(A, B, C, D, E, F);

#[cfg(test)]
mod tests {
    use super::*;
    use dbus_core::proto::Endianness;

    #[test]
    fn vec_of_u32_round_trips() {
        let mut buf = BodyBuf::new();
        vec![1u32, 2, 3].encode(&mut buf).unwrap();

        let mut body = Body::new(buf.as_bytes(), buf.endianness());
        let out: Vec<u32> = Vec::decode(&mut body).unwrap();
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn vec_of_u64_round_trips() {
        // u64 elements need 8-byte alignment after the length, unlike u32
        // (whose 4-byte alignment the length already satisfies). This
        // exercises the padding `store_array`/`load_array` insert for that.
        let mut buf = BodyBuf::new();
        vec![1u64].encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 4 + 4 + 8, "4-byte length, 4 bytes of pad, one u64");

        let mut body = Body::new(buf.as_bytes(), buf.endianness());
        let out: Vec<u64> = Vec::decode(&mut body).unwrap();
        assert_eq!(out, vec![1]);
    }

    #[test]
    fn empty_vec_of_u64_still_pads_to_element_alignment() {
        let mut buf = BodyBuf::new();
        Vec::<u64>::new().encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 8, "empty array still carries the 4-byte pad after its length");

        let mut body = Body::new(buf.as_bytes(), buf.endianness());
        let out: Vec<u64> = Vec::decode(&mut body).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn tuple_signature_is_struct() {
        let sig = <(u32, String)>::signature().unwrap();
        assert_eq!(sig.as_bytes(), b"(us)");
    }

    #[test]
    fn hashmap_round_trips() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), 1u32);

        let mut buf = BodyBuf::with_endianness(Endianness::LITTLE);
        map.encode(&mut buf).unwrap();

        let mut body = Body::new(buf.as_bytes(), Endianness::LITTLE);
        let out: HashMap<String, u32> = HashMap::decode(&mut body).unwrap();
        assert_eq!(out.get("a"), Some(&1));
    }
}
