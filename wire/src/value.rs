//! A dynamically typed D-Bus value.
//!
//! [`Value`] is the escape hatch for code that doesn't know its message
//! shapes at compile time - introspection proxies, generic bus monitors, the
//! object server's method dispatch before a handler has downcast its
//! arguments. Typed callers should prefer the [`DBusType`][crate::ty::DBusType]
//! trait instead; encoding and decoding a `Value` walks its signature one
//! [`Type`] at a time and pays for the indirection that buys.

use std::collections::BTreeMap;

use dbus_core::signature::{Signature, SignatureBuf, SignatureBuilder, Type};

use crate::codec::{Body, BodyBuf};
use crate::error::{Error, ErrorKind, Result};
use crate::object_path::ObjectPathBuf;

/// A single non-container D-Bus value.
#[derive(Debug, Clone, PartialEq)]
pub enum Basic {
    /// `y`
    Byte(u8),
    /// `b`
    Bool(bool),
    /// `n`
    I16(i16),
    /// `q`
    U16(u16),
    /// `i`
    I32(i32),
    /// `u`
    U32(u32),
    /// `x`
    I64(i64),
    /// `t`
    U64(u64),
    /// `d`
    F64(f64),
    /// `s`
    String(String),
}

/// A value of any D-Bus type, tagged with enough structure to recover its
/// signature.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A non-container value.
    Basic(Basic),
    /// `o`
    Path(ObjectPathBuf),
    /// `g`
    Signature(SignatureBuf),
    /// `h`
    Fd(u32),
    /// `a...`, tagged with the element signature so an empty array still
    /// knows its own type.
    Array(SignatureBuf, Vec<Value>),
    /// `(...)`
    Struct(Vec<Value>),
    /// `a{...}`, using a `BTreeMap` so re-encoding is deterministic.
    Dict(SignatureBuf, SignatureBuf, BTreeMap<Basic, Value>),
    /// `v`
    Variant(Box<Value>),
}

impl Eq for Basic {}

impl PartialOrd for Basic {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Basic {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Basic::*;

        match (self, other) {
            (Byte(a), Byte(b)) => a.cmp(b),
            (Bool(a), Bool(b)) => a.cmp(b),
            (I16(a), I16(b)) => a.cmp(b),
            (U16(a), U16(b)) => a.cmp(b),
            (I32(a), I32(b)) => a.cmp(b),
            (U32(a), U32(b)) => a.cmp(b),
            (I64(a), I64(b)) => a.cmp(b),
            (U64(a), U64(b)) => a.cmp(b),
            (F64(a), F64(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            // Dict keys are always written with a single, consistent basic
            // type, so mixed variants never need to compare in practice.
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl Basic {
    /// The signature of this basic value.
    pub fn signature(&self) -> &'static Signature {
        match self {
            Basic::Byte(_) => Signature::BYTE,
            Basic::Bool(_) => Signature::new_const(b"b"),
            Basic::I16(_) => Signature::INT16,
            Basic::U16(_) => Signature::UINT16,
            Basic::I32(_) => Signature::INT32,
            Basic::U32(_) => Signature::UINT32,
            Basic::I64(_) => Signature::INT64,
            Basic::U64(_) => Signature::UINT64,
            Basic::F64(_) => Signature::DOUBLE,
            Basic::String(_) => Signature::STRING,
        }
    }

    fn encode(&self, buf: &mut BodyBuf) {
        match self {
            Basic::Byte(v) => {
                buf.store_u8(*v);
            }
            Basic::Bool(v) => {
                buf.store_bool(*v);
            }
            Basic::I16(v) => {
                buf.store_i16(*v);
            }
            Basic::U16(v) => {
                buf.store_u16(*v);
            }
            Basic::I32(v) => {
                buf.store_i32(*v);
            }
            Basic::U32(v) => {
                buf.store_u32(*v);
            }
            Basic::I64(v) => {
                buf.store_i64(*v);
            }
            Basic::U64(v) => {
                buf.store_u64(*v);
            }
            Basic::F64(v) => {
                buf.store_f64(*v);
            }
            Basic::String(v) => {
                buf.store_str(v);
            }
        }
    }

    fn decode(signature: &Signature, body: &mut Body<'_>) -> Result<Basic> {
        Ok(match signature.as_bytes() {
            b"y" => Basic::Byte(body.load_u8()?),
            b"b" => Basic::Bool(body.load_bool()?),
            b"n" => Basic::I16(body.load_i16()?),
            b"q" => Basic::U16(body.load_u16()?),
            b"i" => Basic::I32(body.load_i32()?),
            b"u" => Basic::U32(body.load_u32()?),
            b"x" => Basic::I64(body.load_i64()?),
            b"t" => Basic::U64(body.load_u64()?),
            b"d" => Basic::F64(body.load_f64()?),
            b"s" => Basic::String(body.load_str()?.to_owned()),
            _ => return Err(Error::new(ErrorKind::DictKeyNotBasic)),
        })
    }
}

impl Value {
    /// The signature this value would encode as.
    pub fn signature(&self) -> SignatureBuf {
        let mut builder = SignatureBuilder::new();
        self.extend_signature(&mut builder);
        builder.to_signature().to_owned()
    }

    fn extend_signature(&self, builder: &mut SignatureBuilder) {
        match self {
            Value::Basic(b) => {
                let _ = builder.extend_from_signature(b.signature());
            }
            Value::Path(_) => {
                let _ = builder.extend_from_signature(Signature::OBJECT_PATH);
            }
            Value::Signature(_) => {
                let _ = builder.extend_from_signature(Signature::SIGNATURE);
            }
            Value::Fd(_) => {
                let _ = builder.extend_from_signature(Signature::UNIX_FD);
            }
            Value::Array(element, _) => {
                let _ = builder.open_array();
                let _ = builder.extend_from_signature(element.as_ref());
                builder.close_array();
            }
            Value::Struct(fields) => {
                let _ = builder.open_struct();

                for field in fields {
                    field.extend_signature(builder);
                }

                let _ = builder.close_struct();
            }
            Value::Dict(key, value, _) => {
                let _ = builder.open_array();
                let _ = builder.open_dict_entry();
                let _ = builder.extend_from_signature(key.as_ref());
                let _ = builder.extend_from_signature(value.as_ref());
                let _ = builder.close_dict_entry();
                builder.close_array();
            }
            Value::Variant(_) => {
                let _ = builder.extend_from_signature(Signature::VARIANT);
            }
        }
    }

    /// Encode this value into `buf`, following its own shape rather than a
    /// pre-declared signature.
    pub fn encode(&self, buf: &mut BodyBuf) -> Result<()> {
        match self {
            Value::Basic(b) => b.encode(buf)?,
            Value::Path(p) => {
                buf.store_object_path(p);
            }
            Value::Signature(s) => {
                buf.store_signature(s);
            }
            Value::Fd(_) => {
                return Err(Error::new(ErrorKind::UnrepresentableType(
                    "cannot re-encode a bare descriptor index without its owning message",
                )));
            }
            Value::Array(element, items) => {
                let align = crate::ty::signature_alignment(element);

                buf.store_array(align, |buf| -> Result<()> {
                    for item in items {
                        item.encode(buf)?;
                    }

                    Ok(())
                })?;
            }
            Value::Struct(fields) => {
                buf.store_struct(|buf| -> Result<()> {
                    for field in fields {
                        field.encode(buf)?;
                    }

                    Ok(())
                })?;
            }
            Value::Dict(_, _, entries) => {
                buf.store_array(8, |buf| -> Result<()> {
                    for (key, value) in entries {
                        buf.store_dict_entry(|buf| -> Result<()> {
                            key.encode(buf)?;
                            value.encode(buf)
                        })?;
                    }

                    Ok(())
                })?;
            }
            Value::Variant(inner) => {
                let signature = inner.signature();
                buf.store_variant(&signature, |buf| inner.encode(buf))?;
            }
        }

        Ok(())
    }

    /// Decode a value matching `signature` out of `body`.
    pub fn decode(signature: &Signature, body: &mut Body<'_>) -> Result<Value> {
        let ty = signature
            .iter()
            .next()
            .ok_or(Error::new(ErrorKind::SignatureMismatch))?;

        Ok(match ty {
            Type::Signature(s) => match s.as_bytes() {
                b"o" => Value::Path(body.load_object_path()?.to_owned()),
                b"g" => Value::Signature(body.load_signature()?),
                b"h" => Value::Fd(body.load_fd_index()?),
                b"v" => {
                    let inner_signature = body.load_variant_signature()?;
                    Value::Variant(Box::new(Value::decode(&inner_signature, body)?))
                }
                _ => Value::Basic(Basic::decode(s, body)?),
            },
            Type::Array(element) => {
                if let Some(Type::Dict(key, value)) = element.iter().next() {
                    let mut array = body.load_array(8)?;
                    let mut entries = BTreeMap::new();

                    while !array.is_empty() {
                        array.load_dict_entry()?;
                        let k = Basic::decode(key, &mut array)?;
                        let v = Value::decode(value, &mut array)?;
                        entries.insert(k, v);
                    }

                    Value::Dict(key.to_owned(), value.to_owned(), entries)
                } else {
                    let align = crate::ty::signature_alignment(element);
                    let mut array = body.load_array(align)?;
                    let mut items = Vec::new();

                    while !array.is_empty() {
                        items.push(Value::decode(element, &mut array)?);
                    }

                    Value::Array(element.to_owned(), items)
                }
            }
            Type::Struct(fields) => {
                body.load_struct()?;
                let mut values = Vec::new();
                let mut iter = fields.iter();

                while let Some(field) = iter.next() {
                    values.push(Value::decode_type(field, body)?);
                }

                Value::Struct(values)
            }
            Type::Dict(..) => return Err(Error::new(ErrorKind::SignatureMismatch)),
        })
    }

    fn decode_type(ty: Type<'_>, body: &mut Body<'_>) -> Result<Value> {
        match ty {
            Type::Signature(s) => Value::decode(s, body),
            Type::Array(element) => {
                let mut builder = SignatureBuilder::new();
                let _ = builder.open_array();
                let _ = builder.extend_from_signature(element);
                builder.close_array();
                Value::decode(builder.to_signature(), body)
            }
            Type::Struct(fields) => {
                let mut builder = SignatureBuilder::new();
                let _ = builder.open_struct();
                let _ = builder.extend_from_signature(fields);
                let _ = builder.close_struct();
                Value::decode(builder.to_signature(), body)
            }
            Type::Dict(key, value) => {
                let mut builder = SignatureBuilder::new();
                let _ = builder.open_array();
                let _ = builder.open_dict_entry();
                let _ = builder.extend_from_signature(key);
                let _ = builder.extend_from_signature(value);
                let _ = builder.close_dict_entry();
                builder.close_array();
                Value::decode(builder.to_signature(), body)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Body;

    fn round_trip(value: Value) -> Value {
        let mut buf = BodyBuf::new();
        value.encode(&mut buf).unwrap();

        let signature = value.signature();
        let mut body = Body::new(buf.as_bytes(), buf.endianness());
        Value::decode(&signature, &mut body).unwrap()
    }

    #[test]
    fn basic_round_trips() {
        let value = Value::Basic(Basic::U32(7));
        assert_eq!(round_trip(value.clone()), value);
    }

    #[test]
    fn string_round_trips() {
        let value = Value::Basic(Basic::String("hello".to_string()));
        assert_eq!(round_trip(value.clone()), value);
    }

    #[test]
    fn array_round_trips() {
        let value = Value::Array(
            Signature::UINT32.to_owned(),
            vec![Value::Basic(Basic::U32(1)), Value::Basic(Basic::U32(2))],
        );
        assert_eq!(round_trip(value.clone()), value);
    }

    #[test]
    fn struct_round_trips() {
        let value = Value::Struct(vec![
            Value::Basic(Basic::U32(1)),
            Value::Basic(Basic::String("x".to_string())),
        ]);
        assert_eq!(round_trip(value.clone()), value);
    }

    #[test]
    fn dict_round_trips() {
        let mut entries = BTreeMap::new();
        entries.insert(Basic::String("a".to_string()), Value::Basic(Basic::U32(1)));

        let value = Value::Dict(Signature::STRING.to_owned(), Signature::UINT32.to_owned(), entries);
        assert_eq!(round_trip(value.clone()), value);
    }

    #[test]
    fn variant_round_trips() {
        let value = Value::Variant(Box::new(Value::Basic(Basic::U32(9))));
        assert_eq!(round_trip(value.clone()), value);
    }

    #[test]
    fn path_round_trips() {
        let path = crate::object_path::ObjectPath::new("/a/b").unwrap().to_owned();
        let value = Value::Path(path);
        assert_eq!(round_trip(value.clone()), value);
    }
}
