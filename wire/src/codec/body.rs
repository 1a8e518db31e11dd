use dbus_core::proto::Endianness;
use dbus_core::signature::{Signature, SignatureBuf};

use crate::error::{Error, ErrorKind, Result};
use crate::ObjectPath;

use super::padding_to;

/// A cursor over a borrowed body, reading values out in the order they were
/// written by [`BodyBuf`][super::BodyBuf].
///
/// Every `load_*` method advances the cursor past the value's required
/// alignment padding before reading, mirroring the padding `BodyBuf` inserts
/// on the encode side.
#[derive(Debug, Clone, Copy)]
pub struct Body<'de> {
    data: &'de [u8],
    pos: usize,
    endianness: Endianness,
}

impl<'de> Body<'de> {
    /// Construct a cursor over `data`, decoding with the given byte order.
    #[inline]
    pub fn new(data: &'de [u8], endianness: Endianness) -> Self {
        Self {
            data,
            pos: 0,
            endianness,
        }
    }

    /// The byte order this cursor is decoding with.
    #[inline]
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Test if the cursor has consumed every byte.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }

    /// The number of unread bytes remaining.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// The number of bytes read from the underlying buffer so far.
    #[inline]
    pub fn consumed(&self) -> usize {
        self.pos
    }

    fn align_to(&mut self, align: usize) -> Result<()> {
        let pad = padding_to(align, self.pos);

        if pad > self.remaining() {
            return Err(Error::new(ErrorKind::BufferUnderflow));
        }

        self.pos += pad;
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'de [u8]> {
        if len > self.remaining() {
            return Err(Error::new(ErrorKind::BufferUnderflow));
        }

        let (out, rest) = self.data[self.pos..].split_at(len);
        self.pos += len;
        let _ = rest;
        Ok(out)
    }

    /// Load a `BYTE`.
    pub fn load_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Load a `BOOLEAN`.
    pub fn load_bool(&mut self) -> Result<bool> {
        Ok(self.load_u32()? != 0)
    }

    /// Load an `INT16`.
    pub fn load_i16(&mut self) -> Result<i16> {
        Ok(self.load_u16()? as i16)
    }

    /// Load a `UINT16`.
    pub fn load_u16(&mut self) -> Result<u16> {
        self.align_to(2)?;
        let bytes: [u8; 2] = self.take(2)?.try_into().expect("exact length");

        Ok(match self.endianness {
            Endianness::BIG => u16::from_be_bytes(bytes),
            _ => u16::from_le_bytes(bytes),
        })
    }

    /// Load an `INT32`.
    pub fn load_i32(&mut self) -> Result<i32> {
        Ok(self.load_u32()? as i32)
    }

    /// Load a `UINT32`.
    pub fn load_u32(&mut self) -> Result<u32> {
        self.align_to(4)?;
        let bytes: [u8; 4] = self.take(4)?.try_into().expect("exact length");

        Ok(match self.endianness {
            Endianness::BIG => u32::from_be_bytes(bytes),
            _ => u32::from_le_bytes(bytes),
        })
    }

    /// Load an `INT64`.
    pub fn load_i64(&mut self) -> Result<i64> {
        Ok(self.load_u64()? as i64)
    }

    /// Load a `UINT64`.
    pub fn load_u64(&mut self) -> Result<u64> {
        self.align_to(8)?;
        let bytes: [u8; 8] = self.take(8)?.try_into().expect("exact length");

        Ok(match self.endianness {
            Endianness::BIG => u64::from_be_bytes(bytes),
            _ => u64::from_le_bytes(bytes),
        })
    }

    /// Load a `DOUBLE`.
    pub fn load_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.load_u64()?))
    }

    /// Load a length-prefixed, NUL-terminated UTF-8 `STRING`.
    pub fn load_str(&mut self) -> Result<&'de str> {
        let bytes = self.load_str_raw()?;
        std::str::from_utf8(bytes).map_err(|e| Error::new(ErrorKind::Utf8Error(e)))
    }

    /// Load an `OBJECT_PATH`.
    pub fn load_object_path(&mut self) -> Result<&'de ObjectPath> {
        let bytes = self.load_str_raw()?;
        let s = std::str::from_utf8(bytes).map_err(|e| Error::new(ErrorKind::Utf8Error(e)))?;
        Ok(ObjectPath::new(s)?)
    }

    fn load_str_raw(&mut self) -> Result<&'de [u8]> {
        let len = self.load_u32()? as usize;
        let bytes = self.take(len)?;
        let nul = self.take(1)?;

        if nul != [0] {
            return Err(Error::new(ErrorKind::NotNullTerminated));
        }

        Ok(bytes)
    }

    /// Load a `SIGNATURE`, which uses a single-byte length prefix.
    pub fn load_signature(&mut self) -> Result<SignatureBuf> {
        let len = self.take(1)?[0] as usize;
        let bytes = self.take(len)?;
        let nul = self.take(1)?;

        if nul != [0] {
            return Err(Error::new(ErrorKind::NotNullTerminated));
        }

        Ok(Signature::new(bytes)?.to_owned())
    }

    /// Load a `UNIX_FD` index. Resolving the index to an actual descriptor
    /// is the caller's responsibility, since the descriptor table lives on
    /// the message this body was sliced from.
    pub fn load_fd_index(&mut self) -> Result<u32> {
        self.load_u32()
    }

    /// Load an array, returning a sub-cursor bounded to exactly the array's
    /// body bytes. `element_align` must match what was passed to
    /// `BodyBuf::store_array` when this array was encoded.
    pub fn load_array(&mut self, element_align: usize) -> Result<Body<'de>> {
        let len = self.load_u32()? as usize;
        self.align_to(element_align)?;
        let bytes = self.take(len)?;
        Ok(Body::new(bytes, self.endianness))
    }

    /// Consume struct-alignment padding. Structs carry no length prefix; the
    /// caller reads fields until it has consumed as many as the signature
    /// calls for.
    pub fn load_struct(&mut self) -> Result<()> {
        self.align_to(8)
    }

    /// Consume dict-entry-alignment padding.
    pub fn load_dict_entry(&mut self) -> Result<()> {
        self.align_to(8)
    }

    /// Load the signature prefixing a variant's value.
    pub fn load_variant_signature(&mut self) -> Result<SignatureBuf> {
        let signature = self.load_signature()?;

        if signature.iter().count() != 1 {
            return Err(Error::new(ErrorKind::InvalidVariantSignature));
        }

        Ok(signature)
    }
}
