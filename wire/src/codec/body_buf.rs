use std::os::fd::OwnedFd;

use dbus_core::proto::Endianness;
use dbus_core::signature::{Signature, SignatureBuf, SignatureBuilder, SignatureError};

use crate::ObjectPath;

use super::padding_to;

/// A growable, owned buffer values are encoded into.
///
/// `BodyBuf` tracks the byte order it is encoding with, the signature of
/// everything written so far, and the out-of-band file descriptors attached
/// to the eventual message. Every `store_*` method pads to the alignment its
/// value requires before writing, exactly as [`Body`][super::Body] expects
/// when decoding the same bytes back.
#[derive(Debug)]
pub struct BodyBuf {
    buf: Vec<u8>,
    endianness: Endianness,
    signature: SignatureBuilder,
    fds: Vec<OwnedFd>,
}

impl BodyBuf {
    /// Construct a new empty body using the host's native byte order.
    pub fn new() -> Self {
        Self::with_endianness(Endianness::NATIVE)
    }

    /// Construct a new empty body using the given byte order.
    pub fn with_endianness(endianness: Endianness) -> Self {
        Self {
            buf: Vec::new(),
            endianness,
            signature: SignatureBuilder::new(),
            fds: Vec::new(),
        }
    }

    /// The byte order this buffer is encoding with.
    #[inline]
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// The signature of every value written to this buffer so far.
    #[inline]
    pub fn signature(&self) -> &Signature {
        self.signature.to_signature()
    }

    /// Test if nothing has been written yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The number of bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Access the raw bytes written so far.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Clear the buffer, preparing it for reuse.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.signature.clear();
        self.fds.clear();
    }

    /// Disassemble this buffer into its raw parts: the encoded body, its
    /// signature, and the file descriptors queued for out-of-band delivery.
    pub fn into_raw_parts(self) -> (Vec<u8>, SignatureBuf, Vec<OwnedFd>) {
        (self.buf, self.signature.to_signature().to_owned(), self.fds)
    }

    fn align_to(&mut self, align: usize) {
        let pad = padding_to(align, self.buf.len());
        self.buf.resize(self.buf.len() + pad, 0);
    }

    /// Store a `BYTE`.
    pub fn store_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self.signature.extend_from_signature(Signature::BYTE);
        self
    }

    /// Store a `BOOLEAN`, encoded as a `u32` that is `0` or `1`.
    pub fn store_bool(&mut self, value: bool) -> &mut Self {
        self.align_to(4);
        self.put_u32(value as u32);
        self.signature.extend_from_signature(Signature::new_const(b"b"));
        self
    }

    /// Store an `INT16`.
    pub fn store_i16(&mut self, value: i16) -> &mut Self {
        self.align_to(2);
        self.put_u16(value as u16);
        self.signature.extend_from_signature(Signature::INT16);
        self
    }

    /// Store a `UINT16`.
    pub fn store_u16(&mut self, value: u16) -> &mut Self {
        self.align_to(2);
        self.put_u16(value);
        self.signature.extend_from_signature(Signature::UINT16);
        self
    }

    /// Store an `INT32`.
    pub fn store_i32(&mut self, value: i32) -> &mut Self {
        self.align_to(4);
        self.put_u32(value as u32);
        self.signature.extend_from_signature(Signature::INT32);
        self
    }

    /// Store a `UINT32`.
    pub fn store_u32(&mut self, value: u32) -> &mut Self {
        self.align_to(4);
        self.put_u32(value);
        self.signature.extend_from_signature(Signature::UINT32);
        self
    }

    /// Store an `INT64`.
    pub fn store_i64(&mut self, value: i64) -> &mut Self {
        self.align_to(8);
        self.put_u64(value as u64);
        self.signature.extend_from_signature(Signature::INT64);
        self
    }

    /// Store a `UINT64`.
    pub fn store_u64(&mut self, value: u64) -> &mut Self {
        self.align_to(8);
        self.put_u64(value);
        self.signature.extend_from_signature(Signature::UINT64);
        self
    }

    /// Store a `DOUBLE`.
    pub fn store_f64(&mut self, value: f64) -> &mut Self {
        self.align_to(8);
        self.put_u64(value.to_bits());
        self.signature.extend_from_signature(Signature::DOUBLE);
        self
    }

    /// Store a length-prefixed, NUL-terminated UTF-8 `STRING`.
    pub fn store_str(&mut self, value: &str) -> &mut Self {
        self.store_str_raw(value);
        self.signature.extend_from_signature(Signature::STRING);
        self
    }

    /// Store an `OBJECT_PATH`, which has the same wire shape as `STRING`.
    pub fn store_object_path(&mut self, value: &ObjectPath) -> &mut Self {
        self.store_str_raw(value.as_str());
        self.signature.extend_from_signature(Signature::OBJECT_PATH);
        self
    }

    fn store_str_raw(&mut self, value: &str) {
        self.align_to(4);
        self.put_u32(value.len() as u32);
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
    }

    /// Store a `SIGNATURE`, which uses a single-byte length prefix.
    pub fn store_signature(&mut self, value: &Signature) -> &mut Self {
        self.buf.push(value.len() as u8);
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
        self.signature.extend_from_signature(Signature::SIGNATURE);
        self
    }

    /// Store a `UNIX_FD`: the file descriptor is queued for out-of-band
    /// delivery and its index into that queue is written to the body.
    pub fn store_fd(&mut self, fd: OwnedFd) -> &mut Self {
        let index = self.fds.len() as u32;
        self.fds.push(fd);
        self.align_to(4);
        self.put_u32(index);
        self.signature.extend_from_signature(Signature::UNIX_FD);
        self
    }

    /// Write an array, using `f` to emit its elements. `element_align` must
    /// be the element type's own alignment (1/2/4/8), so that the padding
    /// required between the length and the first element is inserted even
    /// for an empty array, and excluded from the encoded length.
    pub fn store_array<F, E>(
        &mut self,
        element_align: usize,
        f: F,
    ) -> Result<&mut Self, E>
    where
        F: FnOnce(&mut Self) -> Result<(), E>,
        E: From<SignatureError>,
    {
        self.signature.open_array().map_err(E::from)?;

        self.align_to(4);
        let at = self.buf.len();
        self.buf.extend_from_slice(&[0, 0, 0, 0]);

        self.align_to(element_align);

        let start = self.buf.len();
        f(self)?;
        let end = self.buf.len();

        let len = u32::try_from(end - start).expect("array body fits in u32");
        self.buf[at..at + 4].copy_from_slice(&self.encode_u32(len));

        self.signature.close_array();
        Ok(self)
    }

    /// Write a struct, using `f` to emit its fields. Structs are always
    /// 8-byte aligned regardless of their first field's alignment.
    pub fn store_struct<F, E>(&mut self, f: F) -> Result<&mut Self, E>
    where
        F: FnOnce(&mut Self) -> Result<(), E>,
        E: From<SignatureError>,
    {
        self.signature.open_struct().map_err(E::from)?;
        self.align_to(8);
        f(self)?;
        self.signature.close_struct().map_err(E::from)?;
        Ok(self)
    }

    /// Write a dict entry, using `f` to emit the key then the value. Only
    /// valid directly inside an array.
    pub fn store_dict_entry<F, E>(&mut self, f: F) -> Result<&mut Self, E>
    where
        F: FnOnce(&mut Self) -> Result<(), E>,
        E: From<SignatureError>,
    {
        self.signature.open_dict_entry().map_err(E::from)?;
        self.align_to(8);
        f(self)?;
        self.signature.close_dict_entry().map_err(E::from)?;
        Ok(self)
    }

    /// Write a variant: the inner value's signature, then the value itself,
    /// emitted by `f`.
    pub fn store_variant<F, E>(&mut self, inner: &Signature, f: F) -> Result<&mut Self, E>
    where
        F: FnOnce(&mut Self) -> Result<(), E>,
        E: From<SignatureError>,
    {
        self.store_signature(inner);
        f(self)?;
        self.signature.extend_from_signature(Signature::VARIANT);
        Ok(self)
    }

    fn encode_u16(&self, value: u16) -> [u8; 2] {
        match self.endianness {
            Endianness::BIG => value.to_be_bytes(),
            _ => value.to_le_bytes(),
        }
    }

    fn encode_u32(&self, value: u32) -> [u8; 4] {
        match self.endianness {
            Endianness::BIG => value.to_be_bytes(),
            _ => value.to_le_bytes(),
        }
    }

    fn encode_u64(&self, value: u64) -> [u8; 8] {
        match self.endianness {
            Endianness::BIG => value.to_be_bytes(),
            _ => value.to_le_bytes(),
        }
    }

    fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&self.encode_u16(value));
    }

    fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&self.encode_u32(value));
    }

    fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&self.encode_u64(value));
    }
}

impl Default for BodyBuf {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
