use dbus_core::proto::Endianness;
use dbus_core::signature::SignatureError;

use super::{Body, BodyBuf};

#[test]
fn scenario_u32_is_four_byte_aligned() {
    let mut body = BodyBuf::with_endianness(Endianness::BIG);
    body.store_u8(1);
    body.store_u32(0x0203_0405);

    assert_eq!(body.as_bytes(), &[1, 0, 0, 0, 0x02, 0x03, 0x04, 0x05]);
    assert_eq!(body.signature().as_bytes(), b"yu");
}

#[test]
fn scenario_string_is_length_prefixed_and_nul_terminated() {
    let mut body = BodyBuf::with_endianness(Endianness::BIG);
    body.store_str("hi");

    assert_eq!(body.as_bytes(), &[0, 0, 0, 2, b'h', b'i', 0]);
    assert_eq!(body.signature().as_bytes(), b"s");
}

#[test]
fn scenario_struct_is_eight_byte_aligned() {
    let mut body = BodyBuf::with_endianness(Endianness::BIG);
    body.store_u8(1);
    body.store_struct(|b| -> Result<(), SignatureError> {
        b.store_u16(7);
        Ok(())
    })
    .unwrap();

    assert_eq!(
        body.as_bytes(),
        &[1, 0, 0, 0, 0, 0, 0, 0, 0, 7],
        "7 bytes of padding bring the struct to an 8-byte boundary"
    );
    assert_eq!(body.signature().as_bytes(), b"y(q)");
}

#[test]
fn scenario_array_of_struct_length_excludes_leading_pad() {
    let mut body = BodyBuf::with_endianness(Endianness::BIG);

    body.store_array(8, |b| -> Result<(), SignatureError> {
        b.store_struct(|b| -> Result<(), SignatureError> {
            b.store_u16(1);
            Ok(())
        })?;
        b.store_struct(|b| -> Result<(), SignatureError> {
            b.store_u16(2);
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    assert_eq!(
        body.as_bytes(),
        &[
            0x00, 0x00, 0x00, 0x0a, // length = 10
            0x00, 0x00, 0x00, 0x00, // leading pad to 8-byte struct boundary
            0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02,
        ]
    );
    assert_eq!(body.signature().as_bytes(), b"a(q)");
}

#[test]
fn scenario_empty_struct_array_has_zero_length_but_keeps_leading_pad() {
    let mut body = BodyBuf::with_endianness(Endianness::BIG);

    body.store_array(8, |_| -> Result<(), SignatureError> { Ok(()) })
        .unwrap();

    assert_eq!(body.as_bytes(), &[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
}

#[test]
fn scenario_dict_entry_inside_array() {
    let mut body = BodyBuf::with_endianness(Endianness::BIG);

    body.store_array(8, |b| -> Result<(), SignatureError> {
        b.store_dict_entry(|b| -> Result<(), SignatureError> {
            b.store_u32(1);
            b.store_str("one");
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    assert_eq!(body.signature().as_bytes(), b"a{us}");
}

#[test]
fn round_trip_primitives() {
    for endianness in [Endianness::BIG, Endianness::LITTLE] {
        let mut buf = BodyBuf::with_endianness(endianness);
        buf.store_u8(42);
        buf.store_bool(true);
        buf.store_i32(-7);
        buf.store_str("dbus");
        buf.store_f64(3.5);

        let mut body = Body::new(buf.as_bytes(), endianness);
        assert_eq!(body.load_u8().unwrap(), 42);
        assert!(body.load_bool().unwrap());
        assert_eq!(body.load_i32().unwrap(), -7);
        assert_eq!(body.load_str().unwrap(), "dbus");
        assert_eq!(body.load_f64().unwrap(), 3.5);
        assert!(body.is_empty());
    }
}

#[test]
fn round_trip_array_of_struct() {
    let mut buf = BodyBuf::with_endianness(Endianness::LITTLE);
    buf.store_array(8, |b| -> Result<(), SignatureError> {
        b.store_struct(|b| -> Result<(), SignatureError> {
            b.store_u16(1);
            Ok(())
        })?;
        b.store_struct(|b| -> Result<(), SignatureError> {
            b.store_u16(2);
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    let mut body = Body::new(buf.as_bytes(), Endianness::LITTLE);
    let mut array = body.load_array(8).unwrap();

    array.load_struct().unwrap();
    assert_eq!(array.load_u16().unwrap(), 1);
    array.load_struct().unwrap();
    assert_eq!(array.load_u16().unwrap(), 2);
    assert!(array.is_empty());
}

#[test]
fn round_trip_variant_signature() {
    let mut buf = BodyBuf::with_endianness(Endianness::LITTLE);
    buf.store_variant(dbus_core::signature::Signature::UINT32, |b| -> Result<(), SignatureError> {
        b.store_u32(99);
        Ok(())
    })
    .unwrap();

    let mut body = Body::new(buf.as_bytes(), Endianness::LITTLE);
    let signature = body.load_variant_signature().unwrap();
    assert_eq!(signature.as_bytes(), b"u");
    assert_eq!(body.load_u32().unwrap(), 99);
}
