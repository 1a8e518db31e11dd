use dbus_wire::codec::{Body, BodyBuf};
use dbus_wire::ty::DBusType;
use dbus_wire::DBusType as DeriveDBusType;

#[derive(DeriveDBusType, Debug, PartialEq)]
struct Point {
    x: u32,
    y: u32,
}

#[derive(DeriveDBusType, Debug, PartialEq)]
struct Wrapper(u32, String);

#[derive(DeriveDBusType, Debug, PartialEq, Clone, Copy)]
enum Color {
    Red,
    Green,
    Blue,
}

#[test]
fn named_struct_round_trips() {
    let point = Point { x: 1, y: 2 };

    let mut buf = BodyBuf::new();
    point.encode(&mut buf).unwrap();

    let mut body = Body::new(buf.as_bytes(), buf.endianness());
    assert_eq!(Point::decode(&mut body).unwrap(), point);
}

#[test]
fn named_struct_signature_is_struct() {
    assert_eq!(Point::signature().unwrap().as_bytes(), b"(uu)");
}

#[test]
fn tuple_struct_round_trips() {
    let wrapper = Wrapper(7, "hello".to_string());

    let mut buf = BodyBuf::new();
    wrapper.encode(&mut buf).unwrap();

    let mut body = Body::new(buf.as_bytes(), buf.endianness());
    assert_eq!(Wrapper::decode(&mut body).unwrap(), wrapper);
}

#[test]
fn fieldless_enum_round_trips() {
    let mut buf = BodyBuf::new();
    Color::Green.encode(&mut buf).unwrap();

    let mut body = Body::new(buf.as_bytes(), buf.endianness());
    assert_eq!(Color::decode(&mut body).unwrap(), Color::Green);
}

#[test]
fn fieldless_enum_rejects_unknown_code() {
    let mut buf = BodyBuf::new();
    99u32.encode(&mut buf).unwrap();

    let mut body = Body::new(buf.as_bytes(), buf.endianness());
    assert!(Color::decode(&mut body).is_err());
}
