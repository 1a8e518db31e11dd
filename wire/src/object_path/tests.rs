use super::{ObjectPath, ObjectPathBuf};

#[test]
fn root_is_valid() {
    assert!(ObjectPath::new("/").is_ok());
    assert!(ObjectPath::ROOT.is_root());
}

#[test]
fn rejects_missing_leading_slash() {
    assert!(ObjectPath::new("no/leading/slash").is_err());
}

#[test]
fn rejects_trailing_slash() {
    assert!(ObjectPath::new("/trailing/").is_err());
}

#[test]
fn rejects_doubled_slash() {
    assert!(ObjectPath::new("/a//b").is_err());
}

#[test]
fn rejects_empty_element() {
    assert!(ObjectPath::new("/a//").is_err());
}

#[test]
fn accepts_well_formed_path() {
    let path = ObjectPath::new("/org/freedesktop/DBus").unwrap();
    assert_eq!(path.as_str(), "/org/freedesktop/DBus");
    assert_eq!(
        path.iter().collect::<Vec<_>>(),
        vec!["org", "freedesktop", "DBus"]
    );
}

#[test]
fn prefix_matching_is_element_aligned() {
    let a = ObjectPath::new("/org/freedesktop").unwrap();
    let b = ObjectPath::new("/org/freedesktop/DBus").unwrap();
    let c = ObjectPath::new("/org/freedesktopx").unwrap();

    assert!(a.is_prefix_of(b));
    assert!(!a.is_prefix_of(c));
    assert!(ObjectPath::ROOT.is_prefix_of(b));
}

#[test]
fn owned_round_trips() {
    let buf = ObjectPathBuf::new("/a/b/c").unwrap();
    assert_eq!(&*buf, ObjectPath::new("/a/b/c").unwrap());
}
