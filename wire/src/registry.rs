//! A process-wide cache of the signatures types encode as.
//!
//! Computing a [`DBusType`] signature walks the type recursively every time;
//! for types nested a few levels deep (a struct of vecs of structs) that adds
//! up across every call and reply. [`signature_of`] caches the result keyed
//! by [`TypeId`], so the walk happens once per type per process.
//!
//! Recursive types (a struct that contains itself, directly or through a
//! container) have no signature a D-Bus message could carry - D-Bus
//! signatures are always finite - so the cache also detects recursion via a
//! thread-local stack of types currently being computed, and fails fast
//! with [`ErrorKind::RecursiveType`] instead of overflowing the stack.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use dbus_core::signature::SignatureBuf;

use crate::error::{Error, ErrorKind, Result};
use crate::ty::DBusType;

fn cache() -> &'static Mutex<HashMap<TypeId, SignatureBuf>> {
    static CACHE: OnceLock<Mutex<HashMap<TypeId, SignatureBuf>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

thread_local! {
    static IN_PROGRESS: RefCell<Vec<TypeId>> = const { RefCell::new(Vec::new()) };
}

/// Look up (or compute and cache) the signature for `T`.
pub fn signature_of<T>() -> Result<SignatureBuf>
where
    T: DBusType + 'static,
{
    let id = TypeId::of::<T>();

    if let Some(cached) = cache().lock().unwrap().get(&id) {
        return Ok(cached.clone());
    }

    let entered = IN_PROGRESS.with(|stack| {
        let mut stack = stack.borrow_mut();

        if stack.contains(&id) {
            return false;
        }

        stack.push(id);
        true
    });

    if !entered {
        return Err(Error::new(ErrorKind::RecursiveType));
    }

    let result = T::signature();

    IN_PROGRESS.with(|stack| {
        stack.borrow_mut().pop();
    });

    let signature = result?;
    cache()
        .lock()
        .unwrap()
        .insert(id, signature.clone());
    Ok(signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_primitive_signature() {
        let a = signature_of::<u32>().unwrap();
        let b = signature_of::<u32>().unwrap();
        assert_eq!(a.as_bytes(), b"u");
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn caches_tuple_signature() {
        let sig = signature_of::<(u32, String)>().unwrap();
        assert_eq!(sig.as_bytes(), b"(us)");
    }
}
