//! Component names for instances of generic shapes.
//!
//! `Page<User>` and `Page<i64>` must not share the component `Page`, so the derive
//! names them `Page_User` and `Page_i64`. Names are built once per concrete type and
//! interned for the life of the process, which keeps `schema_name` returning
//! `&'static str`. The set is bounded by the number of monomorphized shapes.

use dashmap::DashMap;
use once_cell::sync::Lazy;

use super::core::ToSchema;

static GENERIC_NAMES: Lazy<DashMap<&'static str, &'static str>> = Lazy::new(DashMap::new);

/// Interned component name for the concrete type `T`, built by `build` on first use.
pub fn generic_schema_name<T: ?Sized>(build: impl FnOnce() -> String) -> &'static str {
    let key = std::any::type_name::<T>();
    if let Some(name) = GENERIC_NAMES.get(key) {
        return *name.value();
    }
    let name = *GENERIC_NAMES
        .entry(key)
        .or_insert_with(|| {
            let leaked: &'static str = Box::leak(build().into_boxed_str());
            leaked
        })
        .value();
    name
}

/// Label of a type argument: its component name, else its Rust type name without
/// module paths (`alloc::vec::Vec<app::User>` becomes `Vec_User`).
pub fn type_label<T: ToSchema + ?Sized>() -> String {
    match T::schema_name() {
        Some(name) => name.to_string(),
        None => short_type_name(std::any::type_name::<T>()),
    }
}

fn short_type_name(full: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let mut start = None;
    let bytes = full.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_alphanumeric() || c == b'_' {
            if start.is_none() {
                start = Some(i);
            }
            i += 1;
            continue;
        }
        if c == b':' && bytes.get(i + 1) == Some(&b':') {
            // module path segment, keep only what follows
            start = None;
            i += 2;
            continue;
        }
        if let Some(s) = start.take() {
            parts.push(&full[s..i]);
        }
        i += 1;
    }
    if let Some(s) = start {
        parts.push(&full[s..]);
    }
    parts.join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker<T>(std::marker::PhantomData<T>);

    #[test]
    fn test_short_type_names() {
        assert_eq!(short_type_name("i64"), "i64");
        assert_eq!(short_type_name("alloc::vec::Vec<app::User>"), "Vec_User");
        assert_eq!(
            short_type_name("std::collections::HashMap<alloc::string::String, u8>"),
            "HashMap_String_u8"
        );
        assert_eq!(short_type_name("&[u8]"), "u8");
    }

    #[test]
    fn test_names_are_built_once_per_type() {
        let first = generic_schema_name::<Marker<u8>>(|| "Marker_u8".to_string());
        let second = generic_schema_name::<Marker<u8>>(|| "other".to_string());
        assert_eq!(first, "Marker_u8");
        assert!(std::ptr::eq(first, second));
        assert_eq!(generic_schema_name::<Marker<u16>>(|| "Marker_u16".to_string()), "Marker_u16");
    }

    #[test]
    fn test_type_label_prefers_component_name() {
        assert_eq!(type_label::<i64>(), "i64");
        assert_eq!(type_label::<Vec<String>>(), "Vec_String");
    }
}
