use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

use super::core::{Schema, ToSchema};

macro_rules! primitive_schema {
    ($ctor:ident => $($ty:ty),+ $(,)?) => {
        $(
            impl ToSchema for $ty {
                fn schema() -> Schema {
                    Schema::$ctor()
                }
            }
        )+
    };
}

primitive_schema!(integer => i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
primitive_schema!(number => f32, f64);
primitive_schema!(boolean => bool);
primitive_schema!(string => String, str, char);

macro_rules! sequence_schema {
    ($($seq:ident),+ $(,)?) => {
        $(
            impl<T: ToSchema> ToSchema for $seq<T> {
                fn schema() -> Schema {
                    Schema::array(T::schema())
                }

                fn tag_name() -> Option<&'static str> {
                    T::tag_name()
                }
            }
        )+
    };
}

sequence_schema!(Vec, VecDeque, HashSet, BTreeSet);

impl<T: ToSchema> ToSchema for [T] {
    fn schema() -> Schema {
        Schema::array(T::schema())
    }

    fn tag_name() -> Option<&'static str> {
        T::tag_name()
    }
}

impl<T: ToSchema, const N: usize> ToSchema for [T; N] {
    fn schema() -> Schema {
        Schema::array(T::schema())
    }

    fn tag_name() -> Option<&'static str> {
        T::tag_name()
    }
}

macro_rules! transparent_schema {
    ($($wrapper:ident),+ $(,)?) => {
        $(
            impl<T: ToSchema + ?Sized> ToSchema for $wrapper<T> {
                fn schema() -> Schema {
                    T::schema()
                }

                fn schema_name() -> Option<&'static str> {
                    T::schema_name()
                }

                fn tag_name() -> Option<&'static str> {
                    T::tag_name()
                }

                fn template_name() -> Option<&'static str> {
                    T::template_name()
                }
            }
        )+
    };
}

transparent_schema!(Box, Arc, Rc);

impl<T: ToSchema> ToSchema for Option<T> {
    fn schema() -> Schema {
        T::schema()
    }

    fn schema_name() -> Option<&'static str> {
        T::schema_name()
    }

    fn tag_name() -> Option<&'static str> {
        T::tag_name()
    }

    fn template_name() -> Option<&'static str> {
        T::template_name()
    }
}

impl<T: ToSchema + ?Sized> ToSchema for &T {
    fn schema() -> Schema {
        T::schema()
    }

    fn schema_name() -> Option<&'static str> {
        T::schema_name()
    }
}

impl<K, V: ToSchema, S> ToSchema for HashMap<K, V, S> {
    fn schema() -> Schema {
        Schema::map(V::schema())
    }
}

impl<K, V: ToSchema> ToSchema for BTreeMap<K, V> {
    fn schema() -> Schema {
        Schema::map(V::schema())
    }
}

impl<Tz: TimeZone> ToSchema for DateTime<Tz> {
    fn schema() -> Schema {
        Schema::string()
            .with_format("date-time")
            .with_example(Value::from(
                DateTime::<Utc>::default().to_rfc3339_opts(SecondsFormat::Secs, true),
            ))
    }
}

impl ToSchema for NaiveDateTime {
    fn schema() -> Schema {
        <DateTime<Utc> as ToSchema>::schema()
    }
}

impl ToSchema for NaiveDate {
    fn schema() -> Schema {
        Schema::string()
            .with_format("date")
            .with_example(Value::from(NaiveDate::default().to_string()))
    }
}

/// Arbitrary JSON: an empty schema accepts anything.
impl ToSchema for Value {
    fn schema() -> Schema {
        Schema::default()
    }
}

impl ToSchema for () {
    fn schema() -> Schema {
        Schema::default()
    }

    fn is_unit() -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaType;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert_eq!(u16::schema().schema_type, Some(SchemaType::Integer));
        assert_eq!(f32::schema().schema_type, Some(SchemaType::Number));
        assert_eq!(bool::schema().schema_type, Some(SchemaType::Boolean));
        assert_eq!(String::schema().schema_type, Some(SchemaType::String));
    }

    #[test]
    fn test_sequences_always_have_items() {
        let schema = <Vec<Option<i32>>>::schema();
        assert_eq!(schema.schema_type, Some(SchemaType::Array));
        let items = schema.items.expect("items");
        assert_eq!(items.schema_type, Some(SchemaType::Integer));

        let nested = <VecDeque<Vec<String>>>::schema();
        let inner = nested.items.expect("outer items");
        assert_eq!(inner.schema_type, Some(SchemaType::Array));
        assert!(inner.items.is_some());
    }

    #[test]
    fn test_date_time_is_rfc3339_string() {
        let schema = <DateTime<Utc>>::schema();
        assert_eq!(schema.schema_type, Some(SchemaType::String));
        assert_eq!(schema.format.as_deref(), Some("date-time"));
        assert_eq!(schema.example, Some(json!("1970-01-01T00:00:00Z")));
    }

    #[test]
    fn test_map_uses_additional_properties() {
        let schema = <HashMap<String, bool>>::schema();
        assert!(schema.is_object());
        assert_eq!(
            schema.additional_properties.map(|s| s.schema_type),
            Some(Some(SchemaType::Boolean))
        );
    }

    #[test]
    fn test_unit_marks_empty_body() {
        assert!(<()>::is_unit());
        assert!(!String::is_unit());
    }
}
