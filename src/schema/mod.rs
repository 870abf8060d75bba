//! # Schema Synthesis
//!
//! Every request and response shape registered with a route implements
//! [`ToSchema`], usually through `#[derive(ToSchema)]`. The derive writes an explicit
//! per-field descriptor table (external name, required marker, format, example and
//! validation bounds) so no runtime reflection is involved.
//!
//! ## Mapping
//!
//! | Rust shape                         | Schema                                   |
//! |------------------------------------|------------------------------------------|
//! | struct with named fields           | `object`, properties in declaration order |
//! | `Vec<T>`, `[T]`, `VecDeque<T>`...  | `array` with `items` = schema of `T`      |
//! | `Option<T>`, `Box<T>`, `Arc<T>`    | schema of `T`                            |
//! | `chrono` date/times                | `string`, `date-time`, RFC3339 example   |
//! | integers / floats / bool / strings | `integer` / `number` / `boolean` / `string` |
//! | unit-only enum                     | `string` with `enum`                     |
//!
//! Synthesized schemas are memoised per `TypeId` in [`SchemaCache`] and shared as
//! `Arc<Schema>` between every operation that references the same shape.

mod cache;
mod core;
mod impls;
mod names;

pub use self::cache::SchemaCache;
pub use self::core::{FieldMeta, Schema, SchemaType, ToSchema};
pub use self::names::{generic_schema_name, type_label};
pub use ember_macros::ToSchema;
